//! Relay bridge.
//!
//! Handles the complete message flow:
//! 1. Receive a `ChannelMessage` from the poller
//! 2. Dispatch a bot command, or forward free text to the completion client
//! 3. Send the reply back to the originating chat

use crate::commands::{self, Command, CLEARED_TEXT};
use crate::message::{ChannelMessage, OutgoingContent};
use crate::traits::Channel;
use anyhow::{Context, Result};
use relay_common::util::sanitize_for_log;
use relay_llm::{CompletionClient, HistoryStore};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::Instrument;

/// Reply sent when handling a message fails outright.
pub const HANDLER_ERROR: &str = "❌ Произошла ошибка. Попробуйте еще раз.";

/// Connects a channel to the completion client.
pub struct RelayBridge {
    channel: Arc<dyn Channel>,
    completion: CompletionClient,
}

impl RelayBridge {
    pub fn new(channel: Arc<dyn Channel>, completion: CompletionClient) -> Self {
        Self { channel, completion }
    }

    /// Process one inbound message to completion.
    pub async fn process(&self, store: &mut HistoryStore, message: &ChannelMessage) -> Result<()> {
        let content = match Command::parse(&message.text) {
            Some(command) => {
                tracing::info!(command = command.as_str(), "Handling command");
                self.run_command(store, message, command)
            }
            None => {
                if let Err(e) = self.channel.send_typing(&message.channel_id).await {
                    tracing::warn!(error = %e, "Failed to send typing indicator");
                }
                let answer = self
                    .completion
                    .complete(store, &message.user_id, &message.text)
                    .await;
                OutgoingContent::text(answer)
            }
        };

        self.channel
            .send(message.reply(content))
            .await
            .with_context(|| format!("failed to reply in chat {}", message.channel_id))?;
        Ok(())
    }

    fn run_command(
        &self,
        store: &mut HistoryStore,
        message: &ChannelMessage,
        command: Command,
    ) -> OutgoingContent {
        match command {
            Command::Start => OutgoingContent::markdown(commands::welcome_text()),
            Command::Help => OutgoingContent::markdown(commands::help_text()),
            Command::Info => {
                OutgoingContent::markdown(commands::info_text(&self.completion.settings().model))
            }
            Command::Clear => {
                store.clear(&message.user_id);
                tracing::info!(user_id = %message.user_id, "History cleared");
                OutgoingContent::text(CLEARED_TEXT)
            }
        }
    }

    /// Process a message, replying with a fixed notice if processing fails.
    pub async fn handle(&self, store: &mut HistoryStore, message: &ChannelMessage) {
        let span = tracing::info_span!(
            "channel_message",
            trace_id = %message.trace_id,
            channel = self.channel.name(),
            user_id = %message.user_id,
            username = message.username.as_deref().unwrap_or("-"),
        );

        async {
            if let Err(e) = self.process(store, message).await {
                tracing::error!(
                    error = %sanitize_for_log(&format!("{e:#}")),
                    "Failed to process message"
                );
                let notice = message.reply(OutgoingContent::text(HANDLER_ERROR));
                if let Err(e) = self.channel.send(notice).await {
                    tracing::error!(error = %e, "Failed to send error notice");
                }
            }
        }
        .instrument(span)
        .await;
    }

    /// Handle messages one at a time until the sender side closes.
    pub async fn run(&self, mut rx: mpsc::Receiver<ChannelMessage>, store: &mut HistoryStore) {
        tracing::info!("Relay bridge started");

        while let Some(message) = rx.recv().await {
            self.handle(store, &message).await;
        }

        tracing::info!("Relay bridge stopped");
    }
}
