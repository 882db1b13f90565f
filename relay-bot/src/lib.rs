//! Telegram front end for deepseek-relay.
//!
//! The poller task feeds a bounded queue; the bridge drains it one message at
//! a time so each user's history is updated in arrival order.

pub mod bridge;
pub mod chunk;
pub mod commands;
pub mod message;
pub mod telegram;
pub mod traits;

pub use bridge::{RelayBridge, HANDLER_ERROR};
pub use chunk::split_message;
pub use commands::Command;
pub use message::{ChannelMessage, OutgoingContent, OutgoingMessage};
pub use telegram::TelegramChannel;
pub use traits::{Channel, ChannelError, ChannelResult};

use anyhow::Result;
use relay_common::config::Config;
use relay_llm::{CompletionClient, CompletionSettings, DeepSeekProvider, HistoryStore};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Capacity of the queue between the poller and the bridge.
const INBOUND_QUEUE: usize = 100;

/// Run the relay until Ctrl-C.
pub async fn start(config: &Config, store: &mut HistoryStore) -> Result<()> {
    let channel: Arc<dyn Channel> = Arc::new(TelegramChannel::from_config(&config.telegram));

    if let Err(e) = channel.init().await {
        tracing::warn!(error = %e, "Telegram init failed, continuing with polling");
    }

    let provider = Arc::new(DeepSeekProvider::from_config(&config.llm));
    tracing::info!(
        endpoint = %provider.endpoint(),
        model = %config.llm.model,
        "Completion provider ready"
    );
    let completion = CompletionClient::new(provider, CompletionSettings::from(&config.llm));
    let bridge = RelayBridge::new(channel.clone(), completion);

    let (tx, rx) = mpsc::channel(INBOUND_QUEUE);
    let listener = {
        let channel = channel.clone();
        tokio::spawn(async move {
            if let Err(e) = channel.listen(tx).await {
                tracing::error!(error = %e, "Telegram listener exited");
            }
        })
    };

    tokio::select! {
        () = bridge.run(rx, store) => {
            tracing::warn!("Inbound queue closed");
        }
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            }
            tracing::info!("Shutdown signal received");
        }
    }

    listener.abort();
    channel.shutdown().await?;
    Ok(())
}
