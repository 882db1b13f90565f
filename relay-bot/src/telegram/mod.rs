//! Telegram channel adapter.
//!
//! Long-polls the Bot API for text messages and sends replies back in order,
//! split into parts that fit Telegram's message size limit.

use crate::chunk::split_message;
use crate::message::{ChannelMessage, OutgoingContent, OutgoingMessage};
use crate::traits::{Channel, ChannelError, ChannelResult};
use async_trait::async_trait;
use relay_common::config::TelegramConfig;
use relay_common::logging::generate_trace_id;
use relay_common::util::sanitize_for_log;
use serde_json::Value;
use std::time::Duration;
use tokio::sync::mpsc;

/// Delay before retrying a failed `getUpdates` call.
const POLL_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Timeout for every call other than the long poll.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Extra time on top of the long-poll timeout before the HTTP call gives up.
const POLL_GRACE: Duration = Duration::from_secs(15);

/// Telegram channel - long-polls the Bot API for updates.
pub struct TelegramChannel {
    bot_token: String,
    api_base: String,
    poll_timeout_secs: u64,
    max_message_len: usize,
    client: reqwest::Client,
}

impl TelegramChannel {
    /// Create a new Telegram channel with default API settings.
    pub fn new(bot_token: impl Into<String>) -> Self {
        let defaults = TelegramConfig::default();
        Self {
            bot_token: bot_token.into(),
            api_base: defaults.api_base,
            poll_timeout_secs: defaults.poll_timeout_secs,
            max_message_len: defaults.max_message_len,
            client: reqwest::Client::new(),
        }
    }

    pub fn from_config(config: &TelegramConfig) -> Self {
        Self::new(config.bot_token.clone())
            .with_api_base(config.api_base.clone())
            .with_poll_timeout(config.poll_timeout_secs)
            .with_max_message_len(config.max_message_len)
    }

    /// Point the channel at another Bot API server.
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_poll_timeout(mut self, secs: u64) -> Self {
        self.poll_timeout_secs = secs;
        self
    }

    pub fn with_max_message_len(mut self, max_message_len: usize) -> Self {
        self.max_message_len = max_message_len.max(1);
        self
    }

    fn api_url(&self, method: &str) -> String {
        format!("{}/bot{}/{method}", self.api_base, self.bot_token)
    }

    /// Convert a `getUpdates` entry into a channel message.
    ///
    /// Only plain text messages are forwarded. Edits, stickers, media and
    /// other update kinds yield `None`.
    pub fn parse_update(update: &Value) -> Option<ChannelMessage> {
        let message = update.get("message")?;
        let text = message.get("text").and_then(Value::as_str)?;
        let message_id = message.get("message_id").and_then(Value::as_i64)?;
        let chat_id = message
            .get("chat")
            .and_then(|c| c.get("id"))
            .and_then(Value::as_i64)?;

        let from = message.get("from");
        let user_id = from
            .and_then(|f| f.get("id"))
            .and_then(Value::as_i64)
            .unwrap_or(chat_id);
        let username = from
            .and_then(|f| f.get("username"))
            .and_then(Value::as_str)
            .map(str::to_string);
        let date = message.get("date").and_then(Value::as_i64).unwrap_or(0);

        Some(ChannelMessage {
            id: message_id.to_string(),
            channel_id: chat_id.to_string(),
            user_id: user_id.to_string(),
            username,
            text: text.to_string(),
            timestamp: date * 1000,
            trace_id: generate_trace_id(),
        })
    }

    /// Fetch the next batch of updates starting at `offset`.
    async fn fetch_updates(&self, offset: i64) -> anyhow::Result<Vec<Value>> {
        let body = serde_json::json!({
            "offset": offset,
            "timeout": self.poll_timeout_secs,
            "allowed_updates": ["message"]
        });

        let data: Value = self
            .client
            .post(self.api_url("getUpdates"))
            .timeout(Duration::from_secs(self.poll_timeout_secs) + POLL_GRACE)
            .json(&body)
            .send()
            .await?
            .json()
            .await?;

        if data.get("ok").and_then(Value::as_bool) != Some(true) {
            let description = data
                .get("description")
                .and_then(Value::as_str)
                .unwrap_or("unknown error");
            anyhow::bail!("Telegram getUpdates failed: {description}");
        }

        Ok(data
            .get("result")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default())
    }

    /// Send a single chunk, retrying as plain text if Telegram rejects the
    /// Markdown entities. Returns the sent message ID.
    async fn send_single_chunk(
        &self,
        text: &str,
        chat_id: &str,
        reply_to: Option<i64>,
        markdown: bool,
    ) -> anyhow::Result<String> {
        let mut body = serde_json::json!({
            "chat_id": chat_id,
            "text": text,
        });
        if let Some(message_id) = reply_to {
            body["reply_parameters"] = serde_json::json!({
                "message_id": message_id,
                "allow_sending_without_reply": true
            });
        }

        let mut formatted = body.clone();
        if markdown {
            formatted["parse_mode"] = Value::from("Markdown");
        }

        let resp = self
            .client
            .post(self.api_url("sendMessage"))
            .timeout(REQUEST_TIMEOUT)
            .json(&formatted)
            .send()
            .await?;

        if resp.status().is_success() {
            return Ok(sent_message_id(resp.json().await?));
        }

        let status = resp.status();
        let error_text = resp.text().await.unwrap_or_default();

        // Telegram returns "Bad Request: can't parse entities" for Markdown errors
        if markdown && status.as_u16() == 400 && error_text.contains("parse entities") {
            tracing::warn!(
                "Telegram Markdown parsing failed, retrying without parse_mode: {}",
                error_text
            );

            let resp_plain = self
                .client
                .post(self.api_url("sendMessage"))
                .timeout(REQUEST_TIMEOUT)
                .json(&body)
                .send()
                .await?;

            if resp_plain.status().is_success() {
                return Ok(sent_message_id(resp_plain.json().await?));
            }

            let plain_error = resp_plain.text().await.unwrap_or_default();
            anyhow::bail!("Telegram sendMessage failed: {plain_error}");
        }

        anyhow::bail!("Telegram sendMessage failed ({status}): {error_text}")
    }

    async fn get_me(&self) -> ChannelResult<Value> {
        let resp = self
            .client
            .get(self.api_url("getMe"))
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(|e| ChannelError::Connection(sanitize_for_log(&e.to_string())))?;

        if !resp.status().is_success() {
            let err = resp.text().await.unwrap_or_default();
            return Err(ChannelError::Auth(format!("Invalid bot token: {err}")));
        }

        resp.json()
            .await
            .map_err(|e| ChannelError::Internal(sanitize_for_log(&e.to_string())))
    }
}

fn sent_message_id(data: Value) -> String {
    data.get("result")
        .and_then(|r| r.get("message_id"))
        .and_then(Value::as_i64)
        .map(|id| id.to_string())
        .unwrap_or_default()
}

#[async_trait]
impl Channel for TelegramChannel {
    fn name(&self) -> &'static str {
        "telegram"
    }

    async fn init(&self) -> ChannelResult<()> {
        let me = self.get_me().await?;
        let username = me
            .get("result")
            .and_then(|r| r.get("username"))
            .and_then(Value::as_str)
            .unwrap_or("unknown");

        tracing::info!(bot = %username, "Telegram channel initialized");
        Ok(())
    }

    async fn send(&self, message: OutgoingMessage) -> ChannelResult<String> {
        let (text, markdown) = match &message.content {
            OutgoingContent::Text { text } => (text.as_str(), false),
            OutgoingContent::Markdown { text } => (text.as_str(), true),
        };
        let reply_to = message
            .reply_to
            .as_deref()
            .and_then(|id| id.parse::<i64>().ok());

        let chunks = split_message(text, self.max_message_len);
        let mut last_id = String::new();
        for chunk in &chunks {
            last_id = self
                .send_single_chunk(chunk, &message.channel_id, reply_to, markdown)
                .await
                .map_err(|e| ChannelError::SendFailed(sanitize_for_log(&e.to_string())))?;
        }

        tracing::debug!(
            channel_id = %message.channel_id,
            parts = chunks.len(),
            "Telegram reply sent"
        );
        Ok(last_id)
    }

    async fn send_typing(&self, channel_id: &str) -> ChannelResult<()> {
        let body = serde_json::json!({
            "chat_id": channel_id,
            "action": "typing"
        });

        let resp = self
            .client
            .post(self.api_url("sendChatAction"))
            .timeout(REQUEST_TIMEOUT)
            .json(&body)
            .send()
            .await
            .map_err(|e| ChannelError::Connection(sanitize_for_log(&e.to_string())))?;

        if !resp.status().is_success() {
            let err = resp.text().await.unwrap_or_default();
            return Err(ChannelError::SendFailed(format!("sendChatAction failed: {err}")));
        }
        Ok(())
    }

    async fn listen(&self, tx: mpsc::Sender<ChannelMessage>) -> ChannelResult<()> {
        let mut offset: i64 = 0;

        tracing::info!("Telegram channel listening for messages...");

        loop {
            if tx.is_closed() {
                return Ok(());
            }

            let updates = match self.fetch_updates(offset).await {
                Ok(updates) => updates,
                Err(e) => {
                    tracing::warn!("Telegram poll error: {}", sanitize_for_log(&e.to_string()));
                    tokio::time::sleep(POLL_RETRY_DELAY).await;
                    continue;
                }
            };

            for update in &updates {
                if let Some(uid) = update.get("update_id").and_then(Value::as_i64) {
                    offset = uid + 1;
                }

                let Some(msg) = Self::parse_update(update) else {
                    continue;
                };

                tracing::info!(
                    trace_id = %msg.trace_id,
                    message_id = %msg.id,
                    channel_id = %msg.channel_id,
                    user_id = %msg.user_id,
                    "Telegram message received"
                );

                if tx.send(msg).await.is_err() {
                    tracing::info!("Message receiver closed, stopping Telegram poller");
                    return Ok(());
                }
            }
        }
    }

    async fn shutdown(&self) -> ChannelResult<()> {
        tracing::info!("Telegram channel shutting down");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn telegram_channel_name() {
        let ch = TelegramChannel::new("fake-token");
        assert_eq!(ch.name(), "telegram");
    }

    #[test]
    fn telegram_api_url() {
        let ch = TelegramChannel::new("123:ABC");
        assert_eq!(
            ch.api_url("getMe"),
            "https://api.telegram.org/bot123:ABC/getMe"
        );
    }

    #[test]
    fn telegram_api_base_override_strips_slash() {
        let ch = TelegramChannel::new("123:ABC").with_api_base("http://127.0.0.1:8081/");
        assert_eq!(ch.api_url("getUpdates"), "http://127.0.0.1:8081/bot123:ABC/getUpdates");
    }

    #[test]
    fn telegram_from_config() {
        let config = TelegramConfig {
            bot_token: "t".into(),
            max_message_len: 100,
            ..TelegramConfig::default()
        };
        let ch = TelegramChannel::from_config(&config);
        assert_eq!(ch.max_message_len, 100);
        assert_eq!(ch.poll_timeout_secs, 30);
    }

    #[test]
    fn parse_update_text_message() {
        let update = serde_json::json!({
            "update_id": 10,
            "message": {
                "message_id": 42,
                "date": 1_700_000_000,
                "chat": {"id": -1001, "type": "group"},
                "from": {"id": 7, "is_bot": false, "username": "alice"},
                "text": "Привет"
            }
        });

        let msg = TelegramChannel::parse_update(&update).unwrap();
        assert_eq!(msg.id, "42");
        assert_eq!(msg.channel_id, "-1001");
        assert_eq!(msg.user_id, "7");
        assert_eq!(msg.username.as_deref(), Some("alice"));
        assert_eq!(msg.text, "Привет");
        assert_eq!(msg.timestamp, 1_700_000_000_000);
        assert!(!msg.trace_id.is_empty());
    }

    #[test]
    fn parse_update_ignores_non_text() {
        let sticker = serde_json::json!({
            "update_id": 11,
            "message": {
                "message_id": 43,
                "chat": {"id": 5},
                "from": {"id": 5},
                "sticker": {"file_id": "abc"}
            }
        });
        let edited = serde_json::json!({
            "update_id": 12,
            "edited_message": {"message_id": 44, "chat": {"id": 5}, "text": "x"}
        });

        assert!(TelegramChannel::parse_update(&sticker).is_none());
        assert!(TelegramChannel::parse_update(&edited).is_none());
    }

    #[test]
    fn parse_update_without_sender_uses_chat() {
        let update = serde_json::json!({
            "update_id": 13,
            "message": {"message_id": 1, "chat": {"id": 99}, "text": "hi"}
        });
        let msg = TelegramChannel::parse_update(&update).unwrap();
        assert_eq!(msg.user_id, "99");
        assert!(msg.username.is_none());
    }

    #[test]
    fn sent_message_id_reads_result() {
        let data = serde_json::json!({"ok": true, "result": {"message_id": 77}});
        assert_eq!(sent_message_id(data), "77");
        assert_eq!(sent_message_id(serde_json::json!({"ok": true})), "");
    }
}
