//! Message types for channel communication.

use serde::{Deserialize, Serialize};

/// Inbound text message from a chat platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelMessage {
    /// Platform message ID, used to reply in-thread
    pub id: String,
    /// Chat identifier the reply goes to
    pub channel_id: String,
    /// Sender identifier; history is keyed by this
    pub user_id: String,
    /// Sender display handle, if the platform has one
    #[serde(default)]
    pub username: Option<String>,
    /// Message text
    pub text: String,
    /// Timestamp (Unix millis)
    pub timestamp: i64,
    /// Trace ID assigned on receipt
    pub trace_id: String,
}

impl ChannelMessage {
    /// Build a reply to this message in the same chat.
    pub fn reply(&self, content: OutgoingContent) -> OutgoingMessage {
        OutgoingMessage {
            channel_id: self.channel_id.clone(),
            reply_to: Some(self.id.clone()),
            content,
        }
    }
}

/// Outgoing message to send to a channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutgoingMessage {
    /// Target chat ID
    pub channel_id: String,
    /// Reply to message ID (optional)
    pub reply_to: Option<String>,
    /// Message content
    pub content: OutgoingContent,
}

/// Outgoing message content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OutgoingContent {
    /// Plain text, sent verbatim
    Text { text: String },
    /// Telegram legacy Markdown
    Markdown { text: String },
}

impl OutgoingContent {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn markdown(text: impl Into<String>) -> Self {
        Self::Markdown { text: text.into() }
    }

    /// The raw text regardless of formatting.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Text { text } | Self::Markdown { text } => text,
        }
    }
}
