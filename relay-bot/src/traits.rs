//! Channel traits for implementing channel adapters.

use crate::message::{ChannelMessage, OutgoingMessage};
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Result type for channel operations.
pub type ChannelResult<T> = Result<T, ChannelError>;

/// Channel error type.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Message send failed: {0}")]
    SendFailed(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Channel adapter trait.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Get the channel name.
    fn name(&self) -> &'static str;

    /// Verify credentials and connectivity.
    async fn init(&self) -> ChannelResult<()>;

    /// Send a message, splitting it as the platform requires.
    ///
    /// Returns the platform ID of the last message sent.
    async fn send(&self, message: OutgoingMessage) -> ChannelResult<String>;

    /// Show a "typing" indicator in the chat.
    async fn send_typing(&self, _channel_id: &str) -> ChannelResult<()> {
        Ok(())
    }

    /// Receive messages until the receiver side of `tx` is dropped.
    async fn listen(&self, tx: mpsc::Sender<ChannelMessage>) -> ChannelResult<()>;

    /// Shutdown the channel gracefully.
    async fn shutdown(&self) -> ChannelResult<()>;
}
