//! Channel traits for implementing transport adapters.

use crate::message::{ChannelMessage, OutgoingMessage};
use async_trait::async_trait;

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

    #[error("Channel not ready")]
    NotReady,
}

/// Channel adapter trait.
///
/// Implement this trait to add support for a new chat transport.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Get the channel name.
    fn name(&self) -> &'static str;

    /// Initialize the channel (connect, authenticate, etc.).
    async fn init(&mut self) -> ChannelResult<()>;

    /// Send a message to the channel, returning the transport's message ID.
    async fn send(&self, message: OutgoingMessage) -> ChannelResult<String>;

    /// Listen for incoming messages until the transport ends.
    ///
    /// Every received message is passed to `callback`, which must not block.
    async fn listen<F>(&self, callback: F) -> ChannelResult<()>
    where
        F: Fn(ChannelMessage) + Send + Sync + 'static;

    /// The bot's own username, once known; used to ignore commands
    /// addressed to other bots.
    fn bot_username(&self) -> Option<&str> {
        None
    }

    /// Check if the channel is healthy.
    async fn health_check(&self) -> ChannelResult<()>;

    /// Shutdown the channel gracefully.
    async fn shutdown(&self) -> ChannelResult<()>;
}
