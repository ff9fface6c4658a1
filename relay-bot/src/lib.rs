//! Relay Bot - conversational relay between a chat transport and an
//! OpenAI-compatible completion endpoint.
//!
//! ## Architecture
//!
//! ```text
//! Telegram/CLI → listen → dispatch (one queue per conversation)
//!                              ↓
//!                        Orchestrator → SessionStore (window / append / reset)
//!                              ↓
//!                        CompletionClient → reply::truncate → Channel::send
//! ```

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod cli;
pub mod dispatch;
pub mod message;
pub mod orchestrator;
pub mod prompt;
pub mod provider;
pub mod reply;
pub mod session;
pub mod telegram;
pub mod traits;

#[cfg(test)]
mod testing;

// Re-export commonly used types
pub use cli::CliChannel;
pub use message::{ChannelMessage, ChannelType, MessageContent, OutgoingMessage};
pub use orchestrator::{Command, Orchestrator, Outcome};
pub use provider::{CompatibleClient, CompletionClient, CompletionError};
pub use session::{RetentionPolicy, Role, SessionStore, Turn, Unbounded};
pub use telegram::TelegramChannel;
pub use traits::{Channel, ChannelError, ChannelResult};

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TrySendError};

/// Capacity of the queue between the transport and the dispatcher.
pub const INBOUND_QUEUE: usize = 256;

/// How long in-flight conversations may finish after the transport stops.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(15);

/// Initialize `channel`, then feed everything it receives to the dispatcher
/// until the transport ends or Ctrl-C arrives.
pub async fn run_channel<C>(mut channel: C, orchestrator: Arc<Orchestrator>) -> anyhow::Result<()>
where
    C: Channel + 'static,
{
    channel.init().await?;
    let channel = Arc::new(channel);

    let (tx, rx) = mpsc::channel(INBOUND_QUEUE);
    let processor = dispatch::spawn_processor(orchestrator, Arc::clone(&channel), rx);

    let forward = move |message: ChannelMessage| match tx.try_send(message) {
        Ok(()) => {}
        Err(TrySendError::Full(message)) => tracing::warn!(
            conversation_id = %message.channel_id,
            "Inbound queue full, dropping message"
        ),
        Err(TrySendError::Closed(message)) => tracing::warn!(
            conversation_id = %message.channel_id,
            "Dispatcher stopped, dropping message"
        ),
    };

    let listen_result = tokio::select! {
        result = channel.listen(forward) => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
            Ok(())
        }
    };

    if tokio::time::timeout(SHUTDOWN_GRACE, processor).await.is_err() {
        tracing::warn!(
            grace_secs = SHUTDOWN_GRACE.as_secs(),
            "In-flight conversations did not finish before shutdown"
        );
    }

    channel.shutdown().await?;
    listen_result?;
    Ok(())
}
