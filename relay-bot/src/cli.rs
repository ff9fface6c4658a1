//! CLI channel adapter for interactive terminal sessions.
//!
//! Provides a stdin/stdout channel for local testing and development. All
//! input belongs to a single conversation.

use crate::message::{ChannelMessage, ChannelType, OutgoingMessage};
use crate::traits::{Channel, ChannelResult};
use async_trait::async_trait;
use tokio::io::{self, AsyncBufRead, AsyncBufReadExt, BufReader};

/// Conversation identifier used for every CLI message.
pub const CLI_CONVERSATION_ID: &str = "cli";

const CLI_USER_ID: &str = "local";

/// CLI channel - stdin/stdout, always available, zero deps.
pub struct CliChannel;

impl CliChannel {
    /// Create a new CLI channel.
    pub const fn new() -> Self {
        Self
    }

    /// Feed every non-empty line of `reader` to `callback` until EOF or `/quit`.
    async fn read_lines<R, F>(reader: R, callback: &F) -> usize
    where
        R: AsyncBufRead + Unpin,
        F: Fn(ChannelMessage),
    {
        let mut lines = reader.lines();
        let mut delivered = 0;

        while let Ok(Some(line)) = lines.next_line().await {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if line == "/quit" || line == "/exit" {
                break;
            }

            callback(ChannelMessage::text(
                ChannelType::Cli,
                CLI_CONVERSATION_ID,
                CLI_USER_ID,
                line,
            ));
            delivered += 1;
        }

        delivered
    }
}

impl Default for CliChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Channel for CliChannel {
    fn name(&self) -> &'static str {
        "cli"
    }

    async fn init(&mut self) -> ChannelResult<()> {
        println!("Chat relay CLI. Type /help for commands, /quit to exit.");
        Ok(())
    }

    async fn send(&self, message: OutgoingMessage) -> ChannelResult<String> {
        println!("{}", message.text);
        Ok(uuid::Uuid::new_v4().to_string())
    }

    async fn listen<F>(&self, callback: F) -> ChannelResult<()>
    where
        F: Fn(ChannelMessage) + Send + Sync + 'static,
    {
        let delivered = Self::read_lines(BufReader::new(io::stdin()), &callback).await;
        tracing::info!(delivered, "CLI input closed");
        Ok(())
    }

    async fn health_check(&self) -> ChannelResult<()> {
        Ok(())
    }

    async fn shutdown(&self) -> ChannelResult<()> {
        Ok(())
    }
}
