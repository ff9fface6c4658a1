//! Message types for channel communication.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Channel type enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelType {
    Telegram,
    Cli,
}

impl ChannelType {
    /// Get the channel type as a string.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Telegram => "telegram",
            Self::Cli => "cli",
        }
    }
}

/// Unified inbound message format for all channels.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelMessage {
    /// Message ID (channel-specific)
    pub id: String,
    /// Channel type
    pub channel_type: ChannelType,
    /// Conversation identifier (Telegram chat ID, "cli", ...)
    pub channel_id: String,
    /// User identifier
    pub user_id: String,
    /// Message content
    pub content: MessageContent,
    /// Additional metadata
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    /// Timestamp (Unix millis)
    pub timestamp: i64,
    /// Trace ID assigned when the message entered the process
    pub trace_id: String,
}

/// Message content types.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MessageContent {
    /// Plain text message
    Text { text: String },
    /// Anything the relay does not handle (stickers, photos, voice, ...)
    Unsupported { kind: String },
}

impl ChannelMessage {
    /// Create a text message stamped with the current time and a fresh trace ID.
    pub fn text(
        channel_type: ChannelType,
        channel_id: impl Into<String>,
        user_id: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            channel_type,
            channel_id: channel_id.into(),
            user_id: user_id.into(),
            content: MessageContent::Text { text: text.into() },
            metadata: HashMap::new(),
            timestamp: now_millis(),
            trace_id: relay_common::logging::generate_trace_id(),
        }
    }

    /// Get the text content if this is a text message.
    pub fn text_content(&self) -> Option<&str> {
        match &self.content {
            MessageContent::Text { text } => Some(text),
            MessageContent::Unsupported { .. } => None,
        }
    }

    /// Get the channel type as a string.
    pub fn channel_type_str(&self) -> &'static str {
        self.channel_type.as_str()
    }

    /// Build a plain-text reply addressed to the same conversation.
    pub fn reply(&self, text: impl Into<String>) -> OutgoingMessage {
        OutgoingMessage {
            channel_type: self.channel_type,
            channel_id: self.channel_id.clone(),
            reply_to: Some(self.id.clone()),
            text: text.into(),
        }
    }
}

/// Outgoing plain-text message to send to a channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutgoingMessage {
    /// Target channel type
    pub channel_type: ChannelType,
    /// Target conversation
    pub channel_id: String,
    /// Reply to message ID (optional)
    pub reply_to: Option<String>,
    /// Message text
    pub text: String,
}

pub(crate) fn now_millis() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}
