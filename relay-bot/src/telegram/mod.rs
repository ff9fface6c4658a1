//! Telegram channel adapter.
//!
//! Long-polls the Bot API with `getUpdates` and answers with plain-text
//! `sendMessage` calls.

use crate::message::{now_millis, ChannelMessage, ChannelType, MessageContent, OutgoingMessage};
use crate::traits::{Channel, ChannelError, ChannelResult};
use async_trait::async_trait;
use relay_common::config::TelegramConfig;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

/// Telegram rejects messages longer than this.
pub const MAX_MESSAGE_LEN: usize = 4096;

const DEFAULT_API_BASE: &str = "https://api.telegram.org";
const POLL_TIMEOUT_SECS: u64 = 30;
const RETRY_DELAY: Duration = Duration::from_secs(5);

/// Content keys checked, in order, to name a non-text message.
const CONTENT_KINDS: &[&str] = &[
    "photo",
    "sticker",
    "voice",
    "audio",
    "video",
    "video_note",
    "animation",
    "document",
    "location",
    "contact",
    "poll",
];

/// Telegram channel - long-polls the Bot API for updates.
pub struct TelegramChannel {
    bot_token: String,
    allowed_users: Vec<String>,
    client: reqwest::Client,
    api_base: String,
    poll_timeout_secs: u64,
    bot_username: Option<String>,
}

impl TelegramChannel {
    /// Create a new Telegram channel.
    pub fn new(bot_token: String, allowed_users: Vec<String>) -> Self {
        Self {
            bot_token,
            allowed_users,
            client: reqwest::Client::new(),
            api_base: DEFAULT_API_BASE.to_string(),
            poll_timeout_secs: POLL_TIMEOUT_SECS,
            bot_username: None,
        }
    }

    /// Create a channel from configuration; the token must be present.
    pub fn from_config(config: &TelegramConfig) -> ChannelResult<Self> {
        let token = config
            .bot_token
            .clone()
            .ok_or_else(|| ChannelError::Auth("TELEGRAM_BOT_TOKEN is not set".into()))?;
        Ok(Self::new(token, config.allowed_users.clone()))
    }

    /// Point the channel at a different Bot API server.
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    /// Override the long-poll timeout passed to `getUpdates`.
    pub fn with_poll_timeout(mut self, secs: u64) -> Self {
        self.poll_timeout_secs = secs;
        self
    }

    fn api_url(&self, method: &str) -> String {
        format!("{}/bot{}/{method}", self.api_base, self.bot_token)
    }

    fn is_user_allowed(&self, username: &str) -> bool {
        self.allowed_users.iter().any(|u| u == "*" || u == username)
    }

    fn allows_everyone(&self) -> bool {
        self.allowed_users.iter().any(|u| u == "*")
    }

    /// A wildcard entry admits senders with no identity at all, such as
    /// anonymous group admins or messages without `from`.
    fn is_any_user_allowed<'a, I>(&self, identities: I) -> bool
    where
        I: IntoIterator<Item = &'a str>,
    {
        self.allows_everyone() || identities.into_iter().any(|id| self.is_user_allowed(id))
    }

    /// Convert one update into a channel message.
    ///
    /// Returns `None` for updates without a message and for senders outside
    /// the allow-list.
    fn parse_update(&self, update: &Value) -> Option<ChannelMessage> {
        let message = update.get("message")?;

        let chat_id = message
            .get("chat")
            .and_then(|c| c.get("id"))
            .and_then(Value::as_i64)?
            .to_string();

        let from = message.get("from");
        let username = from
            .and_then(|f| f.get("username"))
            .and_then(Value::as_str);
        let user_id = from
            .and_then(|f| f.get("id"))
            .and_then(Value::as_i64)
            .map(|id| id.to_string());

        let identities = username.into_iter().chain(user_id.as_deref());
        if !self.is_any_user_allowed(identities) {
            tracing::warn!(
                username = username.unwrap_or("unknown"),
                chat_id = %chat_id,
                "Telegram: ignoring message from unauthorized user"
            );
            return None;
        }

        let content = match message.get("text").and_then(Value::as_str) {
            Some(text) => MessageContent::Text {
                text: text.to_string(),
            },
            None => MessageContent::Unsupported {
                kind: CONTENT_KINDS
                    .iter()
                    .find(|kind| message.get(**kind).is_some())
                    .map_or("other", |kind| *kind)
                    .to_string(),
            },
        };

        let mut metadata = HashMap::new();
        if let Some(name) = username {
            metadata.insert("username".to_string(), name.to_string());
        }

        let msg = ChannelMessage {
            id: message
                .get("message_id")
                .and_then(Value::as_i64)
                .map(|id| id.to_string())
                .unwrap_or_default(),
            channel_type: ChannelType::Telegram,
            channel_id: chat_id,
            user_id: user_id.unwrap_or_else(|| username.unwrap_or("unknown").to_string()),
            content,
            metadata,
            timestamp: now_millis(),
            trace_id: relay_common::logging::generate_trace_id(),
        };

        tracing::info!(
            trace_id = %msg.trace_id,
            message_id = %msg.id,
            channel_id = %msg.channel_id,
            user_id = %msg.user_id,
            message_type = if msg.text_content().is_some() { "text" } else { "unsupported" },
            "Telegram message received"
        );

        Some(msg)
    }

    /// Fetch one batch of updates starting at `offset`, advancing it past
    /// every update seen.
    pub async fn poll_once(&self, offset: &mut i64) -> ChannelResult<Vec<ChannelMessage>> {
        let body = serde_json::json!({
            "offset": *offset,
            "timeout": self.poll_timeout_secs,
            "allowed_updates": ["message"]
        });

        let resp = self
            .client
            .post(self.api_url("getUpdates"))
            .json(&body)
            .send()
            .await
            .map_err(|e| ChannelError::Connection(e.to_string()))?;

        let data: Value = resp
            .json()
            .await
            .map_err(|e| ChannelError::Connection(format!("invalid getUpdates response: {e}")))?;

        if data.get("ok").and_then(Value::as_bool) == Some(false) {
            let description = data
                .get("description")
                .and_then(Value::as_str)
                .unwrap_or("unknown error");
            return Err(ChannelError::Connection(format!(
                "getUpdates failed: {description}"
            )));
        }

        let mut messages = Vec::new();
        if let Some(results) = data.get("result").and_then(Value::as_array) {
            for update in results {
                if let Some(uid) = update.get("update_id").and_then(Value::as_i64) {
                    *offset = (*offset).max(uid + 1);
                }
                if let Some(msg) = self.parse_update(update) {
                    messages.push(msg);
                }
            }
        }

        Ok(messages)
    }

    /// Send a single plain-text chunk, returning Telegram's message id.
    async fn send_single_chunk(
        &self,
        text: &str,
        chat_id: &str,
        reply_to: Option<i64>,
    ) -> ChannelResult<String> {
        let mut body = serde_json::json!({
            "chat_id": chat_id,
            "text": text
        });
        if let Some(message_id) = reply_to {
            body["reply_parameters"] = serde_json::json!({
                "message_id": message_id,
                "allow_sending_without_reply": true
            });
        }

        let resp = self
            .client
            .post(self.api_url("sendMessage"))
            .json(&body)
            .send()
            .await
            .map_err(|e| ChannelError::SendFailed(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let error_text = resp.text().await.unwrap_or_default();
            return Err(ChannelError::SendFailed(format!(
                "sendMessage returned {status}: {error_text}"
            )));
        }

        let data: Value = resp
            .json()
            .await
            .map_err(|e| ChannelError::SendFailed(format!("invalid sendMessage response: {e}")))?;

        Ok(data
            .get("result")
            .and_then(|r| r.get("message_id"))
            .and_then(Value::as_i64)
            .map(|id| id.to_string())
            .unwrap_or_default())
    }
}

/// Split a message into chunks of at most `max_len` characters, preferring
/// paragraph, line, sentence and word boundaries.
fn split_message(message: &str, max_len: usize) -> Vec<String> {
    if message.chars().count() <= max_len {
        return vec![message.to_string()];
    }

    let mut chunks = Vec::new();
    let mut remaining = message;

    while !remaining.is_empty() {
        let Some((limit, _)) = remaining.char_indices().nth(max_len) else {
            chunks.push(remaining.to_string());
            break;
        };

        let chunk = &remaining[..limit];
        let split_pos = chunk
            .rfind("\n\n")
            .or_else(|| chunk.rfind('\n'))
            .or_else(|| chunk.rfind(". ").map(|pos| pos + 1))
            .or_else(|| chunk.rfind(' '))
            .unwrap_or(limit);

        let actual_split = if split_pos == 0 { limit } else { split_pos };

        chunks.push(remaining[..actual_split].to_string());
        remaining = remaining[actual_split..].trim_start();
    }

    chunks
}

#[async_trait]
impl Channel for TelegramChannel {
    fn name(&self) -> &'static str {
        "telegram"
    }

    async fn init(&mut self) -> ChannelResult<()> {
        // Verify bot token by calling getMe
        let resp = self
            .client
            .get(self.api_url("getMe"))
            .send()
            .await
            .map_err(|e| ChannelError::Connection(e.to_string()))?;

        if !resp.status().is_success() {
            let err = resp.text().await.unwrap_or_default();
            return Err(ChannelError::Auth(format!("Invalid bot token: {err}")));
        }

        let me: Value = resp
            .json()
            .await
            .map_err(|e| ChannelError::Connection(e.to_string()))?;
        self.bot_username = me
            .get("result")
            .and_then(|r| r.get("username"))
            .and_then(Value::as_str)
            .map(String::from);

        tracing::info!(
            bot = self.bot_username.as_deref().unwrap_or("unknown"),
            "Telegram channel initialized"
        );
        Ok(())
    }

    fn bot_username(&self) -> Option<&str> {
        self.bot_username.as_deref()
    }

    async fn send(&self, message: OutgoingMessage) -> ChannelResult<String> {
        let reply_to = message.reply_to.as_deref().and_then(|id| id.parse().ok());
        let chunks = split_message(&message.text, MAX_MESSAGE_LEN);
        if chunks.len() > 1 {
            tracing::debug!(chunks = chunks.len(), "Splitting oversized Telegram message");
        }

        let mut last_id = String::new();
        for (i, chunk) in chunks.iter().enumerate() {
            // Only the first chunk quotes the original message
            let reply_to = if i == 0 { reply_to } else { None };
            last_id = self
                .send_single_chunk(chunk, &message.channel_id, reply_to)
                .await?;
        }

        Ok(last_id)
    }

    async fn listen<F>(&self, callback: F) -> ChannelResult<()>
    where
        F: Fn(ChannelMessage) + Send + Sync + 'static,
    {
        let mut offset: i64 = 0;

        tracing::info!("Telegram channel listening for messages...");

        loop {
            match self.poll_once(&mut offset).await {
                Ok(messages) => messages.into_iter().for_each(&callback),
                Err(e) => {
                    tracing::warn!(error = %e, "Telegram poll error");
                    tokio::time::sleep(RETRY_DELAY).await;
                }
            }
        }
    }

    async fn health_check(&self) -> ChannelResult<()> {
        let resp = self
            .client
            .get(self.api_url("getMe"))
            .send()
            .await
            .map_err(|e| ChannelError::Connection(e.to_string()))?;

        if resp.status().is_success() {
            Ok(())
        } else {
            Err(ChannelError::NotReady)
        }
    }

    async fn shutdown(&self) -> ChannelResult<()> {
        tracing::info!("Telegram channel shutting down");
        Ok(())
    }
}
