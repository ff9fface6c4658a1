//! Test infrastructure: MockClient and TestChannel.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::message::{ChannelMessage, OutgoingMessage};
use crate::provider::{CompletionClient, CompletionError};
use crate::session::Turn;
use crate::traits::{Channel, ChannelError, ChannelResult};

// ---------------------------------------------------------------------------
// MockClient
// ---------------------------------------------------------------------------

/// A recorded call to `MockClient::complete()`.
#[derive(Debug, Clone)]
pub struct MockCall {
    pub directive: String,
    pub window: Vec<Turn>,
    pub user_text: String,
}

enum Script {
    Reply(String),
    Echo,
    Fail,
}

/// Completion client with a fixed behavior and optional per-text delays.
pub struct MockClient {
    script: Script,
    delays: HashMap<String, Duration>,
    calls: Mutex<Vec<MockCall>>,
}

impl MockClient {
    fn with_script(script: Script) -> Self {
        Self {
            script,
            delays: HashMap::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Always answer with `reply`.
    pub fn replying(reply: impl Into<String>) -> Self {
        Self::with_script(Script::Reply(reply.into()))
    }

    /// Answer with `re: <user text>`.
    pub fn echo() -> Self {
        Self::with_script(Script::Echo)
    }

    /// Always fail with a transport error.
    pub fn failing() -> Self {
        Self::with_script(Script::Fail)
    }

    /// Sleep for `delay` before answering `user_text`.
    pub fn with_delay(mut self, user_text: impl Into<String>, delay: Duration) -> Self {
        self.delays.insert(user_text.into(), delay);
        self
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl CompletionClient for MockClient {
    async fn complete(
        &self,
        directive: &str,
        window: &[Turn],
        user_text: &str,
    ) -> Result<String, CompletionError> {
        self.calls.lock().unwrap().push(MockCall {
            directive: directive.to_string(),
            window: window.to_vec(),
            user_text: user_text.to_string(),
        });

        if let Some(delay) = self.delays.get(user_text) {
            tokio::time::sleep(*delay).await;
        }

        match &self.script {
            Script::Reply(reply) => Ok(reply.clone()),
            Script::Echo => Ok(format!("re: {user_text}")),
            Script::Fail => Err(CompletionError::Transport("connection refused".into())),
        }
    }
}

// ---------------------------------------------------------------------------
// TestChannel
// ---------------------------------------------------------------------------

/// Channel that records every outgoing message and never listens.
#[derive(Default)]
pub struct TestChannel {
    sent: Mutex<Vec<OutgoingMessage>>,
    failing: AtomicBool,
    bot_username: Option<String>,
}

impl TestChannel {
    /// A channel that reports `username` as its bot name.
    pub fn with_bot_username(username: &str) -> Self {
        Self {
            bot_username: Some(username.to_string()),
            ..Self::default()
        }
    }

    /// Make every following `send` fail.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Texts sent so far, in order.
    pub fn texts(&self) -> Vec<String> {
        self.sent.lock().unwrap().iter().map(|m| m.text.clone()).collect()
    }

    /// Texts sent to one conversation, in order.
    pub fn texts_for(&self, conversation_id: &str) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.channel_id == conversation_id)
            .map(|m| m.text.clone())
            .collect()
    }
}

#[async_trait]
impl Channel for TestChannel {
    fn name(&self) -> &'static str {
        "test"
    }

    async fn init(&mut self) -> ChannelResult<()> {
        Ok(())
    }

    async fn send(&self, message: OutgoingMessage) -> ChannelResult<String> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(ChannelError::SendFailed("channel closed".into()));
        }
        let mut sent = self.sent.lock().unwrap();
        sent.push(message);
        Ok(sent.len().to_string())
    }

    async fn listen<F>(&self, _callback: F) -> ChannelResult<()>
    where
        F: Fn(ChannelMessage) + Send + Sync + 'static,
    {
        Ok(())
    }

    fn bot_username(&self) -> Option<&str> {
        self.bot_username.as_deref()
    }

    async fn health_check(&self) -> ChannelResult<()> {
        Ok(())
    }

    async fn shutdown(&self) -> ChannelResult<()> {
        Ok(())
    }
}
