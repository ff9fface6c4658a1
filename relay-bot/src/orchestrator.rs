//! Conversation orchestrator.
//!
//! Takes one inbound message through `Received → Dispatched → Completed | Failed`:
//! commands are answered directly, free text is sent to the completion
//! endpoint together with the recent history, and the reply is delivered and
//! recorded. No error escapes [`Orchestrator::handle`].

use crate::message::ChannelMessage;
use crate::provider::CompletionClient;
use crate::reply::{truncate, MAX_REPLY_LEN};
use crate::session::{SessionStore, Turn};
use crate::traits::Channel;
use relay_common::config::ConversationConfig;
use std::sync::Arc;

/// Sent whenever the completion endpoint fails.
pub const APOLOGY_TEXT: &str =
    "Sorry, I couldn't process your request right now. Please try again later.";

/// Provisional acknowledgement sent before the remote call.
pub const THINKING_TEXT: &str = "Thinking...";

pub const START_TEXT: &str =
    "Hello! I'm an AI assistant. Send me a message and I'll do my best to help.";

pub const HELP_TEXT: &str = "Available commands:\n\
    /start - start the conversation\n\
    /help - show this help\n\
    /reset - forget the conversation history";

pub const RESET_DONE_TEXT: &str = "Conversation history cleared.";

pub const RESET_EMPTY_TEXT: &str = "Conversation history is already empty.";

// ============================================================================
// Commands
// ============================================================================

/// Command verbs recognized at the start of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Help,
    Reset,
}

impl Command {
    /// Parse `/verb` or `/verb@botname`, returning the command and the bot
    /// mention if any. Verbs are case-sensitive; anything else, including
    /// unknown verbs, is free text.
    pub fn parse(text: &str) -> Option<(Self, Option<&str>)> {
        let token = text.split_whitespace().next()?;
        let verb = token.strip_prefix('/')?;
        let (verb, mention) = match verb.split_once('@') {
            Some((verb, bot)) => (verb, Some(bot)),
            None => (verb, None),
        };

        let command = match verb {
            "start" => Self::Start,
            "help" => Self::Help,
            "reset" => Self::Reset,
            _ => return None,
        };
        Some((command, mention))
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Help => "help",
            Self::Reset => "reset",
        }
    }
}

/// How a message was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Empty or non-text event, or a command for another bot; dropped silently
    Ignored,
    /// A command was answered
    Command(Command),
    /// A reply was delivered and recorded
    Completed,
    /// The completion failed and the apology was sent
    Failed,
    /// A reply was produced but the transport refused it; nothing recorded
    Undelivered,
}

// ============================================================================
// Orchestrator
// ============================================================================

/// Drives every inbound message to a reply.
pub struct Orchestrator {
    store: Arc<SessionStore>,
    client: Arc<dyn CompletionClient>,
    directive: Arc<str>,
    context_window: usize,
    thinking_enabled: bool,
    max_reply_len: usize,
}

impl Orchestrator {
    /// Create an orchestrator with a 10-turn window and the thinking
    /// acknowledgement enabled.
    pub fn new(
        store: Arc<SessionStore>,
        client: Arc<dyn CompletionClient>,
        directive: impl Into<Arc<str>>,
    ) -> Self {
        let defaults = ConversationConfig::default();
        Self {
            store,
            client,
            directive: directive.into(),
            context_window: defaults.context_window,
            thinking_enabled: defaults.thinking_enabled,
            max_reply_len: MAX_REPLY_LEN,
        }
    }

    /// Create an orchestrator using the conversation settings.
    pub fn from_config(
        config: &ConversationConfig,
        store: Arc<SessionStore>,
        client: Arc<dyn CompletionClient>,
        directive: impl Into<Arc<str>>,
    ) -> Self {
        Self::new(store, client, directive)
            .with_context_window(config.context_window)
            .with_thinking(config.thinking_enabled)
    }

    pub fn with_context_window(mut self, turns: usize) -> Self {
        self.context_window = turns;
        self
    }

    pub fn with_thinking(mut self, enabled: bool) -> Self {
        self.thinking_enabled = enabled;
        self
    }

    pub fn with_max_reply_len(mut self, max_len: usize) -> Self {
        self.max_reply_len = max_len;
        self
    }

    /// Shared session store.
    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    /// Handle one inbound message, replying through `channel`.
    ///
    /// Whitespace only decides whether a message is empty; the text is
    /// forwarded and recorded exactly as received.
    pub async fn handle<C: Channel>(&self, message: &ChannelMessage, channel: &C) -> Outcome {
        let Some(text) = message
            .text_content()
            .filter(|text| !text.trim().is_empty())
        else {
            tracing::debug!(message_id = %message.id, "Ignoring message without text");
            return Outcome::Ignored;
        };

        if let Some((command, mention)) = Command::parse(text) {
            if let (Some(mention), Some(own)) = (mention, channel.bot_username()) {
                if !mention.eq_ignore_ascii_case(own) {
                    tracing::debug!(
                        command = command.as_str(),
                        addressed_to = %mention,
                        "Ignoring command addressed to another bot"
                    );
                    return Outcome::Ignored;
                }
            }
            self.run_command(command, message, channel).await;
            return Outcome::Command(command);
        }

        self.converse(message, text, channel).await
    }

    async fn run_command<C: Channel>(&self, command: Command, message: &ChannelMessage, channel: &C) {
        let reply = match command {
            Command::Start => START_TEXT,
            Command::Help => HELP_TEXT,
            Command::Reset => {
                if self.store.reset(&message.channel_id) {
                    RESET_DONE_TEXT
                } else {
                    RESET_EMPTY_TEXT
                }
            }
        };

        tracing::info!(
            command = command.as_str(),
            conversation_id = %message.channel_id,
            user_id = %message.user_id,
            "Command handled"
        );
        self.deliver(channel, message, reply).await;
    }

    async fn converse<C: Channel>(
        &self,
        message: &ChannelMessage,
        text: &str,
        channel: &C,
    ) -> Outcome {
        let conversation_id = message.channel_id.as_str();

        if self.thinking_enabled {
            self.deliver(channel, message, THINKING_TEXT).await;
        }

        let window = self.store.windowed(conversation_id, self.context_window);
        tracing::debug!(
            conversation_id = %conversation_id,
            window = window.len(),
            "Dispatching completion"
        );

        match self.client.complete(&self.directive, &window, text).await {
            Ok(answer) => {
                let reply = truncate(&answer, self.max_reply_len).into_owned();
                if !self.deliver(channel, message, &reply).await {
                    return Outcome::Undelivered;
                }
                self.store
                    .append(conversation_id, Turn::user(text), Turn::assistant(reply));
                Outcome::Completed
            }
            Err(e) => {
                tracing::error!(
                    conversation_id = %conversation_id,
                    user_id = %message.user_id,
                    kind = e.kind(),
                    error = %e,
                    "Completion failed, sending apology"
                );
                self.deliver(channel, message, APOLOGY_TEXT).await;
                Outcome::Failed
            }
        }
    }

    /// Send `text` as a reply; failures are logged and reported as `false`.
    async fn deliver<C: Channel>(&self, channel: &C, message: &ChannelMessage, text: &str) -> bool {
        match channel.send(message.reply(text)).await {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!(
                    channel = channel.name(),
                    conversation_id = %message.channel_id,
                    error = %e,
                    "Failed to deliver message"
                );
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{ChannelType, MessageContent};
    use crate::testing::{MockClient, TestChannel};

    fn orchestrator(client: &Arc<MockClient>) -> Orchestrator {
        Orchestrator::new(Arc::new(SessionStore::new()), client.clone(), "Be helpful.")
            .with_thinking(false)
    }

    fn text(body: &str) -> ChannelMessage {
        ChannelMessage::text(ChannelType::Telegram, "100", "42", body)
    }

    #[test]
    fn test_command_parse() {
        assert_eq!(Command::parse("/start"), Some((Command::Start, None)));
        assert_eq!(
            Command::parse("/help@relay_bot"),
            Some((Command::Help, Some("relay_bot")))
        );
        assert_eq!(Command::parse("  /reset now"), Some((Command::Reset, None)));
        assert_eq!(Command::parse("/weather"), None);
        assert_eq!(Command::parse("reset"), None);
        assert_eq!(Command::parse(""), None);
    }

    #[test]
    fn test_command_parse_is_case_sensitive() {
        assert_eq!(Command::parse("/RESET"), None);
        assert_eq!(Command::parse("/Start"), None);
    }

    #[tokio::test]
    async fn test_completed_message_is_recorded() {
        let client = Arc::new(MockClient::replying("Hi there!"));
        let orch = orchestrator(&client);
        let channel = TestChannel::default();

        let outcome = orch.handle(&text("Hello"), &channel).await;

        assert_eq!(outcome, Outcome::Completed);
        assert_eq!(channel.texts(), vec!["Hi there!"]);
        assert_eq!(
            orch.store().get("100"),
            vec![Turn::user("Hello"), Turn::assistant("Hi there!")]
        );

        let calls = client.calls();
        assert_eq!(calls[0].directive, "Be helpful.");
        assert!(calls[0].window.is_empty());
        assert_eq!(calls[0].user_text, "Hello");
    }

    #[tokio::test]
    async fn test_thinking_ack_precedes_reply() {
        let client = Arc::new(MockClient::replying("answer"));
        let orch = orchestrator(&client).with_thinking(true);
        let channel = TestChannel::default();

        orch.handle(&text("question"), &channel).await;

        assert_eq!(channel.texts(), vec![THINKING_TEXT, "answer"]);
    }

    #[tokio::test]
    async fn test_failure_sends_apology_and_keeps_store() {
        let client = Arc::new(MockClient::failing());
        let orch = orchestrator(&client);
        orch.store()
            .append("100", Turn::user("earlier"), Turn::assistant("reply"));
        let before = orch.store().get("100");
        let channel = TestChannel::default();

        let outcome = orch.handle(&text("Hello"), &channel).await;

        assert_eq!(outcome, Outcome::Failed);
        assert_eq!(channel.texts(), vec![APOLOGY_TEXT]);
        assert_eq!(orch.store().get("100"), before);
    }

    #[tokio::test]
    async fn test_window_is_bounded() {
        let client = Arc::new(MockClient::replying("ok"));
        let orch = orchestrator(&client).with_context_window(2);
        for i in 0..3 {
            orch.store()
                .append("100", Turn::user(format!("q{i}")), Turn::assistant(format!("a{i}")));
        }

        orch.handle(&text("next"), &TestChannel::default()).await;

        assert_eq!(
            client.calls()[0].window,
            vec![Turn::user("q2"), Turn::assistant("a2")]
        );
    }

    #[tokio::test]
    async fn test_long_reply_is_truncated_before_recording() {
        let client = Arc::new(MockClient::replying("z".repeat(50)));
        let orch = orchestrator(&client).with_max_reply_len(20);
        let channel = TestChannel::default();

        orch.handle(&text("long please"), &channel).await;

        let sent = channel.texts();
        assert_eq!(sent[0].chars().count(), 20);
        assert!(sent[0].ends_with("..."));
        assert_eq!(orch.store().get("100")[1].content(), sent[0]);
    }

    #[tokio::test]
    async fn test_empty_and_non_text_are_ignored() {
        let client = Arc::new(MockClient::replying("unused"));
        let orch = orchestrator(&client);
        let channel = TestChannel::default();

        let mut sticker = text("");
        sticker.content = MessageContent::Unsupported {
            kind: "sticker".into(),
        };

        assert_eq!(orch.handle(&text("   "), &channel).await, Outcome::Ignored);
        assert_eq!(orch.handle(&sticker, &channel).await, Outcome::Ignored);
        assert!(channel.texts().is_empty());
        assert_eq!(client.call_count(), 0);
    }

    #[tokio::test]
    async fn test_reset_replies_depend_on_history() {
        let client = Arc::new(MockClient::replying("fine"));
        let orch = orchestrator(&client);
        let channel = TestChannel::default();

        orch.handle(&text("Hello"), &channel).await;
        let outcome = orch.handle(&text("/reset"), &channel).await;
        orch.handle(&text("/reset"), &channel).await;

        assert_eq!(outcome, Outcome::Command(Command::Reset));
        assert_eq!(channel.texts(), vec!["fine", RESET_DONE_TEXT, RESET_EMPTY_TEXT]);
        assert!(orch.store().get("100").is_empty());
    }

    #[tokio::test]
    async fn test_start_and_help_leave_store_alone() {
        let client = Arc::new(MockClient::replying("unused"));
        let orch = orchestrator(&client);
        let channel = TestChannel::default();

        orch.handle(&text("/start"), &channel).await;
        orch.handle(&text("/help@relay_bot"), &channel).await;

        assert_eq!(channel.texts(), vec![START_TEXT, HELP_TEXT]);
        assert_eq!(orch.store().conversation_count(), 0);
        assert_eq!(client.call_count(), 0);
    }

    #[tokio::test]
    async fn test_unknown_command_is_free_text() {
        let client = Arc::new(MockClient::replying("sunny"));
        let orch = orchestrator(&client);

        let outcome = orch
            .handle(&text("/weather today"), &TestChannel::default())
            .await;

        assert_eq!(outcome, Outcome::Completed);
        assert_eq!(client.call_count(), 1);
    }

    #[tokio::test]
    async fn test_undelivered_reply_is_not_recorded() {
        let client = Arc::new(MockClient::replying("lost"));
        let orch = orchestrator(&client);
        let channel = TestChannel::default();
        channel.set_failing(true);

        let outcome = orch.handle(&text("Hello"), &channel).await;

        assert_eq!(outcome, Outcome::Undelivered);
        assert!(orch.store().get("100").is_empty());
    }

    #[tokio::test]
    async fn test_text_is_forwarded_and_stored_verbatim() {
        let client = Arc::new(MockClient::replying("looks fine"));
        let orch = orchestrator(&client);
        let snippet = "    fn main() {}\n";

        let outcome = orch.handle(&text(snippet), &TestChannel::default()).await;

        assert_eq!(outcome, Outcome::Completed);
        assert_eq!(client.calls()[0].user_text, snippet);
        assert_eq!(orch.store().get("100")[0], Turn::user(snippet));
    }

    #[tokio::test]
    async fn test_command_for_another_bot_is_ignored() {
        let client = Arc::new(MockClient::replying("fine"));
        let orch = orchestrator(&client);
        let channel = TestChannel::with_bot_username("relay_bot");

        orch.handle(&text("Hello"), &channel).await;
        let outcome = orch.handle(&text("/reset@some_other_bot"), &channel).await;

        assert_eq!(outcome, Outcome::Ignored);
        assert_eq!(orch.store().len("100"), 2);
        assert_eq!(channel.texts(), vec!["fine"]);
        assert_eq!(client.call_count(), 1);
    }

    #[tokio::test]
    async fn test_command_for_this_bot_runs() {
        let orch = orchestrator(&Arc::new(MockClient::replying("fine")));
        let channel = TestChannel::with_bot_username("Relay_Bot");

        orch.handle(&text("Hello"), &channel).await;
        let outcome = orch.handle(&text("/reset@relay_bot"), &channel).await;

        assert_eq!(outcome, Outcome::Command(Command::Reset));
        assert!(orch.store().get("100").is_empty());
    }

    #[tokio::test]
    async fn test_uppercase_command_is_free_text() {
        let client = Arc::new(MockClient::replying("ok"));
        let orch = orchestrator(&client);

        let outcome = orch.handle(&text("/RESET"), &TestChannel::default()).await;

        assert_eq!(outcome, Outcome::Completed);
        assert_eq!(client.call_count(), 1);
    }
}
