//! Remote completion client.
//!
//! The relay talks to exactly one OpenAI-compatible chat completions endpoint.
//! [`CompletionClient`] is the seam the orchestrator depends on, so tests can
//! swap the HTTP implementation for a scripted one.

mod compatible;

pub use compatible::CompatibleClient;

use crate::session::Turn;
use async_trait::async_trait;
use serde::Serialize;

// ============================================================================
// Client Trait
// ============================================================================

/// Produces one reply for a directive, a history window and a new user text.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Request a completion. Never retries; every failure is returned as-is.
    async fn complete(
        &self,
        directive: &str,
        window: &[Turn],
        user_text: &str,
    ) -> Result<String, CompletionError>;
}

/// Why a completion produced no answer.
#[derive(Debug, thiserror::Error)]
pub enum CompletionError {
    /// Connection, TLS or protocol failure before a response arrived
    #[error("request failed: {0}")]
    Transport(String),

    /// Endpoint answered with a non-success status
    #[error("endpoint returned {status}: {body}")]
    Status { status: u16, body: String },

    /// Response body did not have the expected shape
    #[error("malformed response: {0}")]
    Malformed(String),

    /// Well-formed response without any generated text
    #[error("response contained no completion text")]
    EmptyResponse,

    /// No response within the configured timeout
    #[error("no response within {0:?}")]
    Timeout(std::time::Duration),
}

impl CompletionError {
    /// Short, stable label for structured logs.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Transport(_) => "transport",
            Self::Status { .. } => "status",
            Self::Malformed(_) => "malformed",
            Self::EmptyResponse => "empty_response",
            Self::Timeout(_) => "timeout",
        }
    }
}

// ============================================================================
// Request Types
// ============================================================================

/// Chat completions request body.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<Turn>,
    pub temperature: f64,
    pub max_tokens: u32,
}

/// Assemble the message list: directive first, the window verbatim, the new
/// user text last.
pub fn build_messages(directive: &str, window: &[Turn], user_text: &str) -> Vec<Turn> {
    let mut messages = Vec::with_capacity(window.len() + 2);
    messages.push(Turn::system(directive));
    messages.extend_from_slice(window);
    messages.push(Turn::user(user_text));
    messages
}
