//! OpenAI-compatible chat completions client (OpenRouter and friends).
//!
//! `POST {base_url}/chat/completions` with a bearer key; the reply is read from
//! `choices[0].message.content`.

use super::{build_messages, ChatRequest, CompletionClient, CompletionError};
use crate::session::Turn;
use async_trait::async_trait;
use relay_common::config::CompletionConfig;
use relay_common::util::preview;
use reqwest::Client;
use serde::Deserialize;
use std::time::{Duration, Instant};

/// A client that speaks the OpenAI-compatible chat completions API.
pub struct CompatibleClient {
    base_url: String,
    api_key: String,
    model: String,
    temperature: f64,
    max_tokens: u32,
    timeout: Duration,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct CompatibleResponse {
    choices: Vec<CompatibleChoice>,
    #[serde(default)]
    usage: Option<CompatibleUsage>,
}

#[derive(Debug, Deserialize)]
struct CompatibleChoice {
    message: CompatibleResponseMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CompatibleResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CompatibleUsage {
    prompt_tokens: Option<i64>,
    completion_tokens: Option<i64>,
}

impl CompatibleClient {
    /// Create a client with default sampling parameters and a 60 s timeout.
    pub fn new(base_url: &str, api_key: &str, model: &str) -> Self {
        let defaults = CompletionConfig::default();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            temperature: defaults.temperature,
            max_tokens: defaults.max_tokens,
            timeout: Duration::from_secs(defaults.timeout_secs),
            client: Client::builder()
                .connect_timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_else(|_| Client::new()),
        }
    }

    /// Build a client from validated configuration.
    pub fn from_config(config: &CompletionConfig) -> Self {
        Self::new(
            &config.api_url,
            config.api_key.as_deref().unwrap_or_default(),
            &config.model,
        )
        .with_sampling(config.temperature, config.max_tokens)
        .with_timeout(Duration::from_secs(config.timeout_secs))
    }

    /// Set temperature and maximum output tokens.
    pub fn with_sampling(mut self, temperature: f64, max_tokens: u32) -> Self {
        self.temperature = temperature;
        self.max_tokens = max_tokens;
        self
    }

    /// Set the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Model identifier sent with every request.
    pub fn model(&self) -> &str {
        &self.model
    }

    fn url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    async fn send(&self, request: &ChatRequest) -> Result<String, CompletionError> {
        let response = self
            .client
            .post(self.url())
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| CompletionError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| CompletionError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(CompletionError::Status {
                status: status.as_u16(),
                body: preview(&body, 500),
            });
        }

        let parsed: CompatibleResponse = serde_json::from_str(&body)
            .map_err(|e| CompletionError::Malformed(e.to_string()))?;

        let usage = parsed.usage;
        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or(CompletionError::EmptyResponse)?;

        let content = choice
            .message
            .content
            .filter(|c| !c.trim().is_empty())
            .ok_or(CompletionError::EmptyResponse)?;

        tracing::debug!(
            finish_reason = ?choice.finish_reason,
            prompt_tokens = ?usage.as_ref().and_then(|u| u.prompt_tokens),
            completion_tokens = ?usage.as_ref().and_then(|u| u.completion_tokens),
            "Completion usage"
        );

        Ok(content)
    }
}

#[async_trait]
impl CompletionClient for CompatibleClient {
    async fn complete(
        &self,
        directive: &str,
        window: &[Turn],
        user_text: &str,
    ) -> Result<String, CompletionError> {
        let start = Instant::now();
        let request = ChatRequest {
            model: self.model.clone(),
            messages: build_messages(directive, window, user_text),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        tracing::info!(
            model = %self.model,
            messages = request.messages.len(),
            question = %preview(user_text, 100),
            "Sending completion request"
        );

        let result = match tokio::time::timeout(self.timeout, self.send(&request)).await {
            Ok(result) => result,
            Err(_) => Err(CompletionError::Timeout(self.timeout)),
        };

        let latency_ms = start.elapsed().as_millis() as u64;
        match &result {
            Ok(answer) => tracing::info!(
                model = %self.model,
                latency_ms,
                answer = %preview(answer, 100),
                "Completion received"
            ),
            Err(e) => tracing::warn!(
                model = %self.model,
                latency_ms,
                kind = e.kind(),
                error = %e,
                "Completion request failed"
            ),
        }

        result
    }
}
