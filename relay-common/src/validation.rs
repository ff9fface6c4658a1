//! Configuration validation for the relay.
//!
//! Provides validation logic for configuration fields to ensure
//! all required values are present and within valid ranges.

use thiserror::Error;

use crate::config::{
    CompletionConfig, Config, ConversationConfig, ObservabilityConfig, TelegramConfig,
};

/// Configuration validation error.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Multiple validation errors: {0:?}")]
    Multiple(Vec<ValidationError>),
}

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Trait for validatable configuration sections.
pub trait Validate {
    /// Validate this configuration section.
    fn validate(&self) -> ValidationResult<()>;
}

fn collect(results: impl IntoIterator<Item = ValidationResult<()>>) -> ValidationResult<()> {
    let mut errors: Vec<ValidationError> = results
        .into_iter()
        .filter_map(Result::err)
        .flat_map(|e| match e {
            ValidationError::Multiple(inner) => inner,
            other => vec![other],
        })
        .collect();

    match errors.len() {
        0 => Ok(()),
        1 => Err(errors.remove(0)),
        _ => Err(ValidationError::Multiple(errors)),
    }
}

impl Validate for Config {
    /// Validate everything except the transport section, which is only
    /// required when that transport is selected.
    fn validate(&self) -> ValidationResult<()> {
        collect([
            self.completion.validate(),
            self.conversation.validate(),
            self.observability.validate(),
        ])
    }
}

impl Validate for TelegramConfig {
    fn validate(&self) -> ValidationResult<()> {
        let mut results = Vec::new();

        match self.bot_token.as_deref() {
            None => results.push(Err(ValidationError::MissingField {
                field: "TELEGRAM_BOT_TOKEN".into(),
            })),
            Some(token) if !token.contains(':') => results.push(Err(ValidationError::InvalidValue {
                field: "TELEGRAM_BOT_TOKEN".into(),
                reason: "expected the `<bot id>:<secret>` format".into(),
            })),
            Some(_) => {}
        }

        if self.allowed_users.is_empty() {
            results.push(Err(ValidationError::InvalidValue {
                field: "TELEGRAM_ALLOWED_USERS".into(),
                reason: "no users would be allowed; use `*` to allow everyone".into(),
            }));
        }

        collect(results)
    }
}

impl Validate for CompletionConfig {
    fn validate(&self) -> ValidationResult<()> {
        let mut results = Vec::new();

        if self.api_key.is_none() {
            results.push(Err(ValidationError::MissingField {
                field: "OPENROUTER_API_KEY".into(),
            }));
        }

        if !(self.api_url.starts_with("http://") || self.api_url.starts_with("https://")) {
            results.push(Err(ValidationError::InvalidValue {
                field: "OPENROUTER_API_URL".into(),
                reason: "must start with http:// or https://".into(),
            }));
        }

        if self.model.is_empty() {
            results.push(Err(ValidationError::MissingField {
                field: "LLM_MODEL_NAME".into(),
            }));
        }

        if !(0.0..=2.0).contains(&self.temperature) {
            results.push(Err(ValidationError::InvalidValue {
                field: "LLM_TEMPERATURE".into(),
                reason: "must be between 0.0 and 2.0".into(),
            }));
        }

        if self.max_tokens == 0 {
            results.push(Err(ValidationError::InvalidValue {
                field: "LLM_MAX_TOKENS".into(),
                reason: "must be greater than 0".into(),
            }));
        }

        if self.timeout_secs == 0 {
            results.push(Err(ValidationError::InvalidValue {
                field: "LLM_TIMEOUT_SECS".into(),
                reason: "must be greater than 0".into(),
            }));
        }

        collect(results)
    }
}

impl Validate for ConversationConfig {
    fn validate(&self) -> ValidationResult<()> {
        if self.context_window == 0 {
            return Err(ValidationError::InvalidValue {
                field: "CONTEXT_WINDOW_TURNS".into(),
                reason: "must be a positive number of turns".into(),
            });
        }
        Ok(())
    }
}

impl Validate for ObservabilityConfig {
    fn validate(&self) -> ValidationResult<()> {
        let mut results = Vec::new();

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.to_lowercase().as_str()) {
            results.push(Err(ValidationError::InvalidValue {
                field: "LOG_LEVEL".into(),
                reason: format!("must be one of: {}", valid_levels.join(", ")),
            }));
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.log_format.to_lowercase().as_str()) {
            results.push(Err(ValidationError::InvalidValue {
                field: "LOG_FORMAT".into(),
                reason: format!("must be one of: {}", valid_formats.join(", ")),
            }));
        }

        collect(results)
    }
}
