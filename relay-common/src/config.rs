//! Configuration management for the relay.
//!
//! All settings are sourced from the process environment. A `.env` file in the
//! working directory (or an explicit path) is loaded first and never overrides
//! variables that are already set.
//!
//! # Environment Variable Mapping
//!
//! ## Transport
//! - `TELEGRAM_BOT_TOKEN` → telegram.bot_token (required for Telegram)
//! - `TELEGRAM_ALLOWED_USERS` → telegram.allowed_users (comma separated, `*` = all)
//!
//! ## Completion endpoint
//! - `OPENROUTER_API_KEY` → completion.api_key (required)
//! - `OPENROUTER_API_URL` → completion.api_url
//! - `LLM_MODEL_NAME` → completion.model
//! - `LLM_TEMPERATURE` → completion.temperature
//! - `LLM_MAX_TOKENS` → completion.max_tokens
//! - `LLM_TIMEOUT_SECS` → completion.timeout_secs
//!
//! ## Conversation
//! - `CONTEXT_WINDOW_TURNS` → conversation.context_window
//! - `SYSTEM_PROMPT_PATH` → conversation.system_prompt_path
//! - `RELAY_THINKING_ENABLED` → conversation.thinking_enabled
//!
//! ## Observability
//! - `LOG_LEVEL` → observability.log_level
//! - `LOG_FORMAT` → observability.log_format
//! - `LOG_FILE` → observability.log_file (empty disables the file sink)

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::validation::{Validate, ValidationError};

const DEFAULT_API_URL: &str = "https://openrouter.ai/api/v1";
const DEFAULT_MODEL: &str = "openai/gpt-4o-mini";
const DEFAULT_PROMPT_PATH: &str = "docs/system_prompt.md";
const DEFAULT_LOG_FILE: &str = "logs/bot.log";

/// Load a `.env` file into the process environment.
///
/// With no explicit path a missing `.env` is not an error; an explicit path
/// must exist and parse.
pub fn load_env_file(path: Option<&Path>) -> Result<()> {
    match path {
        Some(p) => dotenvy::from_path(p)
            .map(|_| ())
            .map_err(|e| Error::Config(format!("Failed to load {}: {e}", p.display()))),
        None => match dotenvy::dotenv() {
            Ok(_) => Ok(()),
            Err(e) if e.not_found() => Ok(()),
            Err(e) => Err(Error::Config(format!("Failed to load .env: {e}"))),
        },
    }
}

// ============================================================================
// Sections
// ============================================================================

/// Telegram transport settings.
#[derive(Clone)]
pub struct TelegramConfig {
    /// Bot API token
    pub bot_token: Option<String>,
    /// Usernames or numeric ids allowed to talk to the bot (`*` = everyone)
    pub allowed_users: Vec<String>,
}

impl fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("bot_token", &self.bot_token.as_ref().map(|_| "***"))
            .field("allowed_users", &self.allowed_users)
            .finish()
    }
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            allowed_users: vec!["*".into()],
        }
    }
}

/// Remote completion endpoint settings, fixed for the life of the process.
#[derive(Clone)]
pub struct CompletionConfig {
    /// Base URL; `/chat/completions` is appended
    pub api_url: String,
    /// Bearer credential
    pub api_key: Option<String>,
    /// Model identifier
    pub model: String,
    /// Sampling temperature
    pub temperature: f64,
    /// Maximum output tokens
    pub max_tokens: u32,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

impl fmt::Debug for CompletionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompletionConfig")
            .field("api_url", &self.api_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.into(),
            api_key: None,
            model: DEFAULT_MODEL.into(),
            temperature: 0.7,
            max_tokens: 1000,
            timeout_secs: 60,
        }
    }
}

/// Conversation handling settings.
#[derive(Debug, Clone)]
pub struct ConversationConfig {
    /// Number of most recent turns replayed to the model
    pub context_window: usize,
    /// Location of the system directive text
    pub system_prompt_path: PathBuf,
    /// Send a provisional "thinking" message before the remote call
    pub thinking_enabled: bool,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            context_window: 10,
            system_prompt_path: PathBuf::from(DEFAULT_PROMPT_PATH),
            thinking_enabled: true,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    pub log_level: String,
    pub log_format: String,
    /// File sink; `None` logs to stdout only
    pub log_file: Option<PathBuf>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".into(),
            log_format: "pretty".into(),
            log_file: Some(PathBuf::from(DEFAULT_LOG_FILE)),
        }
    }
}

// ============================================================================
// Root Config
// ============================================================================

/// Root configuration.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub telegram: TelegramConfig,
    pub completion: CompletionConfig,
    pub conversation: ConversationConfig,
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Load configuration from the process environment and validate it.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup and validate it.
    ///
    /// Every unparseable and every invalid field is reported at once.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut errors = Vec::new();
        let config = Self::parse(&lookup, &mut errors);

        if let Err(e) = config.validate() {
            match e {
                ValidationError::Multiple(inner) => errors.extend(inner),
                other => errors.push(other),
            }
        }

        match errors.len() {
            0 => Ok(config),
            1 => Err(Error::Validation(errors.remove(0))),
            _ => Err(Error::Validation(ValidationError::Multiple(errors))),
        }
    }

    fn parse<F>(lookup: &F, errors: &mut Vec<ValidationError>) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let text = |key: &str| lookup(key).map(|v| v.trim().to_string());
        let non_empty = |key: &str| text(key).filter(|v| !v.is_empty());

        let telegram = TelegramConfig {
            bot_token: non_empty("TELEGRAM_BOT_TOKEN"),
            allowed_users: non_empty("TELEGRAM_ALLOWED_USERS")
                .map(|v| {
                    v.split(',')
                        .map(|u| u.trim().trim_start_matches('@').to_string())
                        .filter(|u| !u.is_empty())
                        .collect()
                })
                .unwrap_or(defaults.telegram.allowed_users),
        };

        let completion = CompletionConfig {
            api_url: non_empty("OPENROUTER_API_URL")
                .map(|u| u.trim_end_matches('/').to_string())
                .unwrap_or(defaults.completion.api_url),
            api_key: non_empty("OPENROUTER_API_KEY"),
            model: non_empty("LLM_MODEL_NAME").unwrap_or(defaults.completion.model),
            temperature: parse_var(
                lookup,
                "LLM_TEMPERATURE",
                defaults.completion.temperature,
                errors,
            ),
            max_tokens: parse_var(lookup, "LLM_MAX_TOKENS", defaults.completion.max_tokens, errors),
            timeout_secs: parse_var(
                lookup,
                "LLM_TIMEOUT_SECS",
                defaults.completion.timeout_secs,
                errors,
            ),
        };

        let conversation = ConversationConfig {
            context_window: parse_var(
                lookup,
                "CONTEXT_WINDOW_TURNS",
                defaults.conversation.context_window,
                errors,
            ),
            system_prompt_path: non_empty("SYSTEM_PROMPT_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.conversation.system_prompt_path),
            thinking_enabled: parse_bool(
                lookup,
                "RELAY_THINKING_ENABLED",
                defaults.conversation.thinking_enabled,
                errors,
            ),
        };

        // An explicitly empty LOG_FILE turns the file sink off.
        let log_file = match text("LOG_FILE") {
            Some(v) if v.is_empty() => None,
            Some(v) => Some(PathBuf::from(v)),
            None => defaults.observability.log_file,
        };

        let observability = ObservabilityConfig {
            log_level: non_empty("LOG_LEVEL")
                .map(|v| v.to_lowercase())
                .unwrap_or(defaults.observability.log_level),
            log_format: non_empty("LOG_FORMAT")
                .map(|v| v.to_lowercase())
                .unwrap_or(defaults.observability.log_format),
            log_file,
        };

        Self {
            telegram,
            completion,
            conversation,
            observability,
        }
    }
}

fn parse_var<F, T>(lookup: &F, key: &str, default: T, errors: &mut Vec<ValidationError>) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: fmt::Display,
{
    let Some(raw) = lookup(key).map(|v| v.trim().to_string()) else {
        return default;
    };
    if raw.is_empty() {
        return default;
    }
    match raw.parse() {
        Ok(v) => v,
        Err(e) => {
            errors.push(ValidationError::InvalidValue {
                field: key.into(),
                reason: format!("cannot parse {raw:?}: {e}"),
            });
            default
        }
    }
}

fn parse_bool<F>(lookup: &F, key: &str, default: bool, errors: &mut Vec<ValidationError>) -> bool
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(key).map(|v| v.trim().to_lowercase()) else {
        return default;
    };
    match raw.as_str() {
        "" => default,
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        _ => {
            errors.push(ValidationError::InvalidValue {
                field: key.into(),
                reason: format!("expected a boolean, got {raw:?}"),
            });
            default
        }
    }
}
