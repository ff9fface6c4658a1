//! Relay Common - Shared configuration, logging and error types for the chat relay.
//!
//! This crate provides:
//! - Environment-sourced configuration and its validation
//! - Error types
//! - Logging setup (stdout + optional file sink)
//! - Small utilities (log previews, content fingerprints)

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod config;
pub mod error;
pub mod logging;
pub mod util;
pub mod validation;

pub use config::{
    CompletionConfig, Config, ConversationConfig, ObservabilityConfig, TelegramConfig,
};
pub use error::{Error, Result};
pub use validation::{Validate, ValidationError, ValidationResult};

/// Re-export commonly used types for convenience
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::error::{Error, Result};
    pub use crate::logging::init_logging;
    pub use crate::validation::{Validate, ValidationError};
}
