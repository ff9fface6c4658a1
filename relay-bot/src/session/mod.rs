//! Per-conversation history.

pub mod store;
pub mod types;

pub use store::{RetentionPolicy, SessionStore, Unbounded};
pub use types::{History, Role, Turn};
