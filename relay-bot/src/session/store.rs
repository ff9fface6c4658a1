//! In-memory session store for conversation history.

use super::types::{History, Turn};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

/// Decides what to keep of a history after every append.
pub trait RetentionPolicy: Send + Sync {
    /// Prune `history` in place.
    fn retain(&self, conversation_id: &str, history: &mut History);
}

/// Keeps every turn for the life of the process.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unbounded;

impl RetentionPolicy for Unbounded {
    fn retain(&self, _conversation_id: &str, _history: &mut History) {}
}

/// Volatile session store keyed by conversation identifier.
///
/// Every operation takes the lock once and never across an await point, so
/// each call is atomic on its own. Ordering between a window read and the
/// later append is the dispatcher's job.
pub struct SessionStore {
    sessions: RwLock<HashMap<String, History>>,
    retention: Box<dyn RetentionPolicy>,
}

impl SessionStore {
    /// Create an empty store that never prunes.
    pub fn new() -> Self {
        Self::with_retention(Unbounded)
    }

    /// Create an empty store with a custom retention policy.
    pub fn with_retention(policy: impl RetentionPolicy + 'static) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            retention: Box::new(policy),
        }
    }

    /// Full history of a conversation; empty if none exists.
    pub fn get(&self, conversation_id: &str) -> History {
        self.read(|sessions| sessions.get(conversation_id).cloned().unwrap_or_default())
    }

    /// Append a user turn followed by an assistant turn.
    pub fn append(&self, conversation_id: &str, user: Turn, assistant: Turn) {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        let history = sessions.entry(conversation_id.to_string()).or_default();
        history.push(user);
        history.push(assistant);
        self.retention.retain(conversation_id, history);

        tracing::debug!(
            conversation_id = %conversation_id,
            turns = history.len(),
            "Session history appended"
        );
    }

    /// Drop a conversation's history. Returns whether anything was removed.
    pub fn reset(&self, conversation_id: &str) -> bool {
        let removed = self
            .sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(conversation_id)
            .is_some_and(|history| !history.is_empty());

        tracing::info!(conversation_id = %conversation_id, removed, "Session reset");
        removed
    }

    /// The last `n` turns in stored order (fewer if the history is shorter).
    pub fn windowed(&self, conversation_id: &str, n: usize) -> History {
        self.read(|sessions| {
            sessions
                .get(conversation_id)
                .map(|history| {
                    let start = history.len().saturating_sub(n);
                    history[start..].to_vec()
                })
                .unwrap_or_default()
        })
    }

    /// Number of stored turns for a conversation.
    pub fn len(&self, conversation_id: &str) -> usize {
        self.read(|sessions| sessions.get(conversation_id).map_or(0, Vec::len))
    }

    /// Number of conversations with stored history.
    pub fn conversation_count(&self) -> usize {
        self.read(|sessions| sessions.len())
    }

    fn read<T>(&self, f: impl FnOnce(&HashMap<String, History>) -> T) -> T {
        let sessions = self.sessions.read().unwrap_or_else(PoisonError::into_inner);
        f(&sessions)
    }

    /// Replace a conversation's history wholesale.
    #[cfg(test)]
    pub(crate) fn seed(&self, conversation_id: &str, history: History) {
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(conversation_id.to_string(), history);
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}
