//! Utility functions for the relay.

use sha2::{Digest, Sha256};

/// Short content fingerprint: the first 8 hex characters of the SHA-256 digest.
pub fn fingerprint(content: &str) -> String {
    let digest = Sha256::digest(content.as_bytes());
    hex::encode(digest)[..8].to_string()
}

/// Shorten text for a log line to at most `max_chars` characters, appending
/// "..." if anything was cut.
///
/// This function safely handles multi-byte UTF-8 characters (emoji, CJK, Cyrillic)
/// by using character boundaries instead of byte indices.
pub fn preview(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", s[..idx].trim_end()),
        None => s.to_string(),
    }
}
