//! Outbound length limiting.

use std::borrow::Cow;

/// Maximum reply length in characters. Telegram rejects messages above 4096.
pub const MAX_REPLY_LEN: usize = 4000;

/// Appended to every truncated reply.
pub const TRUNCATION_MARKER: &str = "...";

const MARKER_LEN: usize = 3;

/// Cut `text` to at most `max_len` characters, ending with [`TRUNCATION_MARKER`]
/// when anything was removed.
///
/// Lengths are counted in `char`s so multi-byte text is never split mid-sequence.
pub fn truncate(text: &str, max_len: usize) -> Cow<'_, str> {
    let Some((cut, _)) = text.char_indices().nth(max_len) else {
        return Cow::Borrowed(text);
    };

    let original_len = max_len + text[cut..].chars().count();

    let truncated: String = if max_len < MARKER_LEN {
        TRUNCATION_MARKER[..max_len].to_string()
    } else {
        let keep = text
            .char_indices()
            .nth(max_len - MARKER_LEN)
            .map_or(text.len(), |(idx, _)| idx);
        format!("{}{TRUNCATION_MARKER}", &text[..keep])
    };

    tracing::info!(
        original_len,
        truncated_len = max_len,
        "Reply truncated to transport limit"
    );

    Cow::Owned(truncated)
}
