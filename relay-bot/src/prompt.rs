//! System directive loading.
//!
//! The directive is read once at startup. A missing or unreadable file never
//! stops the process: the relay keeps running with [`FALLBACK_DIRECTIVE`].

use relay_common::util::fingerprint;
use std::path::Path;

/// Directive used when the configured file cannot be loaded.
pub const FALLBACK_DIRECTIVE: &str =
    "You are a helpful assistant. Answer clearly, politely and concisely.";

#[derive(Debug, thiserror::Error)]
enum PromptError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{path} is empty")]
    Empty { path: String },
}

fn read_directive(path: &Path) -> Result<String, PromptError> {
    let text = std::fs::read_to_string(path).map_err(|source| PromptError::Read {
        path: path.display().to_string(),
        source,
    })?;

    let text = text.trim();
    if text.is_empty() {
        return Err(PromptError::Empty {
            path: path.display().to_string(),
        });
    }
    Ok(text.to_string())
}

/// Load the system directive from `path`, falling back to [`FALLBACK_DIRECTIVE`].
///
/// Logs the length and a short fingerprint of whatever was chosen, never the text.
pub fn load(path: &Path) -> String {
    match read_directive(path) {
        Ok(text) => {
            tracing::info!(
                path = %path.display(),
                chars = text.chars().count(),
                fingerprint = %fingerprint(&text),
                "System directive loaded"
            );
            text
        }
        Err(e) => {
            tracing::warn!(
                error = %e,
                fingerprint = %fingerprint(FALLBACK_DIRECTIVE),
                "System directive unavailable, using fallback"
            );
            FALLBACK_DIRECTIVE.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn loads_file_contents_trimmed() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "\nYou are a sales consultant.\n").unwrap();

        assert_eq!(load(file.path()), "You are a sales consultant.");
    }

    #[test]
    fn loads_non_ascii_directive() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "Ты вежливый консультант.").unwrap();

        assert_eq!(load(file.path()), "Ты вежливый консультант.");
    }

    #[test]
    fn missing_file_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(load(&dir.path().join("absent.md")), FALLBACK_DIRECTIVE);
    }

    #[test]
    fn directory_path_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(load(dir.path()), FALLBACK_DIRECTIVE);
    }

    #[test]
    fn invalid_utf8_falls_back() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&[0xff, 0xfe, 0xfd]).unwrap();

        assert_eq!(load(file.path()), FALLBACK_DIRECTIVE);
    }

    #[test]
    fn whitespace_only_file_falls_back() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "   \n\t").unwrap();

        assert_eq!(load(file.path()), FALLBACK_DIRECTIVE);
    }
}
