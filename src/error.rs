//! Error types for keycadence.
//!
//! Per-keystroke injection failures are not errors: they are accumulated in
//! the session's failed-character list. The variants here cover everything
//! that is reported to the operator as a failure of a whole operation.

use std::io;
use thiserror::Error;

/// Main error type for keycadence operations.
#[derive(Error, Debug)]
pub enum TyperError {
    /// The text contains characters the classifier cannot type.
    #[error("text contains {count} unsupported character(s): {}", format_sample(.sample))]
    UnsupportedCharacters {
        count: usize,
        sample: Vec<(usize, char)>,
    },

    /// An unexpected error escaped the per-character step and ended the session.
    #[error("typing session aborted: {0}")]
    FatalSession(String),

    /// The text file could not be read.
    #[error("failed to load text from '{path}': {reason}")]
    TextLoad { path: String, reason: String },

    /// Configuration validation error.
    #[error("configuration error: {0}")]
    Config(String),

    /// A key token has no keystroke on the active layout.
    #[error("unknown key '{key}'")]
    UnknownKey { key: String },

    /// The injection or focus backend could not be used.
    #[error("backend error: {0}")]
    Backend(String),

    /// Nothing to type.
    #[error("no text to type")]
    EmptyText,

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for keycadence operations.
pub type Result<T> = std::result::Result<T, TyperError>;

fn format_sample(sample: &[(usize, char)]) -> String {
    sample
        .iter()
        .map(|(pos, c)| format!("{c:?} at {pos}"))
        .collect::<Vec<_>>()
        .join(", ")
}

impl TyperError {
    pub fn unsupported_characters(count: usize, sample: Vec<(usize, char)>) -> Self {
        Self::UnsupportedCharacters { count, sample }
    }

    pub fn fatal_session(message: impl Into<String>) -> Self {
        Self::FatalSession(message.into())
    }

    pub fn text_load(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::TextLoad {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn unknown_key(key: impl Into<String>) -> Self {
        Self::UnknownKey { key: key.into() }
    }

    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TyperError::unsupported_characters(2, vec![(3, '€'), (7, '\u{1}')]);
        assert_eq!(
            err.to_string(),
            "text contains 2 unsupported character(s): '€' at 3, '\\u{1}' at 7"
        );

        let err = TyperError::unknown_key("hyper");
        assert_eq!(err.to_string(), "unknown key 'hyper'");

        let err = TyperError::config("max_attempts must be at least 1");
        assert_eq!(
            err.to_string(),
            "configuration error: max_attempts must be at least 1"
        );
    }

    #[test]
    fn test_error_from_io() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let err: TyperError = io_err.into();
        assert!(matches!(err, TyperError::Io(_)));
    }
}
