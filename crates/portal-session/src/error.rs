//! Error types for session stores

use std::path::PathBuf;

/// Errors raised by a [`crate::SessionStore`] backend
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// IO error on a file-backed entry
    #[error("io error on {path}: {source}")]
    Io {
        /// File that failed
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Persisted entry could not be decoded
    #[error("corrupt entry for key '{key}': {message}")]
    Corrupt {
        /// Store key
        key: String,
        /// What was wrong with it
        message: String,
    },

    /// Backend-specific failure (external cache unavailable etc.)
    #[error("backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Create IO error for path
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create corrupt-entry error
    pub fn corrupt(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Corrupt {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Transient failures may succeed when the request is repeated
    #[inline]
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Io { .. } | Self::Backend(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_error_display() {
        let err = StoreError::corrupt("wizard:abc", "truncated header");
        assert!(err.to_string().contains("wizard:abc"));
        assert!(err.to_string().contains("truncated header"));
    }

    #[test]
    fn store_error_transient() {
        let io = StoreError::io_error(
            "/tmp/x",
            std::io::Error::new(std::io::ErrorKind::Other, "disk"),
        );
        assert!(io.is_transient());
        assert!(StoreError::Backend("down".into()).is_transient());
        assert!(!StoreError::corrupt("k", "bad").is_transient());
    }
}
