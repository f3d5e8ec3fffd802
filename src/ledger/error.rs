//! Error types for the history ledger.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while reading or persisting the ledger.
///
/// An unparseable ledger file is not an error: it reads as empty.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Filesystem error while reading, writing or renaming the ledger file.
    #[error("IO error on history file {path}: {source}")]
    Io {
        /// The file path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The in-memory events could not be encoded.
    #[error("failed to encode history for {path}: {source}")]
    Encode {
        /// The ledger file being written.
        path: PathBuf,
        /// The underlying serde error.
        #[source]
        source: serde_json::Error,
    },
}

impl LedgerError {
    /// Creates an IO error with path context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates an encoding error with path context.
    pub fn encode(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::Encode {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ledger_error_io_display() {
        let io_error = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let error = LedgerError::io("/var/lib/pinfetch/history.json", io_error);
        let msg = error.to_string();
        assert!(msg.contains("/var/lib/pinfetch/history.json"), "Expected path in: {msg}");
        assert!(msg.contains("access denied"), "Expected cause in: {msg}");
    }
}
