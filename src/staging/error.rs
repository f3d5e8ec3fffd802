//! Error types for the staging area.

use std::path::PathBuf;

use thiserror::Error;

/// Filesystem failures while staging or promoting artifacts.
#[derive(Debug, Error)]
pub enum StagingError {
    /// Creating, listing or removing staging content failed.
    #[error("staging IO error at {path}: {source}")]
    Io {
        /// The path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Moving a staged file into the library failed.
    #[error("failed to move {from} to {to}: {source}")]
    Promote {
        /// Staged file.
        from: PathBuf,
        /// Library destination.
        to: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

impl StagingError {
    /// Creates an IO error with path context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates a promotion error.
    pub fn promote(from: impl Into<PathBuf>, to: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Promote {
            from: from.into(),
            to: to.into(),
            source,
        }
    }
}
