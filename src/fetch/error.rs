//! Error types for media fetchers.

use std::fmt;

use thiserror::Error;

/// Failure reported by a [`Fetcher`](super::Fetcher).
///
/// Every variant is recoverable at the pipeline level: the item is recorded as
/// failed and processing continues with the next item.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The fetch engine does not know how to handle the URL.
    #[error("unsupported URL {url}: {message}")]
    Unsupported {
        /// The URL that was rejected.
        url: String,
        /// Engine-provided explanation.
        message: String,
    },

    /// Transport failure (DNS, refused connection, timeout, HTTP error status).
    #[error("network error fetching {url}: {message}")]
    Network {
        /// The URL being fetched.
        url: String,
        /// Engine-provided explanation.
        message: String,
    },

    /// The engine reached the page but could not extract or write the media.
    #[error("extraction failed for {url}: {message}")]
    Extraction {
        /// The URL being fetched.
        url: String,
        /// Engine-provided explanation.
        message: String,
    },
}

/// Discriminant of [`FetchError`] for logging and matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchErrorKind {
    /// See [`FetchError::Unsupported`].
    Unsupported,
    /// See [`FetchError::Network`].
    Network,
    /// See [`FetchError::Extraction`].
    Extraction,
}

impl FetchError {
    /// Creates an unsupported-URL error.
    pub fn unsupported(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Unsupported {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Creates a network error.
    pub fn network(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Network {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Creates an extraction error.
    pub fn extraction(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Extraction {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Returns the error kind.
    #[must_use]
    pub fn kind(&self) -> FetchErrorKind {
        match self {
            Self::Unsupported { .. } => FetchErrorKind::Unsupported,
            Self::Network { .. } => FetchErrorKind::Network,
            Self::Extraction { .. } => FetchErrorKind::Extraction,
        }
    }
}

impl fmt::Display for FetchErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Unsupported => "unsupported",
            Self::Network => "network",
            Self::Extraction => "extraction",
        };
        write!(f, "{label}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_error_network_display() {
        let error = FetchError::network("https://example.com/v/1", "connection refused");
        let msg = error.to_string();
        assert!(msg.contains("network error"), "Expected kind in: {msg}");
        assert!(msg.contains("https://example.com/v/1"), "Expected URL in: {msg}");
        assert!(msg.contains("connection refused"), "Expected cause in: {msg}");
        assert_eq!(error.kind(), FetchErrorKind::Network);
    }

    #[test]
    fn test_fetch_error_unsupported_kind() {
        let error = FetchError::unsupported("ftp://example.com/v", "scheme not handled");
        assert_eq!(error.kind(), FetchErrorKind::Unsupported);
        assert_eq!(error.kind().to_string(), "unsupported");
    }

    #[test]
    fn test_fetch_error_extraction_kind() {
        let error = FetchError::extraction("https://example.com/v", "no formats");
        assert_eq!(error.kind(), FetchErrorKind::Extraction);
        assert!(error.to_string().starts_with("extraction failed"));
    }
}
