//! Error types for the bookmark source.

use std::time::Duration;

use thiserror::Error;

use super::retry::{FailureType, classify_http_status};

/// Failures talking to the bookmark service.
///
/// `endpoint` is the API path (never the full URL, which carries the token).
#[derive(Debug, Error)]
pub enum SourceError {
    /// Transport failure (DNS, refused connection, TLS).
    #[error("request to {endpoint} failed: {message}")]
    Request {
        /// API path.
        endpoint: String,
        /// Underlying error text.
        message: String,
    },

    /// The request timed out.
    #[error("request to {endpoint} timed out")]
    Timeout {
        /// API path.
        endpoint: String,
    },

    /// Non-success HTTP status.
    #[error("HTTP {status} from {endpoint}")]
    HttpStatus {
        /// API path.
        endpoint: String,
        /// Status code.
        status: u16,
        /// Parsed `Retry-After` hint, if any.
        retry_after: Option<Duration>,
    },

    /// The response body was not what the API documents.
    #[error("unexpected response from {endpoint}: {message}")]
    Decode {
        /// API path.
        endpoint: String,
        /// Parse error text.
        message: String,
    },

    /// The service answered with a non-`done` result code.
    #[error("{endpoint} rejected the request: {code}")]
    Rejected {
        /// API path.
        endpoint: String,
        /// Result code returned by the service.
        code: String,
    },

    /// The configured API endpoint is not a valid base URL.
    #[error("invalid API endpoint {endpoint}")]
    InvalidEndpoint {
        /// Configured endpoint.
        endpoint: String,
    },
}

impl SourceError {
    /// Creates a transport error. The request URL is stripped from the message.
    pub fn request(endpoint: impl Into<String>, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            return Self::Timeout {
                endpoint: endpoint.into(),
            };
        }
        Self::Request {
            endpoint: endpoint.into(),
            message: source.without_url().to_string(),
        }
    }

    /// Creates a decode error.
    pub fn decode(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            endpoint: endpoint.into(),
            message: message.into(),
        }
    }

    /// Classifies the error for retry decisions.
    #[must_use]
    pub fn failure_type(&self) -> FailureType {
        match self {
            Self::Request { .. } | Self::Timeout { .. } => FailureType::Transient,
            Self::HttpStatus { status, .. } => classify_http_status(*status),
            Self::Decode { .. } | Self::Rejected { .. } | Self::InvalidEndpoint { .. } => {
                FailureType::Permanent
            }
        }
    }

    /// Server-provided retry hint.
    #[must_use]
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::HttpStatus { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_status_classification() {
        let unavailable = SourceError::HttpStatus {
            endpoint: "/v1/posts/all".to_string(),
            status: 503,
            retry_after: None,
        };
        assert_eq!(unavailable.failure_type(), FailureType::Transient);

        let limited = SourceError::HttpStatus {
            endpoint: "/v1/posts/all".to_string(),
            status: 429,
            retry_after: Some(Duration::from_secs(3)),
        };
        assert_eq!(limited.failure_type(), FailureType::RateLimited);
        assert_eq!(limited.retry_after(), Some(Duration::from_secs(3)));
        assert_eq!(limited.to_string(), "HTTP 429 from /v1/posts/all");
    }

    #[test]
    fn test_decode_is_permanent() {
        let error = SourceError::decode("/v1/posts/update", "missing update_time");
        assert_eq!(error.failure_type(), FailureType::Permanent);
        assert!(error.to_string().contains("missing update_time"));
    }
}
