//! Domain error types
//!
//! This module defines error types specific to domain operations and the
//! port boundary: validation failures, authentication failures, and remote
//! API errors with transience classification.

use thiserror::Error;

/// Status codes that indicate a transient server-side condition.
///
/// 429 (rate limited), 500 (internal error) and 503 (unavailable) are
/// expected to succeed on retry; every other non-2xx status is permanent.
const TRANSIENT_STATUSES: &[u16] = &[429, 500, 503];

/// Errors that can occur in domain operations and at port boundaries
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Invalid remote object identifier format
    #[error("Invalid remote ID: {0}")]
    InvalidRemoteId(String),

    /// Invalid content hash format (expected 32 lowercase hex chars)
    #[error("Invalid content hash: {0}")]
    InvalidHash(String),

    /// Invalid relative path format
    #[error("Invalid relative path: {0}")]
    InvalidPath(String),

    /// Unknown conflict policy literal
    #[error("Invalid conflict policy: {0}")]
    InvalidPolicy(String),

    /// Authentication or token acquisition failure
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Non-2xx response from the remote API
    ///
    /// The body is captured bounded (at most 64 KiB) by the wire client.
    #[error("API request failed with status {status}: {body}")]
    Api {
        /// HTTP status code of the response
        status: u16,
        /// Error body, truncated by the client before wrapping
        body: String,
    },

    /// Transport-level failure (connection, DNS, TLS)
    #[error("Network error: {0}")]
    Network(String),

    /// Local I/O failure while reading credential or content files
    #[error("I/O error: {0}")]
    Io(String),

    /// Response body could not be decoded into the expected shape
    #[error("Invalid response from remote API: {0}")]
    InvalidResponse(String),
}

impl DomainError {
    /// Returns true if retrying the failed call may succeed.
    ///
    /// Only API errors with status 429, 500 or 503 qualify; transport
    /// errors and every other status are treated as permanent.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Api { status, .. } => TRANSIENT_STATUSES.contains(status),
            _ => false,
        }
    }

    /// Returns true for local I/O failures that should skip a single file
    /// rather than abort a whole batch.
    #[must_use]
    pub fn is_local_io(&self) -> bool {
        matches!(self, Self::Io(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DomainError::InvalidPath("a//b".to_string());
        assert_eq!(err.to_string(), "Invalid relative path: a//b");

        let err = DomainError::Auth("token endpoint returned 400".to_string());
        assert_eq!(
            err.to_string(),
            "Authentication failed: token endpoint returned 400"
        );

        let err = DomainError::Api {
            status: 404,
            body: "not found".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "API request failed with status 404: not found"
        );
    }

    #[test]
    fn test_error_equality() {
        let err1 = DomainError::InvalidHash("xyz".to_string());
        let err2 = DomainError::InvalidHash("xyz".to_string());
        let err3 = DomainError::InvalidHash("abc".to_string());

        assert_eq!(err1, err2);
        assert_ne!(err1, err3);
    }

    #[test]
    fn test_error_clone() {
        let err = DomainError::Api {
            status: 503,
            body: "unavailable".to_string(),
        };
        let cloned = err.clone();
        assert_eq!(err, cloned);
    }

    #[test]
    fn test_transient_statuses() {
        for status in [429u16, 500, 503] {
            let err = DomainError::Api {
                status,
                body: String::new(),
            };
            assert!(err.is_transient(), "status {status} should be transient");
        }
    }

    #[test]
    fn test_permanent_statuses() {
        for status in [400u16, 401, 403, 404, 409, 502] {
            let err = DomainError::Api {
                status,
                body: String::new(),
            };
            assert!(!err.is_transient(), "status {status} should be permanent");
        }
    }

    #[test]
    fn test_non_api_errors_never_transient() {
        assert!(!DomainError::Network("connection refused".to_string()).is_transient());
        assert!(!DomainError::Auth("bad grant".to_string()).is_transient());
        assert!(!DomainError::Io("file vanished".to_string()).is_transient());
    }

    #[test]
    fn test_local_io_classification() {
        assert!(DomainError::Io("missing".to_string()).is_local_io());
        assert!(!DomainError::Network("refused".to_string()).is_local_io());
    }
}
