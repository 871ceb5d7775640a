//! Error types for tether.

use thiserror::Error;

/// Result type alias using tether's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for tether operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Link store operation failed (wraps sqlx::Error). No search or crawl
    /// can proceed without the store, so this fails the enclosing operation.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Link not found
    #[error("Link not found: {0}")]
    LinkNotFound(uuid::Uuid),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Search query was empty after trimming
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// A fusion weight was outside [0, 1]
    #[error("Invalid weight: {0} (must be between 0.0 and 1.0)")]
    InvalidWeight(f32),

    /// Both ranking sources failed; no fused result can be produced
    #[error("Retrieval unavailable: {0}")]
    RetrievalUnavailable(String),

    /// Embedding generation failed (degrades the vector path, not fatal
    /// inside hybrid search)
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// End-to-end search deadline elapsed before fusion completed
    #[error("Timed out: {0}")]
    Timeout(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// HTTP/network request failed
    #[error("Request error: {0}")]
    Request(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Request(e.to_string())
    }
}

/// Per-attempt fetch failure, classified for retry handling.
///
/// Crawl failures are data, not program errors: they are recorded against
/// the link and never abort a cycle, so they live outside [`Error`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// Worth retrying: timeout, connection reset, 5xx, rate-limited 429.
    #[error("transient fetch failure: {message}")]
    Transient {
        status: Option<u16>,
        message: String,
    },

    /// Not worth retrying: 4xx other than 429, malformed content.
    #[error("permanent fetch failure: {message}")]
    Permanent {
        status: Option<u16>,
        message: String,
    },
}

impl FetchError {
    /// Transient failure; `status` is None for timeouts and resets.
    pub fn transient(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::Transient {
            status,
            message: message.into(),
        }
    }

    /// Permanent failure; `status` is None for malformed content.
    pub fn permanent(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::Permanent {
            status,
            message: message.into(),
        }
    }

    /// Whether this failure class is eligible for retry.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }

    /// HTTP status associated with the failure, if the server responded.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Transient { status, .. } | Self::Permanent { status, .. } => *status,
        }
    }

    /// Human-readable failure message.
    pub fn message(&self) -> &str {
        match self {
            Self::Transient { message, .. } | Self::Permanent { message, .. } => message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_error_display_invalid_query() {
        let err = Error::InvalidQuery("empty after trimming".to_string());
        assert_eq!(err.to_string(), "Invalid query: empty after trimming");
    }

    #[test]
    fn test_error_display_invalid_weight() {
        let err = Error::InvalidWeight(1.5);
        assert!(err.to_string().contains("1.5"));
        assert!(err.to_string().contains("between 0.0 and 1.0"));
    }

    #[test]
    fn test_error_display_retrieval_unavailable() {
        let err = Error::RetrievalUnavailable("both sources failed".to_string());
        assert_eq!(
            err.to_string(),
            "Retrieval unavailable: both sources failed"
        );
    }

    #[test]
    fn test_error_display_link_not_found() {
        let id = Uuid::nil();
        let err = Error::LinkNotFound(id);
        assert_eq!(err.to_string(), format!("Link not found: {}", id));
    }

    #[test]
    fn test_error_display_embedding() {
        let err = Error::Embedding("backend unreachable".to_string());
        assert_eq!(err.to_string(), "Embedding error: backend unreachable");
    }

    #[test]
    fn test_error_display_timeout() {
        let err = Error::Timeout("search exceeded 5s".to_string());
        assert_eq!(err.to_string(), "Timed out: search exceeded 5s");
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<i32>("not a number").unwrap_err();
        let err: Error = json_err.into();
        match err {
            Error::Serialization(msg) => assert!(!msg.is_empty()),
            _ => panic!("Expected Serialization error"),
        }
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<Error>();
        assert_sync::<Error>();
        assert_send::<FetchError>();
        assert_sync::<FetchError>();
    }

    #[test]
    fn test_fetch_error_transient_classification() {
        let err = FetchError::Transient {
            status: Some(503),
            message: "service unavailable".to_string(),
        };
        assert!(err.is_transient());
        assert_eq!(err.status(), Some(503));
        assert_eq!(err.message(), "service unavailable");
    }

    #[test]
    fn test_fetch_error_permanent_classification() {
        let err = FetchError::Permanent {
            status: Some(404),
            message: "not found".to_string(),
        };
        assert!(!err.is_transient());
        assert_eq!(err.status(), Some(404));
    }

    #[test]
    fn test_fetch_error_constructors() {
        assert_eq!(FetchError::transient(None, "timeout").status(), None);
        assert_eq!(
            FetchError::transient(Some(429), "rate limited").status(),
            Some(429)
        );
        assert!(!FetchError::permanent(Some(404), "not found").is_transient());
    }
}
