//! Store error types
//!
//! Error definitions with transient/permanent classification for retry logic.

use thiserror::Error;

/// Error that can occur while talking to the primary or workflow store.
#[derive(Debug, Error)]
pub enum StoreError {
    // Connection errors (usually transient)
    /// Failed to establish a connection to the store.
    #[error("connection failed: {message}")]
    ConnectionFailed {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The store call did not complete within the client timeout.
    #[error("store call timed out: {message}")]
    Timeout { message: String },

    /// The store is temporarily unavailable (5xx, pool exhausted).
    #[error("store unavailable: {message}")]
    Unavailable { message: String },

    /// The store asked us to slow down.
    #[error("rate limited by store")]
    RateLimited { retry_after_secs: Option<u64> },

    // Request errors (permanent)
    /// The requested record does not exist.
    #[error("not found: {identifier}")]
    NotFound { identifier: String },

    /// The store rejected the write (validation, constraint).
    #[error("rejected by store: {message}")]
    Rejected { message: String },

    /// Concurrent modification detected by the store.
    #[error("conflict: {message}")]
    Conflict { message: String },

    /// Credentials missing, invalid or lacking permission.
    #[error("authentication failed: {message}")]
    Authentication { message: String },

    /// Database driver error that is not a connectivity problem.
    #[error("database error: {message}")]
    Database {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Payload could not be encoded or decoded.
    #[error("serialization error: {message}")]
    Serialization { message: String },

    /// Store client configuration is invalid.
    #[error("invalid configuration: {message}")]
    InvalidConfiguration { message: String },

    /// Operation is not supported by this store.
    #[error("unsupported operation: {operation}")]
    Unsupported { operation: String },

    /// Transient failures persisted through every retry attempt.
    #[error("{operation} failed after {attempts} attempt(s): {message}")]
    MaxRetriesExceeded {
        operation: String,
        attempts: u32,
        message: String,
    },
}

impl StoreError {
    /// Check if this error is transient and the call may succeed if retried.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            StoreError::ConnectionFailed { .. }
                | StoreError::Timeout { .. }
                | StoreError::Unavailable { .. }
                | StoreError::RateLimited { .. }
        )
    }

    /// Check if this error is a validation rejection by the store.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            StoreError::Rejected { .. } | StoreError::Conflict { .. }
        )
    }

    /// Get a stable error code for logs and failure reasons.
    pub fn error_code(&self) -> &'static str {
        match self {
            StoreError::ConnectionFailed { .. } => "CONNECTION_FAILED",
            StoreError::Timeout { .. } => "TIMEOUT",
            StoreError::Unavailable { .. } => "UNAVAILABLE",
            StoreError::RateLimited { .. } => "RATE_LIMITED",
            StoreError::NotFound { .. } => "NOT_FOUND",
            StoreError::Rejected { .. } => "REJECTED",
            StoreError::Conflict { .. } => "CONFLICT",
            StoreError::Authentication { .. } => "AUTH_FAILED",
            StoreError::Database { .. } => "DATABASE_ERROR",
            StoreError::Serialization { .. } => "SERIALIZATION_ERROR",
            StoreError::InvalidConfiguration { .. } => "INVALID_CONFIG",
            StoreError::Unsupported { .. } => "UNSUPPORTED",
            StoreError::MaxRetriesExceeded { .. } => "MAX_RETRIES_EXCEEDED",
        }
    }

    // Convenience constructors

    /// Create a connection failed error.
    pub fn connection_failed(message: impl Into<String>) -> Self {
        StoreError::ConnectionFailed {
            message: message.into(),
            source: None,
        }
    }

    /// Create a timeout error.
    pub fn timeout(message: impl Into<String>) -> Self {
        StoreError::Timeout {
            message: message.into(),
        }
    }

    /// Create an unavailable error.
    pub fn unavailable(message: impl Into<String>) -> Self {
        StoreError::Unavailable {
            message: message.into(),
        }
    }

    /// Create a not found error.
    pub fn not_found(identifier: impl Into<String>) -> Self {
        StoreError::NotFound {
            identifier: identifier.into(),
        }
    }

    /// Create a rejection error.
    pub fn rejected(message: impl Into<String>) -> Self {
        StoreError::Rejected {
            message: message.into(),
        }
    }

    /// Create an invalid configuration error.
    pub fn invalid_configuration(message: impl Into<String>) -> Self {
        StoreError::InvalidConfiguration {
            message: message.into(),
        }
    }

    /// Create an unsupported operation error.
    pub fn unsupported(operation: impl Into<String>) -> Self {
        StoreError::Unsupported {
            operation: operation.into(),
        }
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => StoreError::not_found("row"),
            sqlx::Error::PoolTimedOut => StoreError::timeout("connection pool timed out"),
            sqlx::Error::PoolClosed => StoreError::unavailable("connection pool closed"),
            sqlx::Error::Io(io) => StoreError::ConnectionFailed {
                message: io.to_string(),
                source: Some(Box::new(io)),
            },
            sqlx::Error::Tls(tls) => StoreError::ConnectionFailed {
                message: tls.to_string(),
                source: Some(tls),
            },
            sqlx::Error::Configuration(cfg) => StoreError::invalid_configuration(cfg.to_string()),
            sqlx::Error::Database(db) => {
                // Class 23 is integrity constraint violation, class 22 is data exception.
                let code = db.code().map(|c| c.to_string()).unwrap_or_default();
                if code.starts_with("23") || code.starts_with("22") {
                    StoreError::rejected(db.message().to_string())
                } else if code == "40001" || code == "40P01" {
                    StoreError::Conflict {
                        message: db.message().to_string(),
                    }
                } else {
                    StoreError::Database {
                        message: db.message().to_string(),
                        source: None,
                    }
                }
            }
            other => StoreError::Database {
                message: other.to_string(),
                source: Some(Box::new(other)),
            },
        }
    }
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            StoreError::timeout(err.to_string())
        } else if err.is_connect() || err.is_request() {
            StoreError::ConnectionFailed {
                message: err.to_string(),
                source: Some(Box::new(err)),
            }
        } else if err.is_decode() {
            StoreError::Serialization {
                message: err.to_string(),
            }
        } else {
            StoreError::unavailable(err.to_string())
        }
    }
}

impl From<tokio::time::error::Elapsed> for StoreError {
    fn from(err: tokio::time::error::Elapsed) -> Self {
        StoreError::timeout(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization {
            message: err.to_string(),
        }
    }
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_elapsed_is_transient_timeout() {
        let elapsed = tokio::time::timeout(
            std::time::Duration::from_millis(1),
            std::future::pending::<()>(),
        )
        .await
        .unwrap_err();

        let err = StoreError::from(elapsed);
        assert_eq!(err.error_code(), "TIMEOUT");
        assert!(err.is_transient());
    }

    #[test]
    fn test_transient_classification() {
        assert!(StoreError::connection_failed("refused").is_transient());
        assert!(StoreError::timeout("10s").is_transient());
        assert!(StoreError::unavailable("503").is_transient());
        assert!(StoreError::RateLimited {
            retry_after_secs: None
        }
        .is_transient());

        assert!(!StoreError::not_found("s1").is_transient());
        assert!(!StoreError::rejected("bad status").is_transient());
        assert!(!StoreError::Authentication {
            message: "expired".into()
        }
        .is_transient());
    }

    #[test]
    fn test_rejection_classification() {
        assert!(StoreError::rejected("constraint").is_rejection());
        assert!(StoreError::Conflict {
            message: "revision mismatch".into()
        }
        .is_rejection());
        assert!(!StoreError::timeout("slow").is_rejection());
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(StoreError::not_found("s1").error_code(), "NOT_FOUND");
        assert_eq!(StoreError::rejected("x").error_code(), "REJECTED");
        assert_eq!(
            StoreError::MaxRetriesExceeded {
                operation: "update".into(),
                attempts: 3,
                message: "timeout".into(),
            }
            .error_code(),
            "MAX_RETRIES_EXCEEDED"
        );
    }

    #[test]
    fn test_error_display() {
        let err = StoreError::not_found("s42");
        assert_eq!(err.to_string(), "not found: s42");

        let err = StoreError::MaxRetriesExceeded {
            operation: "create_or_replace".into(),
            attempts: 3,
            message: "store unavailable: 503".into(),
        };
        assert!(err.to_string().contains("3 attempt(s)"));
    }

    #[test]
    fn test_from_sqlx_pool_timeout_is_transient() {
        let err: StoreError = sqlx::Error::PoolTimedOut.into();
        assert!(err.is_transient());
        assert_eq!(err.error_code(), "TIMEOUT");
    }
}
