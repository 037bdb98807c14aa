//! Sync error types.
//!
//! Only configuration and fetch-layer failures propagate out of a run.
//! Per-record failures are converted to [`FailureReason`] values at the
//! reconciler boundary and counted.

use murmur_store::StoreError;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::statistics::RunStatistics;
use crate::types::Direction;

/// Errors that abort a sync run.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Invalid options or store configuration, detected before any I/O.
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// The source store could not be read. Carries the counts accumulated
    /// before the failure.
    #[error("Fetch failed during {direction} run: {source}")]
    Fetch {
        direction: Direction,
        statistics: Box<RunStatistics>,
        #[source]
        source: StoreError,
    },

    /// A status query could not be answered.
    #[error("Status query failed: {source}")]
    Status {
        #[source]
        source: StoreError,
    },
}

impl SyncError {
    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a fetch error.
    pub fn fetch(direction: Direction, statistics: RunStatistics, source: StoreError) -> Self {
        Self::Fetch {
            direction,
            statistics: Box::new(statistics),
            source,
        }
    }

    /// Partial statistics of the aborted run, if any.
    #[must_use]
    pub fn partial_statistics(&self) -> Option<&RunStatistics> {
        match self {
            Self::Fetch { statistics, .. } => Some(statistics),
            _ => None,
        }
    }

    /// Check if this is a configuration error.
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration { .. })
    }

    /// Stable error code for logs and summaries.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Configuration { .. } => "CONFIGURATION",
            Self::Fetch { source, .. } | Self::Status { source } => source.error_code(),
        }
    }
}

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Classification of a per-record failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Network, timeout or availability problem; likely to succeed next run.
    Transient,
    /// The target store rejected the write.
    Rejected,
    /// The record itself is unusable (e.g. no identifier).
    Malformed,
    /// Anything else.
    Other,
}

impl FailureKind {
    /// Convert to string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Transient => "transient",
            FailureKind::Rejected => "rejected",
            FailureKind::Malformed => "malformed",
            FailureKind::Other => "other",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Why a single record failed to reconcile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureReason {
    pub kind: FailureKind,
    /// Stable error code, e.g. `REJECTED` or `TIMEOUT`.
    pub code: String,
    pub message: String,
}

impl FailureReason {
    /// Failure for a record without a usable identifier.
    pub fn malformed(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Malformed,
            code: "MALFORMED_RECORD".to_string(),
            message: message.into(),
        }
    }
}

impl From<&StoreError> for FailureReason {
    fn from(error: &StoreError) -> Self {
        let kind = match error {
            e if e.is_transient() => FailureKind::Transient,
            StoreError::MaxRetriesExceeded { .. } => FailureKind::Transient,
            e if e.is_rejection() => FailureKind::Rejected,
            StoreError::Serialization { .. } => FailureKind::Malformed,
            _ => FailureKind::Other,
        };
        Self {
            kind,
            code: error.error_code().to_string(),
            message: error.to_string(),
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.code, self.kind, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_kind_from_store_error() {
        let reason = FailureReason::from(&StoreError::timeout("10s"));
        assert_eq!(reason.kind, FailureKind::Transient);
        assert_eq!(reason.code, "TIMEOUT");

        let reason = FailureReason::from(&StoreError::rejected("bad tag"));
        assert_eq!(reason.kind, FailureKind::Rejected);

        let reason = FailureReason::from(&StoreError::MaxRetriesExceeded {
            operation: "create_or_replace".into(),
            attempts: 3,
            message: "503".into(),
        });
        assert_eq!(reason.kind, FailureKind::Transient);

        let reason = FailureReason::from(&StoreError::Authentication {
            message: "expired".into(),
        });
        assert_eq!(reason.kind, FailureKind::Other);
    }

    #[test]
    fn test_fetch_error_carries_partial_statistics() {
        let stats = RunStatistics {
            succeeded: 4,
            ..RunStatistics::default()
        };
        let err = SyncError::fetch(
            Direction::PrimaryToWorkflow,
            stats,
            StoreError::connection_failed("refused"),
        );
        assert_eq!(err.partial_statistics().map(|s| s.succeeded), Some(4));
        assert_eq!(err.error_code(), "CONNECTION_FAILED");
        assert!(err.to_string().contains("primary_to_workflow"));
    }

    #[test]
    fn test_configuration_error() {
        let err = SyncError::configuration("batch_size must be positive");
        assert!(err.is_configuration());
        assert!(err.partial_statistics().is_none());
    }
}
