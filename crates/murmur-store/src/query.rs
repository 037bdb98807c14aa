//! Filters and pagination for store listing queries.

use serde::{Deserialize, Serialize};

use crate::model::SubmissionStatus;

/// Declarative listing filter, evaluated by the store's query layer.
///
/// Soft-deleted records are never returned.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionFilter {
    /// Include rejected submissions.
    #[serde(default)]
    pub include_rejected: bool,
    /// Restrict to a single status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<SubmissionStatus>,
}

impl SubmissionFilter {
    /// Filter matching every live record, rejected included.
    #[must_use]
    pub fn all() -> Self {
        Self {
            include_rejected: true,
            status: None,
        }
    }

    /// Filter matching live records, rejected only if requested.
    #[must_use]
    pub fn live(include_rejected: bool) -> Self {
        Self {
            include_rejected,
            status: None,
        }
    }

    /// Filter matching a single status.
    #[must_use]
    pub fn with_status(status: SubmissionStatus) -> Self {
        Self {
            include_rejected: true,
            status: Some(status),
        }
    }

    /// Evaluate the filter against a status.
    ///
    /// Used by stores whose query layer is in-process.
    #[must_use]
    pub fn matches(&self, status: SubmissionStatus) -> bool {
        if let Some(wanted) = self.status {
            return wanted == status;
        }
        self.include_rejected || status != SubmissionStatus::Rejected
    }
}

/// Offset pagination request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    /// Number of records to skip.
    pub offset: u64,
    /// Maximum number of records to return.
    pub limit: u32,
}

impl PageRequest {
    /// First page of the given size.
    #[must_use]
    pub fn first(limit: u32) -> Self {
        Self { offset: 0, limit }
    }

    /// Request for the page following this one.
    #[must_use]
    pub fn next(&self) -> Self {
        Self {
            offset: self.offset + u64::from(self.limit),
            limit: self.limit,
        }
    }
}

/// One page of listing results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Whether more records follow this page.
    pub has_more: bool,
}

impl<T> Page<T> {
    /// Build a page from a slice window of a larger ordered result.
    #[must_use]
    pub fn new(items: Vec<T>, has_more: bool) -> Self {
        Self { items, has_more }
    }
}
