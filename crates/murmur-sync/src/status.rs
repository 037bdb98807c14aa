//! Status reporter.
//!
//! Counts records in both stores. `in_sync` is a drift alarm, not a
//! correctness proof: it only compares record counts, so two stores with
//! equal counts but diverging field content still report `true`.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use murmur_store::{PrimaryStore, SubmissionFilter, SubmissionStatus, WorkflowStore};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::error::{SyncError, SyncResult};

/// Point-in-time record counts for both stores.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatusReport {
    /// Live primary records, rejected included.
    pub primary_count: u64,
    pub workflow_count: u64,
    /// Workflow documents by moderation status.
    pub pending_count: u64,
    pub approved_count: u64,
    pub rejected_count: u64,
    /// `primary_count == workflow_count`. Necessary, not sufficient, for
    /// convergence.
    pub in_sync: bool,
    pub checked_at: DateTime<Utc>,
}

impl SyncStatusReport {
    /// Difference in record counts, primary minus workflow.
    #[must_use]
    pub fn count_drift(&self) -> i64 {
        i64::try_from(self.primary_count).unwrap_or(i64::MAX)
            - i64::try_from(self.workflow_count).unwrap_or(i64::MAX)
    }
}

/// Answers status queries against both stores.
pub struct StatusReporter {
    primary: Arc<dyn PrimaryStore>,
    workflow: Arc<dyn WorkflowStore>,
}

impl StatusReporter {
    pub fn new(primary: Arc<dyn PrimaryStore>, workflow: Arc<dyn WorkflowStore>) -> Self {
        Self { primary, workflow }
    }

    /// Count records in both stores concurrently.
    #[instrument(skip(self))]
    pub async fn get_status(&self) -> SyncResult<SyncStatusReport> {
        let all = SubmissionFilter::all();
        let pending = SubmissionFilter::with_status(SubmissionStatus::Pending);
        let approved = SubmissionFilter::with_status(SubmissionStatus::Approved);
        let rejected = SubmissionFilter::with_status(SubmissionStatus::Rejected);

        let (primary_count, workflow_count, pending_count, approved_count, rejected_count) =
            tokio::try_join!(
                self.primary.count_submissions(&all),
                self.workflow.count_documents(&all),
                self.workflow.count_documents(&pending),
                self.workflow.count_documents(&approved),
                self.workflow.count_documents(&rejected),
            )
            .map_err(|source| SyncError::Status { source })?;

        let report = SyncStatusReport {
            primary_count,
            workflow_count,
            pending_count,
            approved_count,
            rejected_count,
            in_sync: primary_count == workflow_count,
            checked_at: Utc::now(),
        };

        info!(
            primary_count,
            workflow_count,
            in_sync = report.in_sync,
            "Status checked"
        );
        Ok(report)
    }
}
