//! Bidirectional coordinator.
//!
//! Runs primary→workflow, then workflow→primary, over the same runner.
//! Not transactional across the two directions: each store stays
//! internally valid and the pair is safe to re-run.

use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::error::SyncResult;
use crate::options::SyncOptions;
use crate::runner::{RunResult, SyncRunner};
use crate::types::Direction;

/// Result of a bidirectional sync.
///
/// Each direction carries its own result or error, so a failure of the
/// second direction never hides the outcome of the first.
#[derive(Debug)]
pub struct BidirectionalResult {
    pub primary_to_workflow: SyncResult<RunResult>,
    /// `None` when the second direction was not started because the first
    /// was cancelled.
    pub workflow_to_primary: Option<SyncResult<RunResult>>,
}

impl BidirectionalResult {
    /// Both directions ran to completion without fatal errors.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        matches!(&self.primary_to_workflow, Ok(r) if !r.cancelled)
            && matches!(&self.workflow_to_primary, Some(Ok(r)) if !r.cancelled)
    }

    /// Any record failed or any direction failed outright.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        let failed = |result: &SyncResult<RunResult>| match result {
            Ok(run) => run.has_failures(),
            Err(_) => true,
        };
        failed(&self.primary_to_workflow) || self.workflow_to_primary.as_ref().is_some_and(failed)
    }

    /// Per-direction summaries, in execution order.
    #[must_use]
    pub fn summaries(&self) -> Vec<DirectionSummary> {
        let mut out = vec![DirectionSummary::from_result(
            Direction::PrimaryToWorkflow,
            &self.primary_to_workflow,
        )];
        if let Some(result) = &self.workflow_to_primary {
            out.push(DirectionSummary::from_result(
                Direction::WorkflowToPrimary,
                result,
            ));
        }
        out
    }
}

/// Flat view of one direction's outcome for reporting.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DirectionSummary {
    pub direction: Direction,
    pub succeeded: u64,
    pub skipped: u64,
    pub failed: u64,
    pub cancelled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<&'static str>,
}

impl DirectionSummary {
    /// Summarize a run result. A fatal error keeps the partial counts it
    /// carries, if any.
    #[must_use]
    pub fn from_result(direction: Direction, result: &SyncResult<RunResult>) -> Self {
        match result {
            Ok(run) => Self {
                direction,
                succeeded: run.succeeded,
                skipped: run.skipped,
                failed: run.failed,
                cancelled: run.cancelled,
                error: None,
                error_code: None,
            },
            Err(e) => {
                let partial = e.partial_statistics().cloned().unwrap_or_default();
                Self {
                    direction,
                    succeeded: partial.succeeded,
                    skipped: partial.skipped,
                    failed: partial.failed,
                    cancelled: false,
                    error: Some(e.to_string()),
                    error_code: Some(e.error_code()),
                }
            }
        }
    }
}

/// Runs both directions in a fixed order.
pub struct BidirectionalCoordinator<'a> {
    runner: &'a SyncRunner,
}

impl<'a> BidirectionalCoordinator<'a> {
    pub fn new(runner: &'a SyncRunner) -> Self {
        Self { runner }
    }

    /// Run primary→workflow, then workflow→primary.
    ///
    /// Invalid options fail fast. A fetch failure in the first direction
    /// does not prevent the second from running; a cancellation does.
    #[instrument(skip(self, options))]
    pub async fn run(&self, options: &SyncOptions) -> SyncResult<BidirectionalResult> {
        options.validate()?;

        let primary_to_workflow = self.runner.run(Direction::PrimaryToWorkflow, options).await;

        let cancelled = match &primary_to_workflow {
            Ok(run) => run.cancelled,
            Err(e) => {
                warn!(
                    error_code = e.error_code(),
                    error = %e,
                    "primary_to_workflow failed, continuing with workflow_to_primary"
                );
                self.runner.is_cancelled()
            }
        };

        if cancelled {
            info!("Bidirectional sync cancelled before workflow_to_primary");
            return Ok(BidirectionalResult {
                primary_to_workflow,
                workflow_to_primary: None,
            });
        }

        let workflow_to_primary = self.runner.run(Direction::WorkflowToPrimary, options).await;

        let result = BidirectionalResult {
            primary_to_workflow,
            workflow_to_primary: Some(workflow_to_primary),
        };
        info!(
            complete = result.is_complete(),
            has_failures = result.has_failures(),
            "Bidirectional sync finished"
        );
        Ok(result)
    }
}
