//! Sync engine facade.
//!
//! The four operations an external CLI or scheduler calls. Store handles
//! are passed in once at construction; there is no ambient client state.

use std::sync::Arc;

use murmur_store::{PrimaryStore, WorkflowStore};
use tokio_util::sync::CancellationToken;

use crate::coordinator::{BidirectionalCoordinator, BidirectionalResult};
use crate::error::SyncResult;
use crate::options::SyncOptions;
use crate::runner::{ProgressSink, RunResult, SyncRunner};
use crate::status::{StatusReporter, SyncStatusReport};
use crate::types::Direction;

/// Entry point for sync and status operations.
pub struct SyncEngine {
    runner: SyncRunner,
    status: StatusReporter,
}

impl SyncEngine {
    pub fn new(primary: Arc<dyn PrimaryStore>, workflow: Arc<dyn WorkflowStore>) -> Self {
        Self {
            runner: SyncRunner::new(primary.clone(), workflow.clone()),
            status: StatusReporter::new(primary, workflow),
        }
    }

    #[must_use]
    pub fn with_progress_sink(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.runner = self.runner.with_progress_sink(sink);
        self
    }

    /// Use an externally owned cancellation token, e.g. one tied to Ctrl-C.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.runner = self.runner.with_cancellation(token);
        self
    }

    #[must_use]
    pub fn cancellation_token(&self) -> &CancellationToken {
        self.runner.cancellation_token()
    }

    pub async fn sync_primary_to_workflow(&self, options: &SyncOptions) -> SyncResult<RunResult> {
        self.runner.run(Direction::PrimaryToWorkflow, options).await
    }

    pub async fn sync_workflow_to_primary(&self, options: &SyncOptions) -> SyncResult<RunResult> {
        self.runner.run(Direction::WorkflowToPrimary, options).await
    }

    pub async fn sync_bidirectional(
        &self,
        options: &SyncOptions,
    ) -> SyncResult<BidirectionalResult> {
        BidirectionalCoordinator::new(&self.runner).run(options).await
    }

    /// Run a single direction chosen at runtime.
    pub async fn sync(&self, direction: Direction, options: &SyncOptions) -> SyncResult<RunResult> {
        self.runner.run(direction, options).await
    }

    pub async fn get_status(&self) -> SyncResult<SyncStatusReport> {
        self.status.get_status().await
    }
}
