//! Sync runner: orchestrates one directional pass.
//!
//! fetch → batch → reconcile → report. Per-record failures are counted;
//! only a fetch-layer failure aborts the run. Cancellation is checked at
//! batch boundaries so no record is left half-written.

use std::collections::hash_map::DefaultHasher;
use std::future::Future;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use murmur_store::{
    PrimaryStore, StoreError, Submission, SubmissionFilter, SubmissionId, WorkflowDocument,
    WorkflowStore,
};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::error::{SyncError, SyncResult};
use crate::fetcher::{BatchFetcher, PagedSource};
use crate::options::SyncOptions;
use crate::reconciler::Reconciler;
use crate::statistics::{RunStatistics, StatisticsTracker};
use crate::types::Direction;

/// Progress of a run after a completed batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchProgress {
    pub run_id: Uuid,
    pub direction: Direction,
    /// 1-based index of the batch just completed.
    pub batch: u64,
    pub batches_total: u64,
    pub processed: u64,
    pub succeeded: u64,
    pub skipped: u64,
    pub failed: u64,
    pub percentage: f64,
}

/// Receives progress after each batch, e.g. to surface it in a scheduler.
pub trait ProgressSink: Send + Sync {
    fn on_batch(&self, progress: &BatchProgress);
}

/// Result of one directional run.
///
/// `succeeded` and `failed` are always reported together; a run with
/// failures is never a plain success.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    pub run_id: Uuid,
    pub direction: Direction,
    pub succeeded: u64,
    pub skipped: u64,
    pub failed: u64,
    /// Stopped at a batch boundary before the source was exhausted.
    pub cancelled: bool,
    pub dry_run: bool,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub statistics: RunStatistics,
}

impl RunResult {
    /// Whether any record failed.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }

    /// Completed the whole source set with no failed record.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        !self.cancelled && self.failed == 0
    }
}

struct RunContext<'a> {
    run_id: Uuid,
    direction: Direction,
    tracker: &'a StatisticsTracker,
}

/// Runs directional passes over explicit store handles.
pub struct SyncRunner {
    primary: Arc<dyn PrimaryStore>,
    workflow: Arc<dyn WorkflowStore>,
    progress: Option<Arc<dyn ProgressSink>>,
    cancel: CancellationToken,
}

impl SyncRunner {
    /// Create a runner with its own cancellation token.
    pub fn new(primary: Arc<dyn PrimaryStore>, workflow: Arc<dyn WorkflowStore>) -> Self {
        Self {
            primary,
            workflow,
            progress: None,
            cancel: CancellationToken::new(),
        }
    }

    #[must_use]
    pub fn with_progress_sink(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.progress = Some(sink);
        self
    }

    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Token that stops runs at the next batch boundary.
    #[must_use]
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Run one directional pass.
    ///
    /// Fails fast with [`SyncError::Configuration`] on invalid options,
    /// and with [`SyncError::Fetch`] if the source store cannot be read.
    #[instrument(
        skip(self, options),
        fields(run_id = tracing::field::Empty, direction = %direction)
    )]
    pub async fn run(&self, direction: Direction, options: &SyncOptions) -> SyncResult<RunResult> {
        options.validate()?;

        let run_id = Uuid::new_v4();
        tracing::Span::current().record("run_id", tracing::field::display(run_id));

        let started_at = Utc::now();
        let tracker = StatisticsTracker::new();
        let reconciler = Reconciler::new(self.primary.clone(), self.workflow.clone())
            .with_dry_run(options.dry_run);
        let ctx = RunContext {
            run_id,
            direction,
            tracker: &tracker,
        };

        info!(
            batch_size = options.batch_size,
            include_rejected = options.include_rejected,
            dry_run = options.dry_run,
            concurrency = options.concurrency,
            "Starting sync run"
        );

        let (reconciler, tracker_ref) = (&reconciler, &tracker);
        let cancelled = match direction {
            Direction::PrimaryToWorkflow => {
                let mut fetcher = BatchFetcher::new(
                    self.primary.as_ref(),
                    SubmissionFilter::live(options.include_rejected),
                    options.page_size(),
                );
                self.drive(&ctx, &mut fetcher, move |batch| {
                    apply_submissions(reconciler, batch, tracker_ref, options.concurrency)
                })
                .await?
            }
            Direction::WorkflowToPrimary => {
                let mut fetcher = BatchFetcher::new(
                    self.workflow.as_ref(),
                    SubmissionFilter::all(),
                    options.page_size(),
                );
                self.drive(&ctx, &mut fetcher, move |batch| {
                    apply_documents(reconciler, batch, tracker_ref, options.concurrency)
                })
                .await?
            }
        };

        let statistics = tracker.snapshot();
        let result = RunResult {
            run_id,
            direction,
            succeeded: statistics.succeeded,
            skipped: statistics.skipped,
            failed: statistics.failed,
            cancelled,
            dry_run: options.dry_run,
            started_at,
            completed_at: Utc::now(),
            statistics,
        };

        info!(
            succeeded = result.succeeded,
            skipped = result.skipped,
            failed = result.failed,
            batches = result.statistics.batches,
            cancelled = result.cancelled,
            duration_ms = result.statistics.duration_ms,
            "Sync run finished"
        );

        Ok(result)
    }

    /// Pull batches until the source is exhausted or the run is cancelled.
    /// Returns whether the run was cancelled.
    async fn drive<S, F, Fut>(
        &self,
        ctx: &RunContext<'_>,
        fetcher: &mut BatchFetcher<'_, S>,
        mut process: F,
    ) -> SyncResult<bool>
    where
        S: PagedSource + ?Sized,
        F: FnMut(Vec<S::Item>) -> Fut,
        Fut: Future<Output = ()>,
    {
        let (records, batches) = fetcher
            .totals()
            .await
            .map_err(|e| self.fetch_failed(ctx, e))?;
        ctx.tracker.set_totals(records, batches);

        loop {
            if self.cancel.is_cancelled() {
                warn!(
                    run_id = %ctx.run_id,
                    batches_done = fetcher.batches_fetched(),
                    batches_total = batches,
                    "Sync run cancelled at batch boundary"
                );
                return Ok(true);
            }

            let batch = match fetcher.next_batch().await {
                Ok(Some(batch)) => batch,
                Ok(None) => return Ok(false),
                Err(e) => return Err(self.fetch_failed(ctx, e)),
            };

            process(batch).await;
            let number = ctx.tracker.complete_batch();
            self.report_progress(ctx, number);
        }
    }

    fn fetch_failed(&self, ctx: &RunContext<'_>, error: StoreError) -> SyncError {
        let statistics = ctx.tracker.snapshot();
        error!(
            run_id = %ctx.run_id,
            direction = %ctx.direction,
            error_code = error.error_code(),
            error = %error,
            succeeded = statistics.succeeded,
            skipped = statistics.skipped,
            failed = statistics.failed,
            "Source store fetch failed, aborting run"
        );
        SyncError::fetch(ctx.direction, statistics, error)
    }

    fn report_progress(&self, ctx: &RunContext<'_>, batch: u64) {
        let stats = ctx.tracker.snapshot();
        let progress = BatchProgress {
            run_id: ctx.run_id,
            direction: ctx.direction,
            batch,
            batches_total: stats.batches_total,
            processed: stats.processed,
            succeeded: stats.succeeded,
            skipped: stats.skipped,
            failed: stats.failed,
            percentage: stats.progress_percentage(),
        };

        info!(
            run_id = %progress.run_id,
            direction = %progress.direction,
            batch = progress.batch,
            total_batches = progress.batches_total,
            succeeded = progress.succeeded,
            skipped = progress.skipped,
            failed = progress.failed,
            percentage = format!("{:.1}", progress.percentage),
            "Batch complete"
        );

        if let Some(sink) = &self.progress {
            sink.on_batch(&progress);
        }
    }
}

/// Lane index for a submission id. Stable for the lifetime of the process.
#[must_use]
pub fn lane_for(id: &SubmissionId, lanes: usize) -> usize {
    let lanes = lanes.max(1);
    let mut hasher = DefaultHasher::new();
    id.hash(&mut hasher);
    (hasher.finish() % lanes as u64) as usize
}

/// Split records into lanes so that one id always lands in one lane.
fn partition<T>(records: Vec<T>, lanes: usize, id: impl Fn(&T) -> &SubmissionId) -> Vec<Vec<T>> {
    if lanes <= 1 {
        return vec![records];
    }
    let mut out: Vec<Vec<T>> = (0..lanes).map(|_| Vec::new()).collect();
    for record in records {
        let lane = lane_for(id(&record), lanes);
        out[lane].push(record);
    }
    out.retain(|lane| !lane.is_empty());
    out
}

async fn apply_submissions(
    reconciler: &Reconciler,
    batch: Vec<Submission>,
    tracker: &StatisticsTracker,
    concurrency: usize,
) {
    let lanes = partition(batch, concurrency, |s| &s.id);
    join_all(lanes.iter().map(|lane| async move {
        for outcome in reconciler.reconcile_submission_batch(lane).await {
            tracker.record(&outcome);
        }
    }))
    .await;
}

async fn apply_documents(
    reconciler: &Reconciler,
    batch: Vec<WorkflowDocument>,
    tracker: &StatisticsTracker,
    concurrency: usize,
) {
    let lanes = partition(batch, concurrency, |d| &d.submission_id);
    join_all(lanes.iter().map(|lane| async move {
        for document in lane {
            let outcome = reconciler.reconcile_document(document).await;
            tracker.record(&outcome);
        }
    }))
    .await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use murmur_store::memory::{InMemoryPrimaryStore, InMemoryWorkflowStore};
    use std::sync::Mutex;

    fn submissions(count: usize) -> Vec<Submission> {
        let base = Utc.with_ymd_and_hms(2026, 5, 1, 0, 0, 0).unwrap();
        (0..count)
            .map(|i| {
                Submission::new(
                    format!("s{i:03}"),
                    "river",
                    format!("content {i}"),
                    base + Duration::minutes(i as i64),
                )
            })
            .collect()
    }

    #[derive(Default)]
    struct RecordingSink {
        seen: Mutex<Vec<BatchProgress>>,
        cancel_after: Option<(u64, CancellationToken)>,
    }

    impl ProgressSink for RecordingSink {
        fn on_batch(&self, progress: &BatchProgress) {
            self.seen.lock().unwrap().push(progress.clone());
            if let Some((after, token)) = &self.cancel_after {
                if progress.batch >= *after {
                    token.cancel();
                }
            }
        }
    }

    #[test]
    fn test_partition_keeps_each_id_in_one_lane() {
        let records = submissions(100);
        let lanes = partition(records, 4, |s| &s.id);
        assert!(lanes.len() <= 4);
        assert_eq!(lanes.iter().map(Vec::len).sum::<usize>(), 100);
        for lane in &lanes {
            let expected = lane_for(&lane[0].id, 4);
            assert!(lane.iter().all(|s| lane_for(&s.id, 4) == expected));
        }
    }

    #[test]
    fn test_single_lane_preserves_order() {
        let records = submissions(5);
        let ids: Vec<_> = records.iter().map(|s| s.id.clone()).collect();
        let lanes = partition(records, 1, |s| &s.id);
        assert_eq!(lanes.len(), 1);
        assert_eq!(lanes[0].iter().map(|s| s.id.clone()).collect::<Vec<_>>(), ids);
    }

    #[tokio::test]
    async fn test_progress_reported_per_batch() {
        let primary = Arc::new(InMemoryPrimaryStore::with_submissions(submissions(7)));
        let workflow = Arc::new(InMemoryWorkflowStore::new());
        let sink = Arc::new(RecordingSink::default());
        let runner = SyncRunner::new(primary, workflow).with_progress_sink(sink.clone());

        let result = runner
            .run(
                Direction::PrimaryToWorkflow,
                &SyncOptions::default().with_batch_size(3),
            )
            .await
            .unwrap();

        assert_eq!(result.succeeded, 7);
        assert_eq!(result.statistics.batches, 3);
        let seen = sink.seen.lock().unwrap();
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[0].batch, 1);
        assert_eq!(seen[0].batches_total, 3);
        assert_eq!(seen[0].succeeded, 3);
        assert_eq!(seen[2].processed, 7);
        assert!((seen[2].percentage - 100.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_cancellation_stops_at_batch_boundary() {
        let primary = Arc::new(InMemoryPrimaryStore::with_submissions(submissions(10)));
        let workflow = Arc::new(InMemoryWorkflowStore::new());
        let token = CancellationToken::new();
        let sink = Arc::new(RecordingSink {
            seen: Mutex::default(),
            cancel_after: Some((2, token.clone())),
        });
        let runner = SyncRunner::new(primary, workflow.clone())
            .with_progress_sink(sink)
            .with_cancellation(token);

        let result = runner
            .run(
                Direction::PrimaryToWorkflow,
                &SyncOptions::default().with_batch_size(3),
            )
            .await
            .unwrap();

        assert!(result.cancelled);
        assert!(!result.is_clean());
        assert_eq!(result.statistics.batches, 2);
        assert_eq!(result.succeeded, 6);
        assert_eq!(workflow.len().await, 6);
    }

    #[tokio::test]
    async fn test_invalid_options_fail_before_io() {
        let primary = Arc::new(InMemoryPrimaryStore::new());
        primary.set_fail_listing(true);
        let runner = SyncRunner::new(primary, Arc::new(InMemoryWorkflowStore::new()));

        let err = runner
            .run(
                Direction::PrimaryToWorkflow,
                &SyncOptions::default().with_batch_size(0),
            )
            .await
            .unwrap_err();
        assert!(err.is_configuration());
    }

    #[tokio::test]
    async fn test_concurrent_lanes_reconcile_everything_once() {
        let primary = Arc::new(InMemoryPrimaryStore::with_submissions(submissions(40)));
        let workflow = Arc::new(InMemoryWorkflowStore::new());
        let runner = SyncRunner::new(primary, workflow.clone());

        let result = runner
            .run(
                Direction::PrimaryToWorkflow,
                &SyncOptions::default()
                    .with_batch_size(10)
                    .with_concurrency(4),
            )
            .await
            .unwrap();

        assert_eq!(result.succeeded, 40);
        assert_eq!(result.statistics.action_count("created"), 40);
        assert_eq!(workflow.len().await, 40);
        assert_eq!(workflow.write_calls(), 40);
    }
}
