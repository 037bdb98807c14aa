//! Run statistics tracking.
//!
//! Tracks and aggregates outcome counts during a directional run. The
//! tracker is shared by concurrent lanes, so every counter is atomic.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};
use std::time::Instant;

use crate::types::ReconcileOutcome;

/// Statistics for a directional run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStatistics {
    /// Records matching the source filter when the run started.
    #[serde(default)]
    pub records_total: u64,
    /// Records reconciled so far.
    #[serde(default)]
    pub processed: u64,
    /// Records applied (written, unchanged, or dry-run planned).
    #[serde(default)]
    pub succeeded: u64,
    /// Records skipped (e.g. orphaned workflow documents).
    #[serde(default)]
    pub skipped: u64,
    /// Records that failed and will be retried on the next run.
    #[serde(default)]
    pub failed: u64,
    /// Batches completed.
    #[serde(default)]
    pub batches: u64,
    /// Batches expected when the run started.
    #[serde(default)]
    pub batches_total: u64,
    /// Applied records broken down by action.
    #[serde(default)]
    pub actions: BTreeMap<String, u64>,
    /// Skipped records broken down by reason.
    #[serde(default)]
    pub skip_reasons: BTreeMap<String, u64>,
    /// Failed records broken down by error code.
    #[serde(default)]
    pub failure_codes: BTreeMap<String, u64>,
    /// Wall-clock duration in milliseconds.
    #[serde(default)]
    pub duration_ms: u64,
}

impl RunStatistics {
    /// Calculate progress percentage against the expected total.
    #[must_use]
    pub fn progress_percentage(&self) -> f64 {
        if self.records_total == 0 {
            0.0
        } else {
            (self.processed as f64 / self.records_total as f64 * 100.0).min(100.0)
        }
    }

    /// Count for a specific action, e.g. `created`.
    #[must_use]
    pub fn action_count(&self, action: &str) -> u64 {
        self.actions.get(action).copied().unwrap_or(0)
    }

    /// Whether any record failed.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }
}

/// Thread-safe tracker for accumulating statistics during a run.
pub struct StatisticsTracker {
    records_total: AtomicU64,
    batches_total: AtomicU64,
    processed: AtomicU64,
    succeeded: AtomicU64,
    skipped: AtomicU64,
    failed: AtomicU64,
    batches: AtomicU64,
    actions: RwLock<BTreeMap<String, u64>>,
    skip_reasons: RwLock<BTreeMap<String, u64>>,
    failure_codes: RwLock<BTreeMap<String, u64>>,
    start_time: Instant,
}

impl StatisticsTracker {
    /// Create a new tracker.
    #[must_use]
    pub fn new() -> Self {
        Self {
            records_total: AtomicU64::new(0),
            batches_total: AtomicU64::new(0),
            processed: AtomicU64::new(0),
            succeeded: AtomicU64::new(0),
            skipped: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            batches: AtomicU64::new(0),
            actions: RwLock::new(BTreeMap::new()),
            skip_reasons: RwLock::new(BTreeMap::new()),
            failure_codes: RwLock::new(BTreeMap::new()),
            start_time: Instant::now(),
        }
    }

    /// Set the expected record and batch totals.
    pub fn set_totals(&self, records: u64, batches: u64) {
        self.records_total.store(records, Ordering::SeqCst);
        self.batches_total.store(batches, Ordering::SeqCst);
    }

    /// Record the outcome of one reconcile.
    pub fn record(&self, outcome: &ReconcileOutcome) {
        self.processed.fetch_add(1, Ordering::SeqCst);
        match outcome {
            ReconcileOutcome::Applied { action } => {
                self.succeeded.fetch_add(1, Ordering::SeqCst);
                bump(&self.actions, action.as_str());
            }
            ReconcileOutcome::Skipped { reason } => {
                self.skipped.fetch_add(1, Ordering::SeqCst);
                bump(&self.skip_reasons, reason.as_str());
            }
            ReconcileOutcome::Failed { reason } => {
                self.failed.fetch_add(1, Ordering::SeqCst);
                bump(&self.failure_codes, &reason.code);
            }
        }
    }

    /// Mark a batch as completed; returns the 1-based batch number.
    pub fn complete_batch(&self) -> u64 {
        self.batches.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Get elapsed duration in milliseconds.
    pub fn elapsed_ms(&self) -> u64 {
        u64::try_from(self.start_time.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    /// Snapshot current statistics.
    pub fn snapshot(&self) -> RunStatistics {
        let read = |map: &RwLock<BTreeMap<String, u64>>| {
            map.read().unwrap_or_else(PoisonError::into_inner).clone()
        };

        RunStatistics {
            records_total: self.records_total.load(Ordering::SeqCst),
            processed: self.processed.load(Ordering::SeqCst),
            succeeded: self.succeeded.load(Ordering::SeqCst),
            skipped: self.skipped.load(Ordering::SeqCst),
            failed: self.failed.load(Ordering::SeqCst),
            batches: self.batches.load(Ordering::SeqCst),
            batches_total: self.batches_total.load(Ordering::SeqCst),
            actions: read(&self.actions),
            skip_reasons: read(&self.skip_reasons),
            failure_codes: read(&self.failure_codes),
            duration_ms: self.elapsed_ms(),
        }
    }
}

impl Default for StatisticsTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// A lane that panicked mid-update leaves the lock poisoned; the map
/// itself is still consistent, so keep counting.
fn bump(map: &RwLock<BTreeMap<String, u64>>, key: &str) {
    let mut map = map.write().unwrap_or_else(PoisonError::into_inner);
    *map.entry(key.to_string()).or_insert(0) += 1;
}
