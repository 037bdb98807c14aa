//! Submission reconciliation engine
//!
//! Keeps the primary store (content and identity) and the workflow store
//! (moderation decisions) convergent for every submission.
//!
//! # Overview
//!
//! - **primary→workflow** pushes primary-owned fields into workflow
//!   documents, preserving moderation state already recorded there.
//! - **workflow→primary** writes moderation decisions back to the primary
//!   record, never touching its content.
//! - **bidirectional** runs both, in that order.
//!
//! Runs are idempotent: re-running after a partial failure converges
//! without duplicates. Per-record failures are counted, never thrown; only
//! configuration and fetch-layer failures abort a run.
//!
//! # Usage
//!
//! ```ignore
//! use murmur_sync::{SyncEngine, SyncOptions};
//!
//! let engine = SyncEngine::new(primary, workflow);
//! let result = engine.sync_primary_to_workflow(&SyncOptions::default()).await?;
//! println!("{} succeeded, {} failed", result.succeeded, result.failed);
//! ```

pub mod adapter;
pub mod coordinator;
pub mod engine;
pub mod error;
pub mod fetcher;
pub mod options;
pub mod reconciler;
pub mod runner;
pub mod statistics;
pub mod status;
pub mod types;

pub use adapter::RecordAdapter;
pub use coordinator::{BidirectionalCoordinator, BidirectionalResult, DirectionSummary};
pub use engine::SyncEngine;
pub use error::{FailureKind, FailureReason, SyncError, SyncResult};
pub use fetcher::{BatchFetcher, PagedSource};
pub use options::{SyncOptions, MAX_BATCH_SIZE, MAX_CONCURRENCY};
pub use reconciler::{Reconciler, SyncRecord};
pub use runner::{BatchProgress, ProgressSink, RunResult, SyncRunner};
pub use statistics::{RunStatistics, StatisticsTracker};
pub use status::{StatusReporter, SyncStatusReport};
pub use types::{Direction, ReconcileOutcome, RecordAction, SkipReason};
