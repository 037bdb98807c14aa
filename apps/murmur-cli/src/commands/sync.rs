//! Sync command - reconcile one or both directions

use std::fmt::Write as _;

use clap::{Args, ValueEnum};
use murmur_sync::{Direction, DirectionSummary, SyncEngine, SyncOptions};
use serde::Serialize;

use crate::error::{CliError, CliResult};

/// Which pass to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SyncTarget {
    /// Push content into the workflow store
    PrimaryToWorkflow,
    /// Write moderation decisions back to the primary store
    WorkflowToPrimary,
    /// Both, primary-to-workflow first
    Bidirectional,
}

impl SyncTarget {
    /// The single direction to run, or `None` for both.
    #[must_use]
    pub fn direction(self) -> Option<Direction> {
        match self {
            Self::PrimaryToWorkflow => Some(Direction::PrimaryToWorkflow),
            Self::WorkflowToPrimary => Some(Direction::WorkflowToPrimary),
            Self::Bidirectional => None,
        }
    }
}

/// Arguments for the sync command
#[derive(Debug, Args)]
pub struct SyncArgs {
    #[arg(value_enum)]
    pub target: SyncTarget,

    /// Records per batch (1-1000)
    #[arg(long, default_value_t = 50)]
    pub batch_size: usize,

    /// Include rejected submissions in the primary-to-workflow pass
    #[arg(long)]
    pub include_rejected: bool,

    /// Compute and count changes without writing
    #[arg(long)]
    pub dry_run: bool,

    /// Concurrent lanes per batch, partitioned by submission id (1-16)
    #[arg(long, default_value_t = 1)]
    pub concurrency: usize,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl SyncArgs {
    #[must_use]
    pub fn options(&self) -> SyncOptions {
        SyncOptions::default()
            .with_batch_size(self.batch_size)
            .with_include_rejected(self.include_rejected)
            .with_dry_run(self.dry_run)
            .with_concurrency(self.concurrency)
    }
}

/// Structured summary of a sync invocation.
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub dry_run: bool,
    pub directions: Vec<DirectionSummary>,
}

impl SyncReport {
    /// Total failed records across directions.
    #[must_use]
    pub fn failed(&self) -> u64 {
        self.directions.iter().map(|d| d.failed).sum()
    }

    /// Map the report to the process outcome. An aborted direction wins
    /// over a cancellation, which wins over per-record failures.
    pub fn outcome(&self) -> CliResult<()> {
        if let Some(aborted) = self.directions.iter().find(|d| d.error.is_some()) {
            return Err(CliError::Aborted {
                direction: aborted.direction.to_string(),
                message: aborted.error.clone().unwrap_or_default(),
            });
        }
        if self.directions.iter().any(|d| d.cancelled) {
            return Err(CliError::Cancelled);
        }
        match self.failed() {
            0 => Ok(()),
            failed => Err(CliError::RecordFailures { failed }),
        }
    }
}

/// Execute the sync command against an engine.
///
/// Configuration errors return `Err`; fetch failures are folded into the
/// report so partial counts are still shown.
pub async fn execute(args: &SyncArgs, engine: &SyncEngine) -> CliResult<SyncReport> {
    let options = args.options();

    let directions = match args.target.direction() {
        None => engine.sync_bidirectional(&options).await?.summaries(),
        Some(direction) => match engine.sync(direction, &options).await {
            Err(e) if e.is_configuration() => return Err(e.into()),
            result => vec![DirectionSummary::from_result(direction, &result)],
        },
    };

    Ok(SyncReport {
        dry_run: options.dry_run,
        directions,
    })
}

/// Human-readable summary. Succeeded, skipped and failed are always shown
/// together.
#[must_use]
pub fn render_text(report: &SyncReport) -> String {
    let mut out = String::new();
    if report.dry_run {
        out.push_str("Dry run: no records were written\n");
    }
    for summary in &report.directions {
        let _ = writeln!(
            out,
            "{:<20} succeeded={} skipped={} failed={}{}",
            summary.direction.as_str(),
            summary.succeeded,
            summary.skipped,
            summary.failed,
            if summary.cancelled { " (cancelled)" } else { "" },
        );
        if let Some(error) = &summary.error {
            let _ = writeln!(out, "  error: {error}");
        }
    }
    out
}

/// Print the report to stdout.
pub fn print(report: &SyncReport, json: bool) -> CliResult<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        print!("{}", render_text(report));
    }
    Ok(())
}
