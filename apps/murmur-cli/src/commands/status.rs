//! Status command - show record counts in both stores

use std::fmt::Write as _;

use clap::Args;
use murmur_sync::{SyncEngine, SyncStatusReport};

use crate::error::CliResult;

/// Arguments for the status command
#[derive(Debug, Args)]
pub struct StatusArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Execute the status command against an engine.
pub async fn execute(engine: &SyncEngine) -> CliResult<SyncStatusReport> {
    Ok(engine.get_status().await?)
}

/// Human-readable status.
#[must_use]
pub fn render_text(report: &SyncStatusReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Primary records:   {}", report.primary_count);
    let _ = writeln!(out, "Workflow records:  {}", report.workflow_count);
    let _ = writeln!(
        out,
        "  pending={} approved={} rejected={}",
        report.pending_count, report.approved_count, report.rejected_count
    );
    if report.in_sync {
        // Counts only; field drift is not detected.
        out.push_str("In sync:           yes (record counts match)\n");
    } else {
        let _ = writeln!(
            out,
            "In sync:           no (drift of {} record(s))",
            report.count_drift()
        );
    }
    let _ = writeln!(out, "Checked at:        {}", report.checked_at.to_rfc3339());
    out
}

/// Print the status to stdout.
pub fn print(report: &SyncStatusReport, json: bool) -> CliResult<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        print!("{}", render_text(report));
    }
    Ok(())
}
