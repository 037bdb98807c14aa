//! Command-line definition.

use clap::{Parser, Subcommand};

use crate::commands::status::StatusArgs;
use crate::commands::sync::SyncArgs;

/// murmur - keep primary and workflow submission stores in sync
#[derive(Debug, Parser)]
#[command(name = "murmur")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Reconcile submissions between the two stores
    Sync(SyncArgs),

    /// Show record counts and the coarse in-sync signal
    Status(StatusArgs),
}
