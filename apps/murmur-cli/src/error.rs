//! CLI error types and exit codes

use murmur_store::StoreError;
use murmur_sync::SyncError;
use thiserror::Error;

use crate::config::ConfigError;

/// Exit codes for the CLI
/// - 0: Success
/// - 1: Fatal error (a direction aborted, was cancelled, or output failed)
/// - 2: Configuration error
/// - 3: Completed with per-record failures
pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Store setup failed: {0}")]
    Store(#[from] StoreError),

    #[error("{0}")]
    Sync(#[from] SyncError),

    #[error("{direction} aborted: {message}")]
    Aborted { direction: String, message: String },

    #[error("Sync cancelled before completion")]
    Cancelled,

    #[error("Completed with {failed} failed record(s); they will be retried on the next run")]
    RecordFailures { failed: u64 },

    #[error("Logging setup failed: {0}")]
    Logging(String),

    #[error("Output error: {0}")]
    Output(#[from] serde_json::Error),
}

impl CliError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Config(_) | CliError::Logging(_) => 2,
            CliError::Store(StoreError::InvalidConfiguration { .. }) => 2,
            CliError::Sync(e) if e.is_configuration() => 2,
            CliError::RecordFailures { .. } => 3,
            CliError::Store(_)
            | CliError::Sync(_)
            | CliError::Aborted { .. }
            | CliError::Cancelled
            | CliError::Output(_) => 1,
        }
    }

    /// Print the error to stderr with appropriate formatting
    pub fn print(&self) {
        let use_color = std::env::var("NO_COLOR").is_err();

        if use_color {
            eprintln!("\x1b[31mError:\x1b[0m {}", self);
        } else {
            eprintln!("Error: {}", self);
        }

        if let Some(suggestion) = self.suggestion() {
            if use_color {
                eprintln!("\n\x1b[33mSuggestion:\x1b[0m {}", suggestion);
            } else {
                eprintln!("\nSuggestion: {}", suggestion);
            }
        }
    }

    fn suggestion(&self) -> Option<&'static str> {
        match self {
            CliError::Config(ConfigError::MissingVar(_)) => {
                Some("Set the variable in the environment or in a .env file.")
            }
            CliError::Cancelled | CliError::RecordFailures { .. } | CliError::Aborted { .. } => {
                Some("Re-running is safe; applied records are not duplicated.")
            }
            _ => None,
        }
    }
}
