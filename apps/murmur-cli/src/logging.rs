//! Logging setup using tracing.
//!
//! JSON output suits log aggregation; pretty output suits a terminal.
//! Logs go to stderr so `--json` summaries on stdout stay machine-readable.

use std::str::FromStr;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::{CliError, CliResult};

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "pretty" | "text" => Ok(Self::Pretty),
            other => Err(format!("expected json or pretty, got '{other}'")),
        }
    }
}

/// Initialize the tracing subscriber.
///
/// `RUST_LOG` overrides `filter` when set.
pub fn init_logging(filter: &str, format: LogFormat) -> CliResult<()> {
    let filter_layer = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(filter))
        .map_err(|e| CliError::Logging(format!("invalid log filter '{filter}': {e}")))?;

    let (json_layer, pretty_layer) = match format {
        LogFormat::Json => (
            Some(
                fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_file(true)
                    .with_line_number(true)
                    .flatten_event(true),
            ),
            None,
        ),
        LogFormat::Pretty => (
            None,
            Some(fmt::layer().with_writer(std::io::stderr).with_target(false)),
        ),
    };

    tracing_subscriber::registry()
        .with(json_layer)
        .with(pretty_layer)
        .with(filter_layer)
        .try_init()
        .map_err(|e| CliError::Logging(e.to_string()))?;

    tracing::debug!(filter = %filter, ?format, "Logging initialized");
    Ok(())
}
