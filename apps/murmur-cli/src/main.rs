//! murmur CLI - run and inspect submission reconciliation
//!
//! - `murmur sync <primary-to-workflow|workflow-to-primary|bidirectional>`
//! - `murmur status`

use clap::Parser;
use murmur_cli::cli::{Cli, Commands};
use murmur_cli::commands;
use murmur_cli::config::EngineConfig;
use murmur_cli::error::CliResult;
use murmur_cli::logging;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            e.print();
            std::process::exit(e.exit_code());
        }
    }
}

async fn run(cli: Cli) -> CliResult<()> {
    let config = EngineConfig::from_env()?;
    logging::init_logging(&config.log_filter, config.log_format)?;
    let engine = commands::build_engine(&config)?;

    match cli.command {
        Commands::Sync(args) => {
            commands::cancel_on_ctrl_c(engine.cancellation_token().clone());
            let report = commands::sync::execute(&args, &engine).await?;
            commands::sync::print(&report, args.json)?;
            report.outcome()
        }
        Commands::Status(args) => {
            let report = commands::status::execute(&engine).await?;
            commands::status::print(&report, args.json)
        }
    }
}
