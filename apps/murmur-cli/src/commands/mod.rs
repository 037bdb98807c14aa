//! Command implementations.

pub mod status;
pub mod sync;

use std::sync::Arc;

use murmur_store::http::HttpWorkflowStore;
use murmur_store::postgres::PgPrimaryStore;
use murmur_sync::SyncEngine;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::EngineConfig;
use crate::error::CliResult;

/// Build both store clients once and hand them to a new engine.
pub fn build_engine(config: &EngineConfig) -> CliResult<SyncEngine> {
    let primary = PgPrimaryStore::connect(&config.primary_store_config(), config.retry.clone())?;
    let workflow = HttpWorkflowStore::new(&config.workflow_store_config(), config.retry.clone())?;

    info!(
        environment = config.environment.as_str(),
        dataset = %config.workflow_dataset,
        "Store clients ready"
    );

    Ok(SyncEngine::new(Arc::new(primary), Arc::new(workflow)))
}

/// Cancel `token` on Ctrl-C; runs stop at the next batch boundary.
pub fn cancel_on_ctrl_c(token: CancellationToken) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                warn!("Received Ctrl+C, stopping at the next batch boundary");
                token.cancel();
            }
            Err(e) => error!("Failed to install Ctrl+C handler: {e}"),
        }
    });
}
