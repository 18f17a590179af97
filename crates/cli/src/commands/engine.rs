// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! `skiff run`: the sync engine in the foreground.

use std::sync::Arc;

use tracing::{info, warn};

use super::{block_on, open};
use crate::cli::GlobalArgs;
use crate::config::lock_path;
use crate::error::Result;
use crate::lock::EngineLock;
use crate::sync::{EngineConfig, SyncCoordinator, SyncEngine};

pub fn run(global: &GlobalArgs) -> Result<()> {
    let ctx = open(global)?;
    let url = ctx.require_remote()?.to_string();
    let lock = EngineLock::acquire(&lock_path(&ctx.db_path))?;
    info!(%url, db = %ctx.db_path.display(), lock = %lock.path().display(), "starting");

    let recovered = ctx.coordinator.recover()?;
    if recovered > 0 {
        info!(recovered, "requeued operations left in flight");
    }

    let config = ctx.config.engine_config();
    block_on(run_until(ctx.coordinator, config, shutdown_signal()))?
}

/// Run the engine until `stop` resolves, then shut it down cleanly.
pub(crate) async fn run_until(
    coordinator: Arc<SyncCoordinator>,
    config: EngineConfig,
    stop: impl std::future::Future<Output = ()>,
) -> Result<()> {
    let engine = SyncEngine::start(coordinator, config).await?;
    stop.await;
    info!("shutting down");
    engine.shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "cannot listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
