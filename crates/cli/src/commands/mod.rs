// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Command implementations.
//!
//! Each command has a `run` entry point that opens the store from the global
//! options and writes to stdout, and a `run_impl` that works against an open
//! [`SyncCoordinator`] and any writer so it can be tested in memory.

pub mod conflicts;
pub mod engine;
pub mod queue;
pub mod remote;
#[cfg(test)]
#[path = "mod_tests.rs"]
pub mod testing;

use std::future::Future;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use sk_core::Database;
use tracing::debug;

use crate::cli::{GlobalArgs, OutputFormat};
use crate::config::{Config, ConfigSource};
use crate::error::{Error, Result};
use crate::sync::{HttpTransport, OfflineTransport, OperationQueue, RecordTransport, SyncCoordinator};

/// An opened sync store.
pub struct Context {
    pub config: Config,
    pub db_path: PathBuf,
    pub coordinator: Arc<SyncCoordinator>,
}

impl Context {
    /// Fail with a hint unless a server is configured.
    pub fn require_remote(&self) -> Result<&str> {
        self.config.remote.url.as_deref().ok_or_else(|| {
            Error::Config(
                "no remote server configured\n  hint: set [remote] url in the config file"
                    .to_string(),
            )
        })
    }
}

/// Load the config and open the store named by the global options.
pub fn open(global: &GlobalArgs) -> Result<Context> {
    let source = ConfigSource::resolve(global.config.as_deref());
    let config = Config::load_from(source.as_ref())?;
    let db_path = config.database_path(global.db.as_deref())?;
    debug!(db = %db_path.display(), "opening sync store");

    let db = Database::open(&db_path)?;
    let queue = OperationQueue::new(db, config.backoff());
    let coordinator = SyncCoordinator::new(
        queue,
        build_transport(&config)?,
        config.coordinator_settings(),
    );
    Ok(Context {
        config,
        db_path,
        coordinator: Arc::new(coordinator),
    })
}

/// HTTP transport for the configured server, or an offline stand-in.
pub fn build_transport(config: &Config) -> Result<Arc<dyn RecordTransport>> {
    match &config.remote.url {
        Some(url) => {
            let transport = HttpTransport::new(url.as_str())?
                .with_token(config.token())
                .with_stream_url(config.remote.stream_url.clone());
            Ok(Arc::new(transport))
        }
        None => Ok(Arc::new(OfflineTransport)),
    }
}

/// Drive an async command to completion on a fresh runtime.
pub fn block_on<F: Future>(future: F) -> Result<F::Output> {
    let runtime = tokio::runtime::Runtime::new()?;
    Ok(runtime.block_on(future))
}

/// Write `value` as pretty JSON followed by a newline.
pub(crate) fn write_json<T: Serialize>(out: &mut impl Write, value: &T) -> Result<()> {
    serde_json::to_writer_pretty(&mut *out, value)?;
    writeln!(out)?;
    Ok(())
}

/// Print text or JSON depending on `format`.
pub(crate) fn emit<T: Serialize>(
    out: &mut impl Write,
    format: OutputFormat,
    value: &T,
    text: impl FnOnce(&mut dyn Write, &T) -> std::io::Result<()>,
) -> Result<()> {
    match format {
        OutputFormat::Json => write_json(out, value),
        OutputFormat::Text => Ok(text(out, value)?),
    }
}
