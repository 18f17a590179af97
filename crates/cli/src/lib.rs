// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! skrs - offline-first record synchronization.
//!
//! This crate provides the engine behind the `skiff` CLI. Local edits are
//! applied to a SQLite cache and queued durably; the sync coordinator
//! delivers them to a remote record server in per-record order, detects
//! conflicts against fresh server snapshots, and applies remote change
//! notices pushed over a realtime channel.
//!
//! # Main Components
//!
//! - [`sync::SyncCoordinator`] - queue, delivery, reconciliation and conflict resolution
//! - [`sync::SyncEngine`] - background flush loop and realtime routing
//! - [`sync::RecordTransport`] - the server seam, with [`sync::HttpTransport`] as the
//!   production implementation
//! - [`realtime`] - channel subscriptions, reconnect with backoff and polling fallback
//! - [`Config`] - TOML configuration
//!
//! ```rust,ignore
//! use skrs::sync::{HttpTransport, OperationQueue, SyncCoordinator};
//!
//! let db = sk_core::Database::open(&path)?;
//! let queue = OperationQueue::new(db, config.backoff());
//! let transport = Arc::new(HttpTransport::new("https://records.example.com")?);
//! let coordinator = SyncCoordinator::new(queue, transport, config.coordinator_settings());
//! coordinator.enqueue(OpKind::Update, "tasks", Some(42), payload)?;
//! coordinator.flush_queue().await?;
//! ```

mod cli;
mod commands;
mod lock;
mod logging;

pub mod config;
pub mod env;
pub mod error;
pub mod realtime;
pub mod sync;

pub use cli::{Cli, Command, GlobalArgs, OutputFormat};
pub use config::Config;
pub use error::{Error, Result};
pub use lock::EngineLock;
pub use logging::{setup_logging, LogTarget};

/// Execute a CLI command. This is the main entry point for library users
/// and provides a testable way to run commands without process execution.
pub fn run(cli: Cli) -> Result<()> {
    let Cli { global, command } = cli;
    init_logging(&command);

    match command {
        Command::Status => commands::queue::status(&global),
        Command::Pending => commands::queue::pending(&global),
        Command::Failed => commands::queue::failed(&global),
        Command::Retry { id } => commands::queue::retry(&global, &id),
        Command::Purge => commands::queue::purge(&global),
        Command::Enqueue {
            kind,
            collection,
            id,
            payload,
            max_attempts,
        } => commands::queue::enqueue(&global, kind, &collection, id, &payload, max_attempts),
        Command::Records { collection } => commands::queue::records(&global, &collection),
        Command::Flush => commands::remote::flush(&global),
        Command::Reconcile { collection, ids } => {
            commands::remote::reconcile(&global, &collection, &ids)
        }
        Command::Refresh {
            collection,
            matches,
        } => commands::remote::refresh(&global, &collection, matches),
        Command::ClearCache { collection } => commands::queue::clear_cache(&global, &collection),
        Command::Conflicts { status } => commands::conflicts::list(&global, status),
        Command::Resolve { id, strategy } => commands::conflicts::resolve(&global, &id, strategy),
        Command::Ignore { id } => commands::conflicts::ignore(&global, &id),
        Command::ClearFalsePositives => commands::conflicts::clear_false_positives(&global),
        Command::Resume => commands::remote::resume(&global),
        Command::Run => commands::engine::run(&global),
    }
}

/// `run` logs to a file at info level; everything else warns on stderr.
fn init_logging(command: &Command) {
    match (command, config::log_path()) {
        (Command::Run, Some(path)) => setup_logging(LogTarget::File(&path), "info"),
        (Command::Run, None) => setup_logging(LogTarget::Stderr, "info"),
        _ => setup_logging(LogTarget::Stderr, "warn"),
    }
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
