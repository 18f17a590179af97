// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;
use std::str::FromStr;

use clap::{Args, Parser, Subcommand, ValueEnum};
use sk_core::{ConflictStatus, OpKind, Resolution, Value};

/// Parse a string that must not be empty or whitespace-only.
fn non_empty_string(s: &str) -> Result<String, String> {
    if s.trim().is_empty() {
        Err("cannot be empty".to_string())
    } else {
        Ok(s.to_string())
    }
}

fn op_kind(s: &str) -> Result<OpKind, String> {
    OpKind::from_str(&s.to_ascii_lowercase()).map_err(|e| e.to_string())
}

fn resolution(s: &str) -> Result<Resolution, String> {
    Resolution::from_str(&s.to_ascii_lowercase()).map_err(|e| e.to_string())
}

fn conflict_status(s: &str) -> Result<ConflictStatus, String> {
    ConflictStatus::from_str(&s.to_ascii_lowercase()).map_err(|e| e.to_string())
}

/// Parse `field=value`. The value is read as JSON when it parses, else as a string.
fn field_match(s: &str) -> Result<(String, Value), String> {
    let (field, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected field=value, got '{s}'"))?;
    let field = non_empty_string(field.trim())?;
    let value = serde_json::from_str::<serde_json::Value>(value)
        .map(Value::from)
        .unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((field, value))
}

/// Output format for commands supporting structured output.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "skiff")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Offline-first record sync: queue local edits, deliver them, reconcile conflicts")]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Options shared by every command.
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Config file (default: $SKIFF_CONFIG or <config dir>/skiff/config.toml)
    #[arg(long, global = true, value_name = "path")]
    pub config: Option<PathBuf>,

    /// Sync store database (overrides the config file)
    #[arg(long, global = true, value_name = "path")]
    pub db: Option<PathBuf>,

    /// Output format
    #[arg(long, short, global = true, value_enum, default_value_t)]
    pub output: OutputFormat,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show queue, conflict and transport status
    Status,

    /// List operations waiting for delivery
    Pending,

    /// List operations that exhausted their retries
    Failed,

    /// Move a failed operation back to pending
    Retry {
        /// Operation id (see 'skiff failed')
        #[arg(value_parser = non_empty_string)]
        id: String,
    },

    /// Delete completed operations
    Purge,

    /// Queue a local mutation
    #[command(after_help = "\
Examples:
  skiff enqueue create tasks --payload '{\"name\": \"Draft\"}'
  skiff enqueue update tasks --id 42 --payload '{\"status\": \"done\"}'
  skiff enqueue delete tasks --id 42")]
    Enqueue {
        /// create, update or delete
        #[arg(value_parser = op_kind)]
        kind: OpKind,

        /// Collection the record belongs to
        #[arg(value_parser = non_empty_string)]
        collection: String,

        /// Target record id (required for update and delete)
        #[arg(long, allow_negative_numbers = true)]
        id: Option<i64>,

        /// Field values as a JSON object
        #[arg(long, default_value = "{}")]
        payload: String,

        /// Delivery attempts before the operation is marked failed
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
        max_attempts: Option<u32>,
    },

    /// List cached records of a collection
    Records {
        #[arg(value_parser = non_empty_string)]
        collection: String,
    },

    /// Deliver queued operations now
    Flush,

    /// Compare cached records with the server and record conflicts
    Reconcile {
        #[arg(value_parser = non_empty_string)]
        collection: String,

        /// Record ids to check
        #[arg(required = true, allow_negative_numbers = true)]
        ids: Vec<i64>,
    },

    /// Re-fetch a collection from the server, dropping stale cached records
    #[command(after_help = "\
Examples:
  skiff refresh channels
  skiff refresh channels --match active=true --match is_member=true")]
    Refresh {
        #[arg(value_parser = non_empty_string)]
        collection: String,

        /// Only keep records whose field equals the value (repeatable)
        #[arg(long = "match", value_name = "field=value", value_parser = field_match)]
        matches: Vec<(String, Value)>,
    },

    /// Drop cached records of a collection that have no local edits
    ClearCache {
        #[arg(value_parser = non_empty_string)]
        collection: String,
    },

    /// List sync conflicts
    Conflicts {
        /// pending, resolved or ignored (default: all)
        #[arg(long, value_parser = conflict_status)]
        status: Option<ConflictStatus>,
    },

    /// Resolve a pending conflict
    Resolve {
        #[arg(value_parser = non_empty_string)]
        id: String,

        /// prefer-local, prefer-server or merge
        #[arg(value_parser = resolution)]
        strategy: Resolution,
    },

    /// Dismiss a pending conflict without changing the record
    Ignore {
        #[arg(value_parser = non_empty_string)]
        id: String,
    },

    /// Delete pending conflicts that no longer differ
    ClearFalsePositives,

    /// Resume syncing after the session expired
    Resume,

    /// Run the sync engine in the foreground until interrupted
    Run,
}

#[cfg(test)]
#[path = "../cli_tests/mod.rs"]
mod tests;
