// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

//! Tests for the public `run()` function.
//!
//! Commands that open a store are exercised end to end through a temporary
//! config and database.

use clap::Parser;
use tempfile::TempDir;

use crate::{run, Cli, Error};

fn cli(dir: &TempDir, args: &[&str]) -> Cli {
    let config = dir.path().join("config.toml");
    if !config.exists() {
        std::fs::write(&config, "").unwrap();
    }
    let db = dir.path().join("sync.db");
    let mut argv = vec![
        "skiff".to_string(),
        "--config".to_string(),
        config.display().to_string(),
        "--db".to_string(),
        db.display().to_string(),
    ];
    argv.extend(args.iter().map(|a| a.to_string()));
    Cli::try_parse_from(argv).unwrap()
}

#[test]
fn local_commands_work_without_a_server() {
    let dir = TempDir::new().unwrap();
    run(cli(&dir, &["enqueue", "update", "tasks", "--id", "1", "--payload", "{\"a\":1}"])).unwrap();
    run(cli(&dir, &["status"])).unwrap();
    run(cli(&dir, &["pending", "-o", "json"])).unwrap();
    run(cli(&dir, &["records", "tasks"])).unwrap();
    run(cli(&dir, &["conflicts"])).unwrap();
    run(cli(&dir, &["clear-false-positives"])).unwrap();
    run(cli(&dir, &["purge"])).unwrap();
    run(cli(&dir, &["resume"])).unwrap();
}

#[test]
fn server_commands_need_a_remote() {
    let dir = TempDir::new().unwrap();
    assert!(matches!(run(cli(&dir, &["flush"])), Err(Error::Config(_))));
    assert!(matches!(
        run(cli(&dir, &["reconcile", "tasks", "1"])),
        Err(Error::Config(_))
    ));
}

#[test]
fn retry_of_unknown_operation_fails() {
    let dir = TempDir::new().unwrap();
    assert!(matches!(
        run(cli(&dir, &["retry", "tasks:1:0-0"])),
        Err(Error::Store(_))
    ));
}

#[test]
fn reconcile_rejects_temporary_ids() {
    let dir = TempDir::new().unwrap();
    assert!(matches!(
        run(cli(&dir, &["reconcile", "tasks", "4", "-2"])),
        Err(Error::TemporaryId(-2))
    ));
}
