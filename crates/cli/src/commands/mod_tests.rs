// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

//! Test infrastructure for command testing without filesystem setup.
//!
//! [`TestContext`] wraps an in-memory store and a scripted transport so
//! command logic can be exercised without a config file or a server.

use std::sync::Arc;

use serde_json::json;
use sk_core::OpKind;
use tempfile::TempDir;

use super::*;
use crate::sync::test_helpers::{fields, memory_coordinator, MockTransport};

/// In-memory coordinator backed by a [`MockTransport`].
pub struct TestContext {
    pub transport: Arc<MockTransport>,
    pub coordinator: Arc<SyncCoordinator>,
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

impl TestContext {
    pub fn new() -> Self {
        let transport = Arc::new(MockTransport::new());
        let coordinator = Arc::new(memory_coordinator(&transport));
        TestContext {
            transport,
            coordinator,
        }
    }

    /// Queue an update to `collection:id`, marking the cached record dirty.
    pub fn edit(&self, collection: &str, id: i64, payload: serde_json::Value) -> &Self {
        self.coordinator
            .enqueue(OpKind::Update, collection, Some(id), fields(payload))
            .expect("enqueue failed");
        self
    }
}

/// Capture what a command writes.
pub fn capture(f: impl FnOnce(&mut Vec<u8>) -> Result<()>) -> String {
    let mut out = Vec::new();
    f(&mut out).expect("command failed");
    String::from_utf8(out).expect("output is not utf-8")
}

fn global_for(dir: &TempDir, config: &str) -> GlobalArgs {
    let path = dir.path().join("config.toml");
    std::fs::write(&path, config).unwrap();
    GlobalArgs {
        config: Some(path),
        db: Some(dir.path().join("sync.db")),
        output: OutputFormat::Text,
    }
}

#[test]
fn open_creates_the_store_from_global_options() {
    let dir = TempDir::new().unwrap();
    let ctx = open(&global_for(&dir, "")).unwrap();
    assert_eq!(ctx.db_path, dir.path().join("sync.db"));
    assert!(ctx.db_path.exists());
    assert!(ctx.require_remote().is_err());

    ctx.coordinator
        .enqueue(OpKind::Update, "tasks", Some(1), fields(json!({"a": 1})))
        .unwrap();
    drop(ctx);

    // Queued operations survive reopening.
    let ctx = open(&global_for(&dir, "")).unwrap();
    assert_eq!(ctx.coordinator.list_pending().unwrap().len(), 1);
}

#[test]
fn open_rejects_an_invalid_config() {
    let dir = TempDir::new().unwrap();
    let global = global_for(&dir, "[queue]\nmax_attempts = 0\n");
    assert!(matches!(open(&global), Err(Error::Config(_))));
}

#[test]
fn configured_remote_is_required_and_reported() {
    let dir = TempDir::new().unwrap();
    let ctx = open(&global_for(&dir, "[remote]\nurl = \"http://127.0.0.1:9\"\n")).unwrap();
    assert_eq!(ctx.require_remote().unwrap(), "http://127.0.0.1:9");
}

#[test]
fn offline_flush_keeps_operations_pending() {
    let dir = TempDir::new().unwrap();
    let ctx = open(&global_for(&dir, "")).unwrap();
    ctx.coordinator
        .enqueue(OpKind::Update, "tasks", Some(1), fields(json!({"a": 1})))
        .unwrap();

    let report = block_on(ctx.coordinator.flush_queue()).unwrap().unwrap();
    assert_eq!(report.completed, 0);
    assert_eq!(ctx.coordinator.get_status().unwrap().pending_count, 1);
}

#[test]
fn json_output_ends_with_newline() {
    let text = capture(|out| write_json(out, &json!({"ok": true})));
    assert!(text.ends_with("}\n"));
    assert_eq!(serde_json::from_str::<serde_json::Value>(&text).unwrap(), json!({"ok": true}));
}
