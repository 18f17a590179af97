// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use tempfile::TempDir;

#[test]
fn log_file_and_parent_are_created() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("state").join("skiff.log");
    assert!(open_log(&path).is_some());
    assert!(path.exists());
}

#[test]
fn unopenable_log_file_falls_back() {
    let dir = TempDir::new().unwrap();
    // A directory cannot be opened for appending.
    assert!(open_log(dir.path()).is_none());
}

#[test]
fn setup_twice_does_not_panic() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("skiff.log");
    setup_logging(LogTarget::File(&path), "info");
    setup_logging(LogTarget::Stderr, "warn");
}
