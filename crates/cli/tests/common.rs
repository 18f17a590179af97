// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

// Allow unused items: test helpers are shared across multiple test binaries,
// and not every test file uses every helper.
#![allow(dead_code)]
#![allow(unused_imports)]

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;

pub use predicates::prelude::*;
pub use tempfile::TempDir;

/// A temporary config and store for one test.
pub struct Workspace {
    pub dir: TempDir,
}

impl Workspace {
    /// Empty config: offline, default settings.
    pub fn new() -> Self {
        Self::with_config("")
    }

    pub fn with_config(config: &str) -> Self {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("config.toml"), config).unwrap();
        Workspace { dir }
    }

    /// `skiff` pointed at this workspace, isolated from the caller's environment.
    pub fn skiff(&self) -> Command {
        let mut cmd = cargo_bin_cmd!("skiff");
        cmd.env_remove("SKIFF_CONFIG")
            .env_remove("SKIFF_TOKEN")
            .env_remove("SKIFF_LOG")
            .env("SKIFF_STATE_DIR", self.dir.path().join("state"))
            .arg("--config")
            .arg(self.dir.path().join("config.toml"))
            .arg("--db")
            .arg(self.dir.path().join("sync.db"));
        cmd
    }
}
