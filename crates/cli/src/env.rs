// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access.
//!
//! The variable name constants are generated by `build.rs` and live in the
//! [`vars`] submodule.

use std::path::PathBuf;

/// Generated environment variable name constants.
pub mod vars {
    include!(concat!(env!("OUT_DIR"), "/env_vars.rs"));
}

fn non_empty(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Returns the value of `SKIFF_CONFIG` if set.
pub fn config_path() -> Option<PathBuf> {
    non_empty(vars::SKIFF_CONFIG).map(PathBuf::from)
}

/// Returns the value of `SKIFF_TOKEN` if set and non-empty.
pub fn token() -> Option<String> {
    non_empty(vars::SKIFF_TOKEN)
}

/// Returns the value of `SKIFF_LOG` if set.
pub fn log_filter() -> Option<String> {
    non_empty(vars::SKIFF_LOG)
}

/// Returns the value of `SKIFF_STATE_DIR` if set.
pub fn state_dir() -> Option<PathBuf> {
    non_empty(vars::SKIFF_STATE_DIR).map(PathBuf::from)
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
