// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Tracing setup.
//!
//! `skiff run` is long lived and logs to a file in the state directory.
//! One-shot commands log warnings to stderr so they do not clutter output.

use std::fs;
use std::path::Path;

use tracing_subscriber::EnvFilter;

use crate::env;

/// Where log lines go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogTarget<'a> {
    /// Append to a file, falling back to stderr if it cannot be opened.
    File(&'a Path),
    Stderr,
}

/// Build the filter from `SKIFF_LOG`, then `RUST_LOG`, then `default`.
pub fn filter(default: &str) -> EnvFilter {
    if let Some(directives) = env::log_filter() {
        if let Ok(filter) = EnvFilter::try_new(directives) {
            return filter;
        }
    }
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

/// Install the global subscriber. A second call is a no-op.
pub fn setup_logging(target: LogTarget<'_>, default: &str) {
    let filter = filter(default);

    let file = match target {
        LogTarget::File(path) => open_log(path),
        LogTarget::Stderr => None,
    };

    // try_init: tests and embedders may already have a subscriber.
    let _ = match file {
        Some(file) => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(file)
            .with_ansi(false)
            .try_init(),
        None => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init(),
    };
}

fn open_log(path: &Path) -> Option<fs::File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).ok()?;
    }
    fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .ok()
}

#[cfg(test)]
#[path = "logging_tests.rs"]
mod tests;
