// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Single-engine lock.
//!
//! Only one `skiff run` may drive a store at a time. The lock is an advisory
//! exclusive lock on a file next to the database and is released when the
//! [`EngineLock`] is dropped.

use std::fs;
use std::path::{Path, PathBuf};

use fs2::FileExt;

use crate::error::{Error, Result};

/// Held exclusive lock on the engine lock file.
#[derive(Debug)]
pub struct EngineLock {
    file: fs::File,
    path: PathBuf,
}

impl EngineLock {
    /// Take the lock without blocking.
    pub fn acquire(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;
        file.try_lock_exclusive()
            .map_err(|_| Error::Locked(path.display().to_string()))?;
        Ok(EngineLock {
            file,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for EngineLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

#[cfg(test)]
#[path = "lock_tests.rs"]
mod tests;
