// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for sk-core operations.

use thiserror::Error;

/// All possible errors that can occur in sk-core operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("operation not found: {0}")]
    OperationNotFound(String),

    #[error("conflict not found: {0}")]
    ConflictNotFound(String),

    #[error("record not found: {collection}/{id}")]
    RecordNotFound { collection: String, id: i64 },

    #[error("invalid operation transition: {id} is {from}, cannot become {to}")]
    InvalidTransition { id: String, from: String, to: String },

    #[error("invalid operation kind: '{0}'\n  hint: valid kinds are: create, update, delete")]
    InvalidKind(String),

    #[error("invalid operation status: '{0}'\n  hint: valid statuses are: pending, in_flight, completed, failed")]
    InvalidStatus(String),

    #[error("invalid conflict status: '{0}'\n  hint: valid statuses are: pending, resolved, ignored")]
    InvalidConflictStatus(String),

    #[error("invalid resolution: '{0}'\n  hint: valid resolutions are: prefer-local, prefer-server, merge")]
    InvalidResolution(String),

    #[error("invalid error kind: '{0}'")]
    InvalidErrorKind(String),

    #[error("{0}")]
    InvalidInput(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("corrupted data: {0}")]
    CorruptedData(String),
}

/// A specialized Result type for sk-core operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
