// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;

use crate::sync::TransportError;

/// All possible errors that can occur in the skrs library.
///
/// Errors provide user-friendly messages with hints for common issues.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Store(#[from] sk_core::Error),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("session expired: the server rejected our credentials\n  hint: refresh the token, then run 'skiff resume'")]
    SessionExpired,

    #[error("{kind} operations require a target record id")]
    MissingTarget { kind: &'static str },

    #[error("record {0} has not been created on the server yet\n  hint: flush first, then use the server id")]
    TemporaryId(i64),

    #[error("record {collection}/{id} has a local edit in flight\n  hint: wait for the flush to finish, then resolve again")]
    RecordBusy { collection: String, id: i64 },

    #[error("sync engine already running (lock held on {0})\n  hint: stop the running 'skiff run' first")]
    Locked(String),

    #[error("sync store lock poisoned")]
    LockPoisoned,

    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("config error: {0}")]
    Config(String),

    #[error("invalid config file: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("runtime error: {0}")]
    Runtime(String),
}

/// A specialized Result type for skrs operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
