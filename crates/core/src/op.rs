// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Queued mutations awaiting delivery to the record server.
//!
//! Every local create, update or delete becomes a [`QueuedOperation`]. The
//! operation moves through `pending → in_flight → completed`, or back to
//! `pending` with a larger attempt count on failure, or to `failed` once its
//! retries are exhausted. `completed` and `failed` are the only terminal states.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::clock::Stamp;
use crate::error::{Error, Result};
use crate::value::{is_temporary_id, Fields, Value};

/// Default delivery attempts before an operation becomes `failed`.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// The kind of mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpKind {
    Create,
    Update,
    Delete,
}

impl OpKind {
    /// Returns the string representation used in storage and display.
    pub fn as_str(&self) -> &'static str {
        match self {
            OpKind::Create => "create",
            OpKind::Update => "update",
            OpKind::Delete => "delete",
        }
    }
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for OpKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "create" => Ok(OpKind::Create),
            "update" => Ok(OpKind::Update),
            "delete" => Ok(OpKind::Delete),
            _ => Err(Error::InvalidKind(s.to_string())),
        }
    }
}

/// Delivery status of a queued operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpStatus {
    /// Waiting to be sent (possibly after a backoff delay).
    Pending,
    /// Currently being executed against the server.
    InFlight,
    /// Applied by the server. Garbage-collected by `purge_completed`.
    Completed,
    /// Retries exhausted or not retryable. Kept until retried or cleared.
    Failed,
}

impl OpStatus {
    /// Returns the string representation used in storage and display.
    pub fn as_str(&self) -> &'static str {
        match self {
            OpStatus::Pending => "pending",
            OpStatus::InFlight => "in_flight",
            OpStatus::Completed => "completed",
            OpStatus::Failed => "failed",
        }
    }

    /// Returns true for `completed` and `failed`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OpStatus::Completed | OpStatus::Failed)
    }
}

impl fmt::Display for OpStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for OpStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(OpStatus::Pending),
            "in_flight" => Ok(OpStatus::InFlight),
            "completed" => Ok(OpStatus::Completed),
            "failed" => Ok(OpStatus::Failed),
            _ => Err(Error::InvalidStatus(s.to_string())),
        }
    }
}

/// Classification of the last delivery failure.
///
/// Mirrors the transport failure taxonomy so that the retry policy can be
/// decided from persisted state alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Unauthenticated,
    NotFound,
    Validation,
    Network,
    Timeout,
    Unknown,
}

impl ErrorKind {
    /// Returns the string representation used in storage and display.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Unauthenticated => "unauthenticated",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Validation => "validation",
            ErrorKind::Network => "network",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Unknown => "unknown",
        }
    }

    /// Transient failures are retried with backoff until attempts run out.
    /// The rest can only succeed after something outside the queue changes.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorKind::Network | ErrorKind::Timeout | ErrorKind::Unknown
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ErrorKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "unauthenticated" => Ok(ErrorKind::Unauthenticated),
            "not_found" => Ok(ErrorKind::NotFound),
            "validation" => Ok(ErrorKind::Validation),
            "network" => Ok(ErrorKind::Network),
            "timeout" => Ok(ErrorKind::Timeout),
            "unknown" => Ok(ErrorKind::Unknown),
            _ => Err(Error::InvalidErrorKind(s.to_string())),
        }
    }
}

/// Identity of the record an operation mutates. Operations sharing a key are
/// delivered strictly in enqueue order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChainKey {
    pub collection: String,
    pub record_id: Option<i64>,
}

/// A pending mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedOperation {
    /// `{collection}:{target}:{stamp}`, unique per enqueue.
    pub id: String,
    pub kind: OpKind,
    pub collection: String,
    /// Server record id. Absent for creates; negative while it still refers to
    /// a record whose create has not been confirmed.
    pub target_id: Option<i64>,
    /// Temporary id the local cache uses for a created record.
    pub local_id: Option<i64>,
    pub payload: Fields,
    pub enqueued_at: DateTime<Utc>,
    pub attempt: u32,
    pub max_attempts: u32,
    pub status: OpStatus,
    pub last_error: Option<String>,
    pub last_error_kind: Option<ErrorKind>,
    /// Earliest time (epoch ms) at which the operation may be sent again.
    pub next_attempt_at: i64,
}

impl QueuedOperation {
    /// Builds a fresh pending operation.
    pub fn new(
        kind: OpKind,
        collection: impl Into<String>,
        target_id: Option<i64>,
        payload: Fields,
        max_attempts: u32,
        stamp: Stamp,
    ) -> Self {
        let collection = collection.into();
        let target = target_id.map_or_else(|| "new".to_string(), |id| id.to_string());
        QueuedOperation {
            id: format!("{collection}:{target}:{stamp}"),
            kind,
            collection,
            target_id,
            local_id: None,
            payload,
            enqueued_at: stamp.to_datetime(),
            attempt: 0,
            max_attempts: max_attempts.max(1),
            status: OpStatus::Pending,
            last_error: None,
            last_error_kind: None,
            next_attempt_at: 0,
        }
    }

    /// The record this operation mutates, for per-record ordering.
    pub fn chain_key(&self) -> ChainKey {
        ChainKey {
            collection: self.collection.clone(),
            record_id: self.target_id.or(self.local_id),
        }
    }

    /// The id of the record in the local cache.
    pub fn record_id(&self) -> Option<i64> {
        self.target_id.or(self.local_id)
    }

    /// True while the operation targets or references a record whose create
    /// has not been confirmed by the server.
    pub fn depends_on_unconfirmed_create(&self) -> bool {
        let target_unconfirmed = self.kind != OpKind::Create
            && self.target_id.is_some_and(is_temporary_id);
        target_unconfirmed || self.payload.values().any(Value::has_unresolved_ref)
    }

    /// Returns true if the operation may be sent at `now_ms`.
    pub fn is_due(&self, now_ms: i64) -> bool {
        self.status == OpStatus::Pending && self.next_attempt_at <= now_ms
    }
}

#[cfg(test)]
#[path = "op_tests.rs"]
mod tests;
