// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Divergence between a locally cached record and the server's copy.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::clock::Stamp;
use crate::error::{Error, Result};
use crate::value::Fields;

/// Lifecycle of a conflict. `Resolved` and `Ignored` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictStatus {
    Pending,
    Resolved,
    Ignored,
}

impl ConflictStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictStatus::Pending => "pending",
            ConflictStatus::Resolved => "resolved",
            ConflictStatus::Ignored => "ignored",
        }
    }
}

impl fmt::Display for ConflictStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ConflictStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(ConflictStatus::Pending),
            "resolved" => Ok(ConflictStatus::Resolved),
            "ignored" => Ok(ConflictStatus::Ignored),
            _ => Err(Error::InvalidConflictStatus(s.to_string())),
        }
    }
}

/// How a conflict was (or should be) settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Resolution {
    /// Keep the local snapshot and write it back to the server.
    PreferLocal,
    /// Adopt the server snapshot and discard local edits.
    PreferServer,
    /// Combine both snapshots field by field.
    Merge,
}

impl Resolution {
    pub fn as_str(&self) -> &'static str {
        match self {
            Resolution::PreferLocal => "prefer-local",
            Resolution::PreferServer => "prefer-server",
            Resolution::Merge => "merge",
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Resolution {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().replace('_', "-").as_str() {
            "prefer-local" | "local" => Ok(Resolution::PreferLocal),
            "prefer-server" | "server" => Ok(Resolution::PreferServer),
            "merge" => Ok(Resolution::Merge),
            _ => Err(Error::InvalidResolution(s.to_string())),
        }
    }
}

/// A detected divergence awaiting (or after) resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncConflict {
    pub id: String,
    pub collection: String,
    pub record_id: i64,
    pub local_snapshot: Fields,
    pub server_snapshot: Fields,
    /// Field names whose normalized values differ, in field name order.
    pub conflicting_fields: Vec<String>,
    pub detected_at: DateTime<Utc>,
    pub status: ConflictStatus,
    pub resolution: Option<Resolution>,
    pub resolved_at: Option<DateTime<Utc>>,
    /// When the local snapshot was last edited, if known.
    pub local_modified_at: Option<DateTime<Utc>>,
}

impl SyncConflict {
    /// Creates a pending conflict. The id is derived from the record and the
    /// detection stamp.
    pub fn new(
        collection: impl Into<String>,
        record_id: i64,
        local_snapshot: Fields,
        server_snapshot: Fields,
        conflicting_fields: Vec<String>,
        stamp: Stamp,
    ) -> Self {
        let collection = collection.into();
        SyncConflict {
            id: format!("{collection}:{record_id}:{stamp}"),
            collection,
            record_id,
            local_snapshot,
            server_snapshot,
            conflicting_fields,
            detected_at: stamp.to_datetime(),
            status: ConflictStatus::Pending,
            resolution: None,
            resolved_at: None,
            local_modified_at: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == ConflictStatus::Pending
    }
}

#[cfg(test)]
#[path = "conflict_tests.rs"]
mod tests;
