// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Field-level merge of a local and a server snapshot.
//!
//! Merge rules:
//! - fields on the local-preferred allow-list keep the local value
//! - every other field takes the value from the more recently modified snapshot
//! - ties and unknown modification times go to the server
//! - a field present on only one side is kept

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};

use crate::normalize::as_timestamp;
use crate::value::{Fields, Value};

/// Fields consulted, in order, to find when a snapshot was last modified.
pub const DEFAULT_MODIFIED_FIELDS: &[&str] = &["write_date", "updated_at", "__last_update"];

/// Which snapshot a value was taken from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Local,
    Server,
}

/// Configuration for [`merge_snapshots`].
#[derive(Debug, Clone, PartialEq)]
pub struct MergePolicy {
    /// Fields that always keep the local value.
    pub local_preferred_fields: BTreeSet<String>,
    /// Timestamp fields used to decide which snapshot is newer.
    pub modified_fields: Vec<String>,
}

impl Default for MergePolicy {
    fn default() -> Self {
        MergePolicy {
            local_preferred_fields: BTreeSet::new(),
            modified_fields: DEFAULT_MODIFIED_FIELDS
                .iter()
                .map(|f| f.to_string())
                .collect(),
        }
    }
}

impl MergePolicy {
    pub fn with_local_preferred<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.local_preferred_fields
            .extend(fields.into_iter().map(Into::into));
        self
    }

    /// Returns the first parseable modification timestamp in `snapshot`.
    pub fn modified_at(&self, snapshot: &Fields) -> Option<DateTime<Utc>> {
        self.modified_fields
            .iter()
            .filter_map(|f| snapshot.get(f))
            .find_map(as_timestamp)
    }
}

/// Result of a field-level merge.
#[derive(Debug, Clone, PartialEq)]
pub struct Merged {
    pub fields: Fields,
    /// The snapshot that supplied the non-preferred fields.
    pub newer: Side,
}

/// Decides which snapshot is newer.
///
/// `local_edited_at` is when the local copy was last edited on this device.
/// When known it takes precedence over the local snapshot's own modification
/// fields, which still carry the server time of the copy that was edited.
pub fn newer_side(
    policy: &MergePolicy,
    local: &Fields,
    server: &Fields,
    local_edited_at: Option<DateTime<Utc>>,
) -> Side {
    let local_at = local_edited_at.or_else(|| policy.modified_at(local));
    let server_at = policy.modified_at(server);
    match (local_at, server_at) {
        (Some(l), Some(s)) if l > s => Side::Local,
        (Some(_), None) => Side::Local,
        _ => Side::Server,
    }
}

/// Merges `local` and `server` field by field according to `policy`.
pub fn merge_snapshots(
    policy: &MergePolicy,
    local: &Fields,
    server: &Fields,
    local_edited_at: Option<DateTime<Utc>>,
) -> Merged {
    let newer = newer_side(policy, local, server, local_edited_at);
    let (winner, loser) = match newer {
        Side::Local => (local, server),
        Side::Server => (server, local),
    };

    let keys: BTreeSet<&String> = local.keys().chain(server.keys()).collect();
    let fields = keys
        .into_iter()
        .filter_map(|key| {
            let value: Option<&Value> = if policy.local_preferred_fields.contains(key) {
                local.get(key).or_else(|| server.get(key))
            } else {
                winner.get(key).or_else(|| loser.get(key))
            };
            value.map(|v| (key.clone(), v.clone()))
        })
        .collect();

    Merged { fields, newer }
}

#[cfg(test)]
#[path = "merge_tests.rs"]
mod tests;
