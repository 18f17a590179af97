// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Detection of divergent fields between a local and a server snapshot.
//!
//! The compared field set is the union of both snapshots' keys minus an
//! exclusion set (record id, server/client timestamps, sync bookkeeping).
//! Values are compared after [normalization](crate::normalize), so encoding
//! differences never show up as conflicts.

use std::collections::BTreeSet;

use crate::normalize::values_equal;
use crate::value::Fields;

/// Fields that never participate in conflict detection by default.
pub const DEFAULT_EXCLUDED_FIELDS: &[&str] = &[
    "id",
    "create_date",
    "write_date",
    "__last_update",
    "created_at",
    "updated_at",
];

/// Prefix reserved for sync bookkeeping fields.
pub const SYNC_FIELD_PREFIX: &str = "_sync";

/// The set of fields ignored when comparing snapshots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldExclusions {
    names: BTreeSet<String>,
    prefixes: Vec<String>,
}

impl Default for FieldExclusions {
    fn default() -> Self {
        FieldExclusions {
            names: DEFAULT_EXCLUDED_FIELDS
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
            prefixes: vec![SYNC_FIELD_PREFIX.to_string()],
        }
    }
}

impl FieldExclusions {
    /// Default exclusions extended with additional field names.
    pub fn with_fields<I, S>(extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut exclusions = Self::default();
        exclusions.names.extend(extra.into_iter().map(Into::into));
        exclusions
    }

    pub fn is_excluded(&self, field: &str) -> bool {
        self.names.contains(field) || self.prefixes.iter().any(|p| field.starts_with(p.as_str()))
    }
}

/// Returns the names of fields whose normalized values differ, using the
/// default exclusion set.
///
/// ```
/// use serde_json::json;
/// use sk_core::detect::find_conflicting_fields;
/// use sk_core::value::fields_from_json;
///
/// let local = fields_from_json(json!({"active": "1"})).unwrap();
/// let server = fields_from_json(json!({"active": true})).unwrap();
/// assert!(find_conflicting_fields(&local, &server).is_empty());
/// ```
pub fn find_conflicting_fields(local: &Fields, server: &Fields) -> Vec<String> {
    find_conflicting_fields_with(local, server, &FieldExclusions::default())
}

/// Returns the names of fields whose normalized values differ.
///
/// The result is ordered by field name.
pub fn find_conflicting_fields_with(
    local: &Fields,
    server: &Fields,
    exclusions: &FieldExclusions,
) -> Vec<String> {
    let keys: BTreeSet<&String> = local.keys().chain(server.keys()).collect();

    keys.into_iter()
        .filter(|field| !exclusions.is_excluded(field))
        .filter(|field| !values_equal(local.get(*field), server.get(*field)))
        .cloned()
        .collect()
}

#[cfg(test)]
#[path = "detect_tests.rs"]
mod tests;
