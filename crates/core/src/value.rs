// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Record field values.
//!
//! Payloads exchanged with the record server are field maps. Instead of
//! carrying untyped JSON around, every field value is one of a small closed
//! set of variants so that normalization can match on it exhaustively.
//!
//! Record references are encoded in JSON as `{"$ref": "<collection>", "$id": <int>}`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Field map of a record, ordered by field name.
pub type Fields = BTreeMap<String, Value>;

const REF_KEY: &str = "$ref";
const REF_ID_KEY: &str = "$id";

/// Reference to another record by collection and id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordRef {
    pub collection: String,
    pub id: i64,
}

impl RecordRef {
    pub fn new(collection: impl Into<String>, id: i64) -> Self {
        RecordRef {
            collection: collection.into(),
            id,
        }
    }

    /// Returns true if the referenced id is a local placeholder that the
    /// server has not confirmed yet.
    pub fn is_temporary(&self) -> bool {
        is_temporary_id(self.id)
    }
}

/// Temporary (local, unconfirmed) record ids are negative.
pub fn is_temporary_id(id: i64) -> bool {
    id < 0
}

/// A single field value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "serde_json::Value", into = "serde_json::Value")]
pub enum Value {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Array(Vec<Value>),
    Object(Fields),
    Ref(RecordRef),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the value as an integer if it is a whole number.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Number(n) if n.fract() == 0.0 && n.is_finite() => {
                // CORRECTNESS: whole, finite value; saturating cast is the intended behaviour
                #[allow(clippy::cast_possible_truncation)]
                Some(*n as i64)
            }
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Rewrites every reference to `collection/from` into `collection/to`.
    ///
    /// Returns the number of references rewritten.
    pub fn rewrite_refs(&mut self, collection: &str, from: i64, to: i64) -> usize {
        match self {
            Value::Ref(r) if r.collection == collection && r.id == from => {
                r.id = to;
                1
            }
            Value::Array(items) => items
                .iter_mut()
                .map(|v| v.rewrite_refs(collection, from, to))
                .sum(),
            Value::Object(fields) => rewrite_field_refs(fields, collection, from, to),
            _ => 0,
        }
    }

    /// Returns true if this value references a record by temporary id.
    pub fn has_unresolved_ref(&self) -> bool {
        match self {
            Value::Ref(r) => r.is_temporary(),
            Value::Array(items) => items.iter().any(Value::has_unresolved_ref),
            Value::Object(fields) => fields.values().any(Value::has_unresolved_ref),
            _ => false,
        }
    }

    /// Appends every temporary reference in this value to `out`.
    pub fn collect_temporary_refs(&self, out: &mut Vec<RecordRef>) {
        match self {
            Value::Ref(r) if r.is_temporary() && !out.contains(r) => out.push(r.clone()),
            Value::Array(items) => items.iter().for_each(|v| v.collect_temporary_refs(out)),
            Value::Object(fields) => fields.values().for_each(|v| v.collect_temporary_refs(out)),
            _ => {}
        }
    }
}

/// Temporary references inside a field map, without duplicates.
pub fn temporary_refs(fields: &Fields) -> Vec<RecordRef> {
    let mut refs = Vec::new();
    fields.values().for_each(|v| v.collect_temporary_refs(&mut refs));
    refs
}

/// Rewrites references inside a field map. See [`Value::rewrite_refs`].
pub fn rewrite_field_refs(fields: &mut Fields, collection: &str, from: i64, to: i64) -> usize {
    fields
        .values_mut()
        .map(|v| v.rewrite_refs(collection, from, to))
        .sum()
}

/// Parses a JSON object into a field map.
pub fn fields_from_json(json: serde_json::Value) -> Result<Fields> {
    match json {
        serde_json::Value::Object(map) => Ok(map.into_iter().map(|(k, v)| (k, v.into())).collect()),
        other => Err(Error::InvalidInput(format!(
            "expected a JSON object for record fields, got {other}"
        ))),
    }
}

/// Converts a field map into a JSON object.
pub fn fields_to_json(fields: &Fields) -> serde_json::Value {
    serde_json::Value::Object(
        fields
            .iter()
            .map(|(k, v)| (k.clone(), v.clone().into()))
            .collect(),
    )
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(0.0)),
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::Array(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => {
                if let Some(r) = parse_ref(&map) {
                    return Value::Ref(r);
                }
                Value::Object(map.into_iter().map(|(k, v)| (k, v.into())).collect())
            }
        }
    }
}

fn parse_ref(map: &serde_json::Map<String, serde_json::Value>) -> Option<RecordRef> {
    if map.len() != 2 {
        return None;
    }
    let collection = map.get(REF_KEY)?.as_str()?;
    let id = map.get(REF_ID_KEY)?.as_i64()?;
    Some(RecordRef::new(collection, id))
}

impl From<Value> for serde_json::Value {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(b),
            Value::Number(n) => number_to_json(n),
            Value::String(s) => serde_json::Value::String(s),
            Value::Array(items) => {
                serde_json::Value::Array(items.into_iter().map(Into::into).collect())
            }
            Value::Object(fields) => serde_json::Value::Object(
                fields.into_iter().map(|(k, v)| (k, v.into())).collect(),
            ),
            Value::Ref(r) => {
                let mut map = serde_json::Map::new();
                map.insert(REF_KEY.to_string(), serde_json::Value::String(r.collection));
                map.insert(REF_ID_KEY.to_string(), serde_json::Value::from(r.id));
                serde_json::Value::Object(map)
            }
        }
    }
}

/// Whole numbers inside the i64 range are written as JSON integers so that
/// ids round-trip without a trailing `.0`.
fn number_to_json(n: f64) -> serde_json::Value {
    // i64::MAX is not exactly representable; stay strictly inside the range.
    const LIMIT: f64 = 9_007_199_254_740_992.0;
    if n.fract() == 0.0 && n.abs() < LIMIT {
        // CORRECTNESS: whole value within the exactly representable f64 range
        #[allow(clippy::cast_possible_truncation)]
        return serde_json::Value::from(n as i64);
    }
    serde_json::Number::from_f64(n).map_or(serde_json::Value::Null, serde_json::Value::Number)
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        // CORRECTNESS: record field integers are well inside f64's exact range
        #[allow(clippy::cast_precision_loss)]
        Value::Number(n as f64)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<RecordRef> for Value {
    fn from(r: RecordRef) -> Self {
        Value::Ref(r)
    }
}

#[cfg(test)]
#[path = "value_tests.rs"]
mod tests;
