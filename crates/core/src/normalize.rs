// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Type-normalized value comparison.
//!
//! The local cache and the record server encode the same facts differently:
//! a checkbox may be `true` on one side and `"1"` on the other, a date may be
//! `2024-05-01 10:00:00` or `2024-05-01T10:00:00Z`. Values are reduced to a
//! [`Canonical`] form before comparison so that only real differences count.
//!
//! Rules:
//! - `null` and blank strings are `Null`
//! - `true`/`false`, `0`/`1`, and the strings `"0"`, `"1"`, `"true"`, `"false"`,
//!   `"yes"`, `"no"` (any case) are `Bool`
//! - other numeric strings are `Number`
//! - date-like strings are `Timestamp`, rendered as `YYYY-MM-DDTHH:MM:SS.mmmZ`
//! - arrays, objects and references are normalized recursively

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use crate::value::Value;

/// Canonical representation used for equality checks.
#[derive(Debug, Clone, PartialEq)]
pub enum Canonical {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
    Timestamp(String),
    List(Vec<Canonical>),
    Map(BTreeMap<String, Canonical>),
    Ref { collection: String, id: i64 },
}

/// Reduces a value to its canonical form.
pub fn normalize(value: &Value) -> Canonical {
    match value {
        Value::Null => Canonical::Null,
        Value::Bool(b) => Canonical::Bool(*b),
        Value::Number(n) => normalize_number(*n),
        Value::String(s) => normalize_str(s),
        Value::Array(items) => Canonical::List(items.iter().map(normalize).collect()),
        Value::Object(fields) => Canonical::Map(
            fields
                .iter()
                .map(|(k, v)| (k.clone(), normalize(v)))
                .collect(),
        ),
        Value::Ref(r) => Canonical::Ref {
            collection: r.collection.clone(),
            id: r.id,
        },
    }
}

/// Returns true if both values normalize to the same canonical form.
///
/// A missing field is treated as `null`.
pub fn values_equal(a: Option<&Value>, b: Option<&Value>) -> bool {
    let a = a.map_or(Canonical::Null, normalize);
    let b = b.map_or(Canonical::Null, normalize);
    a == b
}

/// Interprets a value as a point in time, if it is date-like.
pub fn as_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => parse_datetime(s.trim()),
        _ => None,
    }
}

fn normalize_number(n: f64) -> Canonical {
    if n == 0.0 {
        Canonical::Bool(false)
    } else if n == 1.0 {
        Canonical::Bool(true)
    } else {
        Canonical::Number(n)
    }
}

fn normalize_str(raw: &str) -> Canonical {
    let s = raw.trim();
    if s.is_empty() {
        return Canonical::Null;
    }

    match s.to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" => return Canonical::Bool(true),
        "false" | "no" | "0" => return Canonical::Bool(false),
        _ => {}
    }

    if let Ok(n) = s.parse::<f64>() {
        if n.is_finite() {
            return normalize_number(n);
        }
    }

    if let Some(dt) = parse_datetime(s) {
        return Canonical::Timestamp(format_timestamp(&dt));
    }

    Canonical::Text(s.to_string())
}

fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Formats a timestamp in the canonical `YYYY-MM-DDTHH:MM:SS.mmmZ` form.
pub fn format_timestamp(dt: &DateTime<Utc>) -> String {
    dt.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

#[cfg(test)]
#[path = "normalize_tests.rs"]
mod tests;
