// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use crate::value::{fields_from_json, RecordRef};
use serde_json::json;
use yare::parameterized;

fn v(json: serde_json::Value) -> Value {
    Value::from(json)
}

#[parameterized(
    string_one_vs_true = { json!("1"), json!(true) },
    number_zero_vs_false = { json!(0), json!(false) },
    yes_vs_true = { json!("Yes"), json!(true) },
    no_vs_false = { json!(" no "), json!(false) },
    true_string_vs_number = { json!("TRUE"), json!(1) },
    numeric_string = { json!("42"), json!(42) },
    decimal_string = { json!("1.50"), json!(1.5) },
    whole_float = { json!(2.0), json!(2) },
    blank_vs_null = { json!("  "), json!(null) },
    naive_vs_rfc3339 = { json!("2024-05-01 10:00:00"), json!("2024-05-01T10:00:00Z") },
    offset_vs_utc = { json!("2024-05-01T12:00:00+02:00"), json!("2024-05-01T10:00:00.000Z") },
    date_vs_midnight = { json!("2024-05-01"), json!("2024-05-01T00:00:00Z") },
    array_elementwise = { json!(["1", 2, "x"]), json!([true, "2", "x"]) },
    nested_object = { json!({"a": "yes", "b": {"c": "3"}}), json!({"a": true, "b": {"c": 3}}) },
)]
fn normalized_equal(a: serde_json::Value, b: serde_json::Value) {
    assert_eq!(normalize(&v(a)), normalize(&v(b)));
}

#[parameterized(
    different_text = { json!("A"), json!("B") },
    different_numbers = { json!(2), json!(3) },
    true_vs_false = { json!("yes"), json!(false) },
    number_vs_text = { json!("42"), json!("forty-two") },
    different_dates = { json!("2024-05-01"), json!("2024-05-02") },
    array_length = { json!([1, 2]), json!([1, 2, 3]) },
    array_order = { json!(["a", "b"]), json!(["b", "a"]) },
    object_keys = { json!({"a": 1}), json!({"b": 1}) },
    null_vs_false = { json!(null), json!(false) },
)]
fn normalized_different(a: serde_json::Value, b: serde_json::Value) {
    assert_ne!(normalize(&v(a)), normalize(&v(b)));
}

#[test]
fn timestamps_render_canonically() {
    assert_eq!(
        normalize(&v(json!("2024-05-01 10:00:00.5"))),
        Canonical::Timestamp("2024-05-01T10:00:00.500Z".into())
    );
}

#[test]
fn non_finite_strings_stay_text() {
    assert_eq!(normalize(&v(json!("NaN"))), Canonical::Text("NaN".into()));
    assert_eq!(normalize(&v(json!("inf"))), Canonical::Text("inf".into()));
}

#[test]
fn refs_compare_by_collection_and_id() {
    let a = Value::Ref(RecordRef::new("users", 3));
    let b = Value::Ref(RecordRef::new("users", 3));
    let c = Value::Ref(RecordRef::new("teams", 3));
    assert_eq!(normalize(&a), normalize(&b));
    assert_ne!(normalize(&a), normalize(&c));
}

#[test]
fn values_equal_treats_missing_as_null() {
    let fields = fields_from_json(json!({"note": ""})).unwrap();
    assert!(values_equal(fields.get("note"), None));
    assert!(!values_equal(Some(&Value::from("x")), None));
}

#[test]
fn as_timestamp_parses_date_like_strings() {
    let ts = as_timestamp(&v(json!("2024-05-01 10:00:00"))).unwrap();
    assert_eq!(format_timestamp(&ts), "2024-05-01T10:00:00.000Z");
    assert!(as_timestamp(&v(json!("soon"))).is_none());
    assert!(as_timestamp(&v(json!(12))).is_none());
}
