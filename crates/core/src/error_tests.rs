// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use yare::parameterized;

#[parameterized(
    operation_not_found = { Error::OperationNotFound("tasks:42:1000-0".into()), "tasks:42:1000-0" },
    conflict_not_found = { Error::ConflictNotFound("c-1".into()), "c-1" },
    invalid_kind = { Error::InvalidKind("upsert".into()), "create, update, delete" },
    invalid_resolution = { Error::InvalidResolution("theirs".into()), "prefer-server" },
)]
fn error_display_contains(err: Error, expected: &str) {
    assert!(err.to_string().contains(expected));
}

#[test]
fn error_record_not_found_display() {
    let err = Error::RecordNotFound {
        collection: "tasks".into(),
        id: 42,
    };
    assert_eq!(err.to_string(), "record not found: tasks/42");
}

#[test]
fn error_invalid_transition_display() {
    let err = Error::InvalidTransition {
        id: "op-1".into(),
        from: "completed".into(),
        to: "in_flight".into(),
    };
    let msg = err.to_string();
    assert!(msg.contains("completed"));
    assert!(msg.contains("in_flight"));
}

#[test]
fn error_from_io() {
    let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
    let err: Error = io_err.into();
    assert!(matches!(err, Error::Io(_)));
}

#[test]
fn error_from_json() {
    let json_err = serde_json::from_str::<()>("invalid").unwrap_err();
    let err: Error = json_err.into();
    assert!(matches!(err, Error::Json(_)));
}
