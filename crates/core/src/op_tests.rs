// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use crate::value::{fields_from_json, RecordRef};
use serde_json::json;
use yare::parameterized;

fn stamp() -> Stamp {
    Stamp::new(1_000, 0)
}

fn update(target: i64) -> QueuedOperation {
    QueuedOperation::new(
        OpKind::Update,
        "tasks",
        Some(target),
        fields_from_json(json!({"status": "done"})).unwrap(),
        DEFAULT_MAX_ATTEMPTS,
        stamp(),
    )
}

#[parameterized(
    create = { "create", OpKind::Create },
    update = { "Update", OpKind::Update },
    delete = { "DELETE", OpKind::Delete },
)]
fn kind_from_str(input: &str, expected: OpKind) {
    assert_eq!(input.parse::<OpKind>().unwrap(), expected);
    assert_eq!(expected.to_string().parse::<OpKind>().unwrap(), expected);
}

#[parameterized(
    pending = { OpStatus::Pending },
    in_flight = { OpStatus::InFlight },
    completed = { OpStatus::Completed },
    failed = { OpStatus::Failed },
)]
fn status_string_roundtrip(status: OpStatus) {
    assert_eq!(status.as_str().parse::<OpStatus>().unwrap(), status);
}

#[test]
fn invalid_kind_and_status_rejected() {
    assert!("upsert".parse::<OpKind>().is_err());
    assert!("done".parse::<OpStatus>().is_err());
    assert!("teapot".parse::<ErrorKind>().is_err());
}

#[parameterized(
    network = { ErrorKind::Network, true },
    timeout = { ErrorKind::Timeout, true },
    unknown = { ErrorKind::Unknown, true },
    validation = { ErrorKind::Validation, false },
    not_found = { ErrorKind::NotFound, false },
    unauthenticated = { ErrorKind::Unauthenticated, false },
)]
fn error_kind_retryable(kind: ErrorKind, retryable: bool) {
    assert_eq!(kind.is_retryable(), retryable);
    assert_eq!(kind.as_str().parse::<ErrorKind>().unwrap(), kind);
}

#[test]
fn terminal_statuses() {
    assert!(OpStatus::Completed.is_terminal());
    assert!(OpStatus::Failed.is_terminal());
    assert!(!OpStatus::Pending.is_terminal());
    assert!(!OpStatus::InFlight.is_terminal());
}

#[test]
fn new_operation_id_embeds_collection_target_and_stamp() {
    let op = update(42);
    assert_eq!(op.id, "tasks:42:1000-0");
    assert_eq!(op.status, OpStatus::Pending);
    assert_eq!(op.attempt, 0);
    assert_eq!(op.enqueued_at.timestamp_millis(), 1_000);

    let create = QueuedOperation::new(OpKind::Create, "tasks", None, Fields::new(), 3, stamp());
    assert_eq!(create.id, "tasks:new:1000-0");
}

#[test]
fn max_attempts_is_at_least_one() {
    let op = QueuedOperation::new(OpKind::Delete, "tasks", Some(1), Fields::new(), 0, stamp());
    assert_eq!(op.max_attempts, 1);
}

#[test]
fn chain_key_uses_target_or_local_id() {
    let op = update(42);
    assert_eq!(
        op.chain_key(),
        ChainKey {
            collection: "tasks".into(),
            record_id: Some(42)
        }
    );

    let mut create = QueuedOperation::new(OpKind::Create, "tasks", None, Fields::new(), 3, stamp());
    create.local_id = Some(-1);
    assert_eq!(create.chain_key(), update(-1).chain_key());
}

#[test]
fn depends_on_unconfirmed_create() {
    assert!(update(-1).depends_on_unconfirmed_create());
    assert!(!update(5).depends_on_unconfirmed_create());

    let mut op = update(5);
    op.payload
        .insert("parent".into(), RecordRef::new("tasks", -4).into());
    assert!(op.depends_on_unconfirmed_create());
}

#[test]
fn is_due_respects_status_and_backoff() {
    let mut op = update(1);
    op.next_attempt_at = 2_000;
    assert!(!op.is_due(1_999));
    assert!(op.is_due(2_000));

    op.status = OpStatus::Failed;
    assert!(!op.is_due(5_000));
}
