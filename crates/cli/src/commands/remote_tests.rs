// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use serde_json::json;
use similar_asserts::assert_eq;

use crate::commands::testing::{capture, TestContext};
use crate::sync::test_helpers::fields;
use crate::sync::TransportError;

#[test]
fn report_formats() {
    let report = FlushReport {
        completed: 2,
        failed: 1,
        still_pending: 0,
    };
    let text = capture(|out| write_report(&report, OutputFormat::Text, out));
    assert_eq!(text, "Flushed: 2 completed, 1 failed, 0 still pending\n");

    let text = capture(|out| write_report(&report, OutputFormat::Json, out));
    let json: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(json, json!({"completed": 2, "failed": 1, "still_pending": 0}));
}

#[tokio::test]
async fn reconcile_reports_clean_records() {
    let ctx = TestContext::new();
    ctx.transport.put_record("tasks", 1, fields(json!({"a": 1})));

    let mut out = Vec::new();
    reconcile_impl(&ctx.coordinator, "tasks", &[1], OutputFormat::Text, &mut out)
        .await
        .unwrap();
    assert_eq!(String::from_utf8(out).unwrap(), "No conflicts in 1 record(s).\n");
    assert!(ctx.coordinator.get_record("tasks", 1).unwrap().is_some());
}

#[tokio::test]
async fn reconcile_lists_new_conflicts() {
    let ctx = TestContext::new();
    ctx.edit("tasks", 1, json!({"a": 2}));
    ctx.transport.put_record("tasks", 1, fields(json!({"a": 3})));

    let mut out = Vec::new();
    reconcile_impl(&ctx.coordinator, "tasks", &[1], OutputFormat::Json, &mut out)
        .await
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&out).unwrap();
    assert_eq!(json.as_array().unwrap().len(), 1);
    assert_eq!(json[0]["conflicting_fields"], json!(["a"]));
}

#[tokio::test]
async fn resume_after_rejection() {
    let ctx = TestContext::new();
    ctx.transport
        .set_ping_error(Some(TransportError::Unauthenticated("expired".into())));
    assert!(ctx.coordinator.flush_queue().await.is_err());

    let text = capture(|out| resume_impl(&ctx.coordinator, out));
    assert!(text.starts_with("Session resumed"), "{text}");

    let text = capture(|out| resume_impl(&ctx.coordinator, out));
    assert_eq!(text, "Session was not expired.\n");
}

#[test]
fn refresh_filter_defaults_to_whole_collection() {
    assert_eq!(refresh_filter(Vec::new()), Filter::All);
    assert_eq!(
        refresh_filter(vec![("active".to_string(), Value::Bool(true))]),
        Filter::Match {
            fields: fields(json!({"active": true}))
        }
    );
}

#[tokio::test]
async fn refresh_reports_counts() {
    let ctx = TestContext::new();
    ctx.transport
        .put_record("channels", 1, fields(json!({"name": "general", "active": true})));
    ctx.transport
        .put_record("channels", 2, fields(json!({"name": "old", "active": false})));
    ctx.edit("channels", 3, json!({"name": "draft"}));

    let mut out = Vec::new();
    refresh_impl(
        &ctx.coordinator,
        "channels",
        vec![("active".to_string(), Value::Bool(true))],
        OutputFormat::Text,
        &mut out,
    )
    .await
    .unwrap();
    assert_eq!(
        String::from_utf8(out).unwrap(),
        "Refreshed 1 record(s), removed 0 stale, kept 1 with local edits (0 new conflict(s))\n"
    );
    let ids: Vec<i64> = ctx
        .coordinator
        .list_records("channels")
        .unwrap()
        .iter()
        .map(|r| r.id)
        .collect();
    assert_eq!(ids, vec![1, 3]);
}
