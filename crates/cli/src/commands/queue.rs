// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Local queue commands: enqueue, inspect, retry and purge.

use std::io::{self, Write};

use chrono::{DateTime, Utc};
use serde::Serialize;
use sk_core::value::{fields_from_json, fields_to_json};
use sk_core::{CachedRecord, Fields, OpKind, QueuedOperation};

use super::{emit, open, write_json};
use crate::cli::{GlobalArgs, OutputFormat};
use crate::error::{Error, Result};
use crate::sync::{SyncCoordinator, SyncStatus};

pub fn status(global: &GlobalArgs) -> Result<()> {
    let ctx = open(global)?;
    status_impl(&ctx.coordinator, global.output, &mut io::stdout().lock())
}

pub(crate) fn status_impl(
    coordinator: &SyncCoordinator,
    format: OutputFormat,
    out: &mut impl Write,
) -> Result<()> {
    let status = coordinator.get_status()?;
    emit(out, format, &status, write_status)
}

fn write_status(out: &mut dyn Write, status: &SyncStatus) -> io::Result<()> {
    writeln!(out, "Pending ops: {}", status.pending_count)?;
    writeln!(out, "Failed ops: {}", status.failed_count)?;
    writeln!(out, "Conflicts: {}", status.conflict_count)?;
    let polling = if status.polling { " (polling)" } else { "" };
    writeln!(out, "Transport: {}{}", status.transport_state, polling)?;
    if status.session_expired {
        writeln!(out, "Session: expired (run 'skiff resume' after refreshing the token)")?;
    }
    Ok(())
}

pub fn pending(global: &GlobalArgs) -> Result<()> {
    let ctx = open(global)?;
    let ops = ctx.coordinator.list_pending()?;
    write_ops(&ops, global.output, &mut io::stdout().lock())
}

pub fn failed(global: &GlobalArgs) -> Result<()> {
    let ctx = open(global)?;
    let ops = ctx.coordinator.list_failed()?;
    write_ops(&ops, global.output, &mut io::stdout().lock())
}

pub(crate) fn write_ops(
    ops: &[QueuedOperation],
    format: OutputFormat,
    out: &mut impl Write,
) -> Result<()> {
    match format {
        OutputFormat::Json => write_json(out, &ops),
        OutputFormat::Text => {
            if ops.is_empty() {
                writeln!(out, "No operations.")?;
            }
            for op in ops {
                write!(
                    out,
                    "{}  {} {} attempt {}/{}",
                    op.id, op.status, op.kind, op.attempt, op.max_attempts
                )?;
                if let Some(error) = &op.last_error {
                    write!(out, "  ({error})")?;
                }
                writeln!(out)?;
            }
            Ok(())
        }
    }
}

pub fn retry(global: &GlobalArgs, id: &str) -> Result<()> {
    let ctx = open(global)?;
    retry_impl(&ctx.coordinator, id, &mut io::stdout().lock())
}

pub(crate) fn retry_impl(coordinator: &SyncCoordinator, id: &str, out: &mut impl Write) -> Result<()> {
    let op = coordinator.retry(id)?;
    writeln!(out, "Requeued {}", op.id)?;
    Ok(())
}

pub fn purge(global: &GlobalArgs) -> Result<()> {
    let ctx = open(global)?;
    let removed = ctx.coordinator.purge_completed()?;
    println!("Purged {removed} completed operation(s)");
    Ok(())
}

/// Parse a `--payload` argument into record fields.
pub(crate) fn parse_payload(payload: &str) -> Result<Fields> {
    let json: serde_json::Value =
        serde_json::from_str(payload).map_err(|e| Error::InvalidPayload(e.to_string()))?;
    fields_from_json(json).map_err(|e| Error::InvalidPayload(e.to_string()))
}

#[derive(Serialize)]
struct EnqueuedJson<'a> {
    id: &'a str,
    kind: OpKind,
    collection: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    record_id: Option<i64>,
}

pub fn enqueue(
    global: &GlobalArgs,
    kind: OpKind,
    collection: &str,
    id: Option<i64>,
    payload: &str,
    max_attempts: Option<u32>,
) -> Result<()> {
    let ctx = open(global)?;
    enqueue_impl(
        &ctx.coordinator,
        kind,
        collection,
        id,
        payload,
        max_attempts,
        global.output,
        &mut io::stdout().lock(),
    )
}

#[allow(clippy::too_many_arguments)]
pub(crate) fn enqueue_impl(
    coordinator: &SyncCoordinator,
    kind: OpKind,
    collection: &str,
    id: Option<i64>,
    payload: &str,
    max_attempts: Option<u32>,
    format: OutputFormat,
    out: &mut impl Write,
) -> Result<()> {
    let fields = parse_payload(payload)?;
    let max_attempts = max_attempts.unwrap_or(coordinator.settings().max_attempts);
    let op = coordinator.enqueue_with(kind, collection, id, fields, max_attempts)?;

    let enqueued = EnqueuedJson {
        id: &op.id,
        kind: op.kind,
        collection: &op.collection,
        record_id: op.target_id.or(op.local_id),
    };
    emit(out, format, &enqueued, |out, e| {
        write!(out, "Queued {} {}", e.kind, e.id)?;
        match (e.kind, e.record_id) {
            (OpKind::Create, Some(temp)) => writeln!(out, " (temporary id {temp})"),
            _ => writeln!(out),
        }
    })
}

#[derive(Serialize)]
struct RecordJson {
    id: i64,
    dirty: bool,
    fields: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    modified_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    synced_at: Option<DateTime<Utc>>,
}

impl From<&CachedRecord> for RecordJson {
    fn from(record: &CachedRecord) -> Self {
        RecordJson {
            id: record.id,
            dirty: record.dirty,
            fields: fields_to_json(&record.fields),
            modified_at: record.modified_at,
            synced_at: record.synced_at,
        }
    }
}

pub fn records(global: &GlobalArgs, collection: &str) -> Result<()> {
    let ctx = open(global)?;
    records_impl(&ctx.coordinator, collection, global.output, &mut io::stdout().lock())
}

pub(crate) fn records_impl(
    coordinator: &SyncCoordinator,
    collection: &str,
    format: OutputFormat,
    out: &mut impl Write,
) -> Result<()> {
    let records: Vec<RecordJson> = coordinator
        .list_records(collection)?
        .iter()
        .map(RecordJson::from)
        .collect();
    emit(out, format, &records, |out, records| {
        if records.is_empty() {
            writeln!(out, "No cached {collection} records.")?;
        }
        for record in records {
            let marker = if record.dirty { "*" } else { " " };
            writeln!(out, "{marker}{}  {}", record.id, record.fields)?;
        }
        Ok(())
    })
}

#[derive(Serialize)]
struct ClearedJson<'a> {
    collection: &'a str,
    removed: usize,
    kept_dirty: usize,
}

pub fn clear_cache(global: &GlobalArgs, collection: &str) -> Result<()> {
    let ctx = open(global)?;
    clear_cache_impl(&ctx.coordinator, collection, global.output, &mut io::stdout().lock())
}

pub(crate) fn clear_cache_impl(
    coordinator: &SyncCoordinator,
    collection: &str,
    format: OutputFormat,
    out: &mut impl Write,
) -> Result<()> {
    let (removed, kept_dirty) = coordinator.clear_cache(collection)?;
    let cleared = ClearedJson {
        collection,
        removed,
        kept_dirty,
    };
    emit(out, format, &cleared, |out, c| {
        writeln!(
            out,
            "Cleared {} cached {} record(s); kept {} with local edits",
            c.removed, c.collection, c.kept_dirty
        )
    })
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
