// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Commands that talk to the server: flush, reconcile, refresh and resume.

use std::io::{self, Write};

use sk_core::value::is_temporary_id;
use sk_core::{Fields, Value};
use tracing::info;

use super::{block_on, emit, open};
use crate::cli::{GlobalArgs, OutputFormat};
use crate::commands::conflicts::write_conflicts;
use crate::config::lock_path;
use crate::error::{Error, Result};
use crate::lock::EngineLock;
use crate::sync::{Filter, FlushReport, RefreshReport, SyncCoordinator};

/// Deliver queued operations once.
///
/// Holds the engine lock so a running `skiff run` and a manual flush never
/// send the same operation twice.
pub fn flush(global: &GlobalArgs) -> Result<()> {
    let ctx = open(global)?;
    let url = ctx.require_remote()?.to_string();
    let _lock = EngineLock::acquire(&lock_path(&ctx.db_path))?;
    let recovered = ctx.coordinator.recover()?;
    if recovered > 0 {
        info!(recovered, "requeued operations left in flight");
    }
    info!(%url, "flushing");
    let report = block_on(ctx.coordinator.flush_queue())??;
    write_report(&report, global.output, &mut io::stdout().lock())
}

pub(crate) fn write_report(
    report: &FlushReport,
    format: OutputFormat,
    out: &mut impl Write,
) -> Result<()> {
    emit(out, format, report, |out, r| {
        writeln!(
            out,
            "Flushed: {} completed, {} failed, {} still pending",
            r.completed, r.failed, r.still_pending
        )
    })
}

pub fn reconcile(global: &GlobalArgs, collection: &str, ids: &[i64]) -> Result<()> {
    if let Some(temp) = ids.iter().copied().find(|id| is_temporary_id(*id)) {
        return Err(Error::TemporaryId(temp));
    }
    let ctx = open(global)?;
    ctx.require_remote()?;
    block_on(reconcile_impl(
        &ctx.coordinator,
        collection,
        ids,
        global.output,
        &mut io::stdout().lock(),
    ))?
}

pub(crate) async fn reconcile_impl(
    coordinator: &SyncCoordinator,
    collection: &str,
    ids: &[i64],
    format: OutputFormat,
    out: &mut impl Write,
) -> Result<()> {
    let conflicts = coordinator.reconcile(collection, ids).await?;
    if conflicts.is_empty() && format == OutputFormat::Text {
        writeln!(out, "No conflicts in {} record(s).", ids.len())?;
        return Ok(());
    }
    write_conflicts(&conflicts, format, out)
}

pub fn refresh(global: &GlobalArgs, collection: &str, matches: Vec<(String, Value)>) -> Result<()> {
    let ctx = open(global)?;
    ctx.require_remote()?;
    block_on(refresh_impl(
        &ctx.coordinator,
        collection,
        matches,
        global.output,
        &mut io::stdout().lock(),
    ))?
}

/// No matches means the whole collection.
pub(crate) fn refresh_filter(matches: Vec<(String, Value)>) -> Filter {
    if matches.is_empty() {
        Filter::All
    } else {
        Filter::Match {
            fields: matches.into_iter().collect::<Fields>(),
        }
    }
}

pub(crate) async fn refresh_impl(
    coordinator: &SyncCoordinator,
    collection: &str,
    matches: Vec<(String, Value)>,
    format: OutputFormat,
    out: &mut impl Write,
) -> Result<()> {
    let filter = refresh_filter(matches);
    let report = coordinator.refresh_collection(collection, &filter).await?;
    emit(out, format, &report, |out, r: &RefreshReport| {
        writeln!(
            out,
            "Refreshed {} record(s), removed {} stale, kept {} with local edits ({} new conflict(s))",
            r.refreshed, r.removed, r.kept_dirty, r.conflicts
        )
    })
}

pub fn resume(global: &GlobalArgs) -> Result<()> {
    let ctx = open(global)?;
    resume_impl(&ctx.coordinator, &mut io::stdout().lock())
}

pub(crate) fn resume_impl(coordinator: &SyncCoordinator, out: &mut impl Write) -> Result<()> {
    if coordinator.resume_session()? {
        writeln!(out, "Session resumed; queued operations will be delivered on the next flush.")?;
    } else {
        writeln!(out, "Session was not expired.")?;
    }
    Ok(())
}

#[cfg(test)]
#[path = "remote_tests.rs"]
mod tests;
