// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Conflict listing and resolution.

use std::io::{self, Write};

use sk_core::{ConflictStatus, Resolution, SyncConflict};

use super::{emit, open, write_json};
use crate::cli::{GlobalArgs, OutputFormat};
use crate::error::Result;
use crate::sync::SyncCoordinator;

pub fn list(global: &GlobalArgs, status: Option<ConflictStatus>) -> Result<()> {
    let ctx = open(global)?;
    let conflicts = ctx.coordinator.list_conflicts(status)?;
    write_conflicts(&conflicts, global.output, &mut io::stdout().lock())
}

pub(crate) fn write_conflicts(
    conflicts: &[SyncConflict],
    format: OutputFormat,
    out: &mut impl Write,
) -> Result<()> {
    if format == OutputFormat::Json {
        return write_json(out, &conflicts);
    }
    if conflicts.is_empty() {
        writeln!(out, "No conflicts.")?;
    }
    for conflict in conflicts {
        write!(
            out,
            "{}  {} {}:{}  fields: {}",
            conflict.id,
            conflict.status,
            conflict.collection,
            conflict.record_id,
            conflict.conflicting_fields.join(", ")
        )?;
        if let Some(resolution) = conflict.resolution {
            write!(out, "  ({resolution})")?;
        }
        writeln!(out)?;
    }
    Ok(())
}

#[derive(serde::Serialize)]
struct Outcome<'a> {
    id: &'a str,
    changed: bool,
}

pub fn resolve(global: &GlobalArgs, id: &str, strategy: Resolution) -> Result<()> {
    let ctx = open(global)?;
    resolve_impl(&ctx.coordinator, id, strategy, global.output, &mut io::stdout().lock())
}

pub(crate) fn resolve_impl(
    coordinator: &SyncCoordinator,
    id: &str,
    strategy: Resolution,
    format: OutputFormat,
    out: &mut impl Write,
) -> Result<()> {
    let changed = coordinator.resolve(id, strategy)?;
    emit(out, format, &Outcome { id, changed }, |out, o| {
        if o.changed {
            writeln!(out, "Resolved {} ({strategy})", o.id)
        } else {
            writeln!(out, "Conflict {} is already settled", o.id)
        }
    })
}

pub fn ignore(global: &GlobalArgs, id: &str) -> Result<()> {
    let ctx = open(global)?;
    ignore_impl(&ctx.coordinator, id, global.output, &mut io::stdout().lock())
}

pub(crate) fn ignore_impl(
    coordinator: &SyncCoordinator,
    id: &str,
    format: OutputFormat,
    out: &mut impl Write,
) -> Result<()> {
    let changed = coordinator.ignore(id)?;
    emit(out, format, &Outcome { id, changed }, |out, o| {
        if o.changed {
            writeln!(out, "Ignored {}", o.id)
        } else {
            writeln!(out, "Conflict {} is already settled", o.id)
        }
    })
}

pub fn clear_false_positives(global: &GlobalArgs) -> Result<()> {
    let ctx = open(global)?;
    let cleared = ctx.coordinator.clear_false_positives()?;
    println!("Cleared {cleared} false-positive conflict(s)");
    Ok(())
}

#[cfg(test)]
#[path = "conflicts_tests.rs"]
mod tests;
