// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! SQLite-backed durable store for the sync engine.
//!
//! The [`Database`] struct holds the operation queue, detected conflicts, the
//! local record cache, the temporary-id map and per-channel watermarks. Every
//! write is committed with `synchronous = FULL` before the call returns, so a
//! queued operation survives an immediate crash.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::de::DeserializeOwned;
use std::path::Path;

use crate::conflict::{ConflictStatus, SyncConflict};
use crate::error::{Error, Result};
use crate::op::{OpStatus, QueuedOperation};
use crate::value::{rewrite_field_refs, temporary_refs, Fields};

/// SQL schema for the sync store.
pub const SCHEMA: &str = r#"
-- Durable operation queue; seq gives enqueue order
CREATE TABLE IF NOT EXISTS operations (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    id TEXT NOT NULL UNIQUE,
    kind TEXT NOT NULL,
    collection TEXT NOT NULL,
    target_id INTEGER,
    local_id INTEGER,
    payload TEXT NOT NULL,
    enqueued_at TEXT NOT NULL,
    attempt INTEGER NOT NULL DEFAULT 0,
    max_attempts INTEGER NOT NULL,
    status TEXT NOT NULL DEFAULT 'pending',
    last_error TEXT,
    last_error_kind TEXT,
    next_attempt_at INTEGER NOT NULL DEFAULT 0
);

-- Detected divergences between cache and server
CREATE TABLE IF NOT EXISTS conflicts (
    id TEXT PRIMARY KEY,
    collection TEXT NOT NULL,
    record_id INTEGER NOT NULL,
    local_snapshot TEXT NOT NULL,
    server_snapshot TEXT NOT NULL,
    conflicting_fields TEXT NOT NULL,
    detected_at TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'pending',
    resolution TEXT,
    resolved_at TEXT,
    local_modified_at TEXT
);

-- Local record cache
CREATE TABLE IF NOT EXISTS records (
    collection TEXT NOT NULL,
    record_id INTEGER NOT NULL,
    fields TEXT NOT NULL,
    dirty INTEGER NOT NULL DEFAULT 0,
    modified_at TEXT,
    synced_at TEXT,
    PRIMARY KEY (collection, record_id)
);

-- Temporary ids confirmed by the server
CREATE TABLE IF NOT EXISTS id_map (
    collection TEXT NOT NULL,
    temp_id INTEGER NOT NULL,
    server_id INTEGER NOT NULL,
    mapped_at TEXT NOT NULL,
    PRIMARY KEY (collection, temp_id)
);

-- Last delivered event id per realtime channel
CREATE TABLE IF NOT EXISTS watermarks (
    channel TEXT PRIMARY KEY,
    last_id INTEGER NOT NULL,
    updated_at TEXT NOT NULL
);

-- Counters and flags
CREATE TABLE IF NOT EXISTS meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_operations_status ON operations(status);
CREATE INDEX IF NOT EXISTS idx_operations_record ON operations(collection, target_id);
CREATE INDEX IF NOT EXISTS idx_conflicts_status ON conflicts(status);
CREATE INDEX IF NOT EXISTS idx_conflicts_record ON conflicts(collection, record_id);
"#;

const TEMP_ID_KEY: &str = "temp_id_seq";

const OPERATION_COLUMNS: &str = "id, kind, collection, target_id, local_id, payload, enqueued_at,
     attempt, max_attempts, status, last_error, last_error_kind, next_attempt_at";

const CONFLICT_COLUMNS: &str = "id, collection, record_id, local_snapshot, server_snapshot,
     conflicting_fields, detected_at, status, resolution, resolved_at, local_modified_at";

fn conversion_error(message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        0,
        rusqlite::types::Type::Text,
        Box::new(Error::CorruptedData(message)),
    )
}

/// Parse a string value from the database, returning a rusqlite error on parse failure.
fn parse_db<T: std::str::FromStr>(
    value: &str,
    column: &str,
) -> std::result::Result<T, rusqlite::Error> {
    value
        .parse()
        .map_err(|_| conversion_error(format!("invalid value '{value}' in column '{column}'")))
}

fn parse_db_opt<T: std::str::FromStr>(
    value: Option<String>,
    column: &str,
) -> std::result::Result<Option<T>, rusqlite::Error> {
    value.map(|v| parse_db(&v, column)).transpose()
}

/// Parse an RFC3339 timestamp from the database.
fn parse_timestamp(
    value: &str,
    column: &str,
) -> std::result::Result<DateTime<Utc>, rusqlite::Error> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| conversion_error(format!("invalid timestamp '{value}' in column '{column}'")))
}

fn parse_timestamp_opt(
    value: Option<String>,
    column: &str,
) -> std::result::Result<Option<DateTime<Utc>>, rusqlite::Error> {
    value.map(|v| parse_timestamp(&v, column)).transpose()
}

fn parse_json<T: DeserializeOwned>(
    value: &str,
    column: &str,
) -> std::result::Result<T, rusqlite::Error> {
    serde_json::from_str(value)
        .map_err(|e| conversion_error(format!("invalid JSON in column '{column}': {e}")))
}

fn operation_from_row(row: &Row<'_>) -> std::result::Result<QueuedOperation, rusqlite::Error> {
    let kind: String = row.get(1)?;
    let payload: String = row.get(5)?;
    let enqueued_at: String = row.get(6)?;
    let status: String = row.get(9)?;
    Ok(QueuedOperation {
        id: row.get(0)?,
        kind: parse_db(&kind, "kind")?,
        collection: row.get(2)?,
        target_id: row.get(3)?,
        local_id: row.get(4)?,
        payload: parse_json(&payload, "payload")?,
        enqueued_at: parse_timestamp(&enqueued_at, "enqueued_at")?,
        attempt: row.get(7)?,
        max_attempts: row.get(8)?,
        status: parse_db(&status, "status")?,
        last_error: row.get(10)?,
        last_error_kind: parse_db_opt(row.get(11)?, "last_error_kind")?,
        next_attempt_at: row.get(12)?,
    })
}

fn conflict_from_row(row: &Row<'_>) -> std::result::Result<SyncConflict, rusqlite::Error> {
    let local: String = row.get(3)?;
    let server: String = row.get(4)?;
    let fields: String = row.get(5)?;
    let detected_at: String = row.get(6)?;
    let status: String = row.get(7)?;
    Ok(SyncConflict {
        id: row.get(0)?,
        collection: row.get(1)?,
        record_id: row.get(2)?,
        local_snapshot: parse_json(&local, "local_snapshot")?,
        server_snapshot: parse_json(&server, "server_snapshot")?,
        conflicting_fields: parse_json(&fields, "conflicting_fields")?,
        detected_at: parse_timestamp(&detected_at, "detected_at")?,
        status: parse_db(&status, "status")?,
        resolution: parse_db_opt(row.get(8)?, "resolution")?,
        resolved_at: parse_timestamp_opt(row.get(9)?, "resolved_at")?,
        local_modified_at: parse_timestamp_opt(row.get(10)?, "local_modified_at")?,
    })
}

fn record_from_row(row: &Row<'_>) -> std::result::Result<CachedRecord, rusqlite::Error> {
    let fields: String = row.get(2)?;
    Ok(CachedRecord {
        collection: row.get(0)?,
        id: row.get(1)?,
        fields: parse_json(&fields, "fields")?,
        dirty: row.get(3)?,
        modified_at: parse_timestamp_opt(row.get(4)?, "modified_at")?,
        synced_at: parse_timestamp_opt(row.get(5)?, "synced_at")?,
    })
}

/// Run schema creation and all migrations on a database connection.
pub fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;
    migrate_add_local_modified_at(conn)?;
    Ok(())
}

/// Migration: stores created before merge support lack `local_modified_at`.
fn migrate_add_local_modified_at(conn: &Connection) -> Result<()> {
    let has_column: bool = conn
        .query_row(
            "SELECT COUNT(*) > 0 FROM pragma_table_info('conflicts') WHERE name = 'local_modified_at'",
            [],
            |row| row.get(0),
        )
        .unwrap_or(false);

    if !has_column {
        conn.execute("ALTER TABLE conflicts ADD COLUMN local_modified_at TEXT", [])?;
    }
    Ok(())
}

/// A record as held in the local cache.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedRecord {
    pub collection: String,
    pub id: i64,
    pub fields: Fields,
    /// True while the cache holds edits the server has not confirmed.
    pub dirty: bool,
    pub modified_at: Option<DateTime<Utc>>,
    pub synced_at: Option<DateTime<Utc>>,
}

/// SQLite connection with sync store operations.
pub struct Database {
    /// The underlying SQLite connection.
    pub conn: Connection,
}

impl Database {
    /// Open a database connection at the given path, creating and migrating if needed.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;

        // WAL for concurrent readers, FULL sync so commits survive power loss
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = FULL;
             PRAGMA busy_timeout = 5000;",
        )?;

        let db = Database { conn };
        run_migrations(&db.conn)?;
        Ok(db)
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Database { conn };
        run_migrations(&db.conn)?;
        Ok(db)
    }

    // Operations

    /// Append an operation to the queue.
    pub fn insert_operation(&self, op: &QueuedOperation) -> Result<()> {
        self.conn.execute(
            "INSERT INTO operations (id, kind, collection, target_id, local_id, payload,
             enqueued_at, attempt, max_attempts, status, last_error, last_error_kind,
             next_attempt_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                op.id,
                op.kind.as_str(),
                op.collection,
                op.target_id,
                op.local_id,
                serde_json::to_string(&op.payload)?,
                op.enqueued_at.to_rfc3339(),
                i64::from(op.attempt),
                i64::from(op.max_attempts),
                op.status.as_str(),
                op.last_error,
                op.last_error_kind.map(|k| k.as_str()),
                op.next_attempt_at,
            ],
        )?;
        Ok(())
    }

    /// Get an operation by ID.
    pub fn get_operation(&self, id: &str) -> Result<QueuedOperation> {
        let sql = format!("SELECT {OPERATION_COLUMNS} FROM operations WHERE id = ?1");
        self.conn
            .query_row(&sql, params![id], operation_from_row)
            .optional()?
            .ok_or_else(|| Error::OperationNotFound(id.to_string()))
    }

    /// List operations in enqueue order, optionally filtered by status.
    pub fn list_operations(&self, status: Option<OpStatus>) -> Result<Vec<QueuedOperation>> {
        let ops = match status {
            Some(status) => {
                let sql = format!(
                    "SELECT {OPERATION_COLUMNS} FROM operations WHERE status = ?1 ORDER BY seq"
                );
                let mut stmt = self.conn.prepare(&sql)?;
                let rows = stmt.query_map(params![status.as_str()], operation_from_row)?;
                rows.collect::<std::result::Result<Vec<_>, _>>()?
            }
            None => {
                let sql = format!("SELECT {OPERATION_COLUMNS} FROM operations ORDER BY seq");
                let mut stmt = self.conn.prepare(&sql)?;
                let rows = stmt.query_map([], operation_from_row)?;
                rows.collect::<std::result::Result<Vec<_>, _>>()?
            }
        };
        Ok(ops)
    }

    /// Persist the mutable columns of an operation.
    pub fn update_operation(&self, op: &QueuedOperation) -> Result<()> {
        let changed = self.conn.execute(
            "UPDATE operations SET target_id = ?2, local_id = ?3, payload = ?4, attempt = ?5,
             max_attempts = ?6, status = ?7, last_error = ?8, last_error_kind = ?9,
             next_attempt_at = ?10
             WHERE id = ?1",
            params![
                op.id,
                op.target_id,
                op.local_id,
                serde_json::to_string(&op.payload)?,
                i64::from(op.attempt),
                i64::from(op.max_attempts),
                op.status.as_str(),
                op.last_error,
                op.last_error_kind.map(|k| k.as_str()),
                op.next_attempt_at,
            ],
        )?;
        if changed == 0 {
            return Err(Error::OperationNotFound(op.id.clone()));
        }
        Ok(())
    }

    /// Count operations with the given status.
    pub fn count_operations(&self, status: OpStatus) -> Result<i64> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM operations WHERE status = ?1",
            params![status.as_str()],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Delete every operation with the given status. Returns the number removed.
    pub fn delete_operations_with_status(&self, status: OpStatus) -> Result<usize> {
        let removed = self.conn.execute(
            "DELETE FROM operations WHERE status = ?1",
            params![status.as_str()],
        )?;
        Ok(removed)
    }

    /// Delete the `pending` and `failed` operations for one record.
    ///
    /// In-flight operations are left alone; their outcome is still unknown.
    pub fn delete_open_operations_for(&self, collection: &str, record_id: i64) -> Result<usize> {
        let removed = self.conn.execute(
            "DELETE FROM operations
             WHERE collection = ?1
               AND (target_id = ?2 OR (target_id IS NULL AND local_id = ?2))
               AND status IN ('pending', 'failed')",
            params![collection, record_id],
        )?;
        Ok(removed)
    }

    /// Count operations for one record whose delivery is under way.
    pub fn count_in_flight_for(&self, collection: &str, record_id: i64) -> Result<i64> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM operations
             WHERE collection = ?1
               AND (target_id = ?2 OR (target_id IS NULL AND local_id = ?2))
               AND status = 'in_flight'",
            params![collection, record_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Count non-terminal operations for one record.
    pub fn count_open_operations_for(&self, collection: &str, record_id: i64) -> Result<i64> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM operations
             WHERE collection = ?1
               AND (target_id = ?2 OR (target_id IS NULL AND local_id = ?2))
               AND status IN ('pending', 'in_flight')",
            params![collection, record_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Return operations interrupted mid-flight to `pending`.
    ///
    /// Called once at startup: an `in_flight` row at that point belongs to a
    /// process that died before recording the outcome.
    pub fn reset_in_flight(&self) -> Result<usize> {
        let reset = self.conn.execute(
            "UPDATE operations SET status = 'pending' WHERE status = 'in_flight'",
            [],
        )?;
        Ok(reset)
    }

    /// Replace a confirmed temporary id everywhere in the store.
    ///
    /// Rewrites operation targets, references inside open operation payloads
    /// and the cached record's key, and records the mapping. Callers run this
    /// inside [`Database::atomically`] together with completing the create.
    /// Returns the number of operations touched.
    pub fn remap_temp_id(&self, collection: &str, temp_id: i64, server_id: i64) -> Result<usize> {
        let conn = &self.conn;

        conn.execute(
            "INSERT OR REPLACE INTO id_map (collection, temp_id, server_id, mapped_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![collection, temp_id, server_id, Utc::now().to_rfc3339()],
        )?;

        let mut touched = conn.execute(
            "UPDATE operations SET target_id = ?3
             WHERE collection = ?1 AND target_id = ?2",
            params![collection, temp_id, server_id],
        )?;

        let open: Vec<(String, String)> = {
            let mut stmt = conn.prepare(
                "SELECT id, payload FROM operations WHERE status IN ('pending', 'in_flight', 'failed')",
            )?;
            let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
            rows.collect::<std::result::Result<Vec<_>, _>>()?
        };
        for (id, payload) in open {
            let mut fields: Fields = serde_json::from_str(&payload)?;
            if rewrite_field_refs(&mut fields, collection, temp_id, server_id) > 0 {
                conn.execute(
                    "UPDATE operations SET payload = ?2 WHERE id = ?1",
                    params![id, serde_json::to_string(&fields)?],
                )?;
                touched += 1;
            }
        }

        conn.execute(
            "UPDATE OR REPLACE records SET record_id = ?3 WHERE collection = ?1 AND record_id = ?2",
            params![collection, temp_id, server_id],
        )?;

        Ok(touched)
    }

    /// Look up the server id assigned to a temporary id.
    pub fn resolve_temp_id(&self, collection: &str, temp_id: i64) -> Result<Option<i64>> {
        let id = self
            .conn
            .query_row(
                "SELECT server_id FROM id_map WHERE collection = ?1 AND temp_id = ?2",
                params![collection, temp_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id)
    }

    /// Rewrite references to already-confirmed temporary ids inside `fields`.
    ///
    /// Returns the number of references rewritten. References whose create is
    /// still pending are left alone.
    pub fn resolve_confirmed_refs(&self, fields: &mut Fields) -> Result<usize> {
        let mut rewritten = 0;
        for r in temporary_refs(fields) {
            if let Some(server_id) = self.resolve_temp_id(&r.collection, r.id)? {
                rewritten += rewrite_field_refs(fields, &r.collection, r.id, server_id);
            }
        }
        Ok(rewritten)
    }

    /// Allocate the next temporary record id (`-1`, `-2`, ...).
    ///
    /// Safe to call inside [`Database::atomically`].
    pub fn next_temp_id(&self) -> Result<i64> {
        let current: i64 = match self.get_meta(TEMP_ID_KEY)? {
            Some(v) => v
                .parse()
                .map_err(|_| Error::CorruptedData(format!("invalid temp id sequence '{v}'")))?,
            None => 0,
        };
        let next = current - 1;
        self.set_meta(TEMP_ID_KEY, &next.to_string())?;
        Ok(next)
    }

    /// Read a value from the `meta` table.
    pub fn get_meta(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM meta WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    pub fn set_meta(&self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO meta (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    pub fn delete_meta(&self, key: &str) -> Result<bool> {
        let removed = self
            .conn
            .execute("DELETE FROM meta WHERE key = ?1", params![key])?;
        Ok(removed > 0)
    }

    /// Run `f` inside a single transaction. Rolled back if `f` fails.
    ///
    /// Must not be nested.
    pub fn atomically<T, E>(&self, f: impl FnOnce(&Self) -> std::result::Result<T, E>) -> std::result::Result<T, E>
    where
        E: From<Error>,
    {
        let tx = self.conn.unchecked_transaction().map_err(Error::from)?;
        let value = f(self)?;
        tx.commit().map_err(Error::from)?;
        Ok(value)
    }

    // Conflicts

    pub fn insert_conflict(&self, conflict: &SyncConflict) -> Result<()> {
        self.conn.execute(
            "INSERT INTO conflicts (id, collection, record_id, local_snapshot, server_snapshot,
             conflicting_fields, detected_at, status, resolution, resolved_at, local_modified_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                conflict.id,
                conflict.collection,
                conflict.record_id,
                serde_json::to_string(&conflict.local_snapshot)?,
                serde_json::to_string(&conflict.server_snapshot)?,
                serde_json::to_string(&conflict.conflicting_fields)?,
                conflict.detected_at.to_rfc3339(),
                conflict.status.as_str(),
                conflict.resolution.map(|r| r.as_str()),
                conflict.resolved_at.map(|t| t.to_rfc3339()),
                conflict.local_modified_at.map(|t| t.to_rfc3339()),
            ],
        )?;
        Ok(())
    }

    pub fn get_conflict(&self, id: &str) -> Result<SyncConflict> {
        let sql = format!("SELECT {CONFLICT_COLUMNS} FROM conflicts WHERE id = ?1");
        self.conn
            .query_row(&sql, params![id], conflict_from_row)
            .optional()?
            .ok_or_else(|| Error::ConflictNotFound(id.to_string()))
    }

    /// Returns the pending conflict for a record, if there is one.
    pub fn find_pending_conflict(
        &self,
        collection: &str,
        record_id: i64,
    ) -> Result<Option<SyncConflict>> {
        let sql = format!(
            "SELECT {CONFLICT_COLUMNS} FROM conflicts
             WHERE collection = ?1 AND record_id = ?2 AND status = 'pending'
             ORDER BY detected_at DESC LIMIT 1"
        );
        let conflict = self
            .conn
            .query_row(&sql, params![collection, record_id], conflict_from_row)
            .optional()?;
        Ok(conflict)
    }

    /// List conflicts by detection time, optionally filtered by status.
    pub fn list_conflicts(&self, status: Option<ConflictStatus>) -> Result<Vec<SyncConflict>> {
        let conflicts = match status {
            Some(status) => {
                let sql = format!(
                    "SELECT {CONFLICT_COLUMNS} FROM conflicts WHERE status = ?1
                     ORDER BY detected_at, id"
                );
                let mut stmt = self.conn.prepare(&sql)?;
                let rows = stmt.query_map(params![status.as_str()], conflict_from_row)?;
                rows.collect::<std::result::Result<Vec<_>, _>>()?
            }
            None => {
                let sql =
                    format!("SELECT {CONFLICT_COLUMNS} FROM conflicts ORDER BY detected_at, id");
                let mut stmt = self.conn.prepare(&sql)?;
                let rows = stmt.query_map([], conflict_from_row)?;
                rows.collect::<std::result::Result<Vec<_>, _>>()?
            }
        };
        Ok(conflicts)
    }

    /// Persist the mutable columns of a conflict.
    pub fn update_conflict(&self, conflict: &SyncConflict) -> Result<()> {
        let changed = self.conn.execute(
            "UPDATE conflicts SET local_snapshot = ?2, server_snapshot = ?3,
             conflicting_fields = ?4, status = ?5, resolution = ?6, resolved_at = ?7,
             local_modified_at = ?8
             WHERE id = ?1",
            params![
                conflict.id,
                serde_json::to_string(&conflict.local_snapshot)?,
                serde_json::to_string(&conflict.server_snapshot)?,
                serde_json::to_string(&conflict.conflicting_fields)?,
                conflict.status.as_str(),
                conflict.resolution.map(|r| r.as_str()),
                conflict.resolved_at.map(|t| t.to_rfc3339()),
                conflict.local_modified_at.map(|t| t.to_rfc3339()),
            ],
        )?;
        if changed == 0 {
            return Err(Error::ConflictNotFound(conflict.id.clone()));
        }
        Ok(())
    }

    pub fn delete_conflict(&self, id: &str) -> Result<bool> {
        let removed = self
            .conn
            .execute("DELETE FROM conflicts WHERE id = ?1", params![id])?;
        Ok(removed > 0)
    }

    pub fn count_conflicts(&self, status: ConflictStatus) -> Result<i64> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM conflicts WHERE status = ?1",
            params![status.as_str()],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    // Record cache

    /// Insert or replace a cached record.
    pub fn put_record(&self, record: &CachedRecord) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO records (collection, record_id, fields, dirty, modified_at, synced_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                record.collection,
                record.id,
                serde_json::to_string(&record.fields)?,
                record.dirty,
                record.modified_at.map(|t| t.to_rfc3339()),
                record.synced_at.map(|t| t.to_rfc3339()),
            ],
        )?;
        Ok(())
    }

    pub fn get_record(&self, collection: &str, id: i64) -> Result<Option<CachedRecord>> {
        let record = self
            .conn
            .query_row(
                "SELECT collection, record_id, fields, dirty, modified_at, synced_at
                 FROM records WHERE collection = ?1 AND record_id = ?2",
                params![collection, id],
                record_from_row,
            )
            .optional()?;
        Ok(record)
    }

    pub fn list_records(&self, collection: &str) -> Result<Vec<CachedRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT collection, record_id, fields, dirty, modified_at, synced_at
             FROM records WHERE collection = ?1 ORDER BY record_id",
        )?;
        let rows = stmt.query_map(params![collection], record_from_row)?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    pub fn delete_record(&self, collection: &str, id: i64) -> Result<bool> {
        let removed = self.conn.execute(
            "DELETE FROM records WHERE collection = ?1 AND record_id = ?2",
            params![collection, id],
        )?;
        Ok(removed > 0)
    }

    /// Mark a cached record as matching the server.
    pub fn mark_record_clean(&self, collection: &str, id: i64, synced_at: DateTime<Utc>) -> Result<()> {
        self.conn.execute(
            "UPDATE records SET dirty = 0, synced_at = ?3 WHERE collection = ?1 AND record_id = ?2",
            params![collection, id, synced_at.to_rfc3339()],
        )?;
        Ok(())
    }

    // Watermarks

    pub fn get_watermark(&self, channel: &str) -> Result<Option<i64>> {
        let id = self
            .conn
            .query_row(
                "SELECT last_id FROM watermarks WHERE channel = ?1",
                params![channel],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id)
    }

    /// Raise a channel's watermark. Never lowers it.
    pub fn set_watermark(&self, channel: &str, last_id: i64) -> Result<()> {
        self.conn.execute(
            "INSERT INTO watermarks (channel, last_id, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(channel) DO UPDATE SET
                 last_id = MAX(last_id, excluded.last_id),
                 updated_at = excluded.updated_at",
            params![channel, last_id, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    pub fn list_watermarks(&self) -> Result<Vec<(String, i64)>> {
        let mut stmt = self
            .conn
            .prepare("SELECT channel, last_id FROM watermarks ORDER BY channel")?;
        let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }
}

#[cfg(test)]
#[path = "db_tests.rs"]
mod tests;
