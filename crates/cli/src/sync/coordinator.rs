// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Sync coordinator: the single writer over the queue, conflict store and
//! record cache.
//!
//! Store access is serialized through one mutex that is never held across an
//! `.await`; network calls happen between short critical sections. Flushes
//! are serialized by a separate async guard.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::stream::{self, StreamExt};
use serde::Serialize;
use sk_core::protocol::ChannelEvent;
use sk_core::value::is_temporary_id;
use sk_core::{
    find_conflicting_fields_with, merge_snapshots, CachedRecord, ChainKey, ConflictStatus,
    FieldExclusions, Fields, MergePolicy, OpKind, OpStatus, QueuedOperation, Resolution,
    SyncConflict, DEFAULT_MAX_ATTEMPTS,
};
use tracing::{debug, info, warn};

use super::queue::OperationQueue;
use super::transport::{
    with_timeout, Applied, Filter, Mutation, QueryOptions, RecordTransport, TransportError,
};
use crate::error::{Error, Result};
use crate::realtime::{SharedTransportState, TransportState};

const SESSION_EXPIRED_KEY: &str = "session_expired";

/// Tunables for the coordinator.
#[derive(Debug, Clone)]
pub struct CoordinatorSettings {
    /// Deadline for every network call.
    pub request_timeout: Duration,
    /// Chains flushed concurrently.
    pub max_concurrent_chains: usize,
    /// Attempt budget for operations enqueued without an explicit one.
    pub max_attempts: u32,
    pub exclusions: FieldExclusions,
    pub merge_policy: MergePolicy,
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        CoordinatorSettings {
            request_timeout: Duration::from_secs(30),
            max_concurrent_chains: 4,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            exclusions: FieldExclusions::default(),
            merge_policy: MergePolicy::default(),
        }
    }
}

/// Outcome of one [`SyncCoordinator::flush_queue`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FlushReport {
    /// Operations confirmed by the server.
    pub completed: usize,
    /// Operations that moved to `Failed` during this flush.
    pub failed: usize,
    /// Operations still awaiting delivery.
    pub still_pending: usize,
}

/// Snapshot of the engine for status displays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncStatus {
    pub pending_count: i64,
    pub failed_count: i64,
    pub conflict_count: i64,
    pub transport_state: TransportState,
    pub polling: bool,
    pub session_expired: bool,
}

/// Outcome of one [`SyncCoordinator::refresh_collection`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RefreshReport {
    /// Clean records replaced with the server copy.
    pub refreshed: usize,
    /// Clean records the server no longer returns.
    pub removed: usize,
    /// Records with local edits left in place.
    pub kept_dirty: usize,
    /// Newly detected conflicts among the kept records.
    pub conflicts: usize,
}

/// What reconciling one record did.
enum Step {
    Refreshed,
    Removed,
    KeptDirty,
    Conflict(SyncConflict),
    Unchanged,
}

#[derive(Debug, Default)]
struct ChainOutcome {
    completed: usize,
    failed: usize,
    created: usize,
}

/// Group open operations into per-record chains of runnable operation ids.
///
/// A chain stops at the first operation that is in flight, still backing
/// off, or waiting on an unconfirmed create. Chains keep the order in which
/// their first operation was enqueued.
pub fn runnable_chains(ops: Vec<QueuedOperation>, now_ms: i64) -> Vec<Vec<String>> {
    let mut order: Vec<ChainKey> = Vec::new();
    let mut chains: HashMap<ChainKey, (Vec<String>, bool)> = HashMap::new();

    for op in ops {
        let key = op.chain_key();
        let (ids, blocked) = chains.entry(key.clone()).or_insert_with(|| {
            order.push(key);
            (Vec::new(), false)
        });
        if *blocked {
            continue;
        }
        if op.status != OpStatus::Pending
            || !op.is_due(now_ms)
            || op.depends_on_unconfirmed_create()
        {
            *blocked = true;
            continue;
        }
        ids.push(op.id);
    }

    order
        .into_iter()
        .filter_map(|key| chains.remove(&key))
        .map(|(ids, _)| ids)
        .filter(|ids| !ids.is_empty())
        .collect()
}

fn mutation_for(op: &QueuedOperation) -> Result<Mutation> {
    let target = || {
        op.target_id.ok_or(Error::MissingTarget {
            kind: op.kind.as_str(),
        })
    };
    Ok(match op.kind {
        OpKind::Create => Mutation::Create {
            payload: op.payload.clone(),
        },
        OpKind::Update => Mutation::Update {
            id: target()?,
            payload: op.payload.clone(),
        },
        OpKind::Delete => Mutation::Delete { id: target()? },
    })
}

/// Orchestrates the queue, the transport and the conflict store.
pub struct SyncCoordinator {
    queue: Mutex<OperationQueue>,
    transport: Arc<dyn RecordTransport>,
    settings: CoordinatorSettings,
    flush_guard: tokio::sync::Mutex<()>,
    transport_state: Arc<SharedTransportState>,
}

impl SyncCoordinator {
    pub fn new(
        queue: OperationQueue,
        transport: Arc<dyn RecordTransport>,
        settings: CoordinatorSettings,
    ) -> Self {
        SyncCoordinator {
            queue: Mutex::new(queue),
            transport,
            settings,
            flush_guard: tokio::sync::Mutex::new(()),
            transport_state: Arc::new(SharedTransportState::new()),
        }
    }

    pub fn settings(&self) -> &CoordinatorSettings {
        &self.settings
    }

    pub fn transport(&self) -> &Arc<dyn RecordTransport> {
        &self.transport
    }

    /// State shared with the realtime channel manager.
    pub fn transport_state(&self) -> Arc<SharedTransportState> {
        Arc::clone(&self.transport_state)
    }

    fn with_queue<T>(&self, f: impl FnOnce(&OperationQueue) -> Result<T>) -> Result<T> {
        let queue = self.queue.lock().map_err(|_| Error::LockPoisoned)?;
        f(&queue)
    }

    // Local writes

    /// Queue a mutation and apply it to the local cache in one transaction.
    pub fn enqueue(
        &self,
        kind: OpKind,
        collection: &str,
        target_id: Option<i64>,
        payload: Fields,
    ) -> Result<String> {
        self.enqueue_with(kind, collection, target_id, payload, self.settings.max_attempts)
            .map(|op| op.id)
    }

    /// Like [`SyncCoordinator::enqueue`], with an explicit attempt budget.
    pub fn enqueue_with(
        &self,
        kind: OpKind,
        collection: &str,
        target_id: Option<i64>,
        payload: Fields,
        max_attempts: u32,
    ) -> Result<QueuedOperation> {
        self.with_queue(|queue| {
            // Creates confirmed before this call were already remapped, so
            // translate their temporary ids here.
            let mut payload = payload;
            queue.db().resolve_confirmed_refs(&mut payload)?;
            let target_id = match target_id {
                Some(id) if is_temporary_id(id) => {
                    Some(queue.db().resolve_temp_id(collection, id)?.unwrap_or(id))
                }
                other => other,
            };
            let mut op = queue.prepare(kind, collection, target_id, payload, max_attempts)?;
            let now = queue.clock().now();
            queue.db().atomically(|db| -> Result<()> {
                match op.kind {
                    OpKind::Create => {
                        let temp = db.next_temp_id()?;
                        op.local_id = Some(temp);
                        db.put_record(&CachedRecord {
                            collection: op.collection.clone(),
                            id: temp,
                            fields: op.payload.clone(),
                            dirty: true,
                            modified_at: Some(now),
                            synced_at: None,
                        })?;
                    }
                    OpKind::Update => {
                        let id = op.record_id().ok_or(Error::MissingTarget { kind: "update" })?;
                        let mut record = db.get_record(&op.collection, id)?.unwrap_or(CachedRecord {
                            collection: op.collection.clone(),
                            id,
                            fields: Fields::new(),
                            dirty: true,
                            modified_at: None,
                            synced_at: None,
                        });
                        record
                            .fields
                            .extend(op.payload.iter().map(|(k, v)| (k.clone(), v.clone())));
                        record.dirty = true;
                        record.modified_at = Some(now);
                        db.put_record(&record)?;
                    }
                    OpKind::Delete => {
                        if let Some(id) = op.record_id() {
                            db.delete_record(&op.collection, id)?;
                        }
                    }
                }
                queue.enqueue_op(&op)
            })?;
            Ok(op)
        })
    }

    /// Queue a create and return the temporary id of the new record.
    pub fn create_record(&self, collection: &str, payload: Fields) -> Result<i64> {
        let op = self.enqueue_with(
            OpKind::Create,
            collection,
            None,
            payload,
            self.settings.max_attempts,
        )?;
        op.local_id.ok_or_else(|| Error::Runtime("create without a local id".to_string()))
    }

    pub fn get_record(&self, collection: &str, id: i64) -> Result<Option<CachedRecord>> {
        self.with_queue(|queue| Ok(queue.db().get_record(collection, id)?))
    }

    pub fn list_records(&self, collection: &str) -> Result<Vec<CachedRecord>> {
        self.with_queue(|queue| Ok(queue.db().list_records(collection)?))
    }

    // Queue pass-throughs

    pub fn list_pending(&self) -> Result<Vec<QueuedOperation>> {
        self.with_queue(OperationQueue::list_open)
    }

    pub fn list_failed(&self) -> Result<Vec<QueuedOperation>> {
        self.with_queue(OperationQueue::list_failed)
    }

    pub fn retry(&self, op_id: &str) -> Result<QueuedOperation> {
        self.with_queue(|queue| queue.retry(op_id))
    }

    pub fn purge_completed(&self) -> Result<usize> {
        self.with_queue(OperationQueue::purge_completed)
    }

    /// Startup recovery for operations a crash left in flight.
    pub fn recover(&self) -> Result<usize> {
        self.with_queue(OperationQueue::recover)
    }

    /// Return operations left in flight by a cancelled flush to `Pending`.
    ///
    /// Does nothing while a flush is running.
    pub fn release_abandoned(&self) -> Result<usize> {
        match self.flush_guard.try_lock() {
            Ok(_guard) => self.recover(),
            Err(_) => Ok(0),
        }
    }

    // Session

    pub fn is_session_expired(&self) -> Result<bool> {
        self.with_queue(|queue| Ok(queue.db().get_meta(SESSION_EXPIRED_KEY)?.is_some()))
    }

    fn expire_session(&self) -> Result<()> {
        warn!("server rejected credentials, pausing sync");
        self.with_queue(|queue| {
            let now = queue.clock().now().to_rfc3339();
            Ok(queue.db().set_meta(SESSION_EXPIRED_KEY, &now)?)
        })
    }

    /// Clear the expired-session flag. Returns whether it was set.
    pub fn resume_session(&self) -> Result<bool> {
        let cleared =
            self.with_queue(|queue| Ok(queue.db().delete_meta(SESSION_EXPIRED_KEY)?))?;
        if cleared {
            info!("session resumed");
        }
        Ok(cleared)
    }

    fn note_transport_error(&self, error: &TransportError) -> Result<()> {
        if matches!(error, TransportError::Unauthenticated(_)) {
            self.expire_session()?;
        }
        Ok(())
    }

    // Flush

    /// Deliver queued operations to the server.
    ///
    /// Concurrent callers wait for each other. Returns an empty report when
    /// the server is unreachable.
    pub async fn flush_queue(&self) -> Result<FlushReport> {
        let _guard = self.flush_guard.lock().await;
        self.flush_locked().await
    }

    /// Flush unless another flush is already running.
    pub async fn try_flush(&self) -> Result<Option<FlushReport>> {
        let Ok(_guard) = self.flush_guard.try_lock() else {
            debug!("flush already running, skipping");
            return Ok(None);
        };
        self.flush_locked().await.map(Some)
    }

    async fn flush_locked(&self) -> Result<FlushReport> {
        if self.is_session_expired()? {
            return Err(Error::SessionExpired);
        }

        let timeout = self.settings.request_timeout;
        if let Err(e) = with_timeout(timeout, self.transport.ping()).await {
            self.note_transport_error(&e)?;
            if matches!(e, TransportError::Unauthenticated(_)) {
                return Err(Error::SessionExpired);
            }
            debug!(error = %e, "server unreachable, skipping flush");
            return Ok(FlushReport {
                still_pending: self.open_count()?,
                ..FlushReport::default()
            });
        }

        let mut report = FlushReport::default();
        let abort = AtomicBool::new(false);
        loop {
            let chains = self.with_queue(|queue| {
                let now = queue.clock().now_ms_i64();
                Ok(runnable_chains(queue.list_open()?, now))
            })?;
            if chains.is_empty() {
                break;
            }
            debug!(chains = chains.len(), "flushing");

            let outcomes: Vec<Result<ChainOutcome>> = stream::iter(chains)
                .map(|chain| self.run_chain(chain, &abort))
                .buffer_unordered(self.settings.max_concurrent_chains.max(1))
                .collect()
                .await;

            let mut created = 0;
            for outcome in outcomes {
                let outcome = outcome?;
                report.completed += outcome.completed;
                report.failed += outcome.failed;
                created += outcome.created;
            }

            if abort.load(Ordering::SeqCst) {
                return Err(Error::SessionExpired);
            }
            // Confirmed creates may unblock operations that referenced them.
            if created == 0 {
                break;
            }
        }

        self.purge_completed()?;
        report.still_pending = self.open_count()?;
        if report.completed > 0 || report.failed > 0 {
            info!(
                completed = report.completed,
                failed = report.failed,
                still_pending = report.still_pending,
                "flush finished"
            );
        }
        Ok(report)
    }

    async fn run_chain(&self, chain: Vec<String>, abort: &AtomicBool) -> Result<ChainOutcome> {
        let mut outcome = ChainOutcome::default();
        for id in chain {
            if abort.load(Ordering::SeqCst) {
                break;
            }
            let op = self.with_queue(|queue| queue.mark_in_flight(&id))?;
            let mutation = mutation_for(&op)?;
            debug!(op = %op.id, kind = mutation.name(), "sending");

            let result = with_timeout(
                self.settings.request_timeout,
                self.transport.execute(&op.collection, &op.id, mutation),
            )
            .await;

            match result {
                Ok(applied) => {
                    self.complete(&op, applied)?;
                    outcome.completed += 1;
                    if op.kind == OpKind::Create {
                        outcome.created += 1;
                    }
                }
                Err(e) => {
                    warn!(op = %op.id, error = %e, "delivery failed");
                    let op = self.with_queue(|queue| queue.requeue(&op.id, &e.to_string(), e.kind()))?;
                    if op.status == OpStatus::Failed {
                        outcome.failed += 1;
                    }
                    if matches!(e, TransportError::Unauthenticated(_)) {
                        abort.store(true, Ordering::SeqCst);
                        self.expire_session()?;
                    }
                    // Later operations in this chain wait for the next flush.
                    break;
                }
            }
        }
        Ok(outcome)
    }

    fn complete(&self, op: &QueuedOperation, applied: Applied) -> Result<()> {
        self.with_queue(|queue| {
            let db = queue.db();
            let now = queue.clock().now();
            db.atomically(|db| -> Result<()> {
                queue.mark_completed(&op.id)?;
                let record_id = match (op.kind, op.local_id) {
                    (OpKind::Create, Some(temp)) => {
                        let touched = db.remap_temp_id(&op.collection, temp, applied.id)?;
                        debug!(temp, server = applied.id, touched, "confirmed create");
                        applied.id
                    }
                    _ => op.target_id.unwrap_or(applied.id),
                };
                if op.kind == OpKind::Delete
                    || db.count_open_operations_for(&op.collection, record_id)? > 0
                {
                    return Ok(());
                }
                match applied.record {
                    Some(fields) => db.put_record(&CachedRecord {
                        collection: op.collection.clone(),
                        id: record_id,
                        fields,
                        dirty: false,
                        modified_at: None,
                        synced_at: Some(now),
                    })?,
                    None => db.mark_record_clean(&op.collection, record_id, now)?,
                }
                Ok(())
            })
        })
    }

    fn open_count(&self) -> Result<usize> {
        self.with_queue(|queue| {
            let open = queue.count(OpStatus::Pending)? + queue.count(OpStatus::InFlight)?;
            Ok(usize::try_from(open).unwrap_or_default())
        })
    }

    // Conflicts

    /// Compare cached records against fresh server snapshots.
    ///
    /// Clean records are refreshed. Dirty records that differ materially
    /// produce a conflict; the newly detected ones are returned.
    pub async fn reconcile(&self, collection: &str, ids: &[i64]) -> Result<Vec<SyncConflict>> {
        let ids: Vec<i64> = ids.iter().copied().filter(|id| *id > 0).collect();
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let filter = Filter::IdIn { ids: ids.clone() };
        let mut server = self.fetch(collection, &filter).await?;

        self.with_queue(|queue| {
            let mut detected = Vec::new();
            for id in ids {
                let remote = server.remove(&id);
                if let Step::Conflict(conflict) = self.reconcile_one(queue, collection, id, remote)? {
                    detected.push(conflict);
                }
            }
            Ok(detected)
        })
    }

    /// Replace the cached copy of a collection with what the server returns
    /// for `filter`.
    ///
    /// Clean records the server no longer returns are dropped as stale.
    /// Records with local edits are never overwritten; they are checked for
    /// conflicts instead.
    pub async fn refresh_collection(&self, collection: &str, filter: &Filter) -> Result<RefreshReport> {
        let mut server = self.fetch(collection, filter).await?;

        let report = self.with_queue(|queue| {
            let db = queue.db();
            let cached: Vec<i64> = db
                .list_records(collection)?
                .into_iter()
                .map(|r| r.id)
                .filter(|id| !is_temporary_id(*id))
                .collect();
            let mut ids: Vec<i64> = server.keys().copied().collect();
            ids.extend(cached.into_iter().filter(|id| !server.contains_key(id)));

            let mut report = RefreshReport::default();
            db.atomically(|_| -> Result<()> {
                for id in ids {
                    let remote = server.remove(&id);
                    match self.reconcile_one(queue, collection, id, remote)? {
                        Step::Refreshed => report.refreshed += 1,
                        Step::Removed => report.removed += 1,
                        Step::KeptDirty => report.kept_dirty += 1,
                        Step::Conflict(_) => {
                            report.kept_dirty += 1;
                            report.conflicts += 1;
                        }
                        Step::Unchanged => {}
                    }
                }
                Ok(())
            })?;
            Ok(report)
        })?;
        info!(
            collection,
            refreshed = report.refreshed,
            removed = report.removed,
            kept_dirty = report.kept_dirty,
            "collection refreshed"
        );
        Ok(report)
    }

    /// Drop the clean cached records of a collection. Records with local
    /// edits stay. Returns `(removed, kept)`.
    pub fn clear_cache(&self, collection: &str) -> Result<(usize, usize)> {
        self.with_queue(|queue| {
            let db = queue.db();
            db.atomically(|db| -> Result<(usize, usize)> {
                let (mut removed, mut kept) = (0, 0);
                for record in db.list_records(collection)? {
                    if record.dirty {
                        kept += 1;
                    } else if db.delete_record(collection, record.id)? {
                        removed += 1;
                    }
                }
                Ok((removed, kept))
            })
        })
    }

    /// Query the server, keyed by record id.
    async fn fetch(&self, collection: &str, filter: &Filter) -> Result<BTreeMap<i64, Fields>> {
        let options = QueryOptions::default();
        let fetched = with_timeout(
            self.settings.request_timeout,
            self.transport.query(collection, filter, &[], &options),
        )
        .await;
        let fetched = match fetched {
            Ok(records) => records,
            Err(e) => {
                self.note_transport_error(&e)?;
                return Err(e.into());
            }
        };

        let mut server = BTreeMap::new();
        for mut record in fetched {
            match record.remove("id").and_then(|v| v.as_i64()) {
                Some(id) => {
                    server.insert(id, record);
                }
                None => warn!(collection, "server record without an id"),
            }
        }
        Ok(server)
    }

    /// Bring one cached record in line with its server copy.
    fn reconcile_one(
        &self,
        queue: &OperationQueue,
        collection: &str,
        id: i64,
        remote: Option<Fields>,
    ) -> Result<Step> {
        let db = queue.db();
        let local = db.get_record(collection, id)?;
        match (local, remote) {
            (Some(local), Some(remote)) if local.dirty => {
                let fields =
                    find_conflicting_fields_with(&local.fields, &remote, &self.settings.exclusions);
                if fields.is_empty() {
                    return Ok(Step::KeptDirty);
                }
                if let Some(mut existing) = db.find_pending_conflict(collection, id)? {
                    existing.local_snapshot = local.fields;
                    existing.server_snapshot = remote;
                    existing.conflicting_fields = fields;
                    existing.local_modified_at = local.modified_at;
                    db.update_conflict(&existing)?;
                    return Ok(Step::KeptDirty);
                }
                let mut conflict = SyncConflict::new(
                    collection,
                    id,
                    local.fields,
                    remote,
                    fields,
                    queue.next_stamp(),
                );
                conflict.local_modified_at = local.modified_at;
                db.insert_conflict(&conflict)?;
                info!(conflict = %conflict.id, fields = ?conflict.conflicting_fields, "conflict detected");
                Ok(Step::Conflict(conflict))
            }
            (_, Some(remote)) => {
                db.put_record(&CachedRecord {
                    collection: collection.to_string(),
                    id,
                    fields: remote,
                    dirty: false,
                    modified_at: None,
                    synced_at: Some(queue.clock().now()),
                })?;
                Ok(Step::Refreshed)
            }
            (Some(local), None) if !local.dirty => {
                db.delete_record(collection, id)?;
                Ok(Step::Removed)
            }
            (Some(_), None) => {
                debug!(collection, id, "dirty record missing on server");
                Ok(Step::KeptDirty)
            }
            (None, None) => Ok(Step::Unchanged),
        }
    }

    /// Apply a resolution to a pending conflict.
    ///
    /// Returns `false` without side effects if the conflict is already
    /// resolved or ignored.
    pub fn resolve(&self, conflict_id: &str, strategy: Resolution) -> Result<bool> {
        self.with_queue(|queue| {
            let db = queue.db();
            let mut conflict = db.get_conflict(conflict_id)?;
            if !conflict.is_pending() {
                debug!(conflict = conflict_id, status = %conflict.status, "already settled");
                return Ok(false);
            }
            // Discarding the local edit while it is being sent would leave the
            // cache claiming the server copy the edit is about to overwrite.
            if strategy == Resolution::PreferServer
                && db.count_in_flight_for(&conflict.collection, conflict.record_id)? > 0
            {
                return Err(Error::RecordBusy {
                    collection: conflict.collection.clone(),
                    id: conflict.record_id,
                });
            }
            let now = queue.clock().now();

            let adopted = match strategy {
                Resolution::PreferLocal => Some(conflict.local_snapshot.clone()),
                Resolution::PreferServer => None,
                Resolution::Merge => Some(
                    merge_snapshots(
                        &self.settings.merge_policy,
                        &conflict.local_snapshot,
                        &conflict.server_snapshot,
                        conflict.local_modified_at,
                    )
                    .fields,
                ),
            };

            let write_back = match &adopted {
                Some(fields) => {
                    let payload: Fields = fields
                        .iter()
                        .filter(|(k, _)| !self.settings.exclusions.is_excluded(k))
                        .map(|(k, v)| (k.clone(), v.clone()))
                        .collect();
                    Some(queue.prepare(
                        OpKind::Update,
                        &conflict.collection,
                        Some(conflict.record_id),
                        payload,
                        self.settings.max_attempts,
                    )?)
                }
                None => None,
            };

            db.atomically(|db| -> Result<()> {
                match (adopted, write_back) {
                    (Some(fields), Some(op)) => {
                        db.put_record(&CachedRecord {
                            collection: conflict.collection.clone(),
                            id: conflict.record_id,
                            fields,
                            dirty: true,
                            modified_at: Some(now),
                            synced_at: None,
                        })?;
                        queue.enqueue_op(&op)?;
                    }
                    _ => {
                        db.put_record(&CachedRecord {
                            collection: conflict.collection.clone(),
                            id: conflict.record_id,
                            fields: conflict.server_snapshot.clone(),
                            dirty: false,
                            modified_at: None,
                            synced_at: Some(now),
                        })?;
                        let dropped =
                            db.delete_open_operations_for(&conflict.collection, conflict.record_id)?;
                        debug!(dropped, "discarded local edits");
                    }
                }
                conflict.status = ConflictStatus::Resolved;
                conflict.resolution = Some(strategy);
                conflict.resolved_at = Some(now);
                db.update_conflict(&conflict)?;
                Ok(())
            })?;
            info!(conflict = conflict_id, %strategy, "conflict resolved");
            Ok(true)
        })
    }

    /// Mark a pending conflict ignored without touching the record.
    pub fn ignore(&self, conflict_id: &str) -> Result<bool> {
        self.with_queue(|queue| {
            let db = queue.db();
            let mut conflict = db.get_conflict(conflict_id)?;
            if !conflict.is_pending() {
                return Ok(false);
            }
            conflict.status = ConflictStatus::Ignored;
            conflict.resolved_at = Some(queue.clock().now());
            db.update_conflict(&conflict)?;
            Ok(true)
        })
    }

    pub fn list_conflicts(&self, status: Option<ConflictStatus>) -> Result<Vec<SyncConflict>> {
        self.with_queue(|queue| Ok(queue.db().list_conflicts(status)?))
    }

    /// Re-check pending conflicts and delete those with no material difference.
    ///
    /// Returns the number deleted. Running it twice deletes nothing the
    /// second time.
    pub fn clear_false_positives(&self) -> Result<usize> {
        self.with_queue(|queue| {
            let db = queue.db();
            let mut cleared = 0;
            for mut conflict in db.list_conflicts(Some(ConflictStatus::Pending))? {
                let fields = find_conflicting_fields_with(
                    &conflict.local_snapshot,
                    &conflict.server_snapshot,
                    &self.settings.exclusions,
                );
                if fields.is_empty() {
                    db.delete_conflict(&conflict.id)?;
                    cleared += 1;
                } else if fields != conflict.conflicting_fields {
                    conflict.conflicting_fields = fields;
                    db.update_conflict(&conflict)?;
                }
            }
            if cleared > 0 {
                info!(cleared, "removed false-positive conflicts");
            }
            Ok(cleared)
        })
    }

    // Realtime

    /// React to a realtime event. Record change notices trigger a reconcile.
    pub async fn handle_remote_change(&self, event: &ChannelEvent) -> Result<Vec<SyncConflict>> {
        match event.changed_records() {
            Some((collection, ids)) => self.reconcile(&collection, &ids).await,
            None => Ok(Vec::new()),
        }
    }

    pub fn persist_watermark(&self, channel: &str, last_id: i64) -> Result<()> {
        self.with_queue(|queue| Ok(queue.db().set_watermark(channel, last_id)?))
    }

    pub fn watermarks(&self) -> Result<Vec<(String, i64)>> {
        self.with_queue(|queue| Ok(queue.db().list_watermarks()?))
    }

    // Status

    pub fn get_status(&self) -> Result<SyncStatus> {
        let (pending_count, failed_count, conflict_count, session_expired) =
            self.with_queue(|queue| {
                let db = queue.db();
                Ok((
                    queue.count(OpStatus::Pending)? + queue.count(OpStatus::InFlight)?,
                    queue.count(OpStatus::Failed)?,
                    db.count_conflicts(ConflictStatus::Pending)?,
                    db.get_meta(SESSION_EXPIRED_KEY)?.is_some(),
                ))
            })?;
        Ok(SyncStatus {
            pending_count,
            failed_count,
            conflict_count,
            transport_state: self.transport_state.get(),
            polling: self.transport_state.is_polling(),
            session_expired,
        })
    }
}

#[cfg(test)]
#[path = "coordinator_tests.rs"]
mod tests;
