// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Durable operation queue.
//!
//! Every state transition is written through to the SQLite store before the
//! call returns. Retry eligibility is tracked per operation in
//! `next_attempt_at`, computed from the configured [`Backoff`].

use std::sync::Arc;
use std::time::Duration;

use sk_core::{
    Backoff, ClockSource, Database, ErrorKind, Fields, JitterSource, OpKind, OpStatus,
    QueuedOperation, Stamp, StampClock, SystemJitter,
};
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Persisted, ordered list of pending mutations.
pub struct OperationQueue {
    db: Database,
    stamps: StampClock,
    backoff: Backoff,
    jitter: Box<dyn JitterSource>,
}

fn invalid_transition(op: &QueuedOperation, to: OpStatus) -> Error {
    sk_core::Error::InvalidTransition {
        id: op.id.clone(),
        from: op.status.to_string(),
        to: to.to_string(),
    }
    .into()
}

impl OperationQueue {
    pub fn new(db: Database, backoff: Backoff) -> Self {
        OperationQueue {
            db,
            stamps: StampClock::default(),
            backoff,
            jitter: Box::new(SystemJitter),
        }
    }

    /// Replace the wall clock used for ids and retry eligibility.
    pub fn with_clock(mut self, clock: Arc<dyn ClockSource>) -> Self {
        self.stamps = StampClock::new(clock);
        self
    }

    pub fn with_jitter(mut self, jitter: Box<dyn JitterSource>) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn clock(&self) -> &Arc<dyn ClockSource> {
        self.stamps.source()
    }

    pub fn backoff(&self) -> &Backoff {
        &self.backoff
    }

    /// A fresh stamp for ids of records derived from queue activity.
    pub fn next_stamp(&self) -> Stamp {
        self.stamps.next()
    }

    /// Build a new pending operation without persisting it.
    pub fn prepare(
        &self,
        kind: OpKind,
        collection: &str,
        target_id: Option<i64>,
        payload: Fields,
        max_attempts: u32,
    ) -> Result<QueuedOperation> {
        match (kind, target_id) {
            (OpKind::Create, Some(_)) => Err(Error::InvalidPayload(
                "create operations cannot name a target id".to_string(),
            )),
            (OpKind::Update | OpKind::Delete, None) => Err(Error::MissingTarget {
                kind: kind.as_str(),
            }),
            _ => Ok(QueuedOperation::new(
                kind,
                collection,
                target_id,
                payload,
                max_attempts,
                self.stamps.next(),
            )),
        }
    }

    /// Persist a mutation and return its operation id.
    pub fn enqueue(
        &self,
        kind: OpKind,
        collection: &str,
        target_id: Option<i64>,
        payload: Fields,
        max_attempts: u32,
    ) -> Result<String> {
        let op = self.prepare(kind, collection, target_id, payload, max_attempts)?;
        self.enqueue_op(&op)?;
        Ok(op.id)
    }

    pub fn enqueue_op(&self, op: &QueuedOperation) -> Result<()> {
        self.db.insert_operation(op)?;
        debug!(op = %op.id, kind = %op.kind, "enqueued");
        Ok(())
    }

    pub fn get(&self, id: &str) -> Result<QueuedOperation> {
        Ok(self.db.get_operation(id)?)
    }

    /// Pending operations in enqueue order.
    pub fn list_pending(&self) -> Result<Vec<QueuedOperation>> {
        Ok(self.db.list_operations(Some(OpStatus::Pending))?)
    }

    pub fn list_failed(&self) -> Result<Vec<QueuedOperation>> {
        Ok(self.db.list_operations(Some(OpStatus::Failed))?)
    }

    /// Pending and in-flight operations in enqueue order.
    pub fn list_open(&self) -> Result<Vec<QueuedOperation>> {
        let ops = self.db.list_operations(None)?;
        Ok(ops
            .into_iter()
            .filter(|op| matches!(op.status, OpStatus::Pending | OpStatus::InFlight))
            .collect())
    }

    pub fn count(&self, status: OpStatus) -> Result<i64> {
        Ok(self.db.count_operations(status)?)
    }

    pub fn mark_in_flight(&self, id: &str) -> Result<QueuedOperation> {
        let mut op = self.db.get_operation(id)?;
        if op.status != OpStatus::Pending {
            return Err(invalid_transition(&op, OpStatus::InFlight));
        }
        op.status = OpStatus::InFlight;
        self.db.update_operation(&op)?;
        Ok(op)
    }

    pub fn mark_completed(&self, id: &str) -> Result<QueuedOperation> {
        let mut op = self.db.get_operation(id)?;
        if op.status != OpStatus::InFlight {
            return Err(invalid_transition(&op, OpStatus::Completed));
        }
        op.status = OpStatus::Completed;
        op.last_error = None;
        op.last_error_kind = None;
        self.db.update_operation(&op)?;
        Ok(op)
    }

    /// Move an operation straight to `Failed`.
    pub fn mark_failed(&self, id: &str, error: &str) -> Result<QueuedOperation> {
        let mut op = self.db.get_operation(id)?;
        if op.status.is_terminal() {
            return Err(invalid_transition(&op, OpStatus::Failed));
        }
        op.status = OpStatus::Failed;
        op.last_error = Some(error.to_string());
        self.db.update_operation(&op)?;
        warn!(op = %op.id, error, "operation failed");
        Ok(op)
    }

    /// Record a failed delivery attempt.
    ///
    /// The operation returns to `Pending` behind a backoff delay, or becomes
    /// `Failed` once it has used `max_attempts`. A non-retryable failure that
    /// follows another non-retryable failure fails immediately.
    pub fn requeue(&self, id: &str, error: &str, kind: ErrorKind) -> Result<QueuedOperation> {
        let mut op = self.db.get_operation(id)?;
        if op.status.is_terminal() {
            return Err(invalid_transition(&op, OpStatus::Pending));
        }

        let previous_attempts = op.attempt;
        let repeated_rejection =
            !kind.is_retryable() && op.last_error_kind.is_some_and(|k| !k.is_retryable());

        op.attempt += 1;
        op.last_error = Some(error.to_string());
        op.last_error_kind = Some(kind);

        if repeated_rejection || op.attempt >= op.max_attempts {
            op.status = OpStatus::Failed;
            warn!(op = %op.id, attempt = op.attempt, %kind, error, "operation failed");
        } else {
            let delay = self.retry_delay(previous_attempts);
            op.status = OpStatus::Pending;
            op.next_attempt_at = self
                .clock()
                .now_ms_i64()
                .saturating_add(i64::try_from(delay.as_millis()).unwrap_or(i64::MAX));
            debug!(op = %op.id, attempt = op.attempt, ?delay, %kind, "requeued");
        }
        self.db.update_operation(&op)?;
        Ok(op)
    }

    /// Delay applied after the `attempt`-th failure (zero-based).
    pub fn retry_delay(&self, attempt: u32) -> Duration {
        self.backoff.delay(attempt, self.jitter.as_ref())
    }

    /// Reset a `Failed` operation to `Pending` with a fresh attempt budget.
    pub fn retry(&self, id: &str) -> Result<QueuedOperation> {
        let mut op = self.db.get_operation(id)?;
        if op.status != OpStatus::Failed {
            return Err(invalid_transition(&op, OpStatus::Pending));
        }
        op.status = OpStatus::Pending;
        op.attempt = 0;
        op.next_attempt_at = 0;
        op.last_error_kind = None;
        self.db.update_operation(&op)?;
        Ok(op)
    }

    pub fn purge_completed(&self) -> Result<usize> {
        Ok(self.db.delete_operations_with_status(OpStatus::Completed)?)
    }

    /// Return operations interrupted mid-flight by a crash to `Pending`.
    pub fn recover(&self) -> Result<usize> {
        let reset = self.db.reset_in_flight()?;
        if reset > 0 {
            warn!(count = reset, "recovered interrupted operations");
        }
        Ok(reset)
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
