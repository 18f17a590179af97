// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test doubles for the sync and realtime modules.

#![allow(clippy::unwrap_used)]

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use sk_core::protocol::{ChannelEvent, ClientMessage, ServerMessage};
use sk_core::normalize::values_equal;
use sk_core::value::fields_from_json;
use sk_core::Fields;
use tokio::sync::mpsc;

use super::transport::{
    Applied, EventStream, Filter, Mutation, QueryOptions, RecordTransport, TransportError,
    TransportFuture, TransportResult,
};

pub fn fields(json: serde_json::Value) -> Fields {
    fields_from_json(json).unwrap()
}

/// In-process transport that records calls and replays scripted results.
#[derive(Default)]
pub struct MockTransport {
    /// Results handed out by `execute`, in order. Empty means success.
    execute_results: Mutex<VecDeque<TransportResult<Applied>>>,
    /// Mutations received by `execute`, in arrival order.
    executed: Mutex<Vec<(String, Mutation)>>,
    /// Keys passed to `execute`, parallel to `executed`.
    keys: Mutex<Vec<String>>,
    /// Server-side records served by `query`.
    records: Mutex<BTreeMap<(String, i64), Fields>>,
    /// Batches handed out by `poll_since`, per channel.
    poll_batches: Mutex<HashMap<String, VecDeque<Vec<ChannelEvent>>>>,
    polls: AtomicUsize,
    /// Streams handed out by `open_event_stream`. Empty means unavailable.
    streams: Mutex<VecDeque<TransportResult<MockStream>>>,
    ping_error: Mutex<Option<TransportError>>,
    next_id: AtomicI64,
    /// Calls to `execute` currently awaiting a result.
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    /// When set, `execute` records the call and never returns.
    hang: AtomicBool,
}

impl MockTransport {
    pub fn new() -> Self {
        MockTransport {
            next_id: AtomicI64::new(1000),
            ..Default::default()
        }
    }

    pub fn push_result(&self, result: TransportResult<Applied>) {
        self.execute_results.lock().unwrap().push_back(result);
    }

    pub fn push_error(&self, error: TransportError) {
        self.push_result(Err(error));
    }

    pub fn executed(&self) -> Vec<(String, Mutation)> {
        self.executed.lock().unwrap().clone()
    }

    pub fn keys(&self) -> Vec<String> {
        self.keys.lock().unwrap().clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn put_record(&self, collection: &str, id: i64, record: Fields) {
        self.records
            .lock()
            .unwrap()
            .insert((collection.to_string(), id), record);
    }

    pub fn push_poll_batch(&self, channel: &str, events: Vec<ChannelEvent>) {
        self.poll_batches
            .lock()
            .unwrap()
            .entry(channel.to_string())
            .or_default()
            .push_back(events);
    }

    pub fn poll_count(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }

    pub fn push_stream(&self, stream: TransportResult<MockStream>) {
        self.streams.lock().unwrap().push_back(stream);
    }

    pub fn set_hang(&self, hang: bool) {
        self.hang.store(hang, Ordering::SeqCst);
    }

    pub fn set_ping_error(&self, error: Option<TransportError>) {
        *self.ping_error.lock().unwrap() = error;
    }
}

impl RecordTransport for MockTransport {
    fn execute<'a>(
        &'a self,
        collection: &'a str,
        key: &'a str,
        mutation: Mutation,
    ) -> TransportFuture<'a, Applied> {
        Box::pin(async move {
            self.keys.lock().unwrap().push(key.to_string());
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            self.executed
                .lock()
                .unwrap()
                .push((collection.to_string(), mutation.clone()));
            tokio::task::yield_now().await;
            if self.hang.load(Ordering::SeqCst) {
                std::future::pending::<()>().await;
            }

            let scripted = self.execute_results.lock().unwrap().pop_front();
            let result = match scripted {
                Some(result) => result,
                None => Ok(Applied {
                    id: match &mutation {
                        Mutation::Create { .. } => self.next_id.fetch_add(1, Ordering::SeqCst),
                        Mutation::Update { id, .. } | Mutation::Delete { id } => *id,
                    },
                    record: None,
                }),
            };
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            result
        })
    }

    fn query<'a>(
        &'a self,
        collection: &'a str,
        filter: &'a Filter,
        _fields: &'a [String],
        _options: &'a QueryOptions,
    ) -> TransportFuture<'a, Vec<Fields>> {
        Box::pin(async move {
            let records = self.records.lock().unwrap();
            let matching = records
                .iter()
                .filter(|((c, id), fields)| {
                    c == collection
                        && match filter {
                            Filter::IdIn { ids } => ids.contains(id),
                            Filter::Match { fields: wanted } => wanted
                                .iter()
                                .all(|(k, v)| values_equal(fields.get(k), Some(v))),
                            Filter::All => true,
                        }
                })
                .map(|((_, id), fields)| {
                    let mut record = fields.clone();
                    record.insert("id".to_string(), (*id).into());
                    record
                })
                .collect();
            Ok(matching)
        })
    }

    fn open_event_stream(&self) -> TransportFuture<'_, Box<dyn EventStream>> {
        Box::pin(async move {
            match self.streams.lock().unwrap().pop_front() {
                Some(Ok(stream)) => Ok(Box::new(stream) as Box<dyn EventStream>),
                Some(Err(e)) => Err(e),
                None => Err(TransportError::Unavailable("no stream scripted".into())),
            }
        })
    }

    fn poll_since<'a>(&'a self, channel: &'a str, _last_id: i64) -> TransportFuture<'a, Vec<ChannelEvent>> {
        Box::pin(async move {
            self.polls.fetch_add(1, Ordering::SeqCst);
            let batch = self
                .poll_batches
                .lock()
                .unwrap()
                .get_mut(channel)
                .and_then(VecDeque::pop_front)
                .unwrap_or_default();
            Ok(batch)
        })
    }

    fn ping(&self) -> TransportFuture<'_, ()> {
        Box::pin(async move {
            match self.ping_error.lock().unwrap().clone() {
                Some(e) => Err(e),
                None => Ok(()),
            }
        })
    }
}

/// Scripted push connection. Messages are fed through the paired sender;
/// dropping the sender closes the stream.
pub struct MockStream {
    incoming: mpsc::UnboundedReceiver<ServerMessage>,
    sent: Arc<Mutex<Vec<ClientMessage>>>,
}

impl MockStream {
    pub fn new() -> (Self, mpsc::UnboundedSender<ServerMessage>, Arc<Mutex<Vec<ClientMessage>>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let sent = Arc::new(Mutex::new(Vec::new()));
        let stream = MockStream {
            incoming: rx,
            sent: Arc::clone(&sent),
        };
        (stream, tx, sent)
    }
}

impl EventStream for MockStream {
    fn send(&mut self, msg: ClientMessage) -> TransportFuture<'_, ()> {
        let sent = Arc::clone(&self.sent);
        Box::pin(async move {
            sent.lock().unwrap().push(msg);
            Ok(())
        })
    }

    fn recv(&mut self) -> TransportFuture<'_, Option<ServerMessage>> {
        Box::pin(async move { Ok(self.incoming.recv().await) })
    }

    fn close(&mut self) -> TransportFuture<'_, ()> {
        Box::pin(async move {
            self.incoming.close();
            Ok(())
        })
    }
}

/// A coordinator over an in-memory store and `transport`.
pub fn memory_coordinator(transport: &Arc<MockTransport>) -> super::SyncCoordinator {
    let queue = super::OperationQueue::new(
        sk_core::Database::open_in_memory().unwrap(),
        sk_core::Backoff::new(
            std::time::Duration::from_millis(10),
            std::time::Duration::from_millis(100),
        ),
    );
    super::SyncCoordinator::new(
        queue,
        Arc::clone(transport) as Arc<dyn RecordTransport>,
        super::CoordinatorSettings::default(),
    )
}
