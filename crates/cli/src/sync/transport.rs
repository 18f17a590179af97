// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Transport abstraction for the remote record server.
//!
//! Provides a trait-based transport layer that enables:
//! - Real HTTP + WebSocket connections for production
//! - Mock transports for unit testing

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sk_core::protocol::{ChannelEvent, ClientMessage, ServerMessage};
use sk_core::{ErrorKind, Fields};

/// Error type for transport operations.
///
/// The variant decides how the operation queue treats a failure.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TransportError {
    /// Credentials rejected; fatal to the current session.
    #[error("unauthenticated: {0}")]
    Unauthenticated(String),

    /// The target record no longer exists.
    #[error("not found: {0}")]
    NotFound(String),

    /// The server rejected the payload.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Connection or I/O failure.
    #[error("network error: {0}")]
    Network(String),

    /// The call exceeded its deadline.
    #[error("request timed out")]
    Timeout,

    /// The server does not offer an event stream.
    #[error("event stream unavailable: {0}")]
    Unavailable(String),

    #[error("{0}")]
    Unknown(String),
}

impl TransportError {
    /// Persisted classification of this failure.
    pub fn kind(&self) -> ErrorKind {
        match self {
            TransportError::Unauthenticated(_) => ErrorKind::Unauthenticated,
            TransportError::NotFound(_) => ErrorKind::NotFound,
            TransportError::Validation(_) => ErrorKind::Validation,
            TransportError::Network(_) | TransportError::Unavailable(_) => ErrorKind::Network,
            TransportError::Timeout => ErrorKind::Timeout,
            TransportError::Unknown(_) => ErrorKind::Unknown,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }
}

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Boxed future returned by transport methods.
pub type TransportFuture<'a, T> = Pin<Box<dyn Future<Output = TransportResult<T>> + Send + 'a>>;

/// A mutation sent to the server.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    Create { payload: Fields },
    Update { id: i64, payload: Fields },
    Delete { id: i64 },
}

impl Mutation {
    pub fn name(&self) -> &'static str {
        match self {
            Mutation::Create { .. } => "create",
            Mutation::Update { .. } => "update",
            Mutation::Delete { .. } => "delete",
        }
    }
}

/// Outcome of a successful mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct Applied {
    /// Server id of the affected record.
    pub id: i64,
    /// Server snapshot, when the server echoes one back.
    pub record: Option<Fields>,
}

/// Record selection for [`RecordTransport::query`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Filter {
    All,
    IdIn { ids: Vec<i64> },
    /// Records whose fields equal every given value.
    Match { fields: Fields },
}

/// Paging and ordering for [`RecordTransport::query`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<u32>,
    /// Sort expression, e.g. `"id desc"`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<String>,
}

/// One logical connection to the remote record server.
///
/// This trait abstracts over the actual transport mechanism, allowing
/// for easy testing with mock implementations.
pub trait RecordTransport: Send + Sync {
    /// Apply a mutation to `collection`.
    ///
    /// `key` identifies the queued operation and is identical on every
    /// retry, so the server can discard a mutation it already applied.
    fn execute<'a>(
        &'a self,
        collection: &'a str,
        key: &'a str,
        mutation: Mutation,
    ) -> TransportFuture<'a, Applied>;

    /// Fetch records matching `filter`. An empty `fields` slice means all fields.
    fn query<'a>(
        &'a self,
        collection: &'a str,
        filter: &'a Filter,
        fields: &'a [String],
        options: &'a QueryOptions,
    ) -> TransportFuture<'a, Vec<Fields>>;

    /// Open a push event stream.
    ///
    /// Returns [`TransportError::Unavailable`] when the server has none.
    fn open_event_stream(&self) -> TransportFuture<'_, Box<dyn EventStream>>;

    /// Events on `channel` with an id greater than `last_id`.
    fn poll_since<'a>(&'a self, channel: &'a str, last_id: i64) -> TransportFuture<'a, Vec<ChannelEvent>>;

    /// Cheap connectivity check.
    fn ping(&self) -> TransportFuture<'_, ()>;
}

/// A live push connection.
pub trait EventStream: Send {
    fn send(&mut self, msg: ClientMessage) -> TransportFuture<'_, ()>;

    /// Receive the next message.
    ///
    /// Returns `None` if the connection is closed.
    fn recv(&mut self) -> TransportFuture<'_, Option<ServerMessage>>;

    fn close(&mut self) -> TransportFuture<'_, ()>;
}

/// Transport used when no server is configured.
///
/// Every call fails with a network error, so the queue keeps operations
/// pending and flushes become no-ops.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineTransport;

impl OfflineTransport {
    fn unreachable<T>() -> TransportResult<T> {
        Err(TransportError::Network("no remote server configured".to_string()))
    }
}

impl RecordTransport for OfflineTransport {
    fn execute<'a>(
        &'a self,
        _collection: &'a str,
        _key: &'a str,
        _mutation: Mutation,
    ) -> TransportFuture<'a, Applied> {
        Box::pin(async { Self::unreachable() })
    }

    fn query<'a>(
        &'a self,
        _collection: &'a str,
        _filter: &'a Filter,
        _fields: &'a [String],
        _options: &'a QueryOptions,
    ) -> TransportFuture<'a, Vec<Fields>> {
        Box::pin(async { Self::unreachable() })
    }

    fn open_event_stream(&self) -> TransportFuture<'_, Box<dyn EventStream>> {
        Box::pin(async { Err(TransportError::Unavailable("no remote server configured".to_string())) })
    }

    fn poll_since<'a>(&'a self, _channel: &'a str, _last_id: i64) -> TransportFuture<'a, Vec<ChannelEvent>> {
        Box::pin(async { Self::unreachable() })
    }

    fn ping(&self) -> TransportFuture<'_, ()> {
        Box::pin(async { Self::unreachable() })
    }
}

/// Run `fut` with a deadline, classifying expiry as [`TransportError::Timeout`].
pub async fn with_timeout<T, F>(duration: Duration, fut: F) -> TransportResult<T>
where
    F: Future<Output = TransportResult<T>>,
{
    match tokio::time::timeout(duration, fut).await {
        Ok(result) => result,
        Err(_) => Err(TransportError::Timeout),
    }
}

#[cfg(test)]
#[path = "transport_tests.rs"]
mod tests;
