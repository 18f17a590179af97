// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Offline-first synchronization with the remote record server.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │   Engine    │────►│ Coordinator │────►│  Transport  │────► server
//! │ (SyncEngine)│     │             │◄────│   (trait)   │◄────
//! └─────────────┘     └─────────────┘     └─────────────┘
//!        │                   │
//!        ▼                   ▼
//! ┌─────────────┐     ┌─────────────┐
//! │  Realtime   │     │    Queue    │  (SQLite)
//! │  channels   │     │             │
//! └─────────────┘     └─────────────┘
//! ```
//!
//! Local writes land in the record cache and the operation queue in one
//! transaction. The coordinator drains the queue in per-record order,
//! detects conflicts when reconciling with the server, and applies
//! remote change notifications delivered by the realtime layer.

mod coordinator;
mod engine;
mod http;
mod queue;
mod transport;
mod websocket;

pub use coordinator::{
    runnable_chains, CoordinatorSettings, FlushReport, RefreshReport, SyncCoordinator,
    SyncStatus,
};
pub use engine::{EngineCommand, EngineConfig, SyncEngine};
pub use http::HttpTransport;
pub use queue::OperationQueue;
pub use transport::{
    with_timeout, Applied, EventStream, Filter, Mutation, OfflineTransport, QueryOptions,
    RecordTransport, TransportError, TransportFuture, TransportResult,
};
pub use websocket::WebSocketEventStream;

#[cfg(test)]
pub(crate) mod test_helpers;
