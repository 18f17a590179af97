// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! sk-core: Shared library for the skiff sync engine
//!
//! This crate provides the record value model, type-normalized conflict
//! detection, field-level merge, retry backoff, the realtime wire protocol
//! and the SQLite store behind the durable operation queue.

pub mod backoff;
pub mod clock;
pub mod conflict;
pub mod db;
pub mod detect;
pub mod error;
pub mod merge;
pub mod normalize;
pub mod op;
pub mod protocol;
pub mod value;

pub use backoff::{Backoff, FixedJitter, JitterSource, SystemJitter};
pub use clock::{ClockSource, ManualClock, Stamp, StampClock, SystemClock};
pub use conflict::{ConflictStatus, Resolution, SyncConflict};
pub use db::{CachedRecord, Database};
pub use detect::{find_conflicting_fields, find_conflicting_fields_with, FieldExclusions};
pub use error::{Error, Result};
pub use merge::{merge_snapshots, MergePolicy, Merged, Side};
pub use op::{ChainKey, ErrorKind, OpKind, OpStatus, QueuedOperation, DEFAULT_MAX_ATTEMPTS};
pub use protocol::{ChannelCursor, ChannelEvent, ClientMessage, ServerMessage};
pub use value::{Fields, RecordRef, Value};
