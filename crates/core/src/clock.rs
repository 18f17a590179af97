// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Clocks for operation ids, enqueue ordering and retry scheduling.
//!
//! Operation ids embed a [`Stamp`]: wall clock milliseconds plus a counter
//! that advances when several operations are enqueued within the same
//! millisecond (or the wall clock steps backwards). Stamps produced by one
//! [`StampClock`] are strictly increasing.
//!
//! Format: `{wall_ms}-{counter}`

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::{Error, Result};

/// A monotonic enqueue timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Stamp {
    /// Wall clock time in milliseconds since Unix epoch.
    pub wall_ms: u64,
    /// Tiebreaker for stamps issued within the same millisecond.
    pub counter: u32,
}

impl Stamp {
    pub fn new(wall_ms: u64, counter: u32) -> Self {
        Stamp { wall_ms, counter }
    }

    /// The wall clock part as a UTC timestamp.
    pub fn to_datetime(&self) -> DateTime<Utc> {
        i64::try_from(self.wall_ms)
            .ok()
            .and_then(DateTime::from_timestamp_millis)
            .unwrap_or_default()
    }
}

impl fmt::Display for Stamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.wall_ms, self.counter)
    }
}

impl FromStr for Stamp {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (wall, counter) = s.split_once('-').ok_or_else(|| {
            Error::InvalidInput(format!("expected format 'wall_ms-counter', got '{s}'"))
        })?;
        let wall_ms = wall
            .parse::<u64>()
            .map_err(|_| Error::InvalidInput(format!("invalid wall_ms '{wall}' in '{s}'")))?;
        let counter = counter
            .parse::<u32>()
            .map_err(|_| Error::InvalidInput(format!("invalid counter '{counter}' in '{s}'")))?;
        Ok(Stamp::new(wall_ms, counter))
    }
}

/// Trait for getting the current wall clock time.
///
/// This allows injecting a controllable clock for testing.
pub trait ClockSource: Send + Sync {
    /// Returns the current time in milliseconds since Unix epoch.
    fn now_ms(&self) -> u64;

    /// Returns the current time as signed milliseconds, for storage.
    fn now_ms_i64(&self) -> i64 {
        i64::try_from(self.now_ms()).unwrap_or(i64::MAX)
    }

    /// Returns the current time as a UTC timestamp.
    fn now(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.now_ms_i64()).unwrap_or_default()
    }
}

/// System clock implementation using `std::time::SystemTime`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl ClockSource for SystemClock {
    fn now_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
            .unwrap_or(0)
    }
}

impl<C: ClockSource + ?Sized> ClockSource for Arc<C> {
    fn now_ms(&self) -> u64 {
        (**self).now_ms()
    }
}

/// A clock that only moves when told to.
///
/// Cheap to clone; clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    time_ms: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new(initial_ms: u64) -> Self {
        ManualClock {
            time_ms: Arc::new(AtomicU64::new(initial_ms)),
        }
    }

    pub fn set(&self, ms: u64) {
        self.time_ms.store(ms, AtomicOrdering::SeqCst);
    }

    pub fn advance(&self, ms: u64) {
        self.time_ms.fetch_add(ms, AtomicOrdering::SeqCst);
    }
}

impl ClockSource for ManualClock {
    fn now_ms(&self) -> u64 {
        self.time_ms.load(AtomicOrdering::SeqCst)
    }
}

/// Generates strictly increasing [`Stamp`]s.
pub struct StampClock {
    clock: Arc<dyn ClockSource>,
    last: Mutex<Stamp>,
}

impl StampClock {
    pub fn new(clock: Arc<dyn ClockSource>) -> Self {
        StampClock {
            clock,
            last: Mutex::new(Stamp::new(0, 0)),
        }
    }

    /// Returns the underlying wall clock.
    pub fn source(&self) -> &Arc<dyn ClockSource> {
        &self.clock
    }

    /// Generates a new stamp, greater than every stamp generated before.
    pub fn next(&self) -> Stamp {
        let physical = self.clock.now_ms();
        let mut last = self.last.lock().unwrap_or_else(|e| e.into_inner());

        let next = if physical > last.wall_ms {
            Stamp::new(physical, 0)
        } else {
            // Clock went backwards or stayed the same: advance the counter
            Stamp::new(last.wall_ms, last.counter.saturating_add(1))
        };

        *last = next;
        next
    }
}

impl Default for StampClock {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

#[cfg(test)]
#[path = "clock_tests.rs"]
mod tests;
