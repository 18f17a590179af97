// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Connection state shared between the channel manager and status readers.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU8, Ordering};

use serde::Serialize;

/// Lifecycle of the push event stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportState {
    /// No transport attempt active.
    Idle,
    /// Streaming handshake in progress.
    Connecting,
    /// Event delivery active.
    Connected,
    /// Lost or failed; a reconnect is scheduled.
    Disconnected,
}

impl TransportState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportState::Idle => "idle",
            TransportState::Connecting => "connecting",
            TransportState::Connected => "connected",
            TransportState::Disconnected => "disconnected",
        }
    }

    fn to_u8(self) -> u8 {
        match self {
            TransportState::Idle => 0,
            TransportState::Connecting => 1,
            TransportState::Connected => 2,
            TransportState::Disconnected => 3,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            1 => TransportState::Connecting,
            2 => TransportState::Connected,
            3 => TransportState::Disconnected,
            _ => TransportState::Idle,
        }
    }
}

impl fmt::Display for TransportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Connection state visible to both the manager task and status readers.
///
/// Uses atomic fields for lock-free reads.
#[derive(Debug, Default)]
pub struct SharedTransportState {
    state: AtomicU8,
    /// Consecutive failed connection attempts.
    attempt: AtomicU32,
    /// True while subscriptions are served by polling.
    polling: AtomicBool,
}

impl SharedTransportState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> TransportState {
        TransportState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn set(&self, state: TransportState) {
        self.state.store(state.to_u8(), Ordering::Release);
    }

    pub fn attempt(&self) -> u32 {
        self.attempt.load(Ordering::Acquire)
    }

    pub fn set_attempt(&self, attempt: u32) {
        self.attempt.store(attempt, Ordering::Release);
    }

    pub fn is_polling(&self) -> bool {
        self.polling.load(Ordering::Acquire)
    }

    pub fn set_polling(&self, polling: bool) {
        self.polling.store(polling, Ordering::Release);
    }

    /// Human-readable status, e.g. `connecting (attempt 3)`.
    pub fn status_string(&self) -> String {
        let state = self.get();
        let attempt = self.attempt();
        let mut status = match state {
            TransportState::Connecting | TransportState::Disconnected if attempt > 0 => {
                format!("{state} (attempt {attempt})")
            }
            _ => state.to_string(),
        };
        if self.is_polling() {
            status.push_str(", polling");
        }
        status
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
