// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Capped exponential backoff with equal jitter.
//!
//! For attempt `n` the nominal delay is `d = min(base * 2^n, cap)`. Below the
//! cap the actual delay is `d/2 + jitter` with `jitter` in `0..=d/2`; at the
//! cap it is exactly `cap`. Each delay is therefore at least as long as any
//! delay the previous attempt could have produced.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Source of randomness for spreading retries.
pub trait JitterSource: Send + Sync {
    /// Returns a value in `0..=bound_ms`.
    fn jitter_ms(&self, bound_ms: u64) -> u64;
}

/// Jitter derived from the sub-second part of the system clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemJitter;

impl JitterSource for SystemJitter {
    fn jitter_ms(&self, bound_ms: u64) -> u64 {
        if bound_ms == 0 {
            return 0;
        }
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| u64::from(d.subsec_nanos()))
            .unwrap_or(0);
        nanos % (bound_ms + 1)
    }
}

/// Always returns the same fraction of the bound. Used in tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedJitter {
    /// Percentage of the bound, clamped to `0..=100`.
    pub percent: u64,
}

impl FixedJitter {
    pub fn none() -> Self {
        FixedJitter { percent: 0 }
    }

    pub fn full() -> Self {
        FixedJitter { percent: 100 }
    }
}

impl JitterSource for FixedJitter {
    fn jitter_ms(&self, bound_ms: u64) -> u64 {
        bound_ms.saturating_mul(self.percent.min(100)) / 100
    }
}

/// Backoff parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    pub base: Duration,
    pub cap: Duration,
}

impl Backoff {
    pub fn new(base: Duration, cap: Duration) -> Self {
        Backoff {
            base,
            cap: cap.max(base),
        }
    }

    /// The un-jittered delay for `attempt`: `min(base * 2^attempt, cap)`.
    pub fn nominal(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base
            .checked_mul(factor)
            .map_or(self.cap, |d| d.min(self.cap))
    }

    /// The delay before retry number `attempt` (zero-based).
    pub fn delay(&self, attempt: u32, jitter: &dyn JitterSource) -> Duration {
        let nominal = self.nominal(attempt);
        if nominal >= self.cap {
            return self.cap;
        }
        let nominal_ms = u64::try_from(nominal.as_millis()).unwrap_or(u64::MAX);
        let half = nominal_ms / 2;
        let spread = nominal_ms - half;
        Duration::from_millis(half + jitter.jitter_ms(spread).min(spread))
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Backoff::new(Duration::from_secs(1), Duration::from_secs(60))
    }
}

#[cfg(test)]
#[path = "backoff_tests.rs"]
mod tests;
