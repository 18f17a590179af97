// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Per-channel last-seen-id tracking.

use std::collections::HashMap;

use sk_core::protocol::ChannelEvent;

/// Highest event id delivered per channel.
///
/// Events at or below a channel's watermark are duplicates or stragglers
/// from a transport handover and are dropped.
#[derive(Debug, Clone, Default)]
pub struct Watermarks {
    last: HashMap<String, i64>,
}

impl Watermarks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed from persisted `(channel, last_id)` pairs.
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (String, i64)>,
    {
        Watermarks {
            last: pairs.into_iter().collect(),
        }
    }

    pub fn get(&self, channel: &str) -> Option<i64> {
        self.last.get(channel).copied()
    }

    /// The id to resume `channel` from; `0` if nothing was seen yet.
    pub fn cursor(&self, channel: &str) -> i64 {
        self.get(channel).unwrap_or(0)
    }

    /// Returns true and advances the watermark if `event` is new.
    pub fn admit(&mut self, event: &ChannelEvent) -> bool {
        match self.last.get_mut(&event.channel) {
            Some(last) if event.id <= *last => false,
            Some(last) => {
                *last = event.id;
                true
            }
            None => {
                self.last.insert(event.channel.clone(), event.id);
                true
            }
        }
    }
}

#[cfg(test)]
#[path = "watermark_tests.rs"]
mod tests;
