// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Reference-counted channel subscriptions.

use std::collections::BTreeMap;

use sk_core::protocol::ChannelEvent;
use tokio::sync::broadcast;

/// Buffered events per channel before a slow consumer starts lagging.
const CHANNEL_CAPACITY: usize = 256;

struct Entry {
    refs: usize,
    sender: broadcast::Sender<ChannelEvent>,
}

/// Logical subscriptions multiplexed onto one physical connection.
///
/// Consumers of the same channel share one entry; the channel stays
/// subscribed until the last of them releases it.
#[derive(Default)]
pub struct ChannelRegistry {
    channels: BTreeMap<String, Entry>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a consumer. The flag is true when the channel is new.
    pub fn subscribe(&mut self, channel: &str) -> (broadcast::Receiver<ChannelEvent>, bool) {
        if let Some(entry) = self.channels.get_mut(channel) {
            entry.refs += 1;
            return (entry.sender.subscribe(), false);
        }
        let (sender, receiver) = broadcast::channel(CHANNEL_CAPACITY);
        self.channels
            .insert(channel.to_string(), Entry { refs: 1, sender });
        (receiver, true)
    }

    /// Drop a consumer. Returns true when it was the channel's last.
    pub fn release(&mut self, channel: &str) -> bool {
        let Some(entry) = self.channels.get_mut(channel) else {
            return false;
        };
        entry.refs = entry.refs.saturating_sub(1);
        if entry.refs == 0 {
            self.channels.remove(channel);
            return true;
        }
        false
    }

    /// Hand an event to every consumer of its channel.
    pub fn publish(&self, event: &ChannelEvent) -> usize {
        self.channels
            .get(&event.channel)
            .and_then(|entry| entry.sender.send(event.clone()).ok())
            .unwrap_or(0)
    }

    pub fn contains(&self, channel: &str) -> bool {
        self.channels.contains_key(channel)
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub fn channels(&self) -> Vec<String> {
        self.channels.keys().cloned().collect()
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
