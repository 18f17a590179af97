// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Realtime notification protocol.
//!
//! The protocol is simple:
//! - Client subscribes to named channels, passing the last event id it has seen
//! - Server pushes events per channel with monotonically increasing ids
//! - The same [`ChannelEvent`] shape is returned by the polling endpoint

use serde::{Deserialize, Serialize};

/// A change notification on a channel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChannelEvent {
    pub channel: String,
    /// Per-channel monotonically increasing message id.
    pub id: i64,
    /// Opaque event body. Change notices carry `{"collection": .., "ids": [..]}`.
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl ChannelEvent {
    pub fn new(channel: impl Into<String>, id: i64, payload: serde_json::Value) -> Self {
        ChannelEvent {
            channel: channel.into(),
            id,
            payload,
        }
    }

    /// Extracts the `(collection, ids)` pair of a record change notice.
    pub fn changed_records(&self) -> Option<(String, Vec<i64>)> {
        let collection = self.payload.get("collection")?.as_str()?;
        let ids = self
            .payload
            .get("ids")?
            .as_array()?
            .iter()
            .filter_map(serde_json::Value::as_i64)
            .collect();
        Some((collection.to_string(), ids))
    }
}

/// A channel together with the last event id the client has seen.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChannelCursor {
    pub channel: String,
    pub last_id: i64,
}

impl ChannelCursor {
    pub fn new(channel: impl Into<String>, last_id: i64) -> Self {
        ChannelCursor {
            channel: channel.into(),
            last_id,
        }
    }
}

/// Messages sent from client to server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Subscribe to channels.
    ///
    /// Sent on every (re)connect, since the server does not keep
    /// subscriptions across connections.
    Subscribe { channels: Vec<ChannelCursor> },

    /// Stop receiving events for channels.
    Unsubscribe { channels: Vec<String> },

    /// Ping message for keepalive.
    Ping {
        /// Client-chosen ID echoed in Pong.
        id: u64,
    },
}

/// Messages sent from server to client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// A change notification.
    Event(ChannelEvent),

    /// Acknowledges a Subscribe.
    Subscribed { channels: Vec<String> },

    /// Pong response to client Ping.
    Pong {
        /// Echoed from the Ping message.
        id: u64,
    },

    /// Error message.
    Error {
        /// Human-readable error description.
        message: String,
    },
}

impl ClientMessage {
    pub fn subscribe(channels: Vec<ChannelCursor>) -> Self {
        ClientMessage::Subscribe { channels }
    }

    pub fn unsubscribe(channels: Vec<String>) -> Self {
        ClientMessage::Unsubscribe { channels }
    }

    pub fn ping(id: u64) -> Self {
        ClientMessage::Ping { id }
    }

    /// Serializes the message to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserializes the message from JSON.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

impl ServerMessage {
    pub fn event(event: ChannelEvent) -> Self {
        ServerMessage::Event(event)
    }

    pub fn pong(id: u64) -> Self {
        ServerMessage::Pong { id }
    }

    pub fn error(message: impl Into<String>) -> Self {
        ServerMessage::Error {
            message: message.into(),
        }
    }

    /// Serializes the message to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserializes the message from JSON.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
