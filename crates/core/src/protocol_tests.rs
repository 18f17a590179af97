// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use serde_json::json;
use yare::parameterized;

#[parameterized(
    subscribe = { ClientMessage::subscribe(vec![ChannelCursor::new("tasks", 5)]) },
    unsubscribe = { ClientMessage::unsubscribe(vec!["tasks".into()]) },
    ping = { ClientMessage::ping(12345) },
)]
fn client_message_roundtrip(msg: ClientMessage) {
    let json = msg.to_json().unwrap();
    let parsed = ClientMessage::from_json(&json).unwrap();
    assert_eq!(msg, parsed);
}

#[parameterized(
    event = { ServerMessage::event(ChannelEvent::new("tasks", 7, json!({"collection": "tasks", "ids": [1]}))) },
    subscribed = { ServerMessage::Subscribed { channels: vec!["tasks".into()] } },
    pong = { ServerMessage::pong(9) },
    error = { ServerMessage::error("nope") },
)]
fn server_message_roundtrip(msg: ServerMessage) {
    let json = msg.to_json().unwrap();
    let parsed = ServerMessage::from_json(&json).unwrap();
    assert_eq!(msg, parsed);
}

#[test]
fn subscribe_wire_format() {
    let msg = ClientMessage::subscribe(vec![ChannelCursor::new("tasks", 3)]);
    let value: serde_json::Value = serde_json::from_str(&msg.to_json().unwrap()).unwrap();
    assert_eq!(
        value,
        json!({"type": "subscribe", "channels": [{"channel": "tasks", "last_id": 3}]})
    );
}

#[test]
fn event_wire_format_is_flat() {
    let parsed = ServerMessage::from_json(
        r#"{"type":"event","channel":"chat","id":12,"payload":{"body":"hi"}}"#,
    )
    .unwrap();
    assert_eq!(
        parsed,
        ServerMessage::event(ChannelEvent::new("chat", 12, json!({"body": "hi"})))
    );
}

#[test]
fn event_payload_defaults_to_null() {
    let event: ChannelEvent = serde_json::from_str(r#"{"channel":"chat","id":1}"#).unwrap();
    assert!(event.payload.is_null());
}

#[test]
fn changed_records_from_change_notice() {
    let event = ChannelEvent::new("tasks", 1, json!({"collection": "tasks", "ids": [4, 2]}));
    assert_eq!(
        event.changed_records(),
        Some(("tasks".to_string(), vec![4, 2]))
    );

    let chat = ChannelEvent::new("chat", 2, json!({"body": "hello"}));
    assert_eq!(chat.changed_records(), None);
}

#[test]
fn unknown_message_type_is_rejected() {
    assert!(ServerMessage::from_json(r#"{"type":"snapshot"}"#).is_err());
}
