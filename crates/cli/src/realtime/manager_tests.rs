// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Tests for the realtime channel manager.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use super::*;
use crate::sync::test_helpers::{MockStream, MockTransport};
use serde_json::Value;
use similar_asserts::assert_eq;

fn settings(max_stream_attempts: u32) -> RealtimeSettings {
    RealtimeSettings {
        reconnect: Backoff::new(Duration::from_millis(10), Duration::from_millis(50)),
        max_stream_attempts,
        poll_interval: Duration::from_millis(10),
        request_timeout: Duration::from_secs(1),
    }
}

fn event(channel: &str, id: i64) -> ChannelEvent {
    ChannelEvent::new(channel, id, Value::Null)
}

fn spawn(
    transport: &Arc<MockTransport>,
    settings: RealtimeSettings,
    watermarks: Watermarks,
) -> (ChannelManager, Arc<SharedTransportState>, CancellationToken) {
    let state = Arc::new(SharedTransportState::new());
    let cancel = CancellationToken::new();
    let manager = ChannelManager::spawn(
        Arc::clone(transport) as Arc<dyn RecordTransport>,
        Arc::clone(&state),
        settings,
        watermarks,
        cancel.clone(),
    );
    (manager, state, cancel)
}

async fn next_event(subscription: &mut Subscription) -> ChannelEvent {
    tokio::time::timeout(Duration::from_secs(2), subscription.recv())
        .await
        .expect("timed out waiting for event")
        .expect("subscription closed")
}

async fn wait_for(mut condition: impl FnMut() -> bool) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached");
}

#[tokio::test]
async fn handover_from_stream_to_polling_deduplicates() {
    let transport = Arc::new(MockTransport::new());
    let (stream, feed, _sent) = MockStream::new();
    transport.push_stream(Ok(stream));
    transport.push_poll_batch("chat", vec![event("chat", 6), event("chat", 7)]);
    for id in [4, 5, 6] {
        feed.send(ServerMessage::event(event("chat", id))).unwrap();
    }
    // The stream ends after these messages; polling takes over.
    drop(feed);

    let watermarks = Watermarks::from_pairs([("chat".to_string(), 5)]);
    let (manager, state, cancel) = spawn(&transport, settings(1), watermarks);
    let mut sub = manager.handle.subscribe("chat").await.unwrap();

    assert_eq!(next_event(&mut sub).await.id, 6);
    assert_eq!(next_event(&mut sub).await.id, 7);
    assert!(state.is_polling());

    cancel.cancel();
    manager.task.await.unwrap();
}

#[tokio::test]
async fn subscribe_announces_cursor_from_watermark() {
    let transport = Arc::new(MockTransport::new());
    let (stream, _feed, sent) = MockStream::new();
    transport.push_stream(Ok(stream));

    let watermarks = Watermarks::from_pairs([("chat".to_string(), 5)]);
    let (manager, state, cancel) = spawn(&transport, settings(3), watermarks);
    let _sub = manager.handle.subscribe("chat").await.unwrap();

    wait_for(|| state.get() == TransportState::Connected).await;
    assert_eq!(
        sent.lock().unwrap().first().cloned(),
        Some(ClientMessage::subscribe(vec![ChannelCursor::new("chat", 5)]))
    );
    assert!(!state.is_polling());

    cancel.cancel();
    manager.task.await.unwrap();
    assert_eq!(state.get(), TransportState::Idle);
}

#[tokio::test]
async fn unavailable_stream_falls_back_to_polling() {
    let transport = Arc::new(MockTransport::new());
    transport.push_poll_batch("tasks", vec![event("tasks", 1), event("tasks", 2)]);

    let (manager, state, cancel) = spawn(&transport, settings(3), Watermarks::new());
    let mut sub = manager.handle.subscribe("tasks").await.unwrap();

    assert_eq!(next_event(&mut sub).await.id, 1);
    assert_eq!(next_event(&mut sub).await.id, 2);
    assert!(state.is_polling());
    assert_eq!(state.get(), TransportState::Idle);

    cancel.cancel();
    manager.task.await.unwrap();
}

#[tokio::test]
async fn reconnect_reannounces_subscriptions() {
    let transport = Arc::new(MockTransport::new());
    let (first, first_feed, first_sent) = MockStream::new();
    let (second, _second_feed, second_sent) = MockStream::new();
    transport.push_stream(Ok(first));
    transport.push_stream(Err(TransportError::Network("refused".into())));
    transport.push_stream(Ok(second));

    let (mut manager, _state, cancel) = spawn(&transport, settings(10), Watermarks::new());
    let _sub = manager.handle.subscribe("chat").await.unwrap();

    wait_for(|| !first_sent.lock().unwrap().is_empty()).await;
    drop(first_feed);
    wait_for(|| !second_sent.lock().unwrap().is_empty()).await;

    let expected = ClientMessage::subscribe(vec![ChannelCursor::new("chat", 0)]);
    assert_eq!(first_sent.lock().unwrap()[0], expected);
    assert_eq!(second_sent.lock().unwrap()[0], expected);

    let mut connected = 0;
    while let Ok(notice) = manager.notices.try_recv() {
        if notice == Notice::StateChanged(TransportState::Connected) {
            connected += 1;
        }
    }
    assert_eq!(connected, 2);

    cancel.cancel();
    manager.task.await.unwrap();
}

#[tokio::test]
async fn last_release_unsubscribes() {
    let transport = Arc::new(MockTransport::new());
    let (stream, _feed, sent) = MockStream::new();
    transport.push_stream(Ok(stream));

    let (manager, state, cancel) = spawn(&transport, settings(3), Watermarks::new());
    let a = manager.handle.subscribe("chat").await.unwrap();
    let b = manager.handle.subscribe("chat").await.unwrap();
    wait_for(|| state.get() == TransportState::Connected).await;

    drop(a);
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(sent.lock().unwrap().len(), 1);

    drop(b);
    wait_for(|| sent.lock().unwrap().len() == 2).await;
    assert_eq!(
        sent.lock().unwrap()[1],
        ClientMessage::unsubscribe(vec!["chat".to_string()])
    );

    cancel.cancel();
    manager.task.await.unwrap();
}

#[tokio::test]
async fn streamed_events_become_notices() {
    let transport = Arc::new(MockTransport::new());
    let (stream, feed, _sent) = MockStream::new();
    transport.push_stream(Ok(stream));

    let (mut manager, _state, cancel) = spawn(&transport, settings(3), Watermarks::new());
    let mut sub = manager.handle.subscribe("chat").await.unwrap();

    feed.send(ServerMessage::event(event("chat", 3))).unwrap();
    feed.send(ServerMessage::event(event("other", 9))).unwrap();
    feed.send(ServerMessage::event(event("chat", 3))).unwrap();
    feed.send(ServerMessage::event(event("chat", 4))).unwrap();

    assert_eq!(next_event(&mut sub).await.id, 3);
    assert_eq!(next_event(&mut sub).await.id, 4);

    let mut events = Vec::new();
    while let Ok(notice) = manager.notices.try_recv() {
        if let Notice::Event(e) = notice {
            events.push((e.channel, e.id));
        }
    }
    assert_eq!(events, vec![("chat".to_string(), 3), ("chat".to_string(), 4)]);

    cancel.cancel();
    manager.task.await.unwrap();
}
