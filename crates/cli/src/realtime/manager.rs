// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Realtime channel manager.
//!
//! One task owns the event stream, the subscription registry and the
//! watermarks. Consumers talk to it through [`RealtimeHandle`]; everything it
//! learns goes out as [`Notice`]s.
//!
//! ```text
//!   Idle ──► Connecting ──► Connected
//!              ▲   │            │
//!              │   ▼            ▼
//!              └─ Disconnected ◄┘   (reconnect after backoff)
//! ```
//!
//! When the stream is unavailable, or fails `max_stream_attempts` times in a
//! row, every subscribed channel gets its own poll task. Pollers are stopped
//! as soon as the stream reaches `Connected` again.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use sk_core::protocol::{ChannelCursor, ChannelEvent, ClientMessage, ServerMessage};
use sk_core::{Backoff, JitterSource, SystemJitter};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::registry::ChannelRegistry;
use super::state::{SharedTransportState, TransportState};
use super::watermark::Watermarks;
use crate::error::{Error, Result};
use crate::sync::{with_timeout, EventStream, RecordTransport, TransportError, TransportResult};

/// Tunables for the channel manager.
#[derive(Debug, Clone)]
pub struct RealtimeSettings {
    /// Delay between reconnect attempts.
    pub reconnect: Backoff,
    /// Consecutive stream failures before falling back to polling.
    pub max_stream_attempts: u32,
    pub poll_interval: Duration,
    /// Deadline for the handshake and each poll.
    pub request_timeout: Duration,
}

impl Default for RealtimeSettings {
    fn default() -> Self {
        RealtimeSettings {
            reconnect: Backoff::new(Duration::from_secs(1), Duration::from_secs(30)),
            max_stream_attempts: 5,
            poll_interval: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Something the manager wants the rest of the engine to know.
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    /// A new event, already deduplicated against the channel watermark.
    Event(ChannelEvent),
    StateChanged(TransportState),
}

enum Command {
    Subscribe {
        channel: String,
        reply: oneshot::Sender<broadcast::Receiver<ChannelEvent>>,
    },
    Release {
        channel: String,
    },
}

struct PollResult {
    channel: String,
    events: Vec<ChannelEvent>,
}

/// Cloneable handle for subscribing to channels.
#[derive(Clone)]
pub struct RealtimeHandle {
    commands: mpsc::UnboundedSender<Command>,
}

impl RealtimeHandle {
    /// Subscribe to `channel`. Dropping the returned handle unsubscribes.
    pub async fn subscribe(&self, channel: &str) -> Result<Subscription> {
        let (reply, receiver) = oneshot::channel();
        self.commands
            .send(Command::Subscribe {
                channel: channel.to_string(),
                reply,
            })
            .map_err(|_| Error::Runtime("realtime manager stopped".to_string()))?;
        let events = receiver
            .await
            .map_err(|_| Error::Runtime("realtime manager stopped".to_string()))?;
        Ok(Subscription {
            channel: channel.to_string(),
            events,
            commands: self.commands.clone(),
        })
    }
}

/// One consumer's interest in a channel.
pub struct Subscription {
    channel: String,
    events: broadcast::Receiver<ChannelEvent>,
    commands: mpsc::UnboundedSender<Command>,
}

impl Subscription {
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Next event on the channel, or `None` once the manager has stopped.
    pub async fn recv(&mut self) -> Option<ChannelEvent> {
        loop {
            match self.events.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(channel = %self.channel, skipped, "subscriber lagging");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let _ = self.commands.send(Command::Release {
            channel: self.channel.clone(),
        });
    }
}

/// Running manager task.
pub struct ChannelManager {
    pub handle: RealtimeHandle,
    pub notices: mpsc::UnboundedReceiver<Notice>,
    pub task: JoinHandle<()>,
}

impl ChannelManager {
    /// Spawn the manager task. It stops when `cancel` fires.
    pub fn spawn(
        transport: Arc<dyn RecordTransport>,
        state: Arc<SharedTransportState>,
        settings: RealtimeSettings,
        watermarks: Watermarks,
        cancel: CancellationToken,
    ) -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (notice_tx, notice_rx) = mpsc::unbounded_channel();
        let (poll_tx, poll_rx) = mpsc::unbounded_channel();

        let actor = Actor {
            transport,
            state,
            settings,
            registry: ChannelRegistry::new(),
            watermarks,
            commands: command_rx,
            notices: notice_tx,
            cancel,
            stream: None,
            failures: 0,
            stream_unavailable: false,
            reconnect_at: None,
            pollers: HashMap::new(),
            poll_tx,
            poll_rx,
            jitter: Box::new(SystemJitter),
        };
        let task = tokio::spawn(actor.run());

        ChannelManager {
            handle: RealtimeHandle {
                commands: command_tx,
            },
            notices: notice_rx,
            task,
        }
    }
}

struct Actor {
    transport: Arc<dyn RecordTransport>,
    state: Arc<SharedTransportState>,
    settings: RealtimeSettings,
    registry: ChannelRegistry,
    watermarks: Watermarks,
    commands: mpsc::UnboundedReceiver<Command>,
    notices: mpsc::UnboundedSender<Notice>,
    cancel: CancellationToken,
    stream: Option<Box<dyn EventStream>>,
    /// Consecutive failed connection attempts.
    failures: u32,
    /// Set once the server reports it has no event stream.
    stream_unavailable: bool,
    reconnect_at: Option<Instant>,
    pollers: HashMap<String, CancellationToken>,
    poll_tx: mpsc::UnboundedSender<PollResult>,
    poll_rx: mpsc::UnboundedReceiver<PollResult>,
    jitter: Box<dyn JitterSource>,
}

async fn next_message(
    stream: &mut Option<Box<dyn EventStream>>,
) -> TransportResult<Option<ServerMessage>> {
    match stream {
        Some(stream) => stream.recv().await,
        None => std::future::pending().await,
    }
}

impl Actor {
    async fn run(mut self) {
        debug!("realtime manager started");
        loop {
            let reconnect_at = self.reconnect_at;
            tokio::select! {
                _ = self.cancel.cancelled() => break,

                Some(command) = self.commands.recv() => self.handle_command(command).await,

                message = next_message(&mut self.stream) => self.handle_message(message),

                _ = tokio::time::sleep_until(reconnect_at.unwrap_or_else(Instant::now)),
                    if reconnect_at.is_some() => self.connect().await,

                Some(result) = self.poll_rx.recv() => self.handle_poll(result),
            }
        }
        self.shutdown().await;
    }

    fn set_state(&self, state: TransportState) {
        if self.state.get() != state {
            self.state.set(state);
            debug!(%state, "transport state changed");
            let _ = self.notices.send(Notice::StateChanged(state));
        }
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Subscribe { channel, reply } => {
                let (events, first) = self.registry.subscribe(&channel);
                let _ = reply.send(events);
                if first {
                    self.announce(&channel).await;
                }
            }
            Command::Release { channel } => {
                if self.registry.release(&channel) {
                    self.retire(&channel).await;
                }
            }
        }
    }

    /// Start delivery for a newly subscribed channel.
    async fn announce(&mut self, channel: &str) {
        if let Some(stream) = self.stream.as_mut() {
            let cursor = ChannelCursor::new(channel, self.watermarks.cursor(channel));
            if let Err(e) = stream.send(ClientMessage::subscribe(vec![cursor])).await {
                self.connection_failed(e);
            }
        } else if self.stream_unavailable || self.state.is_polling() {
            self.state.set_polling(true);
            self.spawn_poller(channel);
        } else if self.reconnect_at.is_none() {
            self.reconnect_at = Some(Instant::now());
        }
    }

    /// Stop delivery for a channel nobody listens to any more.
    async fn retire(&mut self, channel: &str) {
        if let Some(token) = self.pollers.remove(channel) {
            token.cancel();
        }
        if let Some(stream) = self.stream.as_mut() {
            if let Err(e) = stream
                .send(ClientMessage::unsubscribe(vec![channel.to_string()]))
                .await
            {
                self.connection_failed(e);
            }
        }
    }

    async fn connect(&mut self) {
        self.reconnect_at = None;
        if self.registry.is_empty() {
            self.set_state(TransportState::Idle);
            return;
        }

        self.set_state(TransportState::Connecting);
        let opened = tokio::select! {
            _ = self.cancel.cancelled() => return,
            opened = with_timeout(
                self.settings.request_timeout,
                self.transport.open_event_stream(),
            ) => opened,
        };

        match opened {
            Ok(mut stream) => {
                // The server forgets subscriptions between connections.
                let cursors = self
                    .registry
                    .channels()
                    .into_iter()
                    .map(|channel| {
                        let last_id = self.watermarks.cursor(&channel);
                        ChannelCursor::new(channel, last_id)
                    })
                    .collect();
                match stream.send(ClientMessage::subscribe(cursors)).await {
                    Ok(()) => {
                        self.stream = Some(stream);
                        self.failures = 0;
                        self.state.set_attempt(0);
                        self.stop_polling();
                        self.set_state(TransportState::Connected);
                        info!(channels = self.registry.channels().len(), "event stream connected");
                    }
                    Err(e) => self.connection_failed(e),
                }
            }
            Err(TransportError::Unavailable(reason)) => {
                info!(%reason, "event stream unavailable, polling instead");
                self.stream_unavailable = true;
                self.set_state(TransportState::Idle);
                self.start_polling();
            }
            Err(e) => self.connection_failed(e),
        }
    }

    fn connection_failed(&mut self, error: TransportError) {
        self.stream = None;
        self.failures = self.failures.saturating_add(1);
        self.state.set_attempt(self.failures);
        self.set_state(TransportState::Disconnected);

        if self.failures >= self.settings.max_stream_attempts.max(1) && !self.state.is_polling() {
            warn!(attempts = self.failures, "event stream keeps failing, polling instead");
            self.start_polling();
        }

        let delay = self
            .settings
            .reconnect
            .delay(self.failures - 1, self.jitter.as_ref());
        warn!(error = %error, attempt = self.failures, ?delay, "event stream lost");
        self.reconnect_at = Some(Instant::now() + delay);
    }

    fn handle_message(&mut self, message: TransportResult<Option<ServerMessage>>) {
        match message {
            Ok(Some(ServerMessage::Event(event))) => self.deliver(event),
            Ok(Some(ServerMessage::Subscribed { channels })) => {
                debug!(?channels, "subscriptions confirmed");
            }
            Ok(Some(ServerMessage::Pong { .. })) => {}
            Ok(Some(ServerMessage::Error { message })) => {
                warn!(%message, "server reported an error");
            }
            Ok(None) => self.connection_failed(TransportError::Network("stream closed".into())),
            Err(e) => self.connection_failed(e),
        }
    }

    fn handle_poll(&mut self, result: PollResult) {
        // A stale batch from a poller stopped by a reconnect.
        if !self.pollers.contains_key(&result.channel) {
            return;
        }
        for event in result.events {
            self.deliver(event);
        }
    }

    fn deliver(&mut self, event: ChannelEvent) {
        if !self.registry.contains(&event.channel) {
            return;
        }
        if !self.watermarks.admit(&event) {
            debug!(channel = %event.channel, id = event.id, "dropping duplicate event");
            return;
        }
        self.registry.publish(&event);
        let _ = self.notices.send(Notice::Event(event));
    }

    fn start_polling(&mut self) {
        self.state.set_polling(true);
        for channel in self.registry.channels() {
            self.spawn_poller(&channel);
        }
    }

    fn stop_polling(&mut self) {
        for (_, token) in self.pollers.drain() {
            token.cancel();
        }
        self.state.set_polling(false);
    }

    fn spawn_poller(&mut self, channel: &str) {
        if self.pollers.contains_key(channel) {
            return;
        }
        let token = self.cancel.child_token();
        let transport = Arc::clone(&self.transport);
        let results = self.poll_tx.clone();
        let interval = self.settings.poll_interval;
        let timeout = self.settings.request_timeout;
        let mut cursor = self.watermarks.cursor(channel);
        let name = channel.to_string();
        let poller_token = token.clone();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = poller_token.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                let polled = tokio::select! {
                    _ = poller_token.cancelled() => break,
                    polled = with_timeout(timeout, transport.poll_since(&name, cursor)) => polled,
                };
                match polled {
                    Ok(events) if events.is_empty() => {}
                    Ok(events) => {
                        cursor = events.iter().map(|e| e.id).fold(cursor, i64::max);
                        let batch = PollResult {
                            channel: name.clone(),
                            events,
                        };
                        if results.send(batch).is_err() {
                            break;
                        }
                    }
                    Err(e) => debug!(channel = %name, error = %e, "poll failed"),
                }
            }
            debug!(channel = %name, "poller stopped");
        });

        debug!(channel, "polling started");
        self.pollers.insert(channel.to_string(), token);
    }

    async fn shutdown(&mut self) {
        self.stop_polling();
        if let Some(mut stream) = self.stream.take() {
            let _ = stream.close().await;
        }
        self.state.set_attempt(0);
        self.set_state(TransportState::Idle);
        debug!("realtime manager stopped");
    }
}

#[cfg(test)]
#[path = "manager_tests.rs"]
mod tests;
