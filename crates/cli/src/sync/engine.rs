// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Background sync engine.
//!
//! Ties the coordinator to the realtime channel manager: a flush loop drains
//! the queue on a timer and on demand, and a router applies remote change
//! notices and re-flushes whenever the event stream reconnects.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::coordinator::SyncCoordinator;
use crate::error::{Error, Result};
use crate::realtime::{
    ChannelManager, Notice, RealtimeHandle, RealtimeSettings, Subscription, TransportState,
    Watermarks,
};

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Time between automatic flushes.
    pub flush_interval: Duration,
    /// Channels subscribed for the lifetime of the engine.
    pub channels: Vec<String>,
    pub realtime: RealtimeSettings,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            flush_interval: Duration::from_secs(30),
            channels: Vec::new(),
            realtime: RealtimeSettings::default(),
        }
    }
}

/// Requests for the flush loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineCommand {
    FlushNow,
    /// The server is reachable again.
    ConnectivityRegained,
}

/// A running engine. Call [`SyncEngine::shutdown`] to stop it.
pub struct SyncEngine {
    commands: mpsc::UnboundedSender<EngineCommand>,
    realtime: RealtimeHandle,
    cancel: CancellationToken,
    subscriptions: Vec<Subscription>,
    tasks: Vec<JoinHandle<()>>,
}

impl SyncEngine {
    /// Start the flush loop and the channel manager, and subscribe to the
    /// configured channels.
    pub async fn start(coordinator: Arc<SyncCoordinator>, config: EngineConfig) -> Result<Self> {
        let cancel = CancellationToken::new();
        let watermarks = Watermarks::from_pairs(coordinator.watermarks()?);

        let manager = ChannelManager::spawn(
            Arc::clone(coordinator.transport()),
            coordinator.transport_state(),
            config.realtime.clone(),
            watermarks,
            cancel.child_token(),
        );
        let ChannelManager {
            handle: realtime,
            notices,
            task: manager_task,
        } = manager;

        let (command_tx, command_rx) = mpsc::unbounded_channel();

        let flush_task = tokio::spawn(flush_loop(
            Arc::clone(&coordinator),
            command_rx,
            config.flush_interval,
            cancel.child_token(),
        ));
        let router_task = tokio::spawn(route_notices(
            Arc::clone(&coordinator),
            notices,
            command_tx.clone(),
            cancel.child_token(),
        ));

        let mut engine = SyncEngine {
            commands: command_tx,
            realtime,
            cancel,
            subscriptions: Vec::new(),
            tasks: vec![manager_task, flush_task, router_task],
        };

        for channel in &config.channels {
            let subscribed = engine.realtime.subscribe(channel).await;
            match subscribed {
                Ok(subscription) => engine.subscriptions.push(subscription),
                Err(e) => {
                    engine.shutdown().await;
                    return Err(e);
                }
            }
        }
        info!(channels = config.channels.len(), "sync engine started");
        Ok(engine)
    }

    /// Ask the flush loop to run now.
    pub fn request_flush(&self) -> Result<()> {
        self.commands
            .send(EngineCommand::FlushNow)
            .map_err(|_| Error::Runtime("sync engine stopped".to_string()))
    }

    /// Handle for additional channel subscriptions.
    pub fn handle(&self) -> RealtimeHandle {
        self.realtime.clone()
    }

    /// Stop all tasks and wait for them to finish.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        self.subscriptions.clear();
        for task in self.tasks.drain(..) {
            if let Err(e) = task.await {
                warn!(error = %e, "engine task ended abnormally");
            }
        }
        info!("sync engine stopped");
    }
}

async fn flush_loop(
    coordinator: Arc<SyncCoordinator>,
    mut commands: mpsc::UnboundedReceiver<EngineCommand>,
    interval: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        let reason = tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => "interval",
            command = commands.recv() => match command {
                Some(EngineCommand::FlushNow) => "requested",
                Some(EngineCommand::ConnectivityRegained) => "connectivity regained",
                None => break,
            },
        };
        let cancelled = tokio::select! {
            _ = cancel.cancelled() => true,
            _ = flush_once(&coordinator, reason) => false,
        };
        if cancelled {
            match coordinator.release_abandoned() {
                Ok(0) => {}
                Ok(released) => debug!(released, "flush cancelled, operations returned to pending"),
                Err(e) => warn!(error = %e, "failed to release cancelled operations"),
            }
            break;
        }
    }
}

async fn flush_once(coordinator: &SyncCoordinator, reason: &str) {
    match coordinator.is_session_expired() {
        Ok(false) => {}
        Ok(true) => {
            debug!(reason, "session expired, not flushing");
            return;
        }
        Err(e) => {
            warn!(error = %e, "failed to read session state");
            return;
        }
    }

    match coordinator.try_flush().await {
        Ok(Some(report)) => debug!(
            reason,
            completed = report.completed,
            failed = report.failed,
            still_pending = report.still_pending,
            "flush"
        ),
        Ok(None) => {}
        Err(Error::SessionExpired) => {
            warn!("session expired; refresh the token and run 'skiff resume'")
        }
        Err(e) => warn!(error = %e, reason, "flush failed"),
    }
}

async fn route_notices(
    coordinator: Arc<SyncCoordinator>,
    mut notices: mpsc::UnboundedReceiver<Notice>,
    commands: mpsc::UnboundedSender<EngineCommand>,
    cancel: CancellationToken,
) {
    loop {
        let notice = tokio::select! {
            _ = cancel.cancelled() => break,
            notice = notices.recv() => match notice {
                Some(notice) => notice,
                None => break,
            },
        };

        match notice {
            Notice::Event(event) => {
                if let Err(e) = coordinator.persist_watermark(&event.channel, event.id) {
                    warn!(channel = %event.channel, error = %e, "failed to persist watermark");
                }
                let applied = tokio::select! {
                    _ = cancel.cancelled() => break,
                    applied = coordinator.handle_remote_change(&event) => applied,
                };
                match applied {
                    Ok(conflicts) if !conflicts.is_empty() => {
                        info!(channel = %event.channel, count = conflicts.len(), "conflicts detected");
                    }
                    Ok(_) => {}
                    Err(e) => warn!(
                        channel = %event.channel,
                        id = event.id,
                        error = %e,
                        "failed to apply remote change"
                    ),
                }
            }
            Notice::StateChanged(TransportState::Connected) => {
                let _ = commands.send(EngineCommand::ConnectivityRegained);
            }
            Notice::StateChanged(_) => {
                debug!(status = %coordinator.transport_state().status_string(), "transport state");
            }
        }
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
