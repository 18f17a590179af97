// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Realtime change notifications.
//!
//! Many logical subscriptions share one push stream. When streaming is not
//! possible each channel is polled on its own timer instead, and a per-channel
//! watermark keeps delivery ordered and free of duplicates across handovers.

mod manager;
mod registry;
mod state;
mod watermark;

pub use manager::{ChannelManager, Notice, RealtimeHandle, RealtimeSettings, Subscription};
pub use registry::ChannelRegistry;
pub use state::{SharedTransportState, TransportState};
pub use watermark::Watermarks;
