// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-process event bus.
//!
//! Envelopes are published after each durable append. Delivery is
//! best-effort broadcast: subscribers that lag are skipped, and a real
//! file observer would re-deliver from the canonical events file. The
//! files are the source of truth, never the bus.

use ac_core::EventEnvelope;
use tokio::sync::broadcast;

const BUS_CAPACITY: usize = 256;

/// Cheap-to-clone broadcast bus for freshly appended envelopes.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<EventEnvelope>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(BUS_CAPACITY);
        Self { tx }
    }

    /// Non-blocking publish; silently drops when nobody is listening.
    pub fn publish(&self, envelope: &EventEnvelope) {
        let _ = self.tx.send(envelope.clone());
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
#[path = "bus_tests.rs"]
mod tests;
