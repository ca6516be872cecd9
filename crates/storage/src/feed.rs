// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Change-notification channel for connector rows.
//!
//! The external store publishes on `connectors_changed` whenever a row is
//! created, edited, or soft-deleted; the lifecycle manager reconciles the
//! named connector on each notification.

use sentra_core::ConnectorId;
use tokio::sync::broadcast;

/// Channel name shared with the external store.
pub const CONNECTORS_CHANGED: &str = "connectors_changed";

/// Broadcast feed of changed connector ids.
#[derive(Clone)]
pub struct ChangeFeed {
    tx: broadcast::Sender<ConnectorId>,
}

impl ChangeFeed {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ConnectorId> {
        self.tx.subscribe()
    }

    /// Publish a change. Lagging subscribers shed old notifications rather
    /// than blocking the publisher.
    pub fn notify(&self, id: ConnectorId) {
        let _ = self.tx.send(id);
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
#[path = "feed_tests.rs"]
mod tests;
