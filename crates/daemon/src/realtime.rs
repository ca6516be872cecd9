// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Realtime push channel surfaced to UIs over `/api/connectors/realtime`.
//!
//! A broadcast bus of JSON frames. Lagging subscribers shed frames; nothing
//! on the ingest path ever blocks on a slow UI.

use axum::extract::ws::{Message, WebSocket};
use sentra_core::{AlertSeverity, ConnectorId, ConnectorMetrics, ConnectorStatus, EventId};
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::debug;

/// One frame pushed to realtime subscribers.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum RealtimePush {
    Status {
        connector_id: ConnectorId,
        status: ConnectorStatus,
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    Metrics {
        connector_id: ConnectorId,
        metrics: ConnectorMetrics,
    },
    Event {
        connector_id: ConnectorId,
        event_id: EventId,
        source: String,
        severity: String,
        message: String,
    },
    Alert {
        connector_id: ConnectorId,
        title: String,
        severity: AlertSeverity,
    },
    Queue {
        pending: usize,
        in_flight: usize,
        completed_total: u64,
        failed_total: u64,
    },
}

/// Cheap-to-clone broadcast bus.
#[derive(Clone)]
pub struct RealtimeBus {
    tx: broadcast::Sender<RealtimePush>,
}

impl RealtimeBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn publish(&self, frame: RealtimePush) {
        let _ = self.tx.send(frame);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RealtimePush> {
        self.tx.subscribe()
    }

    /// Pump frames into one WebSocket until the client goes away.
    pub async fn serve_socket(&self, mut socket: WebSocket) {
        let mut rx = self.subscribe();
        loop {
            match rx.recv().await {
                Ok(frame) => {
                    let Ok(text) = serde_json::to_string(&frame) else { continue };
                    if socket.send(Message::Text(text.into())).await.is_err() {
                        return;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    debug!(missed, "realtime subscriber lagged; frames shed");
                }
                Err(broadcast::error::RecvError::Closed) => return,
            }
        }
    }
}

impl Default for RealtimeBus {
    fn default() -> Self {
        Self::new(512)
    }
}

#[cfg(test)]
#[path = "realtime_tests.rs"]
mod tests;
