// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared connector state: status machine, error budget, outbound channels,
//! rolling metrics, and run cancellation.
//!
//! One harness lives inside each concrete connector. The lifecycle manager
//! holds the matching [`ConnectorRx`] and never touches the connector's
//! internals directly.

use parking_lot::Mutex;
use sentra_core::{
    Clock, ConnectorId, ConnectorMetrics, ConnectorStatus, RawEvent, RollingWindow, StatusChange,
};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Consecutive cycle-level failures before auto-disable.
pub const AUTO_DISABLE_THRESHOLD: u32 = 5;

/// Buffered capacity of the raw-event channel; overflow is shed.
const EVENT_CHANNEL_CAPACITY: usize = 1_024;

/// Typed receivers for everything a connector emits.
pub struct ConnectorRx {
    pub events: mpsc::Receiver<RawEvent>,
    pub errors: mpsc::UnboundedReceiver<(ConnectorId, String)>,
    pub status: mpsc::UnboundedReceiver<StatusChange>,
    pub metrics: mpsc::UnboundedReceiver<(ConnectorId, ConnectorMetrics)>,
}

/// Shared state embedded in every concrete connector.
pub struct Harness<C: Clock> {
    id: ConnectorId,
    name: String,
    clock: C,
    status: Mutex<ConnectorStatus>,
    consecutive_errors: AtomicU32,
    window: RollingWindow<C>,
    cancel: Mutex<CancellationToken>,
    tx_events: mpsc::Sender<RawEvent>,
    tx_errors: mpsc::UnboundedSender<(ConnectorId, String)>,
    tx_status: mpsc::UnboundedSender<StatusChange>,
    tx_metrics: mpsc::UnboundedSender<(ConnectorId, ConnectorMetrics)>,
}

impl<C: Clock> Harness<C> {
    pub fn new(id: ConnectorId, name: impl Into<String>, clock: C) -> (Self, ConnectorRx) {
        let (tx_events, rx_events) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let (tx_errors, rx_errors) = mpsc::unbounded_channel();
        let (tx_status, rx_status) = mpsc::unbounded_channel();
        let (tx_metrics, rx_metrics) = mpsc::unbounded_channel();
        let harness = Self {
            id,
            name: name.into(),
            window: RollingWindow::new(clock.clone()),
            clock,
            status: Mutex::new(ConnectorStatus::Disabled),
            consecutive_errors: AtomicU32::new(0),
            cancel: Mutex::new(CancellationToken::new()),
            tx_events,
            tx_errors,
            tx_status,
            tx_metrics,
        };
        let rx = ConnectorRx {
            events: rx_events,
            errors: rx_errors,
            status: rx_status,
            metrics: rx_metrics,
        };
        (harness, rx)
    }

    pub fn id(&self) -> ConnectorId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn status(&self) -> ConnectorStatus {
        *self.status.lock()
    }

    /// Transition status, emitting a change notification. Transitions to
    /// `Active` reset the consecutive-error counter. Same-status calls are
    /// no-ops.
    pub fn set_status(&self, to: ConnectorStatus, message: Option<String>) {
        let from = {
            let mut status = self.status.lock();
            let from = *status;
            if from == to {
                return;
            }
            *status = to;
            from
        };
        if to == ConnectorStatus::Active {
            self.consecutive_errors.store(0, Ordering::Relaxed);
        }
        debug!(connector = %self.id, %from, %to, "status change");
        let _ = self.tx_status.send(StatusChange { connector_id: self.id, from, to, message });
    }

    pub fn consecutive_errors(&self) -> u32 {
        self.consecutive_errors.load(Ordering::Relaxed)
    }

    /// Record a cycle-level failure: bump the error budget, emit the error,
    /// and auto-disable once the budget is exhausted. Returns `true` when
    /// this failure tripped auto-disable.
    pub fn record_failure(&self, message: impl Into<String>) -> bool {
        let message = message.into();
        self.window.record_error();
        let _ = self.tx_errors.send((self.id, message.clone()));

        let count = self.consecutive_errors.fetch_add(1, Ordering::Relaxed) + 1;
        if count >= AUTO_DISABLE_THRESHOLD {
            warn!(
                connector = %self.id,
                consecutive = count,
                "error budget exhausted; auto-disabling"
            );
            self.cancel_all();
            self.set_status(
                ConnectorStatus::Disabled,
                Some(format!("auto-disabled after {count} consecutive errors: {message}")),
            );
            return true;
        }
        self.set_status(ConnectorStatus::Error, Some(message));
        false
    }

    /// Record a successful cycle: reset the budget and restore `Active`.
    pub fn record_success(&self) {
        self.consecutive_errors.store(0, Ordering::Relaxed);
        if self.status() == ConnectorStatus::Error {
            self.set_status(ConnectorStatus::Active, None);
        }
    }

    /// Emit a raw event. Under back-pressure the event is shed (never blocks
    /// ingest I/O); returns whether it was delivered.
    pub fn emit(&self, event: RawEvent) -> bool {
        match self.tx_events.try_send(event) {
            Ok(()) => {
                self.window.record_event();
                true
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.window.record_shed();
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }

    /// Record a non-fatal per-record error (parse failure, dropped line).
    pub fn record_soft_error(&self, message: impl Into<String>) {
        self.window.record_error();
        let _ = self.tx_errors.send((self.id, message.into()));
    }

    pub fn record_latency(&self, latency: Duration) {
        self.window.record_latency(latency);
    }

    pub fn metrics(&self) -> ConnectorMetrics {
        self.window.snapshot()
    }

    /// Push a metrics snapshot to subscribers.
    pub fn publish_metrics(&self) {
        let _ = self.tx_metrics.send((self.id, self.metrics()));
    }

    /// Fresh cancellation token for a new run; cancels any previous run.
    pub fn begin_run(&self) -> CancellationToken {
        let mut cancel = self.cancel.lock();
        cancel.cancel();
        *cancel = CancellationToken::new();
        cancel.clone()
    }

    /// Token covering the current run.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.lock().clone()
    }

    /// Cancel all in-flight work for this connector.
    pub fn cancel_all(&self) {
        self.cancel.lock().cancel();
    }
}

#[cfg(test)]
#[path = "harness_tests.rs"]
mod tests;
