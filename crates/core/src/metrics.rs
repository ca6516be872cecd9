// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Rolling per-connector metrics.
//!
//! Counters accumulate into a fixed 60-second window. Recording uses atomic
//! increments; the rollover on snapshot holds a lock only long enough to swap
//! the window out.

use crate::clock::Clock;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

const WINDOW: Duration = Duration::from_secs(60);

/// Snapshot handed to subscribers and written back onto the connector record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConnectorMetrics {
    /// Events counted in the last completed 60-second window.
    pub events_per_minute: u64,
    /// Errors counted in the last completed 60-second window.
    pub errors_per_minute: u64,
    /// Mean latency over the last completed window, if any was recorded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg_latency_ms: Option<f64>,
    pub uptime_secs: u64,
    pub events_total: u64,
    pub errors_total: u64,
    /// Messages dropped under back-pressure.
    pub shed_total: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_event_at: Option<DateTime<Utc>>,
}

#[derive(Default)]
struct WindowCounts {
    events: u64,
    errors: u64,
    latency_sum_ms: u64,
    latency_samples: u64,
}

impl WindowCounts {
    fn avg_latency(&self) -> Option<f64> {
        (self.latency_samples > 0)
            .then(|| self.latency_sum_ms as f64 / self.latency_samples as f64)
    }
}

struct WindowState {
    started_at: Instant,
    current: WindowCounts,
    completed: WindowCounts,
}

/// Rolling 60-second metrics window for one connector.
pub struct RollingWindow<C: Clock> {
    clock: C,
    started: Instant,
    events_total: AtomicU64,
    errors_total: AtomicU64,
    shed_total: AtomicU64,
    last_event_ms: AtomicU64,
    window: Mutex<WindowState>,
}

impl<C: Clock> RollingWindow<C> {
    pub fn new(clock: C) -> Self {
        let now = clock.now();
        Self {
            clock,
            started: now,
            events_total: AtomicU64::new(0),
            errors_total: AtomicU64::new(0),
            shed_total: AtomicU64::new(0),
            last_event_ms: AtomicU64::new(0),
            window: Mutex::new(WindowState {
                started_at: now,
                current: WindowCounts::default(),
                completed: WindowCounts::default(),
            }),
        }
    }

    pub fn record_event(&self) {
        self.events_total.fetch_add(1, Ordering::Relaxed);
        self.last_event_ms.store(self.clock.epoch_ms(), Ordering::Relaxed);
        self.rotated().current.events += 1;
    }

    pub fn record_error(&self) {
        self.errors_total.fetch_add(1, Ordering::Relaxed);
        self.rotated().current.errors += 1;
    }

    pub fn record_latency(&self, latency: Duration) {
        let mut window = self.rotated();
        window.current.latency_sum_ms += latency.as_millis() as u64;
        window.current.latency_samples += 1;
    }

    /// Count a message dropped under back-pressure.
    pub fn record_shed(&self) {
        self.shed_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Read the current snapshot, rotating the window first if it elapsed.
    pub fn snapshot(&self) -> ConnectorMetrics {
        let window = self.rotated();
        let last_ms = self.last_event_ms.load(Ordering::Relaxed);
        ConnectorMetrics {
            events_per_minute: window.completed.events,
            errors_per_minute: window.completed.errors,
            avg_latency_ms: window.completed.avg_latency(),
            uptime_secs: self.clock.now().duration_since(self.started).as_secs(),
            events_total: self.events_total.load(Ordering::Relaxed),
            errors_total: self.errors_total.load(Ordering::Relaxed),
            shed_total: self.shed_total.load(Ordering::Relaxed),
            last_event_at: (last_ms > 0).then(|| {
                chrono::TimeZone::timestamp_millis_opt(&Utc, last_ms as i64)
                    .single()
                    .unwrap_or_else(Utc::now)
            }),
        }
    }

    /// Lock the window, completing it first when 60 s have elapsed.
    fn rotated(&self) -> parking_lot::MutexGuard<'_, WindowState> {
        let mut window = self.window.lock();
        let now = self.clock.now();
        if now.duration_since(window.started_at) >= WINDOW {
            window.completed = std::mem::take(&mut window.current);
            window.started_at = now;
        }
        window
    }
}

#[cfg(test)]
#[path = "metrics_tests.rs"]
mod tests;
