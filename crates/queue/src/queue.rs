// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Work queue implementation: bands, worker loops, history rings.

use crate::{JobHandler, QueueConfig, QueueError};
use parking_lot::Mutex;
use sentra_core::{Clock, ConnectorId, IngestJob, JobPriority};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Point-in-time queue statistics.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct QueueMetrics {
    pub pending: usize,
    pub in_flight: usize,
    pub completed_total: u64,
    pub failed_total: u64,
    /// Mean handler duration over retained successful jobs, if any.
    pub avg_processing_ms: Option<f64>,
}

struct FinishedJob {
    job: IngestJob,
    finished_at_ms: u64,
    duration_ms: u64,
    error: Option<String>,
}

#[derive(Default)]
struct Bands {
    critical: VecDeque<IngestJob>,
    high: VecDeque<IngestJob>,
    medium: VecDeque<IngestJob>,
    low: VecDeque<IngestJob>,
}

impl Bands {
    fn band(&mut self, priority: JobPriority) -> &mut VecDeque<IngestJob> {
        match priority {
            JobPriority::Critical => &mut self.critical,
            JobPriority::High => &mut self.high,
            JobPriority::Medium => &mut self.medium,
            JobPriority::Low => &mut self.low,
        }
    }

    fn len(&self) -> usize {
        self.critical.len() + self.high.len() + self.medium.len() + self.low.len()
    }

    /// Highest non-empty band first, FIFO within the band.
    fn pop(&mut self) -> Option<IngestJob> {
        self.critical
            .pop_front()
            .or_else(|| self.high.pop_front())
            .or_else(|| self.medium.pop_front())
            .or_else(|| self.low.pop_front())
    }
}

struct QueueInner<C: Clock> {
    config: QueueConfig,
    clock: C,
    bands: Mutex<Bands>,
    wake: Notify,
    cancel: CancellationToken,
    started: AtomicBool,
    in_flight: AtomicUsize,
    completed_total: AtomicU64,
    failed_total: AtomicU64,
    completed: Mutex<VecDeque<FinishedJob>>,
    failed: Mutex<VecDeque<FinishedJob>>,
}

/// Process-wide priority work queue. Shared by reference (`Arc`).
pub struct WorkQueue<C: Clock> {
    inner: Arc<QueueInner<C>>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl<C: Clock> WorkQueue<C> {
    pub fn new(config: QueueConfig, clock: C) -> Self {
        Self {
            inner: Arc::new(QueueInner {
                config,
                clock,
                bands: Mutex::new(Bands::default()),
                wake: Notify::new(),
                cancel: CancellationToken::new(),
                started: AtomicBool::new(false),
                in_flight: AtomicUsize::new(0),
                completed_total: AtomicU64::new(0),
                failed_total: AtomicU64::new(0),
                completed: Mutex::new(VecDeque::new()),
                failed: Mutex::new(VecDeque::new()),
            }),
            handles: Mutex::new(Vec::new()),
        }
    }

    /// Enqueue a job. Fails when the pending count is at capacity or the
    /// queue has been shut down.
    pub fn enqueue(&self, job: IngestJob) -> Result<(), QueueError> {
        if self.inner.cancel.is_cancelled() {
            return Err(QueueError::Stopped);
        }
        {
            let mut bands = self.inner.bands.lock();
            let pending = bands.len();
            if pending >= self.inner.config.capacity {
                return Err(QueueError::Full { pending });
            }
            debug!(job = %job.id, priority = %job.priority, "job enqueued");
            bands.band(job.priority).push_back(job);
        }
        self.inner.wake.notify_one();
        Ok(())
    }

    /// Spawn the worker loops and the cleanup sweep. Idempotent.
    pub fn start(&self, handler: Arc<dyn JobHandler>) {
        if self.inner.started.swap(true, Ordering::SeqCst) {
            return;
        }
        let mut handles = self.handles.lock();
        for worker in 0..self.inner.config.workers {
            let inner = self.inner.clone();
            let handler = handler.clone();
            handles.push(tokio::spawn(async move {
                worker_loop(inner, handler, worker).await;
            }));
        }
        let inner = self.inner.clone();
        handles.push(tokio::spawn(async move {
            cleanup_loop(inner).await;
        }));
    }

    /// Cancel workers and pending waits. In-flight handler calls are
    /// abandoned, not awaited.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();
        self.inner.wake.notify_waiters();
        let handles = std::mem::take(&mut *self.handles.lock());
        for handle in handles {
            handle.abort();
            let _ = handle.await;
        }
    }

    /// Move retry-eligible failed jobs back to pending, optionally scoped to
    /// one connector. Returns how many were requeued.
    pub fn retry_failed(&self, connector_id: Option<ConnectorId>) -> usize {
        let mut failed = self.inner.failed.lock();
        let mut keep = VecDeque::with_capacity(failed.len());
        let mut requeued = 0;
        for entry in failed.drain(..) {
            let matches = connector_id.map_or(true, |id| entry.job.connector_id == id);
            if matches {
                let mut bands = self.inner.bands.lock();
                if bands.len() < self.inner.config.capacity {
                    let mut job = entry.job;
                    job.attempts = 0;
                    bands.band(job.priority).push_back(job);
                    requeued += 1;
                    continue;
                }
            }
            // Non-matching, or the queue is full again: stays dead-lettered.
            keep.push_back(entry);
        }
        *failed = keep;
        if requeued > 0 {
            self.inner.wake.notify_waiters();
        }
        requeued
    }

    pub fn metrics(&self) -> QueueMetrics {
        let completed = self.inner.completed.lock();
        let samples = completed.len();
        let avg = (samples > 0).then(|| {
            completed.iter().map(|f| f.duration_ms as f64).sum::<f64>() / samples as f64
        });
        QueueMetrics {
            pending: self.inner.bands.lock().len(),
            in_flight: self.inner.in_flight.load(Ordering::Relaxed),
            completed_total: self.inner.completed_total.load(Ordering::Relaxed),
            failed_total: self.inner.failed_total.load(Ordering::Relaxed),
            avg_processing_ms: avg,
        }
    }

    /// Failed jobs currently in the dead-letter ring (newest last).
    pub fn failed_jobs(&self) -> Vec<IngestJob> {
        self.inner.failed.lock().iter().map(|f| f.job.clone()).collect()
    }

    /// Sweep completed/failed entries older than the retention window.
    pub fn cleanup(&self) -> usize {
        sweep(&self.inner)
    }
}

fn sweep<C: Clock>(inner: &QueueInner<C>) -> usize {
    let cutoff = inner
        .clock
        .epoch_ms()
        .saturating_sub(inner.config.retention.as_millis() as u64);
    let mut removed = 0;
    for ring in [&inner.completed, &inner.failed] {
        let mut ring = ring.lock();
        let before = ring.len();
        ring.retain(|f| f.finished_at_ms >= cutoff);
        removed += before - ring.len();
    }
    removed
}

async fn worker_loop<C: Clock>(inner: Arc<QueueInner<C>>, handler: Arc<dyn JobHandler>, worker: usize) {
    loop {
        let job = inner.bands.lock().pop();
        let Some(mut job) = job else {
            tokio::select! {
                _ = inner.cancel.cancelled() => return,
                _ = inner.wake.notified() => continue,
            }
        };

        inner.in_flight.fetch_add(1, Ordering::Relaxed);
        let started = inner.clock.now();
        let result = tokio::select! {
            _ = inner.cancel.cancelled() => {
                inner.in_flight.fetch_sub(1, Ordering::Relaxed);
                return;
            }
            result = handler.handle(&job) => result,
        };
        let duration_ms = inner.clock.now().duration_since(started).as_millis() as u64;
        inner.in_flight.fetch_sub(1, Ordering::Relaxed);

        match result {
            Ok(()) => {
                inner.completed_total.fetch_add(1, Ordering::Relaxed);
                push_ring(
                    &inner.completed,
                    FinishedJob {
                        job,
                        finished_at_ms: inner.clock.epoch_ms(),
                        duration_ms,
                        error: None,
                    },
                    inner.config.history_capacity,
                );
            }
            Err(error) => {
                job.attempts += 1;
                job.last_error = Some(error.clone());
                if job.retryable() {
                    debug!(
                        job = %job.id,
                        attempt = job.attempts,
                        worker,
                        "job failed; scheduling retry"
                    );
                    let delay = inner.config.base_delay * job.attempts;
                    let retry_inner = inner.clone();
                    tokio::spawn(async move {
                        tokio::select! {
                            _ = retry_inner.cancel.cancelled() => {}
                            _ = tokio::time::sleep(delay) => {
                                // Re-enter at the band tail; capacity is not
                                // re-checked for retries so a full queue
                                // cannot strand an owed attempt.
                                retry_inner.bands.lock().band(job.priority).push_back(job);
                                retry_inner.wake.notify_one();
                            }
                        }
                    });
                } else {
                    warn!(job = %job.id, error = %error, "job exhausted retries; dead-lettered");
                    inner.failed_total.fetch_add(1, Ordering::Relaxed);
                    push_ring(
                        &inner.failed,
                        FinishedJob {
                            job,
                            finished_at_ms: inner.clock.epoch_ms(),
                            duration_ms,
                            error: Some(error),
                        },
                        inner.config.history_capacity,
                    );
                }
            }
        }
    }
}

fn push_ring(ring: &Mutex<VecDeque<FinishedJob>>, entry: FinishedJob, capacity: usize) {
    let mut ring = ring.lock();
    if ring.len() >= capacity {
        ring.pop_front();
    }
    ring.push_back(entry);
}

async fn cleanup_loop<C: Clock>(inner: Arc<QueueInner<C>>) {
    let mut ticker = tokio::time::interval(inner.config.cleanup_interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // The first tick fires immediately; skip it.
    ticker.tick().await;
    loop {
        tokio::select! {
            _ = inner.cancel.cancelled() => return,
            _ = ticker.tick() => {
                let removed = sweep(&inner);
                if removed > 0 {
                    debug!(removed, "queue history swept");
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
