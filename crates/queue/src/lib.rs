// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! sentra-queue: bounded priority queue for normalization jobs.
//!
//! Four bands (critical > high > medium > low), FIFO within a band for
//! first-attempt enqueues; retried jobs re-enter at the band tail after a
//! linear-backoff delay. Delivery to the handler is at-least-once; the
//! handler is responsible for idempotence against the store.

mod queue;

pub use queue::{QueueMetrics, WorkQueue};

use async_trait::async_trait;
use sentra_core::IngestJob;
use std::time::Duration;
use thiserror::Error;

/// Default pending-job bound.
pub const DEFAULT_CAPACITY: usize = 10_000;
/// Default worker count.
pub const DEFAULT_WORKERS: usize = 5;

#[derive(Debug, Error)]
pub enum QueueError {
    /// Pending jobs exceed the configured bound.
    #[error("queue full: {pending} jobs pending")]
    Full { pending: usize },

    #[error("queue is shut down")]
    Stopped,
}

/// Processes one leased job. Failures are retried per the job's budget.
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn handle(&self, job: &IngestJob) -> Result<(), String>;
}

/// Tunables for the work queue.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    pub capacity: usize,
    pub workers: usize,
    /// Retry delay is `base_delay × attempts` (linear, no jitter).
    pub base_delay: Duration,
    /// Bounded history rings for finished jobs.
    pub history_capacity: usize,
    /// Completed/failed entries older than this are swept.
    pub retention: Duration,
    pub cleanup_interval: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            workers: DEFAULT_WORKERS,
            base_delay: Duration::from_secs(5),
            history_capacity: 1_000,
            retention: Duration::from_secs(24 * 60 * 60),
            cleanup_interval: Duration::from_secs(60 * 60),
        }
    }
}
