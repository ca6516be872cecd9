// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Periodic driver for poll-style connectors.
//!
//! Api connectors get a recurring tick derived from their `poll_interval`;
//! continuous connectors (syslog, agent) and passive ones (webhook, file)
//! are started once by the lifecycle manager and have no tick here.

use crate::manager::{LifecycleManager, ManagerError};
use parking_lot::Mutex;
use sentra_core::{Clock, ConnectorId, ConnectorType};
use sentra_connectors::CycleOutcome;
use sentra_storage::ConnectorStore;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Tick period for a poll interval: exact below one minute, minute
/// granularity above.
fn cadence(poll_secs: u64) -> Duration {
    if poll_secs < 60 {
        Duration::from_secs(poll_secs.max(1))
    } else {
        Duration::from_secs(poll_secs.div_ceil(60) * 60)
    }
}

pub struct Scheduler<C: Clock> {
    manager: LifecycleManager<C>,
    connectors: Arc<dyn ConnectorStore>,
    tasks: Mutex<HashMap<i64, JoinHandle<()>>>,
    cancel: CancellationToken,
}

impl<C: Clock> Scheduler<C> {
    pub fn new(manager: LifecycleManager<C>, connectors: Arc<dyn ConnectorStore>) -> Self {
        Self {
            manager,
            connectors,
            tasks: Mutex::new(HashMap::new()),
            cancel: CancellationToken::new(),
        }
    }

    /// Schedule every live connector.
    pub async fn start(&self) -> Result<(), ManagerError> {
        for id in self.manager.live_ids() {
            self.update_schedule(id).await?;
        }
        Ok(())
    }

    /// Idempotent cancel-then-reschedule for one connector.
    pub async fn update_schedule(&self, id: ConnectorId) -> Result<(), ManagerError> {
        if let Some(previous) = self.tasks.lock().remove(&id.0) {
            previous.abort();
        }

        let Some(record) = self.connectors.get(id).await? else {
            return Ok(());
        };
        if record.connector_type != ConnectorType::Api {
            // Continuous/passive connectors run from `start()` alone.
            return Ok(());
        }

        let poll_secs = record
            .configuration
            .get("poll_interval_secs")
            .and_then(serde_json::Value::as_u64)
            .unwrap_or(300);
        let every = cadence(poll_secs);
        info!(connector = %id, ?every, "poll schedule installed");

        let manager = self.manager.clone();
        let cancel = self.cancel.clone();
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    _ = ticker.tick() => {
                        match manager.run_now(id).await {
                            Ok(CycleOutcome::Completed { events }) => {
                                debug!(connector = %id, events, "poll cycle complete");
                            }
                            Ok(CycleOutcome::Skipped) => {
                                debug!(connector = %id, "poll cycle skipped (breaker open)");
                            }
                            Ok(CycleOutcome::Idle) => {}
                            Err(e) => {
                                warn!(connector = %id, error = %e, "poll cycle failed");
                            }
                        }
                    }
                }
            }
        });
        self.tasks.lock().insert(id.0, task);
        Ok(())
    }

    /// Remove a connector's tick (disable/delete).
    pub fn remove(&self, id: ConnectorId) {
        if let Some(task) = self.tasks.lock().remove(&id.0) {
            task.abort();
        }
    }

    /// Bypass the schedule and run one cycle now.
    pub async fn run_now(&self, id: ConnectorId) -> Result<CycleOutcome, ManagerError> {
        self.manager.run_now(id).await
    }

    pub fn scheduled_ids(&self) -> Vec<ConnectorId> {
        self.tasks.lock().keys().map(|id| ConnectorId(*id)).collect()
    }

    /// Cancel all ticks. Connector stop is the manager's job.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        for (_, task) in self.tasks.lock().drain() {
            task.abort();
        }
    }
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
