// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lifecycle manager: the authoritative map of live connectors.
//!
//! Bootstraps from active store rows, reconciles on change notifications,
//! fans connector output out to the store / normalizer / realtime bus, and
//! runs the periodic health-and-metrics sweep.

use crate::realtime::{RealtimeBus, RealtimePush};
use crate::sinks::InsightHooks;
use axum::Router;
use parking_lot::{Mutex, RwLock};
use sentra_connectors::{build_connector, Connector, ConnectorDeps, ConnectorRx, CycleOutcome};
use sentra_core::{
    Clock, ConnectorId, ConnectorRecord, ConnectorStatus, ConnectorType, Parse, RawEvent,
};
use sentra_normalize::{NormalizeContext, Normalizer};
use sentra_queue::WorkQueue;
use sentra_storage::{
    ChangeFeed, ConnectorLogEntry, ConnectorStore, IngestStore, LogLevel, StorageError,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum ManagerError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("connector {id}: {message}")]
    Connector { id: ConnectorId, message: String },
}

struct Live {
    connector: Arc<dyn Connector>,
    connector_type: ConnectorType,
    pump: JoinHandle<()>,
}

/// Per-connector context captured for the pump task.
#[derive(Clone)]
struct PumpCtx {
    id: ConnectorId,
    name: String,
    vendor: String,
    organization_id: sentra_core::OrganizationId,
}

struct ManagerInner<C: Clock> {
    clock: C,
    deps: ConnectorDeps<C>,
    connectors: Arc<dyn ConnectorStore>,
    ingest: Arc<dyn IngestStore>,
    normalizer: Arc<Normalizer>,
    queue: Arc<WorkQueue<C>>,
    realtime: RealtimeBus,
    hooks: Arc<dyn InsightHooks>,
    parse_mode: Parse,
    live: Mutex<HashMap<i64, Live>>,
    agent_router: Arc<RwLock<Option<Router>>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    cancel: CancellationToken,
}

/// Owns the live connector set; everything else talks to it by reference.
pub struct LifecycleManager<C: Clock> {
    inner: Arc<ManagerInner<C>>,
}

impl<C: Clock> LifecycleManager<C> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        clock: C,
        deps: ConnectorDeps<C>,
        connectors: Arc<dyn ConnectorStore>,
        ingest: Arc<dyn IngestStore>,
        normalizer: Arc<Normalizer>,
        queue: Arc<WorkQueue<C>>,
        realtime: RealtimeBus,
        hooks: Arc<dyn InsightHooks>,
        parse_mode: Parse,
    ) -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                clock,
                deps,
                connectors,
                ingest,
                normalizer,
                queue,
                realtime,
                hooks,
                parse_mode,
                live: Mutex::new(HashMap::new()),
                agent_router: Arc::new(RwLock::new(None)),
                tasks: Mutex::new(Vec::new()),
                cancel: CancellationToken::new(),
            }),
        }
    }

    /// Slot the HTTP host reads the current agent sub-router from.
    pub fn agent_router_slot(&self) -> Arc<RwLock<Option<Router>>> {
        self.inner.agent_router.clone()
    }

    pub fn realtime(&self) -> RealtimeBus {
        self.inner.realtime.clone()
    }

    /// Load all active rows and bring their connectors up. Individual
    /// failures mark the row `error` and do not abort the bootstrap.
    pub async fn bootstrap(&self) -> Result<usize, ManagerError> {
        let records = self.inner.connectors.load_active().await?;
        let total = records.len();
        let mut started = 0usize;
        for record in records {
            if record.status == ConnectorStatus::Disabled {
                debug!(connector = %record.id, "disabled row skipped at bootstrap");
                continue;
            }
            match self.spawn_connector(&record).await {
                Ok(()) => started += 1,
                Err(e) => {
                    warn!(connector = %record.id, error = %e, "bootstrap failed for connector");
                    let _ = self
                        .inner
                        .connectors
                        .update_status(record.id, ConnectorStatus::Error, Some(e.to_string()))
                        .await;
                }
            }
        }
        info!(started, total, "connector bootstrap complete");
        Ok(started)
    }

    async fn spawn_connector(&self, record: &ConnectorRecord) -> Result<(), ManagerError> {
        let built = build_connector(record, &self.inner.deps, self.inner.parse_mode)
            .map_err(|e| ManagerError::Connector { id: record.id, message: e.to_string() })?;

        if let Some(router) = built.agent_router {
            *self.inner.agent_router.write() = Some(router);
        }

        let ctx = PumpCtx {
            id: record.id,
            name: record.name.clone(),
            vendor: record.vendor.clone(),
            organization_id: record.organization_id,
        };
        let pump_inner = self.inner.clone();
        let pump = tokio::spawn(pump(pump_inner, ctx, built.rx));

        if let Err(e) = built.connector.start().await {
            pump.abort();
            let message = e.to_string();
            let _ = self
                .inner
                .connectors
                .update_status(record.id, ConnectorStatus::Error, Some(message.clone()))
                .await;
            return Err(ManagerError::Connector { id: record.id, message });
        }

        let _ = self
            .inner
            .connectors
            .update_status(record.id, ConnectorStatus::Active, None)
            .await;
        self.inner.live.lock().insert(
            record.id.0,
            Live {
                connector: built.connector,
                connector_type: record.connector_type,
                pump,
            },
        );
        Ok(())
    }

    /// Apply one change notification: reload the row and converge the
    /// runtime object to it.
    pub async fn reconcile(&self, id: ConnectorId) -> Result<(), ManagerError> {
        let record = self.inner.connectors.get(id).await?;
        let is_live = self.inner.live.lock().contains_key(&id.0);

        match record {
            None => {
                if is_live {
                    info!(connector = %id, "row gone; stopping connector");
                    self.stop_and_remove(id).await;
                }
            }
            Some(record) if !record.is_active || record.status == ConnectorStatus::Disabled => {
                if is_live {
                    info!(connector = %id, "row deactivated; stopping connector");
                    self.stop_and_remove(id).await;
                }
            }
            Some(record) => {
                if is_live {
                    // Configuration may have changed: recreate from scratch.
                    info!(connector = %id, "row changed; recreating connector");
                    self.stop_and_remove(id).await;
                }
                self.spawn_connector(&record).await?;
            }
        }
        Ok(())
    }

    async fn stop_and_remove(&self, id: ConnectorId) {
        let removed = self.inner.live.lock().remove(&id.0);
        let Some(live) = removed else { return };
        live.connector.stop().await;
        if live.connector_type == ConnectorType::Agent {
            *self.inner.agent_router.write() = None;
        }
        // Give the pump a beat to persist the final status change, then
        // reap it.
        tokio::task::yield_now().await;
        live.pump.abort();
        let _ = self
            .inner
            .connectors
            .update_status(id, ConnectorStatus::Disabled, None)
            .await;
    }

    /// Subscribe to store change notifications.
    pub fn run_reconcile_loop(&self, feed: &ChangeFeed) {
        let mut rx = feed.subscribe();
        let manager = Self { inner: self.inner.clone() };
        let cancel = self.inner.cancel.clone();
        self.inner.tasks.lock().push(tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    changed = rx.recv() => match changed {
                        Ok(id) => {
                            if let Err(e) = manager.reconcile(id).await {
                                warn!(connector = %id, error = %e, "reconcile failed");
                            }
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(missed)) => {
                            warn!(missed, "change feed lagged");
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Closed) => return,
                    }
                }
            }
        }));
    }

    /// Periodic health-and-metrics sweep.
    pub fn run_sweep_loop(&self, every: std::time::Duration) {
        let manager = Self { inner: self.inner.clone() };
        let cancel = self.inner.cancel.clone();
        self.inner.tasks.lock().push(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    _ = ticker.tick() => manager.sweep_once().await,
                }
            }
        }));
    }

    /// One sweep pass: write throughput back to rows, surface metrics, and
    /// flag unhealthy connectors.
    pub async fn sweep_once(&self) {
        let live: Vec<(ConnectorId, Arc<dyn Connector>)> = self
            .inner
            .live
            .lock()
            .iter()
            .map(|(id, live)| (ConnectorId(*id), live.connector.clone()))
            .collect();

        for (id, connector) in live {
            let metrics = connector.metrics();
            let _ = self
                .inner
                .connectors
                .record_throughput(id, metrics.events_per_minute, metrics.last_event_at)
                .await;
            self.inner.realtime.publish(RealtimePush::Metrics { connector_id: id, metrics });

            let health = connector.health_check().await;
            if !health.healthy && connector.status().is_running() {
                warn!(connector = %id, message = %health.message, "health check failed");
                let _ = self
                    .inner
                    .connectors
                    .update_status(id, ConnectorStatus::Error, Some(health.message.clone()))
                    .await;
                self.inner.realtime.publish(RealtimePush::Status {
                    connector_id: id,
                    status: ConnectorStatus::Error,
                    message: Some(health.message),
                });
            }
        }

        let queue = self.inner.queue.metrics();
        self.inner.realtime.publish(RealtimePush::Queue {
            pending: queue.pending,
            in_flight: queue.in_flight,
            completed_total: queue.completed_total,
            failed_total: queue.failed_total,
        });
    }

    pub fn get(&self, id: ConnectorId) -> Option<Arc<dyn Connector>> {
        self.inner.live.lock().get(&id.0).map(|l| l.connector.clone())
    }

    pub fn live_ids(&self) -> Vec<ConnectorId> {
        self.inner.live.lock().keys().map(|id| ConnectorId(*id)).collect()
    }

    /// Execute one poll cycle immediately, bypassing the schedule.
    pub async fn run_now(&self, id: ConnectorId) -> Result<CycleOutcome, ManagerError> {
        let connector = self
            .get(id)
            .ok_or(ManagerError::Connector { id, message: "not live".into() })?;
        let outcome = connector
            .run_once()
            .await
            .map_err(|e| ManagerError::Connector { id, message: e.to_string() })?;
        if matches!(outcome, CycleOutcome::Completed { .. }) {
            let _ = self.inner.connectors.record_success(id, self.inner.clock.now_utc()).await;
        }
        Ok(outcome)
    }

    /// Stop everything: loops first, then each connector within its grace
    /// period.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();
        for task in self.inner.tasks.lock().drain(..) {
            task.abort();
        }
        let ids = self.live_ids();
        for id in ids {
            self.stop_and_remove(id).await;
        }
    }
}

impl<C: Clock> Clone for LifecycleManager<C> {
    fn clone(&self) -> Self {
        Self { inner: self.inner.clone() }
    }
}

/// Consume a connector's typed channels until they close.
async fn pump<C: Clock>(inner: Arc<ManagerInner<C>>, ctx: PumpCtx, mut rx: ConnectorRx) {
    loop {
        tokio::select! {
            event = rx.events.recv() => match event {
                Some(event) => handle_event(&inner, &ctx, event).await,
                None => return,
            },
            error = rx.errors.recv() => match error {
                Some((id, message)) => {
                    let _ = inner.ingest.append_log(ConnectorLogEntry::new(
                        id,
                        LogLevel::Error,
                        message,
                        inner.clock.now_utc(),
                    )).await;
                }
                None => return,
            },
            change = rx.status.recv() => match change {
                Some(change) => {
                    let _ = inner.connectors.update_status(
                        change.connector_id,
                        change.to,
                        change.message.clone(),
                    ).await;
                    let _ = inner.ingest.append_log(ConnectorLogEntry::new(
                        change.connector_id,
                        if change.to == ConnectorStatus::Error { LogLevel::Warn } else { LogLevel::Info },
                        format!("status {} -> {}", change.from, change.to),
                        inner.clock.now_utc(),
                    )).await;
                    inner.realtime.publish(RealtimePush::Status {
                        connector_id: change.connector_id,
                        status: change.to,
                        message: change.message,
                    });
                }
                None => return,
            },
            metrics = rx.metrics.recv() => match metrics {
                Some((id, metrics)) => {
                    inner.realtime.publish(RealtimePush::Metrics { connector_id: id, metrics });
                }
                None => return,
            },
        }
    }
}

/// Fan one raw event out: persist, normalize into an alert/intel pair, push
/// realtime, and append a log row.
async fn handle_event<C: Clock>(inner: &Arc<ManagerInner<C>>, ctx: &PumpCtx, event: RawEvent) {
    if let Err(e) = inner.ingest.insert_raw_event(&event).await {
        warn!(event = %event.id, error = %e, "raw event insert failed");
    }

    let input = normalization_input(&event);
    let normalize_ctx = NormalizeContext {
        vendor: ctx.vendor.clone(),
        connector_name: ctx.name.clone(),
        organization_id: ctx.organization_id,
    };
    if let Some(normalized) = inner.normalizer.normalize(&input, &normalize_ctx).await {
        if let Some(mut alert) = normalized.alert {
            alert.metadata.insert("connectorId".into(), json!(ctx.id.0));
            alert.metadata.insert("eventId".into(), json!(event.id));
            match inner.ingest.insert_alert(&alert).await {
                Ok(()) => {
                    if alert.severity.is_actionable() {
                        inner.hooks.on_actionable_alert(&alert).await;
                    }
                }
                Err(e) => warn!(event = %event.id, error = %e, "alert insert failed"),
            }
        }
        if let Some(intel) = normalized.intel {
            if let Err(e) = inner.ingest.insert_intel(&intel).await {
                warn!(event = %event.id, error = %e, "intel insert failed");
            }
        }
    }

    inner.realtime.publish(RealtimePush::Event {
        connector_id: event.connector_id,
        event_id: event.id.clone(),
        source: event.source.clone(),
        severity: event.severity.to_string(),
        message: event.message.clone(),
    });

    let _ = inner
        .ingest
        .append_log(ConnectorLogEntry::new(
            event.connector_id,
            LogLevel::Info,
            format!("event {} from {}", event.id, event.source),
            inner.clock.now_utc(),
        ))
        .await;
}

/// The vendor-shaped payload to normalize for a raw event: the api record,
/// the webhook payload, or a synthesized view of the event itself.
fn normalization_input(event: &RawEvent) -> Value {
    if let Some(record) = event.raw_data.get("record") {
        return record.clone();
    }
    if let Some(payload) = event.raw_data.get("payload") {
        return payload.clone();
    }
    json!({
        "message": event.message,
        "severity": event.severity.to_string(),
        "source": event.source,
        "raw_data": Value::Object(event.raw_data.clone()),
    })
}

#[cfg(test)]
#[path = "manager_tests.rs"]
mod tests;
