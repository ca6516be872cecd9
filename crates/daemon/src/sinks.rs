// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon-side implementations of the sink capabilities injected into
//! connectors, plus the queue job handler that normalizes deferred batches.

use crate::realtime::{RealtimeBus, RealtimePush};
use async_trait::async_trait;
use sentra_connectors::{AgentDirectory, AlertSink, JobSink};
use sentra_core::{AgentEntry, Alert, Clock, ConnectorId, IngestJob, OrganizationId};
use sentra_normalize::{NormalizeContext, Normalizer};
use sentra_queue::WorkQueue;
use sentra_storage::{AgentStore, ConnectorStore, IngestStore};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

/// External AI-insight generator and incident-linker collaborators, invoked
/// for high/critical alerts.
#[async_trait]
pub trait InsightHooks: Send + Sync {
    async fn on_actionable_alert(&self, alert: &Alert);
}

/// Default no-op collaborators.
pub struct NoHooks;

#[async_trait]
impl InsightHooks for NoHooks {
    async fn on_actionable_alert(&self, _alert: &Alert) {}
}

/// Bridges connectors to the work queue.
pub struct QueueJobSink<C: Clock>(pub Arc<WorkQueue<C>>);

impl<C: Clock> JobSink for QueueJobSink<C> {
    fn enqueue(&self, job: IngestJob) -> Result<(), ()> {
        self.0.enqueue(job).map_err(|e| {
            warn!(error = %e, "work queue rejected batch");
        })
    }
}

/// Persists connector-synthesized alerts and fans them out.
pub struct StoreAlertSink {
    pub ingest: Arc<dyn IngestStore>,
    pub realtime: RealtimeBus,
    pub hooks: Arc<dyn InsightHooks>,
}

#[async_trait]
impl AlertSink for StoreAlertSink {
    async fn publish(&self, alert: Alert) {
        if let Err(e) = self.ingest.insert_alert(&alert).await {
            warn!(error = %e, title = %alert.title, "failed to persist alert");
            return;
        }
        let connector_id = alert
            .metadata
            .get("connectorId")
            .and_then(Value::as_i64)
            .map(ConnectorId)
            .unwrap_or_default();
        self.realtime.publish(RealtimePush::Alert {
            connector_id,
            title: alert.title.clone(),
            severity: alert.severity,
        });
        if alert.severity.is_actionable() {
            self.hooks.on_actionable_alert(&alert).await;
        }
    }
}

/// Persists registered agents through the store seam.
pub struct StoreAgentDirectory(pub Arc<dyn AgentStore>);

#[async_trait]
impl AgentDirectory for StoreAgentDirectory {
    async fn save(&self, connector_id: ConnectorId, agent: AgentEntry) {
        if let Err(e) = self.0.upsert_agent(connector_id, agent).await {
            warn!(error = %e, "failed to persist agent entry");
        }
    }
}

/// Queue worker handler: normalizes one deferred batch and persists the
/// results. Idempotence against the store is carried by raw-event ids and
/// alert metadata, so at-least-once delivery is safe.
pub struct NormalizeJobHandler {
    pub normalizer: Arc<Normalizer>,
    pub connectors: Arc<dyn ConnectorStore>,
    pub ingest: Arc<dyn IngestStore>,
    pub hooks: Arc<dyn InsightHooks>,
}

#[async_trait]
impl sentra_queue::JobHandler for NormalizeJobHandler {
    async fn handle(&self, job: &IngestJob) -> Result<(), String> {
        let records: Vec<Value> = match &job.payload {
            Value::Array(items) => items.clone(),
            Value::Null => Vec::new(),
            other => vec![other.clone()],
        };

        let organization_id = self
            .connectors
            .get(job.connector_id)
            .await
            .map_err(|e| e.to_string())?
            .map(|record| record.organization_id)
            .unwrap_or(OrganizationId(0));

        let ctx = NormalizeContext {
            vendor: job.source.vendor.clone(),
            connector_name: job.source.connector_name.clone(),
            organization_id,
        };

        let mut stored = 0usize;
        let mut failures = 0usize;
        for record in &records {
            let Some(normalized) = self.normalizer.normalize(record, &ctx).await else {
                continue;
            };
            if let Some(alert) = normalized.alert {
                match self.ingest.insert_alert(&alert).await {
                    Ok(()) => {
                        stored += 1;
                        if alert.severity.is_actionable() {
                            self.hooks.on_actionable_alert(&alert).await;
                        }
                    }
                    Err(e) => {
                        // Per-record storage failure: the batch continues.
                        failures += 1;
                        warn!(error = %e, "alert insert failed");
                    }
                }
            }
            if let Some(intel) = normalized.intel {
                if let Err(e) = self.ingest.insert_intel(&intel).await {
                    failures += 1;
                    warn!(error = %e, "intel insert failed");
                }
            }
        }

        debug!(job = %job.id, records = records.len(), stored, failures, "batch normalized");
        if stored == 0 && failures > 0 {
            return Err(format!("all {failures} storable records failed to persist"));
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "sinks_tests.rs"]
mod tests;
