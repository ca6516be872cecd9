// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Sink capabilities injected into connectors at construction.
//!
//! Connectors never reach back into the lifecycle manager; alerts they
//! synthesize and batches they defer go out through these seams.

use async_trait::async_trait;
use sentra_core::{AgentEntry, Alert, ConnectorId, IngestJob};

/// Publishes connector-synthesized alerts (agent liveness, agent event
/// policy). The daemon implementation persists the alert, notifies, and
/// triggers the insight/incident collaborators for high/critical severities.
#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn publish(&self, alert: Alert);
}

/// Hands oversized record batches to the work queue.
///
/// `Err(())` means the queue is full, which the caller must treat as a
/// cycle-level failure.
pub trait JobSink: Send + Sync {
    fn enqueue(&self, job: IngestJob) -> Result<(), ()>;
}

/// Persists registered agents on behalf of an agent connector.
#[async_trait]
pub trait AgentDirectory: Send + Sync {
    async fn save(&self, connector_id: ConnectorId, agent: AgentEntry);
}

/// Sink for contexts with no downstream wiring (tests, detached runs).
pub struct NullAlertSink;

#[async_trait]
impl AlertSink for NullAlertSink {
    async fn publish(&self, _alert: Alert) {}
}

#[async_trait]
impl AgentDirectory for NullAlertSink {
    async fn save(&self, _connector_id: ConnectorId, _agent: AgentEntry) {}
}
