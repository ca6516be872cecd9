// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The unified connector capability set.

use crate::error::ConnectorError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sentra_core::{ConnectorId, ConnectorMetrics, ConnectorStatus, ConnectorType};
use serde::Serialize;

/// Result of one poll cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Cycle ran; `events` raw events were emitted.
    Completed { events: usize },
    /// The circuit breaker is open; nothing was issued.
    Skipped,
    /// Not a poll-driven connector.
    Idle,
}

/// Outcome of `health_check()`.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub healthy: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    pub last_checked: DateTime<Utc>,
}

impl HealthReport {
    pub fn healthy(message: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self { healthy: true, message: message.into(), latency_ms: None, last_checked: at }
    }

    pub fn unhealthy(message: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self { healthy: false, message: message.into(), latency_ms: None, last_checked: at }
    }
}

/// Outcome of `test_connection()`.
#[derive(Debug, Clone, Serialize)]
pub struct TestOutcome {
    pub success: bool,
    pub message: String,
}

/// Capability set every connector exposes to the lifecycle manager.
///
/// State machine: `disabled → active → (paused ↔ active) → error → disabled`.
/// Five consecutive cycle-level failures auto-disable the connector; only an
/// external `start()` revives it.
#[async_trait]
pub trait Connector: Send + Sync {
    fn id(&self) -> ConnectorId;
    fn name(&self) -> &str;
    fn connector_type(&self) -> ConnectorType;
    fn status(&self) -> ConnectorStatus;
    fn metrics(&self) -> ConnectorMetrics;

    /// Bring the connector up. Failure transitions it to `error`.
    async fn start(&self) -> Result<(), ConnectorError>;

    /// Tear everything down within a bounded grace period: in-flight work is
    /// cancelled, not awaited. After return the connector holds no sockets,
    /// timers, or outbound requests.
    async fn stop(&self);

    /// Stop listeners/timers without tearing down configuration.
    async fn pause(&self) -> Result<(), ConnectorError>;

    async fn resume(&self) -> Result<(), ConnectorError>;

    /// Execute one poll cycle. Continuous connectors return `Idle`.
    async fn run_once(&self) -> Result<CycleOutcome, ConnectorError> {
        Ok(CycleOutcome::Idle)
    }

    async fn health_check(&self) -> HealthReport;

    async fn test_connection(&self) -> TestOutcome;

    /// Apply a configuration patch. The patch is re-validated as a whole;
    /// listeners restart as needed.
    async fn update_config(&self, patch: serde_json::Value) -> Result<(), ConnectorError>;
}
