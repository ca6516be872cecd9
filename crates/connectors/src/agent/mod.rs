// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent fleet connector: the server side of the host agents.
//!
//! Exposes a connector-scoped router (mounted by the HTTP host under
//! `/api/agents`): bootstrap registration gated by the master token,
//! bearer-authenticated heartbeat and event ingress, and informational
//! listings. A liveness sweep downgrades silent agents and synthesizes a
//! medium-severity alert per transition.

mod policy;

pub use policy::AgentDataEvent;

use crate::connector::{Connector, HealthReport, TestOutcome};
use crate::error::ConnectorError;
use crate::harness::{ConnectorRx, Harness};
use crate::sink::{AgentDirectory, AlertSink};
use async_trait::async_trait;
use axum::extract::{ConnectInfo, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use sentra_core::{
    AgentConfig, AgentEntry, AgentId, AgentStatus, Alert, AlertSeverity, Clock, ConnectorConfig,
    ConnectorId, ConnectorMetrics, ConnectorStatus, ConnectorType, OrganizationId, Parse,
    RawEvent,
};
use sentra_vault::{TokenVerification, Vault};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet, VecDeque};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Failed registration attempts from one IP before it is blocked.
const REGISTRATION_ATTEMPT_LIMIT: u32 = 5;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegisterRequest {
    hostname: String,
    #[serde(default)]
    ip: Option<String>,
    os: String,
    version: String,
    #[serde(default)]
    capabilities: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RegisterResponse {
    agent_id: AgentId,
    auth_token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HeartbeatRequest {
    agent_id: AgentId,
    timestamp: DateTime<Utc>,
    status: AgentStatus,
    #[serde(default)]
    metrics: Option<Value>,
}

struct AgentInner<C: Clock> {
    harness: Harness<C>,
    config: Mutex<AgentConfig>,
    vault: Arc<Vault<C>>,
    org_id: OrganizationId,
    /// Master bootstrap secret; never returned to agents.
    registration_token: String,
    agents: Mutex<HashMap<String, AgentEntry>>,
    failed_attempts: Mutex<HashMap<IpAddr, u32>>,
    blocked: Mutex<HashSet<IpAddr>>,
    pending: Mutex<Vec<AgentDataEvent>>,
    recent: Mutex<VecDeque<AgentDataEvent>>,
    alert_sink: Arc<dyn AlertSink>,
    directory: Arc<dyn AgentDirectory>,
}

impl<C: Clock> AgentInner<C> {
    fn running(&self) -> bool {
        self.harness.status().is_running()
    }

    /// Bearer auth: the token must verify against the vault, embed the same
    /// agent id as the request body, and match the token stored for that
    /// agent.
    fn authorize(&self, headers: &HeaderMap, agent_id: &AgentId) -> Result<(), StatusCode> {
        let token = headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .ok_or(StatusCode::UNAUTHORIZED)?;

        match self.vault.verify_agent_token(token) {
            TokenVerification::Valid(claims) if claims.agent_id == *agent_id => {
                let agents = self.agents.lock();
                let entry = agents.get(agent_id.as_str()).ok_or(StatusCode::UNAUTHORIZED)?;
                if entry.token == token {
                    Ok(())
                } else {
                    Err(StatusCode::UNAUTHORIZED)
                }
            }
            _ => Err(StatusCode::UNAUTHORIZED),
        }
    }

    /// Drain the pending buffer: every event becomes a raw event, and the
    /// alert policy decides which additionally become alerts.
    async fn drain_pending(&self) {
        let drained: Vec<AgentDataEvent> = std::mem::take(&mut *self.pending.lock());
        if drained.is_empty() {
            return;
        }
        debug!(connector = %self.harness.id(), events = drained.len(), "draining agent events");

        let max_recent = self.config.lock().max_recent_events;
        for event in drained {
            let hostname = self
                .agents
                .lock()
                .get(event.agent_id.as_str())
                .map(|a| a.hostname.clone())
                .unwrap_or_else(|| event.agent_id.to_string());

            let raw = RawEvent::new(
                self.harness.id(),
                event.timestamp,
                hostname.clone(),
                event.message.clone(),
                policy::event_severity(&event.severity),
            )
            .with_field("agent_id", json!(event.agent_id))
            .with_field("event_type", json!(event.event_type))
            .with_field("details", event.details.clone());
            self.harness.emit(raw);

            if policy::warrants_alert(&event) {
                let source_ip = self
                    .agents
                    .lock()
                    .get(event.agent_id.as_str())
                    .and_then(|a| a.ip.clone());
                let mut alert = policy::build_alert(
                    &event,
                    &hostname,
                    self.harness.name(),
                    self.org_id,
                );
                alert.source_ip = source_ip;
                alert
                    .metadata
                    .insert("connectorId".into(), json!(self.harness.id().0));
                self.alert_sink.publish(alert).await;
            }

            let mut recent = self.recent.lock();
            if recent.len() >= max_recent {
                recent.pop_front();
            }
            recent.push_back(event);
        }
    }

    /// Mark agents silent past the timeout as inactive, alerting once per
    /// transition.
    async fn liveness_sweep(&self) {
        let timeout = self.config.lock().agent_timeout_secs();
        let now = self.harness.clock().now_utc();
        let mut lapsed = Vec::new();
        {
            let mut agents = self.agents.lock();
            for agent in agents.values_mut() {
                let silent_for = (now - agent.last_heartbeat).num_seconds();
                if agent.status == AgentStatus::Active && silent_for > timeout as i64 {
                    agent.status = AgentStatus::Inactive;
                    lapsed.push(agent.clone());
                }
            }
        }
        for agent in lapsed {
            warn!(
                connector = %self.harness.id(),
                agent = %agent.agent_id,
                hostname = %agent.hostname,
                "agent went silent; marked inactive"
            );
            self.directory.save(self.harness.id(), agent.clone()).await;
            let alert = Alert::new(
                format!("Agente {} inactivo", agent.hostname),
                AlertSeverity::Medium,
                self.harness.name().to_string(),
                self.org_id,
            )
            .description(format!(
                "No heartbeat received from {} for more than {timeout} seconds",
                agent.hostname
            ));
            let mut alert = alert;
            alert.source_ip = agent.ip.clone();
            alert
                .metadata
                .insert("agentId".into(), json!(agent.agent_id));
            alert
                .metadata
                .insert("connectorId".into(), json!(self.harness.id().0));
            self.alert_sink.publish(alert).await;
        }
    }
}

/// Agent fleet connector.
pub struct AgentConnector<C: Clock> {
    inner: Arc<AgentInner<C>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl<C: Clock> AgentConnector<C> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: ConnectorId,
        name: impl Into<String>,
        config: AgentConfig,
        org_id: OrganizationId,
        registration_token: String,
        vault: Arc<Vault<C>>,
        alert_sink: Arc<dyn AlertSink>,
        directory: Arc<dyn AgentDirectory>,
        clock: C,
    ) -> (Self, ConnectorRx) {
        let (harness, rx) = Harness::new(id, name, clock);
        let connector = Self {
            inner: Arc::new(AgentInner {
                harness,
                config: Mutex::new(config),
                vault,
                org_id,
                registration_token,
                agents: Mutex::new(HashMap::new()),
                failed_attempts: Mutex::new(HashMap::new()),
                blocked: Mutex::new(HashSet::new()),
                pending: Mutex::new(Vec::new()),
                recent: Mutex::new(VecDeque::new()),
                alert_sink,
                directory,
            }),
            tasks: Mutex::new(Vec::new()),
        };
        (connector, rx)
    }

    /// Connector-scoped router for the HTTP host to mount (e.g. under
    /// `/api/agents`). Serve with connect-info so registration abuse control
    /// can see client addresses.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/register", post(register::<C>))
            .route("/heartbeat", post(heartbeat::<C>))
            .route("/data", post(ingest_data::<C>))
            .route("/", get(list_agents::<C>))
            .route("/events", get(list_events::<C>))
            .with_state(self.inner.clone())
    }

    /// Run one liveness sweep immediately (also driven by the background
    /// timer while started).
    pub async fn sweep_now(&self) {
        self.inner.liveness_sweep().await;
    }

    /// Drain pending agent events immediately.
    pub async fn drain_now(&self) {
        self.inner.drain_pending().await;
    }

    pub fn registered_agents(&self) -> Vec<AgentEntry> {
        self.inner.agents.lock().values().cloned().collect()
    }

    fn spawn_timers(&self) {
        let cancel = self.inner.harness.begin_run();
        let config = self.inner.config.lock().clone();
        let mut tasks = self.tasks.lock();

        let drain_inner = self.inner.clone();
        let drain_cancel = cancel.clone();
        let drain_every = std::time::Duration::from_secs(config.drain_interval_secs);
        tasks.push(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(drain_every);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = drain_cancel.cancelled() => return,
                    _ = ticker.tick() => drain_inner.drain_pending().await,
                }
            }
        }));

        let sweep_inner = self.inner.clone();
        let sweep_every = std::time::Duration::from_secs(config.heartbeat_interval_secs);
        tasks.push(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(sweep_every);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    _ = ticker.tick() => sweep_inner.liveness_sweep().await,
                }
            }
        }));
    }
}

#[async_trait]
impl<C: Clock> Connector for AgentConnector<C> {
    fn id(&self) -> ConnectorId {
        self.inner.harness.id()
    }

    fn name(&self) -> &str {
        self.inner.harness.name()
    }

    fn connector_type(&self) -> ConnectorType {
        ConnectorType::Agent
    }

    fn status(&self) -> ConnectorStatus {
        self.inner.harness.status()
    }

    fn metrics(&self) -> ConnectorMetrics {
        self.inner.harness.metrics()
    }

    async fn start(&self) -> Result<(), ConnectorError> {
        if self.status() == ConnectorStatus::Active {
            return Ok(());
        }
        if self.inner.registration_token.is_empty() {
            let message = "agent connector requires a registration token".to_string();
            self.inner.harness.set_status(ConnectorStatus::Error, Some(message.clone()));
            return Err(ConnectorError::Credentials(message));
        }

        self.spawn_timers();
        info!(connector = %self.id(), "agent connector started");
        self.inner.harness.set_status(ConnectorStatus::Active, None);
        Ok(())
    }

    async fn stop(&self) {
        self.inner.harness.cancel_all();
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }
        self.inner.harness.set_status(ConnectorStatus::Disabled, None);
    }

    async fn pause(&self) -> Result<(), ConnectorError> {
        if self.status() != ConnectorStatus::Active {
            return Err(ConnectorError::InvalidState(self.status()));
        }
        self.inner.harness.cancel_all();
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }
        self.inner.harness.set_status(ConnectorStatus::Paused, None);
        Ok(())
    }

    async fn resume(&self) -> Result<(), ConnectorError> {
        if self.status() != ConnectorStatus::Paused {
            return Err(ConnectorError::InvalidState(self.status()));
        }
        self.spawn_timers();
        self.inner.harness.set_status(ConnectorStatus::Active, None);
        Ok(())
    }

    async fn health_check(&self) -> HealthReport {
        let at = self.inner.harness.clock().now_utc();
        if self.status().is_running() {
            let agents = self.inner.agents.lock();
            let active =
                agents.values().filter(|a| a.status == AgentStatus::Active).count();
            HealthReport::healthy(
                format!("{active}/{} agents active", agents.len()),
                at,
            )
        } else {
            HealthReport::unhealthy(format!("status {}", self.status()), at)
        }
    }

    async fn test_connection(&self) -> TestOutcome {
        let count = self.inner.agents.lock().len();
        TestOutcome { success: true, message: format!("{count} agents registered") }
    }

    async fn update_config(&self, patch: serde_json::Value) -> Result<(), ConnectorError> {
        let (config, dropped) = ConnectorConfig::parse(ConnectorType::Agent, &patch, Parse::Lenient)?;
        if !dropped.is_empty() {
            warn!(connector = %self.id(), ?dropped, "ignoring unknown config fields");
        }
        let ConnectorConfig::Agent(config) = config else {
            return Err(ConnectorError::Invariant("non-agent config for agent connector".into()));
        };
        let was_running = self.status() == ConnectorStatus::Active;
        *self.inner.config.lock() = config;
        if was_running {
            // Timer cadences changed; cycle the background tasks.
            self.pause().await?;
            self.resume().await?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// HTTP handlers
// ---------------------------------------------------------------------------

async fn register<C: Clock>(
    State(inner): State<Arc<AgentInner<C>>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(body): Json<RegisterRequest>,
) -> Response {
    if !inner.running() {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }
    let ip: IpAddr = peer.ip();
    if inner.blocked.lock().contains(&ip) {
        return StatusCode::FORBIDDEN.into_response();
    }

    let presented = headers
        .get("x-registration-token")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if presented != inner.registration_token {
        let mut attempts = inner.failed_attempts.lock();
        let count = attempts.entry(ip).or_insert(0);
        *count += 1;
        if *count >= REGISTRATION_ATTEMPT_LIMIT {
            inner.blocked.lock().insert(ip);
            warn!(connector = %inner.harness.id(), %ip, "registration source blocked");
            return StatusCode::FORBIDDEN.into_response();
        }
        return StatusCode::UNAUTHORIZED.into_response();
    }
    inner.failed_attempts.lock().remove(&ip);

    let agent_id = AgentId::generate();
    let token = inner.vault.issue_agent_token(&agent_id, inner.org_id);
    let entry = AgentEntry {
        agent_id: agent_id.clone(),
        hostname: body.hostname,
        ip: body.ip.or_else(|| Some(ip.to_string())),
        os: body.os,
        version: body.version,
        capabilities: body.capabilities,
        status: AgentStatus::Active,
        last_heartbeat: inner.harness.clock().now_utc(),
        token: token.clone(),
        last_metrics: None,
    };
    info!(connector = %inner.harness.id(), agent = %agent_id, hostname = %entry.hostname, "agent registered");
    inner.agents.lock().insert(agent_id.as_str().to_string(), entry.clone());
    inner.directory.save(inner.harness.id(), entry).await;

    (StatusCode::OK, Json(RegisterResponse { agent_id, auth_token: token })).into_response()
}

async fn heartbeat<C: Clock>(
    State(inner): State<Arc<AgentInner<C>>>,
    headers: HeaderMap,
    Json(body): Json<HeartbeatRequest>,
) -> Response {
    if !inner.running() {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }
    if let Err(status) = inner.authorize(&headers, &body.agent_id) {
        return status.into_response();
    }

    let updated = {
        let mut agents = inner.agents.lock();
        match agents.get_mut(body.agent_id.as_str()) {
            Some(entry) => {
                if entry.apply_heartbeat(body.timestamp, body.status, body.metrics.clone()) {
                    Some(entry.clone())
                } else {
                    None
                }
            }
            None => return StatusCode::UNAUTHORIZED.into_response(),
        }
    };
    match updated {
        Some(entry) => {
            inner.directory.save(inner.harness.id(), entry).await;
            (StatusCode::OK, Json(json!({"status": "ok"}))).into_response()
        }
        // Stale timestamp rejected; lastHeartbeat moves only forward.
        None => (
            StatusCode::CONFLICT,
            Json(json!({"error": "stale heartbeat timestamp"})),
        )
            .into_response(),
    }
}

async fn ingest_data<C: Clock>(
    State(inner): State<Arc<AgentInner<C>>>,
    headers: HeaderMap,
    Json(body): Json<AgentDataEvent>,
) -> Response {
    if !inner.running() {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }
    if let Err(status) = inner.authorize(&headers, &body.agent_id) {
        return status.into_response();
    }

    let over_threshold = {
        let mut pending = inner.pending.lock();
        pending.push(body);
        pending.len() > inner.config.lock().drain_threshold
    };
    if over_threshold {
        inner.drain_pending().await;
    }
    StatusCode::ACCEPTED.into_response()
}

async fn list_agents<C: Clock>(State(inner): State<Arc<AgentInner<C>>>) -> Response {
    let agents: Vec<AgentEntry> = inner.agents.lock().values().cloned().collect();
    Json(agents).into_response()
}

async fn list_events<C: Clock>(State(inner): State<Arc<AgentInner<C>>>) -> Response {
    let events: Vec<AgentDataEvent> = inner.recent.lock().iter().cloned().collect();
    Json(events).into_response()
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
