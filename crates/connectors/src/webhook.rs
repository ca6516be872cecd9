// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Webhook ingress connector.
//!
//! The HTTP host framework is external; connectors register their path in a
//! [`WebhookRegistry`] the host dispatches into. Path deregistration on stop
//! is best-effort, so a stopped connector silently drops deliveries instead
//! of emitting events.

use crate::connector::{Connector, HealthReport, TestOutcome};
use crate::error::ConnectorError;
use crate::harness::{ConnectorRx, Harness};
use async_trait::async_trait;
use hmac::{Hmac, Mac};
use parking_lot::{Mutex, RwLock};
use sentra_core::{
    Clock, ConnectorConfig, ConnectorId, ConnectorMetrics, ConnectorStatus, ConnectorType,
    EventSeverity, Parse, RawEvent, WebhookConfig,
};
use serde_json::{json, Value};
use sha2::Sha256;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

type HmacSha256 = Hmac<Sha256>;

/// Response the HTTP host should return for a delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WebhookResponse {
    pub status: u16,
    pub message: &'static str,
}

impl WebhookResponse {
    const ACCEPTED: Self = Self { status: 200, message: "accepted" };
    const DROPPED: Self = Self { status: 200, message: "ok" };
    const UNAUTHORIZED: Self = Self { status: 401, message: "invalid signature" };
}

/// A registered delivery target.
pub trait WebhookTarget: Send + Sync {
    fn deliver(&self, headers: &[(String, String)], body: &[u8]) -> WebhookResponse;
}

/// Path-keyed webhook dispatch table shared with the HTTP host.
#[derive(Default)]
pub struct WebhookRegistry {
    routes: RwLock<HashMap<String, Arc<dyn WebhookTarget>>>,
}

impl WebhookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a target; replaces any previous holder of the path.
    pub fn register(&self, path: impl Into<String>, target: Arc<dyn WebhookTarget>) {
        self.routes.write().insert(path.into(), target);
    }

    pub fn deregister(&self, path: &str) {
        self.routes.write().remove(path);
    }

    pub fn paths(&self) -> Vec<String> {
        self.routes.read().keys().cloned().collect()
    }

    /// Dispatch a delivery; `None` when no connector owns the path.
    pub fn dispatch(
        &self,
        path: &str,
        headers: &[(String, String)],
        body: &[u8],
    ) -> Option<WebhookResponse> {
        let target = self.routes.read().get(path).cloned()?;
        Some(target.deliver(headers, body))
    }
}

struct Inner<C: Clock> {
    harness: Harness<C>,
    config: Mutex<WebhookConfig>,
    /// HMAC secret from the credential set, when verification is enabled.
    secret: Option<String>,
}

impl<C: Clock> Inner<C> {
    fn verify_signature(&self, headers: &[(String, String)], body: &[u8]) -> bool {
        let config = self.config.lock();
        if !config.verify_signature {
            return true;
        }
        let Some(secret) = &self.secret else {
            // Verification requested but no secret provisioned: fail closed.
            return false;
        };
        let header_name = config.signature_header.to_ascii_lowercase();
        drop(config);

        let Some(presented) = headers
            .iter()
            .find(|(name, _)| name.to_ascii_lowercase() == header_name)
            .map(|(_, value)| value.trim().trim_start_matches("sha256=").to_string())
        else {
            return false;
        };
        let Ok(presented) = hex::decode(presented) else {
            return false;
        };

        let Ok(mut mac) = <HmacSha256 as Mac>::new_from_slice(secret.as_bytes()) else {
            return false;
        };
        mac.update(body);
        mac.verify_slice(&presented).is_ok()
    }
}

impl<C: Clock> WebhookTarget for Inner<C> {
    fn deliver(&self, headers: &[(String, String)], body: &[u8]) -> WebhookResponse {
        if !self.harness.status().is_running() {
            debug!(connector = %self.harness.id(), "delivery to stopped webhook dropped");
            return WebhookResponse::DROPPED;
        }
        if !self.verify_signature(headers, body) {
            self.harness.record_soft_error("webhook signature mismatch");
            return WebhookResponse::UNAUTHORIZED;
        }

        let path = self.config.lock().path.clone();
        let payload: Value = serde_json::from_slice(body)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(body).into_owned()));
        let header_map: serde_json::Map<String, Value> = headers
            .iter()
            .map(|(name, value)| (name.clone(), json!(value)))
            .collect();

        let event = RawEvent::new(
            self.harness.id(),
            self.harness.clock().now_utc(),
            path.clone(),
            format!("webhook delivery on {path}"),
            EventSeverity::Info,
        )
        .with_field("payload", payload)
        .with_field("headers", Value::Object(header_map))
        .with_field("path", json!(path));
        self.harness.emit(event);
        WebhookResponse::ACCEPTED
    }
}

/// Incoming-HTTP connector bound to one path.
pub struct WebhookConnector<C: Clock> {
    inner: Arc<Inner<C>>,
    registry: Arc<WebhookRegistry>,
}

impl<C: Clock> WebhookConnector<C> {
    pub fn new(
        id: ConnectorId,
        name: impl Into<String>,
        config: WebhookConfig,
        secret: Option<String>,
        registry: Arc<WebhookRegistry>,
        clock: C,
    ) -> (Self, ConnectorRx) {
        let (harness, rx) = Harness::new(id, name, clock);
        let connector = Self {
            inner: Arc::new(Inner { harness, config: Mutex::new(config), secret }),
            registry,
        };
        (connector, rx)
    }

    pub fn path(&self) -> String {
        self.inner.config.lock().path.clone()
    }
}

#[async_trait]
impl<C: Clock> Connector for WebhookConnector<C> {
    fn id(&self) -> ConnectorId {
        self.inner.harness.id()
    }

    fn name(&self) -> &str {
        self.inner.harness.name()
    }

    fn connector_type(&self) -> ConnectorType {
        ConnectorType::Webhook
    }

    fn status(&self) -> ConnectorStatus {
        self.inner.harness.status()
    }

    fn metrics(&self) -> ConnectorMetrics {
        self.inner.harness.metrics()
    }

    async fn start(&self) -> Result<(), ConnectorError> {
        let path = self.path();
        if !path.starts_with('/') {
            let message = format!("webhook path must begin with '/': {path}");
            self.inner.harness.set_status(ConnectorStatus::Error, Some(message.clone()));
            return Err(ConnectorError::Config(sentra_core::ConfigError::Invalid(message)));
        }
        self.registry.register(path, self.inner.clone());
        self.inner.harness.set_status(ConnectorStatus::Active, None);
        Ok(())
    }

    async fn stop(&self) {
        // Best-effort: the host may still hold deliveries in flight; the
        // status gate in `deliver` drops those.
        self.registry.deregister(&self.path());
        self.inner.harness.set_status(ConnectorStatus::Disabled, None);
    }

    async fn pause(&self) -> Result<(), ConnectorError> {
        if self.status() != ConnectorStatus::Active {
            return Err(ConnectorError::InvalidState(self.status()));
        }
        self.inner.harness.set_status(ConnectorStatus::Paused, None);
        Ok(())
    }

    async fn resume(&self) -> Result<(), ConnectorError> {
        if self.status() != ConnectorStatus::Paused {
            return Err(ConnectorError::InvalidState(self.status()));
        }
        self.inner.harness.set_status(ConnectorStatus::Active, None);
        Ok(())
    }

    async fn health_check(&self) -> HealthReport {
        let at = self.inner.harness.clock().now_utc();
        if self.status().is_running() {
            HealthReport::healthy(format!("registered on {}", self.path()), at)
        } else {
            HealthReport::unhealthy(format!("status {}", self.status()), at)
        }
    }

    async fn test_connection(&self) -> TestOutcome {
        let path = self.path();
        if path.starts_with('/') {
            TestOutcome { success: true, message: format!("path {path} is valid") }
        } else {
            TestOutcome { success: false, message: format!("invalid path {path}") }
        }
    }

    async fn update_config(&self, patch: serde_json::Value) -> Result<(), ConnectorError> {
        let (config, dropped) =
            ConnectorConfig::parse(ConnectorType::Webhook, &patch, Parse::Lenient)?;
        if !dropped.is_empty() {
            warn!(connector = %self.id(), ?dropped, "ignoring unknown config fields");
        }
        let ConnectorConfig::Webhook(config) = config else {
            return Err(ConnectorError::Invariant("non-webhook config for webhook connector".into()));
        };
        let old_path = self.path();
        let was_running = self.status().is_running();
        *self.inner.config.lock() = config;
        if was_running && old_path != self.path() {
            self.registry.deregister(&old_path);
            self.registry.register(self.path(), self.inner.clone());
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "webhook_tests.rs"]
mod tests;
