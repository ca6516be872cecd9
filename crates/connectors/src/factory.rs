// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Type-indexed construction of concrete connectors from persisted records.

use crate::agent::AgentConnector;
use crate::api::PolledApiConnector;
use crate::connector::Connector;
use crate::error::ConnectorError;
use crate::file::FileWatcherConnector;
use crate::harness::ConnectorRx;
use crate::sink::{AgentDirectory, AlertSink, JobSink};
use crate::syslog::SyslogConnector;
use crate::webhook::{WebhookConnector, WebhookRegistry};
use axum::Router;
use sentra_core::{Clock, ConnectorConfig, ConnectorRecord, Parse};
use sentra_vault::{CredentialSet, SealedCredentials, Vault};
use std::sync::Arc;
use tracing::warn;

/// Everything a connector may need injected at construction.
pub struct ConnectorDeps<C: Clock> {
    pub clock: C,
    pub vault: Arc<Vault<C>>,
    pub job_sink: Arc<dyn JobSink>,
    pub alert_sink: Arc<dyn AlertSink>,
    pub agent_directory: Arc<dyn AgentDirectory>,
    pub webhook_registry: Arc<WebhookRegistry>,
}

/// A constructed connector plus its outbound channels.
pub struct Built {
    pub connector: Arc<dyn Connector>,
    pub rx: ConnectorRx,
    /// Present for agent connectors: the sub-router the HTTP host mounts.
    pub agent_router: Option<Router>,
}

impl std::fmt::Debug for Built {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Built")
            .field("connector", &self.connector.id())
            .field("agent_router", &self.agent_router.is_some())
            .finish()
    }
}

/// Build the concrete connector for a record. Configuration is parsed once
/// here; credentials are decrypted through the vault and validated for the
/// connector type.
pub fn build_connector<C: Clock>(
    record: &ConnectorRecord,
    deps: &ConnectorDeps<C>,
    mode: Parse,
) -> Result<Built, ConnectorError> {
    let (config, dropped) = ConnectorConfig::parse(record.connector_type, &record.configuration, mode)?;
    if !dropped.is_empty() {
        warn!(connector = %record.id, ?dropped, "ignoring unknown config fields");
    }

    let credentials = match &record.credentials {
        None => CredentialSet::default(),
        Some(sealed) => {
            let sealed: SealedCredentials = serde_json::from_value(sealed.clone())
                .map_err(|e| ConnectorError::Credentials(format!("malformed sealed blob: {e}")))?;
            let credentials = deps
                .vault
                .decrypt(&sealed)
                .map_err(|e| ConnectorError::Credentials(e.to_string()))?;
            if !deps.vault.validate(&credentials, record.connector_type) {
                return Err(ConnectorError::Credentials(format!(
                    "credentials incomplete for {} connector",
                    record.connector_type
                )));
            }
            tracing::debug!(
                connector = %record.id,
                credentials = ?sentra_vault::sanitize_for_logging(&credentials),
                "credentials decrypted"
            );
            credentials
        }
    };

    match config {
        ConnectorConfig::Syslog(config) => {
            let (connector, rx) =
                SyslogConnector::new(record.id, record.name.clone(), config, deps.clock.clone());
            Ok(Built { connector: Arc::new(connector), rx, agent_router: None })
        }
        ConnectorConfig::Api(config) => {
            let (connector, rx) = PolledApiConnector::new(
                record.id,
                record.name.clone(),
                record.vendor.clone(),
                config,
                credentials,
                deps.job_sink.clone(),
                deps.clock.clone(),
            )?;
            Ok(Built { connector: Arc::new(connector), rx, agent_router: None })
        }
        ConnectorConfig::Webhook(config) => {
            let secret = credentials
                .api_secret
                .clone()
                .or_else(|| credentials.token.clone());
            let (connector, rx) = WebhookConnector::new(
                record.id,
                record.name.clone(),
                config,
                secret,
                deps.webhook_registry.clone(),
                deps.clock.clone(),
            );
            Ok(Built { connector: Arc::new(connector), rx, agent_router: None })
        }
        ConnectorConfig::File(config) => {
            let (connector, rx) = FileWatcherConnector::new(
                record.id,
                record.name.clone(),
                config,
                deps.clock.clone(),
            );
            Ok(Built { connector: Arc::new(connector), rx, agent_router: None })
        }
        ConnectorConfig::Agent(config) => {
            let registration_token = credentials.token.clone().unwrap_or_default();
            let (connector, rx) = AgentConnector::new(
                record.id,
                record.name.clone(),
                config,
                record.organization_id,
                registration_token,
                deps.vault.clone(),
                deps.alert_sink.clone(),
                deps.agent_directory.clone(),
                deps.clock.clone(),
            );
            let router = connector.router();
            Ok(Built { connector: Arc::new(connector), rx, agent_router: Some(router) })
        }
    }
}

#[cfg(test)]
#[path = "factory_tests.rs"]
mod tests;
