// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Polled-API connector.
//!
//! Each cycle: circuit-breaker gate → per-endpoint rate limit → paginated
//! requests with retry/backoff → record dispatch (small batches emit raw
//! events directly, oversized batches become one queue job). A cycle fails
//! only when no endpoint succeeded; that is the unit the breaker counts.

mod auth;
mod backoff;
mod breaker;
mod pagination;
mod rate_limit;

pub use breaker::{BreakerState, CircuitBreaker};
pub use pagination::{extract_records, Paginator, MAX_PAGES};
pub use rate_limit::FixedWindow;

use crate::connector::{Connector, CycleOutcome, HealthReport, TestOutcome};
use crate::error::ConnectorError;
use crate::harness::{ConnectorRx, Harness};
use crate::sink::JobSink;
use async_trait::async_trait;
use auth::OAuthCache;
use parking_lot::Mutex;
use sentra_core::{
    ApiAuth, ApiConfig, ApiEndpoint, Clock, ConnectorConfig, ConnectorId, ConnectorMetrics,
    ConnectorStatus, ConnectorType, EventSeverity, IngestJob, JobSource, Parse, RawEvent,
};
use sentra_vault::CredentialSet;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use url::Url;

/// Batches up to this size bypass the queue and emit directly.
const SMALL_BATCH_MAX: usize = 100;

/// Dotted-path lookup used by cursor pagination.
pub(crate) fn get_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = value;
    for segment in path.split('.') {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Scheduled HTTP polling connector.
pub struct PolledApiConnector<C: Clock> {
    harness: Harness<C>,
    vendor: String,
    config: Mutex<ApiConfig>,
    credentials: CredentialSet,
    client: Mutex<reqwest::Client>,
    breaker: Mutex<Arc<CircuitBreaker>>,
    limiters: Mutex<HashMap<String, Arc<FixedWindow>>>,
    oauth: OAuthCache,
    job_sink: Arc<dyn JobSink>,
}

impl<C: Clock> PolledApiConnector<C> {
    pub fn new(
        id: ConnectorId,
        name: impl Into<String>,
        vendor: impl Into<String>,
        config: ApiConfig,
        credentials: CredentialSet,
        job_sink: Arc<dyn JobSink>,
        clock: C,
    ) -> Result<(Self, ConnectorRx), ConnectorError> {
        let (harness, rx) = Harness::new(id, name, clock);
        let client = build_client(config.timeout_secs)?;
        let breaker = Arc::new(CircuitBreaker::new(config.breaker));
        let connector = Self {
            harness,
            vendor: vendor.into(),
            config: Mutex::new(config),
            credentials,
            client: Mutex::new(client),
            breaker: Mutex::new(breaker),
            limiters: Mutex::new(HashMap::new()),
            oauth: OAuthCache::default(),
            job_sink,
        };
        Ok((connector, rx))
    }

    /// Breaker state, for health reporting and tests.
    pub fn breaker_state(&self) -> BreakerState {
        self.breaker.lock().state()
    }

    fn limiter_for(&self, config: &ApiConfig, endpoint: &ApiEndpoint) -> Option<Arc<FixedWindow>> {
        let rate = config.rate_limit?;
        let mut limiters = self.limiters.lock();
        Some(
            limiters
                .entry(endpoint.path.clone())
                .or_insert_with(|| Arc::new(FixedWindow::new(rate)))
                .clone(),
        )
    }

    async fn execute_endpoint(
        &self,
        client: &reqwest::Client,
        config: &ApiConfig,
        endpoint: &ApiEndpoint,
        cancel: &CancellationToken,
    ) -> Result<usize, ConnectorError> {
        let oauth_bearer = match &endpoint.auth {
            ApiAuth::OAuth { token_url, scopes } => Some(
                self.oauth
                    .bearer(client, token_url, scopes, &self.credentials)
                    .await
                    .map_err(ConnectorError::Http)?,
            ),
            _ => None,
        };

        let limiter = self.limiter_for(config, endpoint);
        let mut paginator = Paginator::new(endpoint.pagination.as_ref());
        let mut dispatched = 0usize;

        loop {
            if let Some(limiter) = &limiter {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        return Err(ConnectorError::Http("cycle cancelled".into()));
                    }
                    _ = limiter.acquire() => {}
                }
            }

            let body = self
                .request_with_retry(
                    client,
                    config,
                    endpoint,
                    paginator.params(),
                    oauth_bearer.as_deref(),
                    cancel,
                )
                .await?;
            let records = extract_records(&body);
            dispatched += self.dispatch(endpoint, records.as_slice())?;

            if !paginator.advance(&body, records.len()) {
                break;
            }
        }
        Ok(dispatched)
    }

    async fn request_with_retry(
        &self,
        client: &reqwest::Client,
        config: &ApiConfig,
        endpoint: &ApiEndpoint,
        page_params: Vec<(String, String)>,
        oauth_bearer: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<Value, ConnectorError> {
        let mut attempt: u32 = 0;
        loop {
            let mut url = build_url(&config.base_url, &endpoint.path)?;
            {
                let mut pairs = url.query_pairs_mut();
                for (key, value) in &endpoint.query {
                    pairs.append_pair(key, value);
                }
                for (key, value) in &page_params {
                    pairs.append_pair(key, value);
                }
            }

            let method = reqwest::Method::from_bytes(endpoint.method.as_bytes())
                .map_err(|_| ConnectorError::Http(format!("bad method {}", endpoint.method)))?;
            let mut request = client.request(method, url);
            for (key, value) in &endpoint.headers {
                request = request.header(key.as_str(), value.as_str());
            }
            request = auth::apply_auth(request, &endpoint.auth, &self.credentials, oauth_bearer);
            if let Some(body) = &endpoint.body {
                request = request.json(body);
            }

            let started = std::time::Instant::now();
            let outcome = tokio::select! {
                _ = cancel.cancelled() => {
                    return Err(ConnectorError::Http("request cancelled".into()));
                }
                outcome = request.send() => outcome,
            };

            match outcome {
                Ok(response) => {
                    self.harness.record_latency(started.elapsed());
                    let status = response.status();
                    if status.is_success() {
                        let bytes = response
                            .bytes()
                            .await
                            .map_err(|e| ConnectorError::Http(format!("body read: {e}")))?;
                        debug!(
                            connector = %self.id(),
                            endpoint = %endpoint.path,
                            bytes = bytes.len(),
                            "endpoint response"
                        );
                        if bytes.is_empty() {
                            return Ok(Value::Null);
                        }
                        let body = serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                            Value::String(String::from_utf8_lossy(&bytes).into_owned())
                        });
                        return Ok(body);
                    }

                    let code = status.as_u16();
                    let retryable = config.retryable_statuses.contains(&code);
                    if retryable && attempt < config.max_retries {
                        let wait = backoff::delay(&config.backoff, attempt);
                        debug!(
                            connector = %self.id(),
                            endpoint = %endpoint.path,
                            %status,
                            attempt,
                            ?wait,
                            "retrying after retryable status"
                        );
                        attempt += 1;
                        tokio::select! {
                            _ = cancel.cancelled() => {
                                return Err(ConnectorError::Http("backoff cancelled".into()));
                            }
                            _ = tokio::time::sleep(wait) => continue,
                        }
                    }
                    // 4xx (except 429) is fatal for the endpoint; exhausted
                    // retryables land here too.
                    return Err(ConnectorError::Http(format!(
                        "{} returned {status}",
                        endpoint.path
                    )));
                }
                Err(e) => {
                    if attempt < config.max_retries {
                        let wait = backoff::delay(&config.backoff, attempt);
                        attempt += 1;
                        tokio::select! {
                            _ = cancel.cancelled() => {
                                return Err(ConnectorError::Http("backoff cancelled".into()));
                            }
                            _ = tokio::time::sleep(wait) => continue,
                        }
                    }
                    return Err(ConnectorError::Http(format!("transport: {e}")));
                }
            }
        }
    }

    /// Dispatch one page of records, in received order.
    fn dispatch(&self, endpoint: &ApiEndpoint, records: &[Value]) -> Result<usize, ConnectorError> {
        if records.is_empty() {
            return Ok(0);
        }
        if records.len() <= SMALL_BATCH_MAX {
            for record in records {
                self.harness.emit(self.record_event(endpoint, record));
            }
            return Ok(records.len());
        }

        let job = IngestJob::new(
            self.id(),
            Value::Array(records.to_vec()),
            JobSource {
                connector_name: self.name().to_string(),
                vendor: self.vendor.clone(),
                endpoint: Some(endpoint.path.clone()),
            },
            endpoint.priority(),
            self.harness.clock().now_utc(),
        );
        debug!(
            connector = %self.id(),
            records = records.len(),
            priority = %job.priority,
            "batch deferred to work queue"
        );
        self.job_sink.enqueue(job).map_err(|_| ConnectorError::QueueFull)?;
        Ok(records.len())
    }

    fn record_event(&self, endpoint: &ApiEndpoint, record: &Value) -> RawEvent {
        let message = ["message", "title", "name", "summary"]
            .iter()
            .find_map(|key| record.get(*key).and_then(Value::as_str))
            .map(str::to_string)
            .unwrap_or_else(|| {
                let text = record.to_string();
                sentra_core::short(&text, 256).to_string()
            });
        RawEvent::new(
            self.id(),
            self.harness.clock().now_utc(),
            endpoint.path.clone(),
            message,
            EventSeverity::Info,
        )
        .with_field("record", record.clone())
        .with_field("endpoint", json!(endpoint.path))
        .with_field("vendor", json!(self.vendor))
    }
}

#[async_trait]
impl<C: Clock> Connector for PolledApiConnector<C> {
    fn id(&self) -> ConnectorId {
        self.harness.id()
    }

    fn name(&self) -> &str {
        self.harness.name()
    }

    fn connector_type(&self) -> ConnectorType {
        ConnectorType::Api
    }

    fn status(&self) -> ConnectorStatus {
        self.harness.status()
    }

    fn metrics(&self) -> ConnectorMetrics {
        self.harness.metrics()
    }

    async fn start(&self) -> Result<(), ConnectorError> {
        let base = self.config.lock().base_url.clone();
        if let Err(e) = Url::parse(&base) {
            let message = format!("malformed base_url {base}: {e}");
            self.harness.set_status(ConnectorStatus::Error, Some(message.clone()));
            return Err(ConnectorError::Config(sentra_core::ConfigError::Invalid(message)));
        }
        self.harness.begin_run();
        self.harness.set_status(ConnectorStatus::Active, None);
        Ok(())
    }

    async fn stop(&self) {
        self.harness.cancel_all();
        self.harness.set_status(ConnectorStatus::Disabled, None);
    }

    async fn pause(&self) -> Result<(), ConnectorError> {
        if self.status() != ConnectorStatus::Active {
            return Err(ConnectorError::InvalidState(self.status()));
        }
        self.harness.cancel_all();
        self.harness.set_status(ConnectorStatus::Paused, None);
        Ok(())
    }

    async fn resume(&self) -> Result<(), ConnectorError> {
        if self.status() != ConnectorStatus::Paused {
            return Err(ConnectorError::InvalidState(self.status()));
        }
        self.harness.begin_run();
        self.harness.set_status(ConnectorStatus::Active, None);
        Ok(())
    }

    async fn run_once(&self) -> Result<CycleOutcome, ConnectorError> {
        match self.status() {
            ConnectorStatus::Paused | ConnectorStatus::Disabled => return Ok(CycleOutcome::Idle),
            _ => {}
        }
        {
            let breaker = self.breaker.lock().clone();
            if !breaker.allow_cycle() {
                debug!(connector = %self.id(), "circuit open; cycle skipped");
                return Ok(CycleOutcome::Skipped);
            }
        }

        let cancel = self.harness.cancel_token();
        let config = self.config.lock().clone();
        let client = self.client.lock().clone();
        let breaker = self.breaker.lock().clone();

        let mut dispatched = 0usize;
        let mut any_success = false;
        let mut last_error = String::from("no endpoints configured");

        for endpoint in &config.endpoints {
            if cancel.is_cancelled() {
                break;
            }
            match self.execute_endpoint(&client, &config, endpoint, &cancel).await {
                Ok(count) => {
                    any_success = true;
                    dispatched += count;
                }
                Err(e) => {
                    last_error = e.to_string();
                    warn!(
                        connector = %self.id(),
                        endpoint = %endpoint.path,
                        error = %last_error,
                        "endpoint failed"
                    );
                    self.harness.record_soft_error(last_error.clone());
                    if matches!(e, ConnectorError::QueueFull) {
                        // Back-pressure fails the whole cycle.
                        breaker.on_cycle_failure();
                        self.harness.record_failure(last_error);
                        return Err(e);
                    }
                }
            }
        }

        if any_success {
            breaker.on_cycle_success();
            self.harness.record_success();
            self.harness.publish_metrics();
            Ok(CycleOutcome::Completed { events: dispatched })
        } else {
            breaker.on_cycle_failure();
            self.harness.record_failure(format!("cycle failed: {last_error}"));
            Err(ConnectorError::Http(last_error))
        }
    }

    async fn health_check(&self) -> HealthReport {
        let at = self.harness.clock().now_utc();
        let status = self.status();
        let breaker = self.breaker_state();
        if status.is_running() && breaker != BreakerState::Open {
            HealthReport::healthy(format!("polling; breaker {breaker}"), at)
        } else {
            HealthReport::unhealthy(format!("status {status}; breaker {breaker}"), at)
        }
    }

    async fn test_connection(&self) -> TestOutcome {
        let config = self.config.lock().clone();
        let path = config.endpoints.first().map(|e| e.path.clone()).unwrap_or_default();
        let url = match build_url(&config.base_url, &path) {
            Ok(url) => url,
            Err(e) => return TestOutcome { success: false, message: e.to_string() },
        };
        let client = match build_client(10) {
            Ok(client) => client,
            Err(e) => return TestOutcome { success: false, message: e.to_string() },
        };
        match client.get(url.clone()).send().await {
            Ok(response) if response.status().is_success() => TestOutcome {
                success: true,
                message: format!("{url} answered {}", response.status()),
            },
            Ok(response) => TestOutcome {
                success: false,
                message: format!("{url} answered {}", response.status()),
            },
            Err(e) => TestOutcome { success: false, message: format!("{url}: {e}") },
        }
    }

    async fn update_config(&self, patch: serde_json::Value) -> Result<(), ConnectorError> {
        let (config, dropped) = ConnectorConfig::parse(ConnectorType::Api, &patch, Parse::Lenient)?;
        if !dropped.is_empty() {
            warn!(connector = %self.id(), ?dropped, "ignoring unknown config fields");
        }
        let ConnectorConfig::Api(config) = config else {
            return Err(ConnectorError::Invariant("non-api config for api connector".into()));
        };
        *self.client.lock() = build_client(config.timeout_secs)?;
        *self.breaker.lock() = Arc::new(CircuitBreaker::new(config.breaker));
        self.limiters.lock().clear();
        self.oauth.invalidate().await;
        *self.config.lock() = config;
        Ok(())
    }
}

fn build_client(timeout_secs: u64) -> Result<reqwest::Client, ConnectorError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| ConnectorError::Http(format!("http client: {e}")))
}

/// Join base URL and path, then validate.
fn build_url(base: &str, path: &str) -> Result<Url, ConnectorError> {
    let joined = if path.is_empty() {
        base.to_string()
    } else {
        format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
    };
    Url::parse(&joined)
        .map_err(|e| ConnectorError::Http(format!("malformed url {joined}: {e}")))
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
