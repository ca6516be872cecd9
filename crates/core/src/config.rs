// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Type-tagged connector configuration.
//!
//! The store keeps configuration as opaque JSON; it is parsed exactly once at
//! connector construction into one of the per-type structs here. Strict mode
//! rejects unknown top-level keys; lenient mode logs and drops them. Nested
//! objects tolerate extras either way (vendor payload shapes evolve faster
//! than this schema).

use crate::connector::ConnectorType;
use crate::job::JobPriority;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Parse mode for the opaque configuration column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parse {
    Strict,
    Lenient,
}

/// Configuration parse/validation failures. Surfaced at `start()`.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration must be a JSON object")]
    NotAnObject,

    #[error("unknown configuration field `{0}`")]
    UnknownField(String),

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("malformed configuration: {0}")]
    Json(#[from] serde_json::Error),
}

/// Parsed configuration for one connector, tagged by its type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ConnectorConfig {
    Syslog(SyslogConfig),
    Api(ApiConfig),
    Webhook(WebhookConfig),
    File(FileConfig),
    Agent(AgentConfig),
}

impl ConnectorConfig {
    /// Parse the opaque JSON column for a connector of the given type.
    ///
    /// Returns the dropped unknown keys alongside the parsed config so the
    /// caller can log them in lenient mode.
    pub fn parse(
        ty: ConnectorType,
        raw: &Value,
        mode: Parse,
    ) -> Result<(Self, Vec<String>), ConfigError> {
        let obj = raw.as_object().ok_or(ConfigError::NotAnObject)?;
        let known = Self::known_keys(ty);
        let mut unknown = Vec::new();
        for key in obj.keys() {
            if !known.contains(&key.as_str()) {
                if mode == Parse::Strict {
                    return Err(ConfigError::UnknownField(key.clone()));
                }
                unknown.push(key.clone());
            }
        }

        let mut cleaned = obj.clone();
        for key in &unknown {
            cleaned.remove(key);
        }
        let cleaned = Value::Object(cleaned);

        let config = match ty {
            ConnectorType::Syslog => Self::Syslog(serde_json::from_value(cleaned)?),
            ConnectorType::Api => Self::Api(serde_json::from_value(cleaned)?),
            ConnectorType::Webhook => Self::Webhook(serde_json::from_value(cleaned)?),
            ConnectorType::File => Self::File(serde_json::from_value(cleaned)?),
            ConnectorType::Agent => Self::Agent(serde_json::from_value(cleaned)?),
        };
        config.validate()?;
        Ok((config, unknown))
    }

    fn known_keys(ty: ConnectorType) -> &'static [&'static str] {
        match ty {
            ConnectorType::Syslog => &["protocol", "bind_addr", "port", "tls", "filters"],
            ConnectorType::Api => &[
                "base_url",
                "poll_interval_secs",
                "timeout_secs",
                "max_retries",
                "retryable_statuses",
                "backoff",
                "rate_limit",
                "breaker",
                "endpoints",
            ],
            ConnectorType::Webhook => &["path", "verify_signature", "signature_header"],
            ConnectorType::File => &[
                "paths",
                "include",
                "exclude",
                "hash_contents",
                "high_priority_pattern",
            ],
            ConnectorType::Agent => &[
                "heartbeat_interval_secs",
                "agent_timeout_secs",
                "drain_interval_secs",
                "drain_threshold",
                "max_recent_events",
            ],
        }
    }

    /// Structural validation; network-level checks (URL resolution, binds)
    /// happen when the connector starts.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self {
            Self::Syslog(c) => {
                if c.port == 0 {
                    return Err(ConfigError::Invalid("syslog port must be non-zero".into()));
                }
                if c.protocol == SyslogProtocol::Tls && c.tls.is_none() {
                    return Err(ConfigError::Invalid(
                        "tls protocol requires a tls section".into(),
                    ));
                }
                Ok(())
            }
            Self::Api(c) => {
                if c.base_url.is_empty() {
                    return Err(ConfigError::Invalid("base_url is required".into()));
                }
                if c.endpoints.is_empty() {
                    return Err(ConfigError::Invalid(
                        "at least one endpoint is required".into(),
                    ));
                }
                if c.poll_interval_secs == 0 {
                    return Err(ConfigError::Invalid(
                        "poll_interval_secs must be non-zero".into(),
                    ));
                }
                if let Some(rl) = &c.rate_limit {
                    if rl.requests == 0 || rl.window_ms == 0 {
                        return Err(ConfigError::Invalid(
                            "rate_limit requires non-zero requests and window_ms".into(),
                        ));
                    }
                }
                Ok(())
            }
            Self::Webhook(c) => {
                if !c.path.starts_with('/') {
                    return Err(ConfigError::Invalid(format!(
                        "webhook path must begin with '/': {}",
                        c.path
                    )));
                }
                Ok(())
            }
            Self::File(c) => {
                if c.paths.is_empty() {
                    return Err(ConfigError::Invalid("at least one watch path is required".into()));
                }
                Ok(())
            }
            Self::Agent(c) => {
                if c.heartbeat_interval_secs == 0 {
                    return Err(ConfigError::Invalid(
                        "heartbeat_interval_secs must be non-zero".into(),
                    ));
                }
                Ok(())
            }
        }
    }

    pub fn connector_type(&self) -> ConnectorType {
        match self {
            Self::Syslog(_) => ConnectorType::Syslog,
            Self::Api(_) => ConnectorType::Api,
            Self::Webhook(_) => ConnectorType::Webhook,
            Self::File(_) => ConnectorType::File,
            Self::Agent(_) => ConnectorType::Agent,
        }
    }
}

// ---------------------------------------------------------------------------
// Syslog
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SyslogProtocol {
    #[default]
    Udp,
    Tcp,
    Tls,
}

crate::simple_display! {
    SyslogProtocol {
        Udp => "udp",
        Tcp => "tcp",
        Tls => "tls",
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TlsConfig {
    pub cert_path: String,
    pub key_path: String,
    /// CA bundle used to validate client certificates.
    #[serde(default)]
    pub ca_path: Option<String>,
    #[serde(default)]
    pub require_client_cert: bool,
}

/// All filters combine conjunctively; empty lists match everything.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SyslogFilters {
    #[serde(default)]
    pub facilities: Vec<u8>,
    #[serde(default)]
    pub severities: Vec<u8>,
    /// Hostname or IP whitelist.
    #[serde(default)]
    pub sources: Vec<String>,
    /// Substring include list (OR).
    #[serde(default)]
    pub include: Vec<String>,
    /// Substring exclude list (any match drops).
    #[serde(default)]
    pub exclude: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyslogConfig {
    #[serde(default)]
    pub protocol: SyslogProtocol,
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    #[serde(default = "default_syslog_port")]
    pub port: u16,
    #[serde(default)]
    pub tls: Option<TlsConfig>,
    #[serde(default)]
    pub filters: SyslogFilters,
}

fn default_bind_addr() -> String {
    "0.0.0.0".into()
}

fn default_syslog_port() -> u16 {
    514
}

// ---------------------------------------------------------------------------
// Polled API
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackoffConfig {
    #[serde(default = "default_backoff_base_ms")]
    pub base_ms: u64,
    #[serde(default = "default_backoff_factor")]
    pub factor: f64,
    /// Multiplies each delay by a random factor in [0.5, 1.0).
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self { base_ms: default_backoff_base_ms(), factor: default_backoff_factor(), jitter: true }
    }
}

fn default_backoff_base_ms() -> u64 {
    1_000
}

fn default_backoff_factor() -> f64 {
    2.0
}

fn default_true() -> bool {
    true
}

/// Fixed window: `requests` allowed per `window_ms`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub requests: u32,
    pub window_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakerConfig {
    #[serde(default = "default_breaker_threshold")]
    pub threshold: u32,
    #[serde(default = "default_breaker_reset_secs")]
    pub reset_timeout_secs: u64,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            threshold: default_breaker_threshold(),
            reset_timeout_secs: default_breaker_reset_secs(),
        }
    }
}

fn default_breaker_threshold() -> u32 {
    5
}

fn default_breaker_reset_secs() -> u64 {
    60
}

/// Auth scheme for one endpoint. Secrets come from the credential vault at
/// runtime; config carries only the shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ApiAuth {
    #[default]
    None,
    /// API key sent in a named header.
    ApiKey { header: String },
    /// `Authorization: Bearer <token>` from the credential set.
    Bearer,
    /// HTTP basic from username + password.
    Basic,
    /// OAuth client-credentials grant; token fetched lazily and cached.
    OAuth {
        token_url: String,
        #[serde(default)]
        scopes: Vec<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaginationMode {
    Offset,
    Page,
    Cursor,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationConfig {
    pub mode: PaginationMode,
    #[serde(default = "default_page_limit")]
    pub limit: u32,
    /// Query parameter carrying the page number / offset / cursor.
    #[serde(default = "default_page_param")]
    pub param: String,
    /// Query parameter carrying the page size.
    #[serde(default = "default_limit_param")]
    pub limit_param: String,
    /// Dotted path to the next cursor in the response body
    /// (e.g. `pagination.next_token`). Cursor mode only.
    #[serde(default)]
    pub cursor_path: Option<String>,
}

fn default_page_limit() -> u32 {
    100
}

fn default_page_param() -> String {
    "page".into()
}

fn default_limit_param() -> String {
    "limit".into()
}

/// What an endpoint's records represent; drives queue priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseType {
    Alerts,
    ThreatIntel,
    Logs,
}

impl ResponseType {
    pub fn priority(self) -> JobPriority {
        match self {
            Self::Alerts => JobPriority::High,
            Self::ThreatIntel => JobPriority::Medium,
            Self::Logs => JobPriority::Low,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiEndpoint {
    pub path: String,
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(default)]
    pub query: IndexMap<String, String>,
    #[serde(default)]
    pub headers: IndexMap<String, String>,
    #[serde(default)]
    pub auth: ApiAuth,
    #[serde(default)]
    pub pagination: Option<PaginationConfig>,
    #[serde(default)]
    pub response_type: Option<ResponseType>,
    /// JSON body for POST endpoints.
    #[serde(default)]
    pub body: Option<Value>,
}

fn default_method() -> String {
    "GET".into()
}

impl ApiEndpoint {
    /// Queue priority for oversized batches from this endpoint.
    pub fn priority(&self) -> JobPriority {
        self.response_type.map(ResponseType::priority).unwrap_or(JobPriority::Medium)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiConfig {
    pub base_url: String,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retryable_statuses")]
    pub retryable_statuses: Vec<u16>,
    #[serde(default)]
    pub backoff: BackoffConfig,
    #[serde(default)]
    pub rate_limit: Option<RateLimitConfig>,
    #[serde(default)]
    pub breaker: BreakerConfig,
    pub endpoints: Vec<ApiEndpoint>,
}

fn default_poll_interval() -> u64 {
    300
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    3
}

fn default_retryable_statuses() -> Vec<u16> {
    vec![429, 500, 502, 503, 504]
}

// ---------------------------------------------------------------------------
// Webhook
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookConfig {
    /// Route path, must begin with `/`.
    pub path: String,
    #[serde(default)]
    pub verify_signature: bool,
    /// Header carrying the hex HMAC-SHA256 of the raw body.
    #[serde(default = "default_signature_header")]
    pub signature_header: String,
}

fn default_signature_header() -> String {
    "x-webhook-signature".into()
}

// ---------------------------------------------------------------------------
// File watcher
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileConfig {
    pub paths: Vec<String>,
    /// Substring include patterns (OR); empty matches everything.
    #[serde(default)]
    pub include: Vec<String>,
    /// Substring exclude patterns (any match drops).
    #[serde(default)]
    pub exclude: Vec<String>,
    #[serde(default)]
    pub hash_contents: bool,
    /// Regex marking high-priority paths.
    #[serde(default)]
    pub high_priority_pattern: Option<String>,
}

// ---------------------------------------------------------------------------
// Agent fleet
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default = "default_heartbeat_secs")]
    pub heartbeat_interval_secs: u64,
    /// Explicit inactivity cutoff; defaults to `2 × heartbeat`, minimum 120 s.
    #[serde(default)]
    pub agent_timeout_secs: Option<u64>,
    #[serde(default = "default_drain_interval")]
    pub drain_interval_secs: u64,
    #[serde(default = "default_drain_threshold")]
    pub drain_threshold: usize,
    #[serde(default = "default_max_recent_events")]
    pub max_recent_events: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval_secs: default_heartbeat_secs(),
            agent_timeout_secs: None,
            drain_interval_secs: default_drain_interval(),
            drain_threshold: default_drain_threshold(),
            max_recent_events: default_max_recent_events(),
        }
    }
}

impl AgentConfig {
    /// Inactivity cutoff in seconds: configured value, else twice the
    /// heartbeat interval, never below 120 s.
    pub fn agent_timeout_secs(&self) -> u64 {
        self.agent_timeout_secs
            .unwrap_or(self.heartbeat_interval_secs * 2)
            .max(120)
    }
}

fn default_heartbeat_secs() -> u64 {
    60
}

fn default_drain_interval() -> u64 {
    15
}

fn default_drain_threshold() -> usize {
    20
}

fn default_max_recent_events() -> usize {
    200
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
