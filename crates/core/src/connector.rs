// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Persisted connector row shared between the store and the lifecycle manager.
//!
//! The store's integer primary key is authoritative; `(organization, name)` is
//! only the display key. `status = Disabled` implies the runtime object must
//! not exist.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Store-assigned primary key of a connector row.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct ConnectorId(pub i64);

impl ConnectorId {
    pub fn new(id: i64) -> Self {
        Self(id)
    }
}

impl fmt::Display for ConnectorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for ConnectorId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Tenant owning a connector and its derived records.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct OrganizationId(pub i64);

impl fmt::Display for OrganizationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The five ingestion source kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectorType {
    Syslog,
    Api,
    Webhook,
    File,
    Agent,
}

crate::simple_display! {
    ConnectorType {
        Syslog => "syslog",
        Api => "api",
        Webhook => "webhook",
        File => "file",
        Agent => "agent",
    }
}

impl ConnectorType {
    /// Poll-driven types are ticked by the scheduler; the rest run
    /// continuously (or passively) after a single `start()`.
    pub fn is_polled(&self) -> bool {
        matches!(self, Self::Api)
    }
}

/// Runtime status of a connector as persisted on its record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectorStatus {
    Active,
    Paused,
    Disabled,
    Error,
    Warning,
}

crate::simple_display! {
    ConnectorStatus {
        Active => "active",
        Paused => "paused",
        Disabled => "disabled",
        Error => "error",
        Warning => "warning",
    }
}

impl ConnectorStatus {
    /// Whether a connector in this status may emit events.
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Active | Self::Warning)
    }
}

/// Persisted connector row (authoritative schema shared with the store).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectorRecord {
    pub id: ConnectorId,
    pub organization_id: OrganizationId,
    pub name: String,
    #[serde(rename = "type")]
    pub connector_type: ConnectorType,
    pub vendor: String,
    /// Opaque JSON configuration, parsed at construction into
    /// [`crate::config::ConnectorConfig`].
    pub configuration: serde_json::Value,
    /// Sealed credential blob, if credentials were provided.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials: Option<serde_json::Value>,
    pub status: ConnectorStatus,
    pub is_active: bool,
    #[serde(default)]
    pub last_successful_connection: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_data: Option<DateTime<Utc>>,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub events_per_min: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

crate::builder! {
    pub struct ConnectorRecordBuilder => ConnectorRecord {
        into {
            name: String = "test-connector",
            vendor: String = "generic",
        }
        set {
            id: ConnectorId = ConnectorId(1),
            organization_id: OrganizationId = OrganizationId(1),
            connector_type: ConnectorType = ConnectorType::Api,
            configuration: serde_json::Value = serde_json::Value::Null,
            status: ConnectorStatus = ConnectorStatus::Active,
            is_active: bool = true,
        }
        option {
            credentials: serde_json::Value = None,
            error_message: String = None,
        }
        computed {
            last_successful_connection: Option<DateTime<Utc>> = None,
            last_data: Option<DateTime<Utc>> = None,
            events_per_min: u64 = 0,
            created_at: DateTime<Utc> = Utc::now(),
            updated_at: DateTime<Utc> = Utc::now(),
        }
    }
}

#[cfg(test)]
#[path = "connector_tests.rs"]
mod tests;
