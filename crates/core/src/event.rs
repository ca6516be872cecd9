// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Raw events and status transitions emitted by connectors.
//!
//! A [`RawEvent`] is the untyped, pre-normalization record produced by a
//! connector. Once persisted it is immutable input to the normalizer.
//! Connectors push these (plus errors, [`StatusChange`]s, and metrics
//! snapshots) outward on typed channels; they never reach back into the
//! lifecycle manager.

use crate::connector::{ConnectorId, ConnectorStatus};
use crate::id::EventId;
use crate::intel::IocSet;
use crate::severity::EventSeverity;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Untyped record emitted by a connector, consumed by the lifecycle manager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawEvent {
    pub id: EventId,
    pub connector_id: ConnectorId,
    pub timestamp: DateTime<Utc>,
    /// Label identifying where the data came from (host, endpoint, path).
    pub source: String,
    pub message: String,
    pub severity: EventSeverity,
    #[serde(default)]
    pub raw_data: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iocs: Option<IocSet>,
}

impl RawEvent {
    pub fn new(
        connector_id: ConnectorId,
        timestamp: DateTime<Utc>,
        source: impl Into<String>,
        message: impl Into<String>,
        severity: EventSeverity,
    ) -> Self {
        Self {
            id: EventId::generate(),
            connector_id,
            timestamp,
            source: source.into(),
            message: message.into(),
            severity,
            raw_data: Map::new(),
            iocs: None,
        }
    }

    crate::setters! {
        set {
            raw_data: Map<String, Value>,
        }
        option {
            iocs: IocSet,
        }
    }

    /// Insert one raw-data field, chaining.
    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.raw_data.insert(key.into(), value);
        self
    }

    /// One-line summary for the daemon log.
    pub fn log_summary(&self) -> String {
        format!(
            "event connector={} event={} severity={} source={}",
            self.connector_id, self.id, self.severity, self.source
        )
    }
}

crate::builder! {
    pub struct RawEventBuilder => RawEvent {
        into {
            source: String = "test-source",
            message: String = "test message",
        }
        set {
            connector_id: ConnectorId = ConnectorId(1),
            severity: EventSeverity = EventSeverity::Info,
            raw_data: Map<String, Value> = Map::new(),
        }
        option {
            iocs: IocSet = None,
        }
        computed {
            id: EventId = EventId::generate(),
            timestamp: DateTime<Utc> = Utc::now(),
        }
    }
}

/// A status transition reported by a connector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChange {
    pub connector_id: ConnectorId,
    pub from: ConnectorStatus,
    pub to: ConnectorStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
