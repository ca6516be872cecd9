// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Canonical alert shape persisted for analyst consumption.
//!
//! Title and severity are required; `metadata` keeps enough of the original
//! payload (under `originalData`) to reconstruct provenance.

use crate::connector::OrganizationId;
use crate::severity::AlertSeverity;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Triage status of an alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AlertStatus {
    #[default]
    New,
    Ack,
    Closed,
}

crate::simple_display! {
    AlertStatus {
        New => "new",
        Ack => "ack",
        Closed => "closed",
    }
}

/// Post-normalization alert record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub title: String,
    pub description: String,
    pub severity: AlertSeverity,
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_ip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination_ip: Option<String>,
    #[serde(default)]
    pub status: AlertStatus,
    pub organization_id: OrganizationId,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl Alert {
    /// Minimal constructor; everything else defaults.
    pub fn new(
        title: impl Into<String>,
        severity: AlertSeverity,
        source: impl Into<String>,
        organization_id: OrganizationId,
    ) -> Self {
        Self {
            title: title.into(),
            description: String::new(),
            severity,
            source: source.into(),
            source_ip: None,
            destination_ip: None,
            status: AlertStatus::New,
            organization_id,
            metadata: Map::new(),
        }
    }

    crate::setters! {
        into {
            description: String,
        }
        set {
            metadata: Map<String, Value>,
        }
        option {
            source_ip: String,
            destination_ip: String,
        }
    }

    /// Stash the untouched source payload under `metadata.originalData`.
    pub fn with_original(mut self, original: Value) -> Self {
        self.metadata.insert("originalData".into(), original);
        self
    }
}

crate::builder! {
    pub struct AlertBuilder => Alert {
        into {
            title: String = "test alert",
            description: String = "",
            source: String = "test-source",
        }
        set {
            severity: AlertSeverity = AlertSeverity::Medium,
            organization_id: OrganizationId = OrganizationId(1),
            status: AlertStatus = AlertStatus::New,
            metadata: Map<String, Value> = Map::new(),
        }
        option {
            source_ip: String = None,
            destination_ip: String = None,
        }
    }
}

#[cfg(test)]
#[path = "alert_tests.rs"]
mod tests;
