// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Registered host-agent entries, subordinate to an agent connector.
//!
//! `last_heartbeat` only moves forward (stale heartbeats are rejected at the
//! ingress), and `Inactive` is set only by the liveness sweep, never by the
//! agent itself.

use crate::id::AgentId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Liveness status of a registered agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    Active,
    Warning,
    Inactive,
    Error,
}

crate::simple_display! {
    AgentStatus {
        Active => "active",
        Warning => "warning",
        Inactive => "inactive",
        Error => "error",
    }
}

/// One registered host agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentEntry {
    pub agent_id: AgentId,
    pub hostname: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    pub os: String,
    pub version: String,
    #[serde(default)]
    pub capabilities: Vec<String>,
    pub status: AgentStatus,
    pub last_heartbeat: DateTime<Utc>,
    /// Vault-issued bearer token, bound 1:1 to `agent_id`. Never logged.
    #[serde(skip_serializing)]
    pub token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_metrics: Option<Value>,
}

impl AgentEntry {
    /// Apply a heartbeat, enforcing the monotonic timestamp invariant.
    ///
    /// Returns `false` (and leaves the entry untouched) when the reported
    /// timestamp is older than the stored one.
    pub fn apply_heartbeat(
        &mut self,
        at: DateTime<Utc>,
        status: AgentStatus,
        metrics: Option<Value>,
    ) -> bool {
        if at < self.last_heartbeat {
            return false;
        }
        self.last_heartbeat = at;
        // The sweep owns the Inactive transition; an agent reporting
        // "inactive" about itself is ignored.
        if status != AgentStatus::Inactive {
            self.status = status;
        }
        if metrics.is_some() {
            self.last_metrics = metrics;
        }
        true
    }
}

#[cfg(test)]
#[path = "agent_tests.rs"]
mod tests;
