// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent event-to-alert policy.
//!
//! An alert is generated when the event type names a security concern, the
//! severity is high/critical, or a file_change touches a critical system
//! path. Titles are operator-facing and formatted per event type.

use chrono::{DateTime, Utc};
use sentra_core::{AgentId, Alert, AlertSeverity, EventSeverity, OrganizationId};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// One event submitted by a host agent via `POST /data`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentDataEvent {
    pub agent_id: AgentId,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub severity: String,
    pub message: String,
    #[serde(default)]
    pub details: Value,
}

const SECURITY_MARKERS: [&str; 4] = ["security", "threat", "malware", "attack"];

const CRITICAL_FILE_PREFIXES: [&str; 3] = ["/etc/", "/bin/", "C:\\Windows\\System32"];

/// Map the agent-reported severity string to the raw-event scale.
pub(crate) fn event_severity(severity: &str) -> EventSeverity {
    match severity.to_ascii_lowercase().as_str() {
        "critical" => EventSeverity::Critical,
        "high" | "error" => EventSeverity::Error,
        "medium" | "warning" | "warn" => EventSeverity::Warn,
        _ => EventSeverity::Info,
    }
}

fn alert_severity(severity: &str) -> AlertSeverity {
    match severity.to_ascii_lowercase().as_str() {
        "critical" => AlertSeverity::Critical,
        "high" => AlertSeverity::High,
        "low" => AlertSeverity::Low,
        _ => AlertSeverity::Medium,
    }
}

fn touches_critical_path(details: &Value) -> bool {
    details
        .get("path")
        .and_then(Value::as_str)
        .is_some_and(|path| CRITICAL_FILE_PREFIXES.iter().any(|prefix| path.starts_with(prefix)))
}

/// Whether this event warrants an alert.
pub(crate) fn warrants_alert(event: &AgentDataEvent) -> bool {
    let event_type = event.event_type.to_ascii_lowercase();
    if SECURITY_MARKERS.iter().any(|marker| event_type.contains(marker)) {
        return true;
    }
    if matches!(alert_severity(&event.severity), AlertSeverity::High | AlertSeverity::Critical) {
        return true;
    }
    event_type == "file_change" && touches_critical_path(&event.details)
}

/// Operator-facing title per event type, falling back to a humanized form.
fn alert_title(event_type: &str, hostname: &str) -> String {
    match event_type {
        "malware_detected" => format!("Malware detectado en {hostname}"),
        "suspicious_network" | "network_anomaly" => {
            format!("Actividad de red sospechosa en {hostname}")
        }
        "intrusion_attempt" => format!("Intento de intrusión en {hostname}"),
        "file_change" => format!("Archivo crítico modificado en {hostname}"),
        other => format!("{} en {hostname}", humanize(other)),
    }
}

fn humanize(event_type: &str) -> String {
    let mut out = String::with_capacity(event_type.len());
    for (i, word) in event_type.split('_').enumerate() {
        if i > 0 {
            out.push(' ');
        }
        let mut chars = word.chars();
        if let Some(first) = chars.next() {
            if i == 0 {
                out.extend(first.to_uppercase());
            } else {
                out.push(first);
            }
            out.push_str(chars.as_str());
        }
    }
    out
}

/// Build the alert for an event that passed [`warrants_alert`].
pub(crate) fn build_alert(
    event: &AgentDataEvent,
    hostname: &str,
    connector_name: &str,
    org_id: OrganizationId,
) -> Alert {
    let mut alert = Alert::new(
        alert_title(&event.event_type, hostname),
        alert_severity(&event.severity),
        connector_name.to_string(),
        org_id,
    )
    .description(event.message.clone());
    alert.metadata.insert("agentId".into(), json!(event.agent_id));
    alert.metadata.insert("eventType".into(), json!(event.event_type));
    alert.metadata.insert("details".into(), event.details.clone());
    alert
}

#[cfg(test)]
#[path = "policy_tests.rs"]
mod tests;
