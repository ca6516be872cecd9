// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;

#[test]
fn new_alert_defaults_to_status_new() {
    let alert = Alert::new("boom", AlertSeverity::High, "syslog-1", OrganizationId(7));
    assert_eq!(alert.status, AlertStatus::New);
    assert_eq!(alert.severity, AlertSeverity::High);
    assert!(alert.metadata.is_empty());
}

#[test]
fn with_original_preserves_payload_in_metadata() {
    let original = json!({"vendor_field": 1, "nested": {"a": true}});
    let alert = Alert::new("t", AlertSeverity::Low, "s", OrganizationId(1))
        .with_original(original.clone());
    assert_eq!(alert.metadata.get("originalData"), Some(&original));
}

#[test]
fn optional_ips_are_omitted_from_json_when_absent() {
    let alert = Alert::new("t", AlertSeverity::Low, "s", OrganizationId(1));
    let json = serde_json::to_value(&alert).unwrap();
    assert!(json.get("source_ip").is_none());
    assert!(json.get("destination_ip").is_none());
}

#[test]
fn setters_chain() {
    let alert = Alert::new("t", AlertSeverity::Medium, "s", OrganizationId(1))
        .description("details")
        .source_ip("192.0.2.10")
        .destination_ip("192.0.2.20");
    assert_eq!(alert.description, "details");
    assert_eq!(alert.source_ip.as_deref(), Some("192.0.2.10"));
    assert_eq!(alert.destination_ip.as_deref(), Some("192.0.2.20"));
}
