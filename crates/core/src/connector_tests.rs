// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn record_serializes_type_field_with_wire_name() {
    let record = ConnectorRecord::builder()
        .connector_type(ConnectorType::Syslog)
        .build();
    let json = serde_json::to_value(&record).unwrap();
    assert_eq!(json["type"], "syslog");
    assert_eq!(json["status"], "active");
}

#[yare::parameterized(
    syslog = { ConnectorType::Syslog, false },
    api = { ConnectorType::Api, true },
    webhook = { ConnectorType::Webhook, false },
    file = { ConnectorType::File, false },
    agent = { ConnectorType::Agent, false },
)]
fn only_api_is_polled(ty: ConnectorType, polled: bool) {
    assert_eq!(ty.is_polled(), polled);
}

#[yare::parameterized(
    active = { ConnectorStatus::Active, true },
    warning = { ConnectorStatus::Warning, true },
    paused = { ConnectorStatus::Paused, false },
    disabled = { ConnectorStatus::Disabled, false },
    error = { ConnectorStatus::Error, false },
)]
fn running_statuses(status: ConnectorStatus, running: bool) {
    assert_eq!(status.is_running(), running);
}

#[test]
fn connector_id_displays_as_integer() {
    assert_eq!(ConnectorId(42).to_string(), "42");
}
