// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;

#[yare::parameterized(
    nine_plus = { json!(9), AlertSeverity::Critical },
    ten = { json!(10), AlertSeverity::Critical },
    seven = { json!(7.5), AlertSeverity::High },
    four = { json!(4), AlertSeverity::Medium },
    three = { json!(3.9), AlertSeverity::Low },
    zero = { json!(0), AlertSeverity::Low },
    numeric_string = { json!("8"), AlertSeverity::High },
)]
fn numeric_scale(raw: serde_json::Value, expected: AlertSeverity) {
    assert_eq!(map_severity(&raw), expected);
}

#[yare::parameterized(
    fatal = { "fatal", AlertSeverity::Critical },
    emergency = { "EMERGENCY", AlertSeverity::Critical },
    severe = { "severe", AlertSeverity::Critical },
    important = { "important", AlertSeverity::High },
    error = { "error", AlertSeverity::High },
    red = { "red", AlertSeverity::High },
    major = { "major", AlertSeverity::High },
    danger = { "danger", AlertSeverity::High },
    warning = { "warning", AlertSeverity::Medium },
    amber = { "amber", AlertSeverity::Medium },
    yellow = { "yellow", AlertSeverity::Medium },
    moderate = { "moderate", AlertSeverity::Medium },
    minor = { "minor", AlertSeverity::Low },
    informational = { "informational", AlertSeverity::Low },
    green = { "green", AlertSeverity::Low },
    unknown = { "bananas", AlertSeverity::Medium },
)]
fn string_classes(raw: &str, expected: AlertSeverity) {
    assert_eq!(map_severity(&json!(raw)), expected);
}

#[yare::parameterized(
    low = { "low" },
    medium = { "medium" },
    high = { "high" },
    critical = { "critical" },
)]
fn mapping_is_idempotent_on_canonical_values(canonical: &str) {
    let mapped = map_severity(&json!(canonical));
    assert_eq!(mapped.to_string(), canonical);
    // A second application is a fixed point.
    assert_eq!(map_severity(&json!(mapped.to_string())), mapped);
}

#[test]
fn virustotal_ratio_drives_severity() {
    // 60 of 80 decided verdicts: 0.75 > 0.7.
    let payload = json!({"attributes": {"last_analysis_stats": {
        "malicious": 60, "harmless": 20, "suspicious": 10, "undetected": 10
    }}});
    assert_eq!(virustotal_severity(&payload), Some(AlertSeverity::Critical));

    let payload = json!({"attributes": {"last_analysis_stats": {
        "malicious": 45, "harmless": 55
    }}});
    assert_eq!(virustotal_severity(&payload), Some(AlertSeverity::High));

    let payload = json!({"attributes": {"last_analysis_stats": {
        "malicious": 2, "harmless": 98
    }}});
    assert_eq!(virustotal_severity(&payload), Some(AlertSeverity::Low));
}

#[test]
fn virustotal_undecided_verdicts_stay_out_of_the_ratio() {
    // 8 malicious vs 2 clean; the 90 undetected engines do not dilute it.
    let payload = json!({"attributes": {"last_analysis_stats": {
        "malicious": 8, "harmless": 2, "undetected": 90
    }}});
    assert_eq!(virustotal_severity(&payload), Some(AlertSeverity::Critical));
}

#[test]
fn virustotal_without_stats_yields_none() {
    assert_eq!(virustotal_severity(&json!({"attributes": {}})), None);
    assert_eq!(
        virustotal_severity(&json!({"attributes": {"last_analysis_stats": {}}})),
        None
    );
    // Only undecided verdicts: nothing to take a ratio over.
    assert_eq!(
        virustotal_severity(&json!({"attributes": {"last_analysis_stats": {
            "suspicious": 5, "undetected": 60
        }}})),
        None
    );
}

#[yare::parameterized(
    one = { 1, AlertSeverity::Critical },
    two = { 2, AlertSeverity::High },
    three = { 3, AlertSeverity::Medium },
    four = { 4, AlertSeverity::Low },
)]
fn misp_threat_levels(level: u64, expected: AlertSeverity) {
    let payload = json!({"Event": {"threat_level_id": level}});
    assert_eq!(misp_severity(&payload), Some(expected));
}

#[yare::parameterized(
    red = { "red", AlertSeverity::Critical },
    amber = { "amber", AlertSeverity::High },
    green = { "green", AlertSeverity::Medium },
    white = { "white", AlertSeverity::Low },
)]
fn otx_tlp(tlp: &str, expected: AlertSeverity) {
    assert_eq!(otx_severity(&json!({"tlp": tlp})), Some(expected));
}

#[test]
fn vendor_override_beats_raw_field() {
    let payload = json!({"tlp": "red", "severity": "low"});
    let raw = payload.get("severity");
    assert_eq!(vendor_severity("otx", &payload, raw), AlertSeverity::Critical);
}

#[test]
fn unknown_vendor_uses_raw_field() {
    let payload = json!({"severity": "high"});
    let raw = payload.get("severity");
    assert_eq!(vendor_severity("acme", &payload, raw), AlertSeverity::High);
}

mod properties {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn every_input_maps_to_some_canonical_value(s in ".{0,24}") {
            // Never panics, always lands on the four-step scale.
            let _ = map_severity(&json!(s));
        }

        #[test]
        fn idempotent_for_all_outputs(n in 0.0f64..12.0) {
            let first = map_severity(&json!(n));
            let second = map_severity(&json!(first.to_string()));
            prop_assert_eq!(first, second);
        }
    }
}
