// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;

#[test]
fn extract_follows_dotted_paths() {
    let rule = FieldRule::new("device.local_ip");
    let payload = json!({"device": {"local_ip": "10.1.2.3"}});
    assert_eq!(rule.extract(&payload), Some("10.1.2.3".into()));
}

#[test]
fn extract_stringifies_scalars() {
    let rule = FieldRule::new("severity");
    assert_eq!(rule.extract(&json!({"severity": 7})), Some("7".into()));
}

#[yare::parameterized(
    lowercase = { Transform::Lowercase, "ALERT", "alert" },
    uppercase = { Transform::Uppercase, "alert", "ALERT" },
    none = { Transform::None, "Alert", "Alert" },
)]
fn transforms_apply(transform: Transform, input: &str, expected: &str) {
    let rule = FieldRule { path: "v".into(), transform, required: false };
    assert_eq!(rule.extract(&json!({"v": input})), Some(expected.into()));
}

#[test]
fn null_extracts_as_absent() {
    let rule = FieldRule::new("v");
    assert_eq!(rule.extract(&json!({"v": null})), None);
}

#[test]
fn missing_required_names_the_field() {
    let rules = VendorRules {
        title: Some(FieldRule::required("detection_name")),
        description: Some(FieldRule::new("description")),
        ..Default::default()
    };
    assert_eq!(rules.missing_required(&json!({"description": "d"})), Some("title"));
    assert_eq!(rules.missing_required(&json!({"detection_name": "n"})), None);
}

#[test]
fn builtin_rules_cover_shipped_vendors() {
    let rules = builtin_rules();
    for vendor in ["crowdstrike", "virustotal", "misp", "otx", "generic"] {
        assert!(rules.contains_key(vendor), "missing {vendor}");
    }
}
