// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn empty_set_reports_empty() {
    let set = IocSet::default();
    assert!(set.is_empty());
    assert_eq!(set.len(), 0);
}

#[test]
fn merge_deduplicates_per_bucket() {
    let mut a = IocSet {
        ips: vec!["10.0.0.1".into()],
        domains: vec!["evil.example".into()],
        ..Default::default()
    };
    let b = IocSet {
        ips: vec!["10.0.0.1".into(), "10.0.0.2".into()],
        hashes: vec!["d41d8cd9".into()],
        ..Default::default()
    };
    a.merge(b);
    assert_eq!(a.ips, vec!["10.0.0.1".to_string(), "10.0.0.2".to_string()]);
    assert_eq!(a.hashes.len(), 1);
    assert_eq!(a.len(), 4);
}

#[yare::parameterized(
    below = { -5, 0 },
    zero = { 0, 0 },
    mid = { 55, 55 },
    top = { 100, 100 },
    above = { 250, 100 },
)]
fn confidence_is_clamped(raw: i64, expected: u8) {
    assert_eq!(ThreatIntel::clamp_confidence(raw), expected);
}
