// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;

fn job(priority: JobPriority) -> IngestJob {
    IngestJob::new(
        ConnectorId(1),
        json!([{"id": 1}]),
        JobSource {
            connector_name: "api-1".into(),
            vendor: "generic".into(),
            endpoint: Some("/events".into()),
        },
        priority,
        Utc::now(),
    )
}

#[yare::parameterized(
    low = { JobPriority::Low, 3 },
    medium = { JobPriority::Medium, 3 },
    high = { JobPriority::High, 3 },
    critical = { JobPriority::Critical, 5 },
)]
fn max_attempts_by_priority(priority: JobPriority, expected: u32) {
    assert_eq!(job(priority).max_attempts, expected);
}

#[test]
fn priority_band_ordering() {
    assert!(JobPriority::Critical > JobPriority::High);
    assert!(JobPriority::High > JobPriority::Medium);
    assert!(JobPriority::Medium > JobPriority::Low);
}

#[test]
fn retryable_until_attempts_exhausted() {
    let mut j = job(JobPriority::Medium);
    assert!(j.retryable());
    j.attempts = 2;
    assert!(j.retryable());
    j.attempts = 3;
    assert!(!j.retryable());
}
