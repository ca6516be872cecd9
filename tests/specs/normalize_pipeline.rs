// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Normalization pipeline scenarios: vendor severity overrides and the
//! deferred-batch path through the work queue.

use sentra_core::{
    AlertSeverity, ConnectorId, FakeClock, IngestJob, JobPriority, JobSource, OrganizationId,
};
use sentra_daemon::{NoHooks, NormalizeJobHandler};
use sentra_normalize::{map_severity, NoFallback, NormalizeContext, Normalizer};
use sentra_queue::{QueueConfig, WorkQueue};
use sentra_storage::MemoryStore;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn virustotal_analysis_ratio_maps_to_critical() {
    let normalizer = Normalizer::new(Arc::new(NoFallback));
    let ctx = NormalizeContext {
        vendor: "virustotal".into(),
        connector_name: "vt-feed".into(),
        organization_id: OrganizationId(1),
    };
    let input = json!({"attributes": {"last_analysis_stats": {
        "malicious": 60, "harmless": 20, "suspicious": 10, "undetected": 10
    }}});

    let out = normalizer.normalize(&input, &ctx).await.unwrap();
    assert_eq!(out.alert.unwrap().severity, AlertSeverity::Critical);
}

#[test]
fn severity_mapping_is_idempotent_across_the_canonical_scale() {
    for canonical in ["low", "medium", "high", "critical"] {
        let once = map_severity(&json!(canonical));
        let twice = map_severity(&json!(once.to_string()));
        assert_eq!(once, twice);
    }
}

#[tokio::test]
async fn queued_batches_honor_priority_and_retry_budget() {
    let clock = FakeClock::new();
    let store = Arc::new(MemoryStore::new());
    let queue = WorkQueue::new(
        QueueConfig {
            workers: 1,
            base_delay: Duration::from_millis(5),
            ..QueueConfig::default()
        },
        clock,
    );
    queue.start(Arc::new(NormalizeJobHandler {
        normalizer: Arc::new(Normalizer::new(Arc::new(NoFallback))),
        connectors: store.clone(),
        ingest: store.clone(),
        hooks: Arc::new(NoHooks),
    }));

    let source = JobSource {
        connector_name: "api".into(),
        vendor: "generic".into(),
        endpoint: Some("/bulk".into()),
    };
    queue
        .enqueue(IngestJob::new(
            ConnectorId(1),
            json!([{"title": "slow lane"}]),
            source.clone(),
            JobPriority::Low,
            chrono::Utc::now(),
        ))
        .unwrap();
    queue
        .enqueue(IngestJob::new(
            ConnectorId(1),
            json!([{"title": "fast lane", "severity": "critical"}]),
            source,
            JobPriority::Critical,
            chrono::Utc::now(),
        ))
        .unwrap();

    for _ in 0..500 {
        if store.alerts().len() == 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let alerts = store.alerts();
    assert_eq!(alerts.len(), 2);
    assert_eq!(queue.metrics().completed_total, 2);
    queue.shutdown().await;
}
