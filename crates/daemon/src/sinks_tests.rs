// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use parking_lot::Mutex;
use sentra_core::{AlertSeverity, ConnectorRecord, ConnectorType, JobPriority, JobSource};
use sentra_normalize::NoFallback;
use sentra_storage::MemoryStore;
use serde_json::json;

struct CountingHooks {
    seen: Mutex<Vec<String>>,
}

#[async_trait]
impl InsightHooks for CountingHooks {
    async fn on_actionable_alert(&self, alert: &Alert) {
        self.seen.lock().push(alert.title.clone());
    }
}

fn job(payload: Value) -> IngestJob {
    IngestJob::new(
        ConnectorId(1),
        payload,
        JobSource {
            connector_name: "api-1".into(),
            vendor: "generic".into(),
            endpoint: Some("/events".into()),
        },
        JobPriority::Medium,
        chrono::Utc::now(),
    )
}

fn handler(store: Arc<MemoryStore>, hooks: Arc<CountingHooks>) -> NormalizeJobHandler {
    NormalizeJobHandler {
        normalizer: Arc::new(Normalizer::new(Arc::new(NoFallback))),
        connectors: store.clone(),
        ingest: store,
        hooks,
    }
}

#[tokio::test]
async fn batch_normalizes_into_alerts() {
    let store = Arc::new(MemoryStore::new());
    sentra_storage::ConnectorStore::upsert(
        store.as_ref(),
        ConnectorRecord::builder()
            .id(ConnectorId(1))
            .connector_type(ConnectorType::Api)
            .build(),
    )
    .await
    .unwrap();
    let hooks = Arc::new(CountingHooks { seen: Mutex::new(Vec::new()) });
    let handler = handler(store.clone(), hooks.clone());

    let payload = json!([
        {"title": "low one", "severity": "low"},
        {"title": "critical one", "severity": "critical"},
    ]);
    sentra_queue::JobHandler::handle(&handler, &job(payload)).await.unwrap();

    let alerts = store.alerts();
    assert_eq!(alerts.len(), 2);
    assert_eq!(alerts[0].title, "low one");
    assert_eq!(alerts[1].severity, AlertSeverity::Critical);
    // Only the critical alert reached the insight hooks.
    assert_eq!(*hooks.seen.lock(), vec!["critical one".to_string()]);
}

#[tokio::test]
async fn missing_connector_row_still_normalizes() {
    let store = Arc::new(MemoryStore::new());
    let hooks = Arc::new(CountingHooks { seen: Mutex::new(Vec::new()) });
    let handler = handler(store.clone(), hooks);

    sentra_queue::JobHandler::handle(&handler, &job(json!([{"title": "t"}])))
        .await
        .unwrap();
    assert_eq!(store.alerts().len(), 1);
}

#[tokio::test]
async fn alert_sink_persists_and_invokes_hooks() {
    let store = Arc::new(MemoryStore::new());
    let hooks = Arc::new(CountingHooks { seen: Mutex::new(Vec::new()) });
    let bus = RealtimeBus::default();
    let mut rx = bus.subscribe();
    let sink = StoreAlertSink {
        ingest: store.clone(),
        realtime: bus,
        hooks: hooks.clone(),
    };

    sink.publish(Alert::new("high!", AlertSeverity::High, "s", OrganizationId(1))).await;
    sink.publish(Alert::new("meh", AlertSeverity::Low, "s", OrganizationId(1))).await;

    assert_eq!(store.alerts().len(), 2);
    assert_eq!(*hooks.seen.lock(), vec!["high!".to_string()]);
    let frame = rx.recv().await.unwrap();
    assert_eq!(serde_json::to_value(&frame).unwrap()["type"], "alert");
}

#[tokio::test]
async fn queue_sink_translates_queue_full() {
    let clock = sentra_core::FakeClock::new();
    let queue = Arc::new(WorkQueue::new(
        sentra_queue::QueueConfig { capacity: 1, ..Default::default() },
        clock,
    ));
    let sink = QueueJobSink(queue);
    assert!(sink.enqueue(job(json!([])) ).is_ok());
    assert!(sink.enqueue(job(json!([]))).is_err());
}
