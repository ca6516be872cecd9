// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Polled-API ingestion end to end: pagination through the lifecycle
//! manager into the store, and oversized batches through the work queue.

use axum::extract::Query;
use axum::routing::get;
use axum::{Json, Router};
use sentra_connectors::{ConnectorDeps, CycleOutcome, WebhookRegistry};
use sentra_core::{ConnectorId, ConnectorRecord, ConnectorType, FakeClock, Parse};
use sentra_daemon::{
    LifecycleManager, NoHooks, NormalizeJobHandler, QueueJobSink, RealtimeBus,
    StoreAgentDirectory, StoreAlertSink,
};
use sentra_normalize::{NoFallback, Normalizer};
use sentra_queue::{QueueConfig, WorkQueue};
use sentra_storage::{ConnectorStore, MemoryStore};
use sentra_vault::Vault;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

struct Stack {
    manager: LifecycleManager<FakeClock>,
    store: Arc<MemoryStore>,
    queue: Arc<WorkQueue<FakeClock>>,
}

fn stack() -> Stack {
    let clock = FakeClock::new();
    let store = Arc::new(MemoryStore::new());
    let vault = Arc::new(Vault::new(b"specs-api".to_vec(), clock.clone()));
    let queue = Arc::new(WorkQueue::new(
        QueueConfig { base_delay: Duration::from_millis(10), ..QueueConfig::default() },
        clock.clone(),
    ));
    let realtime = RealtimeBus::default();
    let hooks = Arc::new(NoHooks);
    let normalizer = Arc::new(Normalizer::new(Arc::new(NoFallback)));

    queue.start(Arc::new(NormalizeJobHandler {
        normalizer: normalizer.clone(),
        connectors: store.clone(),
        ingest: store.clone(),
        hooks: hooks.clone(),
    }));

    let deps = ConnectorDeps {
        clock: clock.clone(),
        vault,
        job_sink: Arc::new(QueueJobSink(queue.clone())),
        alert_sink: Arc::new(StoreAlertSink {
            ingest: store.clone(),
            realtime: realtime.clone(),
            hooks: hooks.clone(),
        }),
        agent_directory: Arc::new(StoreAgentDirectory(store.clone())),
        webhook_registry: Arc::new(WebhookRegistry::new()),
    };
    let manager = LifecycleManager::new(
        clock,
        deps,
        store.clone(),
        store.clone(),
        normalizer,
        queue.clone(),
        realtime,
        hooks,
        Parse::Lenient,
    );
    Stack { manager, store, queue }
}

async fn serve(router: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    addr
}

async fn wait_until(mut done: impl FnMut() -> bool) {
    for _ in 0..500 {
        if done() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached");
}

#[tokio::test]
async fn cursor_pagination_lands_ordered_events_in_the_store() {
    #[derive(serde::Deserialize)]
    struct Params {
        cursor: Option<String>,
    }
    let addr = serve(Router::new().route(
        "/events",
        get(|Query(params): Query<Params>| async move {
            match params.cursor.as_deref() {
                None => Json(json!({
                    "data": [{"id": 1}, {"id": 2}],
                    "pagination": {"next_token": "T"}
                })),
                _ => Json(json!({"data": [{"id": 3}], "pagination": {}})),
            }
        }),
    ))
    .await;

    let stack = stack();
    stack
        .store
        .upsert(
            ConnectorRecord::builder()
                .id(ConnectorId(1))
                .name("paged-api")
                .connector_type(ConnectorType::Api)
                .configuration(json!({
                    "base_url": format!("http://{addr}"),
                    "endpoints": [{
                        "path": "/events",
                        "pagination": {
                            "mode": "cursor",
                            "limit": 2,
                            "param": "cursor",
                            "cursor_path": "pagination.next_token"
                        }
                    }]
                }))
                .build(),
        )
        .await
        .unwrap();

    stack.manager.bootstrap().await.unwrap();
    let outcome = stack.manager.run_now(ConnectorId(1)).await.unwrap();
    assert_eq!(outcome, CycleOutcome::Completed { events: 3 });

    let store = stack.store.clone();
    wait_until(move || store.raw_events().len() == 3).await;

    let ids: Vec<i64> = stack
        .store
        .raw_events()
        .iter()
        .map(|e| e.raw_data["record"]["id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, vec![1, 2, 3]);

    // One cycle counted as a success on the record.
    let row = stack.store.get(ConnectorId(1)).await.unwrap().unwrap();
    assert!(row.last_successful_connection.is_some());
    stack.manager.shutdown().await;
    stack.queue.shutdown().await;
}

#[tokio::test]
async fn oversized_batches_flow_through_the_queue_into_alerts() {
    let records: Vec<serde_json::Value> = (0..150)
        .map(|i| json!({"title": format!("alert {i}"), "severity": "high"}))
        .collect();
    let addr = serve(Router::new().route(
        "/bulk",
        get(move || {
            let records = records.clone();
            async move { Json(json!({"data": records})) }
        }),
    ))
    .await;

    let stack = stack();
    stack
        .store
        .upsert(
            ConnectorRecord::builder()
                .id(ConnectorId(2))
                .name("bulk-api")
                .connector_type(ConnectorType::Api)
                .configuration(json!({
                    "base_url": format!("http://{addr}"),
                    "endpoints": [{"path": "/bulk", "response_type": "alerts"}]
                }))
                .build(),
        )
        .await
        .unwrap();

    stack.manager.bootstrap().await.unwrap();
    stack.manager.run_now(ConnectorId(2)).await.unwrap();

    // The queue worker normalizes the whole batch asynchronously.
    let store = stack.store.clone();
    wait_until(move || store.alerts().len() == 150).await;

    let alerts = stack.store.alerts();
    assert_eq!(alerts[0].title, "alert 0");
    assert_eq!(alerts[149].title, "alert 149");
    assert_eq!(stack.queue.metrics().completed_total, 1);
    stack.manager.shutdown().await;
    stack.queue.shutdown().await;
}
