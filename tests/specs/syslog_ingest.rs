// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Syslog ingestion end to end: a UDP datagram becomes a raw-event row and
//! a normalized alert.

use sentra_connectors::{ConnectorDeps, WebhookRegistry};
use sentra_core::{ConnectorId, ConnectorRecord, ConnectorType, EventSeverity, FakeClock, Parse};
use sentra_daemon::{
    LifecycleManager, NoHooks, QueueJobSink, RealtimeBus, StoreAgentDirectory, StoreAlertSink,
};
use sentra_normalize::{NoFallback, Normalizer};
use sentra_queue::{QueueConfig, WorkQueue};
use sentra_storage::{ConnectorStore, MemoryStore};
use sentra_vault::Vault;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

async fn free_udp_port() -> u16 {
    let socket = tokio::net::UdpSocket::bind("127.0.0.1:0").await.unwrap();
    socket.local_addr().unwrap().port()
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
async fn udp_datagram_becomes_raw_event_and_alert() {
    let clock = FakeClock::new();
    let store = Arc::new(MemoryStore::new());
    let vault = Arc::new(Vault::new(b"specs-syslog".to_vec(), clock.clone()));
    let queue = Arc::new(WorkQueue::new(QueueConfig::default(), clock.clone()));
    let realtime = RealtimeBus::default();
    let hooks = Arc::new(NoHooks);

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
        Arc::new(Normalizer::new(Arc::new(NoFallback))),
        queue.clone(),
        realtime,
        hooks,
        Parse::Lenient,
    );

    let port = free_udp_port().await;
    store
        .upsert(
            ConnectorRecord::builder()
                .id(ConnectorId(1))
                .name("edge-syslog")
                .vendor("syslog")
                .connector_type(ConnectorType::Syslog)
                .configuration(json!({
                    "protocol": "udp",
                    "bind_addr": "127.0.0.1",
                    "port": port,
                }))
                .build(),
        )
        .await
        .unwrap();
    manager.bootstrap().await.unwrap();

    let client = tokio::net::UdpSocket::bind("127.0.0.1:0").await.unwrap();
    client
        .send_to(
            b"<34>Oct 11 22:14:15 mymachine su: 'su root' failed for lonvick on /dev/pts/8",
            ("127.0.0.1", port),
        )
        .await
        .unwrap();

    let probe = store.clone();
    wait_until(move || !probe.alerts().is_empty()).await;

    let raw = store.raw_events();
    assert_eq!(raw.len(), 1);
    let event = &raw[0];
    assert_eq!(event.raw_data["facility"], 4);
    assert_eq!(event.raw_data["severity_code"], 2);
    assert_eq!(event.source, "mymachine");
    assert_eq!(event.raw_data["app_name"], "su");
    assert_eq!(event.severity, EventSeverity::Critical);

    // The normalizer turned it into an alert preserving provenance.
    let alerts = store.alerts();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].metadata["eventId"], event.id.as_str());

    manager.shutdown().await;
    queue.shutdown().await;
}
