// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent fleet end to end through the daemon HTTP surface: registration,
//! heartbeat, and the liveness sweep synthesizing an inactivity alert.

use sentra_connectors::agent::AgentConnector;
use sentra_connectors::Connector;
use sentra_core::{
    AgentConfig, AgentStatus, AlertSeverity, Clock, ConnectorId, FakeClock, OrganizationId,
};
use sentra_daemon::http::{build_router, HttpState};
use sentra_daemon::{NoHooks, RealtimeBus, StoreAgentDirectory, StoreAlertSink};
use sentra_connectors::WebhookRegistry;
use sentra_storage::MemoryStore;
use sentra_vault::Vault;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

const MASTER_TOKEN: &str = "fleet-master-token";

struct Fleet {
    connector: AgentConnector<FakeClock>,
    store: Arc<MemoryStore>,
    clock: FakeClock,
    addr: SocketAddr,
    client: reqwest::Client,
}

async fn fleet() -> Fleet {
    let clock = FakeClock::new();
    let store = Arc::new(MemoryStore::new());
    let vault = Arc::new(Vault::new(b"specs-agents".to_vec(), clock.clone()));
    let realtime = RealtimeBus::default();

    let (connector, _rx) = AgentConnector::new(
        ConnectorId(1),
        "fleet",
        AgentConfig::default(),
        OrganizationId(1),
        MASTER_TOKEN.into(),
        vault,
        Arc::new(StoreAlertSink {
            ingest: store.clone(),
            realtime: realtime.clone(),
            hooks: Arc::new(NoHooks),
        }),
        Arc::new(StoreAgentDirectory(store.clone())),
        clock.clone(),
    );
    connector.start().await.unwrap();

    let state = HttpState {
        agent_router: Arc::new(parking_lot_slot(connector.router())),
        webhooks: Arc::new(WebhookRegistry::new()),
        realtime,
    };
    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await;
    });

    Fleet { connector, store, clock, addr, client: reqwest::Client::new() }
}

fn parking_lot_slot(router: axum::Router) -> parking_lot::RwLock<Option<axum::Router>> {
    parking_lot::RwLock::new(Some(router))
}

#[tokio::test]
async fn register_heartbeat_and_liveness_alert() {
    let fleet = fleet().await;

    // Bootstrap registration with the master token.
    let response = fleet
        .client
        .post(format!("http://{}/api/agents/register", fleet.addr))
        .header("X-Registration-Token", MASTER_TOKEN)
        .json(&serde_json::json!({
            "hostname": "db-07",
            "os": "linux",
            "version": "2.0.1",
            "capabilities": ["fs"]
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    let agent_id = body["agentId"].as_str().unwrap().to_string();
    let token = body["authToken"].as_str().unwrap().to_string();

    // Heartbeat two seconds later updates the stored liveness.
    fleet.clock.advance(Duration::from_secs(2));
    let beat_at = fleet.clock.now_utc();
    let response = fleet
        .client
        .post(format!("http://{}/api/agents/heartbeat", fleet.addr))
        .bearer_auth(&token)
        .json(&serde_json::json!({
            "agentId": agent_id,
            "timestamp": beat_at,
            "status": "active"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let persisted = fleet.store.agents_for(ConnectorId(1));
    assert_eq!(persisted[0].last_heartbeat, beat_at);

    // Silence past the timeout: the sweep downgrades the agent and emits
    // exactly one medium-severity inactivity alert.
    fleet.clock.advance(Duration::from_secs(200));
    fleet.connector.sweep_now().await;

    let persisted = fleet.store.agents_for(ConnectorId(1));
    assert_eq!(persisted[0].status, AgentStatus::Inactive);

    let alerts = fleet.store.alerts();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].title, "Agente db-07 inactivo");
    assert_eq!(alerts[0].severity, AlertSeverity::Medium);

    fleet.connector.sweep_now().await;
    assert_eq!(fleet.store.alerts().len(), 1);

    fleet.connector.stop().await;
}

#[tokio::test]
async fn data_ingress_requires_the_issued_bearer() {
    let fleet = fleet().await;
    let response = fleet
        .client
        .post(format!("http://{}/api/agents/register", fleet.addr))
        .header("X-Registration-Token", MASTER_TOKEN)
        .json(&serde_json::json!({"hostname": "h", "os": "linux", "version": "1"}))
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = response.json().await.unwrap();
    let agent_id = body["agentId"].as_str().unwrap().to_string();
    let token = body["authToken"].as_str().unwrap().to_string();

    let data = serde_json::json!({
        "agentId": agent_id,
        "timestamp": fleet.clock.now_utc(),
        "eventType": "malware_detected",
        "severity": "critical",
        "message": "EICAR found",
        "details": {"path": "/tmp/eicar"}
    });

    let unauthorized = fleet
        .client
        .post(format!("http://{}/api/agents/data", fleet.addr))
        .bearer_auth("not-the-token")
        .json(&data)
        .send()
        .await
        .unwrap();
    assert_eq!(unauthorized.status(), 401);

    let accepted = fleet
        .client
        .post(format!("http://{}/api/agents/data", fleet.addr))
        .bearer_auth(&token)
        .json(&data)
        .send()
        .await
        .unwrap();
    assert_eq!(accepted.status(), 202);

    fleet.connector.drain_now().await;
    let alerts = fleet.store.alerts();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].title, "Malware detectado en h");

    fleet.connector.stop().await;
}
