// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::{Json, Router};
use sentra_core::{BackoffConfig, FakeClock, PaginationConfig, PaginationMode, RateLimitConfig};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Instant;

struct CollectSink {
    jobs: Mutex<Vec<IngestJob>>,
    reject: AtomicBool,
}

impl CollectSink {
    fn new() -> Arc<Self> {
        Arc::new(Self { jobs: Mutex::new(Vec::new()), reject: AtomicBool::new(false) })
    }
}

impl JobSink for CollectSink {
    fn enqueue(&self, job: IngestJob) -> Result<(), ()> {
        if self.reject.load(Ordering::Relaxed) {
            return Err(());
        }
        self.jobs.lock().push(job);
        Ok(())
    }
}

async fn serve(router: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    addr
}

fn api_config(base: String, endpoints: Vec<ApiEndpoint>) -> ApiConfig {
    ApiConfig {
        base_url: base,
        poll_interval_secs: 60,
        timeout_secs: 5,
        max_retries: 2,
        retryable_statuses: vec![429, 500, 502, 503, 504],
        backoff: BackoffConfig { base_ms: 1, factor: 2.0, jitter: false },
        rate_limit: None,
        breaker: sentra_core::BreakerConfig { threshold: 5, reset_timeout_secs: 60 },
        endpoints,
    }
}

fn endpoint(path: &str) -> ApiEndpoint {
    ApiEndpoint {
        path: path.into(),
        method: "GET".into(),
        query: Default::default(),
        headers: Default::default(),
        auth: ApiAuth::None,
        pagination: None,
        response_type: None,
        body: None,
    }
}

fn connector(
    config: ApiConfig,
    credentials: CredentialSet,
    sink: Arc<CollectSink>,
) -> (PolledApiConnector<FakeClock>, ConnectorRx) {
    PolledApiConnector::new(
        ConnectorId(1),
        "api-test",
        "generic",
        config,
        credentials,
        sink,
        FakeClock::new(),
    )
    .unwrap()
}

async fn drain_events(rx: &mut ConnectorRx) -> Vec<RawEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.events.try_recv() {
        events.push(event);
    }
    events
}

#[tokio::test]
async fn cursor_pagination_emits_records_in_order() {
    #[derive(serde::Deserialize)]
    struct Params {
        cursor: Option<String>,
    }
    let addr = serve(Router::new().route(
        "/events",
        get(|Query(params): Query<Params>| async move {
            match params.cursor.as_deref() {
                None => Json(serde_json::json!({
                    "data": [{"id": 1}, {"id": 2}],
                    "pagination": {"next_token": "T"}
                })),
                Some("T") => Json(serde_json::json!({
                    "data": [{"id": 3}],
                    "pagination": {}
                })),
                Some(other) => panic!("unexpected cursor {other}"),
            }
        }),
    ))
    .await;

    let mut ep = endpoint("/events");
    ep.pagination = Some(PaginationConfig {
        mode: PaginationMode::Cursor,
        limit: 2,
        param: "cursor".into(),
        limit_param: "limit".into(),
        cursor_path: Some("pagination.next_token".into()),
    });
    let sink = CollectSink::new();
    let (connector, mut rx) =
        connector(api_config(format!("http://{addr}"), vec![ep]), Default::default(), sink);

    connector.start().await.unwrap();
    let outcome = connector.run_once().await.unwrap();
    assert_eq!(outcome, CycleOutcome::Completed { events: 3 });
    assert_eq!(connector.breaker_state(), BreakerState::Closed);

    let events = drain_events(&mut rx).await;
    let ids: Vec<i64> = events
        .iter()
        .map(|e| e.raw_data["record"]["id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, vec![1, 2, 3]);

    // A successful cycle publishes a metrics snapshot.
    let (id, metrics) = rx.metrics.try_recv().unwrap();
    assert_eq!(id, ConnectorId(1));
    assert_eq!(metrics.events_total, 3);
    connector.stop().await;
}

#[tokio::test]
async fn retryable_status_is_retried_until_success() {
    let hits = Arc::new(AtomicU32::new(0));
    let addr = serve(Router::new().route(
        "/flaky",
        get({
            let hits = hits.clone();
            move || {
                let hits = hits.clone();
                async move {
                    if hits.fetch_add(1, Ordering::SeqCst) == 0 {
                        Err(axum::http::StatusCode::SERVICE_UNAVAILABLE)
                    } else {
                        Ok(Json(serde_json::json!({"data": [{"id": 1}]})))
                    }
                }
            }
        }),
    ))
    .await;

    let sink = CollectSink::new();
    let (connector, _rx) = connector(
        api_config(format!("http://{addr}"), vec![endpoint("/flaky")]),
        Default::default(),
        sink,
    );
    connector.start().await.unwrap();
    let outcome = connector.run_once().await.unwrap();
    assert_eq!(outcome, CycleOutcome::Completed { events: 1 });
    assert_eq!(hits.load(Ordering::SeqCst), 2);
    connector.stop().await;
}

#[tokio::test]
async fn fatal_4xx_skips_endpoint_but_cycle_succeeds_via_others() {
    let gone_hits = Arc::new(AtomicU32::new(0));
    let addr = serve(
        Router::new()
            .route(
                "/gone",
                get({
                    let hits = gone_hits.clone();
                    move || {
                        let hits = hits.clone();
                        async move {
                            hits.fetch_add(1, Ordering::SeqCst);
                            axum::http::StatusCode::NOT_FOUND
                        }
                    }
                }),
            )
            .route("/ok", get(|| async { Json(serde_json::json!({"data": [{"id": 9}]})) })),
    )
    .await;

    let sink = CollectSink::new();
    let (connector, _rx) = connector(
        api_config(format!("http://{addr}"), vec![endpoint("/gone"), endpoint("/ok")]),
        Default::default(),
        sink,
    );
    connector.start().await.unwrap();
    let outcome = connector.run_once().await.unwrap();
    assert_eq!(outcome, CycleOutcome::Completed { events: 1 });
    // 404 is fatal for the endpoint: exactly one attempt, no retries.
    assert_eq!(gone_hits.load(Ordering::SeqCst), 1);
    assert_eq!(connector.breaker_state(), BreakerState::Closed);
    connector.stop().await;
}

#[tokio::test]
async fn breaker_opens_and_skips_without_issuing_http() {
    let hits = Arc::new(AtomicU32::new(0));
    let addr = serve(Router::new().route(
        "/down",
        get({
            let hits = hits.clone();
            move || {
                let hits = hits.clone();
                async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                    axum::http::StatusCode::SERVICE_UNAVAILABLE
                }
            }
        }),
    ))
    .await;

    let mut config = api_config(format!("http://{addr}"), vec![endpoint("/down")]);
    config.max_retries = 1;
    config.breaker = sentra_core::BreakerConfig { threshold: 2, reset_timeout_secs: 60 };
    let sink = CollectSink::new();
    let (connector, _rx) = connector(config, Default::default(), sink);
    connector.start().await.unwrap();

    assert!(connector.run_once().await.is_err());
    assert_eq!(connector.breaker_state(), BreakerState::Closed);
    assert!(connector.run_once().await.is_err());
    assert_eq!(connector.breaker_state(), BreakerState::Open);

    let hits_before = hits.load(Ordering::SeqCst);
    let outcome = connector.run_once().await.unwrap();
    assert_eq!(outcome, CycleOutcome::Skipped);
    assert_eq!(hits.load(Ordering::SeqCst), hits_before);
    connector.stop().await;
}

#[tokio::test]
async fn rate_limit_delays_the_excess_request() {
    let addr =
        serve(Router::new().route("/limited", get(|| async { Json(serde_json::json!({"data": []})) })))
            .await;

    let mut config = api_config(format!("http://{addr}"), vec![endpoint("/limited")]);
    config.rate_limit = Some(RateLimitConfig { requests: 2, window_ms: 1_000 });
    let sink = CollectSink::new();
    let (connector, _rx) = connector(config, Default::default(), sink);
    connector.start().await.unwrap();

    let started = Instant::now();
    connector.run_once().await.unwrap();
    connector.run_once().await.unwrap();
    assert!(started.elapsed().as_millis() < 500);

    connector.run_once().await.unwrap();
    assert!(started.elapsed().as_millis() >= 500, "third cycle should have slept");
    connector.stop().await;
}

#[tokio::test]
async fn oversized_batch_becomes_one_queue_job() {
    let records: Vec<serde_json::Value> =
        (0..150).map(|i| serde_json::json!({"id": i})).collect();
    let addr = serve(Router::new().route(
        "/bulk",
        get(move || {
            let records = records.clone();
            async move { Json(serde_json::json!({"data": records})) }
        }),
    ))
    .await;

    let mut ep = endpoint("/bulk");
    ep.response_type = Some(sentra_core::ResponseType::Alerts);
    let sink = CollectSink::new();
    let (connector, mut rx) = connector(
        api_config(format!("http://{addr}"), vec![ep]),
        Default::default(),
        sink.clone(),
    );
    connector.start().await.unwrap();
    let outcome = connector.run_once().await.unwrap();
    assert_eq!(outcome, CycleOutcome::Completed { events: 150 });

    // Nothing emitted directly; exactly one high-priority job enqueued.
    assert!(drain_events(&mut rx).await.is_empty());
    let jobs = sink.jobs.lock();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].priority, sentra_core::JobPriority::High);
    assert_eq!(jobs[0].payload.as_array().unwrap().len(), 150);
    connector.stop().await;
}

#[tokio::test]
async fn queue_full_fails_the_cycle() {
    let records: Vec<serde_json::Value> =
        (0..150).map(|i| serde_json::json!({"id": i})).collect();
    let addr = serve(Router::new().route(
        "/bulk",
        get(move || {
            let records = records.clone();
            async move { Json(serde_json::json!({"data": records})) }
        }),
    ))
    .await;

    let sink = CollectSink::new();
    sink.reject.store(true, Ordering::Relaxed);
    let (connector, _rx) = connector(
        api_config(format!("http://{addr}"), vec![endpoint("/bulk")]),
        Default::default(),
        sink,
    );
    connector.start().await.unwrap();
    let err = connector.run_once().await.unwrap_err();
    assert!(matches!(err, ConnectorError::QueueFull));
    assert_eq!(connector.harness.consecutive_errors(), 1);
    connector.stop().await;
}

#[derive(Clone, Default)]
struct SeenHeaders {
    headers: Arc<Mutex<Vec<(Option<String>, Option<String>)>>>,
}

async fn capture(State(seen): State<SeenHeaders>, headers: HeaderMap) -> Json<serde_json::Value> {
    let auth = headers.get("authorization").and_then(|v| v.to_str().ok()).map(String::from);
    let api_key = headers.get("x-api-key").and_then(|v| v.to_str().ok()).map(String::from);
    seen.headers.lock().push((auth, api_key));
    Json(serde_json::json!({"data": []}))
}

#[tokio::test]
async fn bearer_auth_sets_single_authorization_header() {
    let seen = SeenHeaders::default();
    let addr = serve(
        Router::new().route("/auth", get(capture)).with_state(seen.clone()),
    )
    .await;

    let mut ep = endpoint("/auth");
    ep.auth = ApiAuth::Bearer;
    let credentials =
        CredentialSet { token: Some("tok-123".into()), ..Default::default() };
    let sink = CollectSink::new();
    let (connector, _rx) =
        connector(api_config(format!("http://{addr}"), vec![ep]), credentials, sink);
    connector.start().await.unwrap();
    connector.run_once().await.unwrap();

    let captured = seen.headers.lock();
    assert_eq!(captured.len(), 1);
    assert_eq!(captured[0].0.as_deref(), Some("Bearer tok-123"));
    connector.stop().await;
}

#[tokio::test]
async fn api_key_auth_uses_named_header() {
    let seen = SeenHeaders::default();
    let addr = serve(
        Router::new().route("/auth", get(capture)).with_state(seen.clone()),
    )
    .await;

    let mut ep = endpoint("/auth");
    ep.auth = ApiAuth::ApiKey { header: "x-api-key".into() };
    let credentials = CredentialSet { api_key: Some("key-9".into()), ..Default::default() };
    let sink = CollectSink::new();
    let (connector, _rx) =
        connector(api_config(format!("http://{addr}"), vec![ep]), credentials, sink);
    connector.start().await.unwrap();
    connector.run_once().await.unwrap();

    let captured = seen.headers.lock();
    assert_eq!(captured[0].1.as_deref(), Some("key-9"));
    assert_eq!(captured[0].0, None);
    connector.stop().await;
}

#[tokio::test]
async fn oauth_token_is_fetched_once_and_cached() {
    let token_hits = Arc::new(AtomicU32::new(0));
    let seen = SeenHeaders::default();
    let addr = serve(
        Router::new()
            .route(
                "/oauth/token",
                post({
                    let hits = token_hits.clone();
                    move || {
                        let hits = hits.clone();
                        async move {
                            hits.fetch_add(1, Ordering::SeqCst);
                            Json(serde_json::json!({
                                "access_token": "oauth-tok",
                                "expires_in": 3600
                            }))
                        }
                    }
                }),
            )
            .route("/auth", get(capture))
            .with_state(seen.clone()),
    )
    .await;

    let mut ep = endpoint("/auth");
    ep.auth = ApiAuth::OAuth {
        token_url: format!("http://{addr}/oauth/token"),
        scopes: vec!["read".into()],
    };
    let credentials = CredentialSet {
        api_key: Some("client-id".into()),
        api_secret: Some("client-secret".into()),
        ..Default::default()
    };
    let sink = CollectSink::new();
    let (connector, _rx) =
        connector(api_config(format!("http://{addr}"), vec![ep]), credentials, sink);
    connector.start().await.unwrap();
    connector.run_once().await.unwrap();
    connector.run_once().await.unwrap();

    assert_eq!(token_hits.load(Ordering::SeqCst), 1);
    let captured = seen.headers.lock();
    assert_eq!(captured.len(), 2);
    assert!(captured.iter().all(|(auth, _)| auth.as_deref() == Some("Bearer oauth-tok")));
    connector.stop().await;
}

#[tokio::test]
async fn malformed_base_url_fails_start() {
    let sink = CollectSink::new();
    let (connector, _rx) = connector(
        api_config("not a url".into(), vec![endpoint("/x")]),
        Default::default(),
        sink,
    );
    assert!(connector.start().await.is_err());
    assert_eq!(connector.status(), ConnectorStatus::Error);
}
