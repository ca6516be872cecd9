// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use sentra_core::FakeClock;

fn config(path: &str, verify: bool) -> WebhookConfig {
    WebhookConfig {
        path: path.into(),
        verify_signature: verify,
        signature_header: "x-webhook-signature".into(),
    }
}

fn connector(
    path: &str,
    verify: bool,
    secret: Option<&str>,
) -> (WebhookConnector<FakeClock>, ConnectorRx, Arc<WebhookRegistry>) {
    let registry = Arc::new(WebhookRegistry::new());
    let (connector, rx) = WebhookConnector::new(
        ConnectorId(1),
        "hook-test",
        config(path, verify),
        secret.map(String::from),
        registry.clone(),
        FakeClock::new(),
    );
    (connector, rx, registry)
}

fn sign(secret: &str, body: &[u8]) -> String {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

#[tokio::test]
async fn delivery_emits_one_event_with_payload_and_headers() {
    let (connector, mut rx, registry) = connector("/hooks/github", false, None);
    connector.start().await.unwrap();

    let response = registry
        .dispatch(
            "/hooks/github",
            &[("content-type".into(), "application/json".into())],
            br#"{"action": "opened"}"#,
        )
        .unwrap();
    assert_eq!(response.status, 200);

    let event = rx.events.recv().await.unwrap();
    assert_eq!(event.severity, EventSeverity::Info);
    assert_eq!(event.raw_data["payload"]["action"], "opened");
    assert_eq!(event.raw_data["path"], "/hooks/github");
    assert_eq!(event.raw_data["headers"]["content-type"], "application/json");
    assert!(rx.events.try_recv().is_err());
}

#[tokio::test]
async fn valid_signature_is_accepted() {
    let (connector, mut rx, registry) = connector("/hook", true, Some("s3cret"));
    connector.start().await.unwrap();

    let body = br#"{"n": 1}"#;
    let signature = sign("s3cret", body);
    let response = registry
        .dispatch("/hook", &[("X-Webhook-Signature".into(), signature)], body)
        .unwrap();
    assert_eq!(response.status, 200);
    assert!(rx.events.recv().await.is_some());
}

#[tokio::test]
async fn bad_signature_is_rejected_with_401_and_no_event() {
    let (connector, mut rx, registry) = connector("/hook", true, Some("s3cret"));
    connector.start().await.unwrap();

    let response = registry
        .dispatch("/hook", &[("x-webhook-signature".into(), "00".repeat(32))], b"{}")
        .unwrap();
    assert_eq!(response.status, 401);
    assert!(rx.events.try_recv().is_err());
}

#[tokio::test]
async fn missing_signature_header_is_rejected() {
    let (connector, _rx, registry) = connector("/hook", true, Some("s3cret"));
    connector.start().await.unwrap();
    let response = registry.dispatch("/hook", &[], b"{}").unwrap();
    assert_eq!(response.status, 401);
}

#[tokio::test]
async fn sha256_prefixed_signatures_are_understood() {
    let (connector, mut rx, registry) = connector("/hook", true, Some("s3cret"));
    connector.start().await.unwrap();
    let body = b"payload";
    let signature = format!("sha256={}", sign("s3cret", body));
    let response = registry
        .dispatch("/hook", &[("x-webhook-signature".into(), signature)], body)
        .unwrap();
    assert_eq!(response.status, 200);
    assert!(rx.events.recv().await.is_some());
}

#[tokio::test]
async fn stopped_connector_drops_deliveries_silently() {
    let (connector, mut rx, registry) = connector("/hook", false, None);
    connector.start().await.unwrap();
    connector.stop().await;

    // Host frameworks may race deregistration; simulate a late dispatch by
    // re-registering the stopped target.
    registry.register("/hook", connector.inner.clone());
    let response = registry.dispatch("/hook", &[], b"{}").unwrap();
    assert_eq!(response.status, 200);
    assert!(rx.events.try_recv().is_err());
}

#[tokio::test]
async fn stop_deregisters_the_path() {
    let (connector, _rx, registry) = connector("/hook", false, None);
    connector.start().await.unwrap();
    assert_eq!(registry.paths(), vec!["/hook".to_string()]);
    connector.stop().await;
    assert!(registry.paths().is_empty());
    assert!(registry.dispatch("/hook", &[], b"{}").is_none());
}

#[tokio::test]
async fn invalid_path_fails_start() {
    let (connector, _rx, _registry) = connector("no-slash", false, None);
    assert!(connector.start().await.is_err());
    assert_eq!(connector.status(), ConnectorStatus::Error);
}

#[tokio::test]
async fn verification_without_secret_fails_closed() {
    let (connector, _rx, registry) = connector("/hook", true, None);
    connector.start().await.unwrap();
    let body = b"x";
    let response = registry
        .dispatch("/hook", &[("x-webhook-signature".into(), sign("guess", body))], body)
        .unwrap();
    assert_eq!(response.status, 401);
}
