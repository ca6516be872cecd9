// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP surface: agent endpoints, webhook ingress, realtime WebSocket.
//!
//! The agent sub-router is owned by whichever agent connector is live; the
//! host reads it through a shared slot so reconciliation can swap it without
//! rebuilding the server.

use crate::realtime::RealtimeBus;
use axum::body::Body;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Request, State};
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use parking_lot::RwLock;
use sentra_connectors::WebhookRegistry;
use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::{Service, ServiceExt};
use tower_http::trace::TraceLayer;

/// Shared context for the HTTP handlers.
#[derive(Clone)]
pub struct HttpState {
    pub agent_router: Arc<RwLock<Option<Router>>>,
    pub webhooks: Arc<WebhookRegistry>,
    pub realtime: RealtimeBus,
}

/// Assemble the daemon router.
pub fn build_router(state: HttpState) -> Router {
    let agent_proxy = AgentProxy { slot: state.agent_router.clone() };
    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/connectors/realtime", get(realtime_ws))
        .nest_service("/api/agents", agent_proxy)
        .fallback(webhook_ingress)
        .layer(axum::extract::DefaultBodyLimit::max(1024 * 1024))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

async fn realtime_ws(State(state): State<HttpState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| async move {
        state.realtime.serve_socket(socket).await;
    })
}

/// Catch-all for dynamically registered webhook paths.
async fn webhook_ingress(State(state): State<HttpState>, request: Request) -> Response {
    if request.method() != Method::POST {
        return StatusCode::NOT_FOUND.into_response();
    }
    let path = request.uri().path().to_string();
    let headers: Vec<(String, String)> = request
        .headers()
        .iter()
        .filter_map(|(name, value)| {
            value.to_str().ok().map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect();
    let body = match axum::body::to_bytes(request.into_body(), 1024 * 1024).await {
        Ok(bytes) => bytes,
        Err(_) => return StatusCode::BAD_REQUEST.into_response(),
    };

    match state.webhooks.dispatch(&path, &headers, &body) {
        Some(outcome) => {
            let status =
                StatusCode::from_u16(outcome.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            (status, outcome.message).into_response()
        }
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// Forwards `/api/agents/*` into the live agent connector's router.
#[derive(Clone)]
struct AgentProxy {
    slot: Arc<RwLock<Option<Router>>>,
}

impl Service<Request<Body>> for AgentProxy {
    type Response = Response;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Response, Infallible>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Infallible>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: Request<Body>) -> Self::Future {
        let router = self.slot.read().clone();
        Box::pin(async move {
            match router {
                Some(router) => {
                    Ok(router.oneshot(request).await.into_response())
                }
                None => Ok(StatusCode::NOT_FOUND.into_response()),
            }
        })
    }
}

#[cfg(test)]
#[path = "http_tests.rs"]
mod tests;
