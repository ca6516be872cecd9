// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Syslog listener connector: UDP, TCP, or TCP+TLS.
//!
//! TCP framing is newline-terminated with partial tails carried across
//! reads. A parse failure of a single line never tears down the listener;
//! malformed TLS handshakes only bump the error counter.

mod filter;
mod parser;

pub use parser::{parse_message, ParsedSyslog, SyslogFormat};

use crate::connector::{Connector, HealthReport, TestOutcome};
use crate::error::ConnectorError;
use crate::harness::{ConnectorRx, Harness};
use async_trait::async_trait;
use parking_lot::Mutex;
use sentra_core::{
    Clock, ConnectorConfig, ConnectorId, ConnectorMetrics, ConnectorStatus, ConnectorType,
    EventSeverity, Parse, RawEvent, SyslogConfig, SyslogProtocol, TlsConfig,
};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::net::{TcpListener, UdpSocket};
use tokio::task::JoinHandle;
use tokio_rustls::rustls;
use tokio_rustls::TlsAcceptor;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

struct Inner<C: Clock> {
    harness: Harness<C>,
    config: Mutex<SyslogConfig>,
    bound_addr: Mutex<Option<SocketAddr>>,
}

impl<C: Clock> Inner<C> {
    /// Parse, filter, and emit one framed message.
    fn handle_line(&self, line: &str, peer: &str) {
        if line.trim().is_empty() {
            return;
        }
        let parsed = parser::parse_message(line, self.harness.clock().now_utc());
        let config = self.config.lock();
        if !filter::passes(&config.filters, &parsed, peer) {
            return;
        }
        drop(config);

        // On a parse miss the peer address stands in for the hostname.
        let source = parsed.hostname.clone().unwrap_or_else(|| peer.to_string());
        let timestamp = parsed.timestamp.unwrap_or_else(|| self.harness.clock().now_utc());

        let mut event = RawEvent::new(
            self.harness.id(),
            timestamp,
            source,
            parsed.message.clone(),
            EventSeverity::from_syslog_code(parsed.severity),
        )
        .with_field("facility", json!(parsed.facility))
        .with_field("severity_code", json!(parsed.severity))
        .with_field("format", json!(parsed.format.to_string()))
        .with_field("peer", json!(peer))
        .with_field("raw", json!(line.trim_end()));
        if let Some(app) = &parsed.app {
            event = event.with_field("app_name", json!(app));
        }
        if let Some(procid) = &parsed.procid {
            event = event.with_field("procid", json!(procid));
        }
        if let Some(msgid) = &parsed.msgid {
            event = event.with_field("msgid", json!(msgid));
        }
        if let Some(sd) = &parsed.structured_data {
            event = event.with_field("structured_data", json!(sd));
        }
        self.harness.emit(event);
    }
}

/// Syslog listener connector.
pub struct SyslogConnector<C: Clock> {
    inner: Arc<Inner<C>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl<C: Clock> SyslogConnector<C> {
    pub fn new(id: ConnectorId, name: impl Into<String>, config: SyslogConfig, clock: C) -> (Self, ConnectorRx) {
        let (harness, rx) = Harness::new(id, name, clock);
        let connector = Self {
            inner: Arc::new(Inner {
                harness,
                config: Mutex::new(config),
                bound_addr: Mutex::new(None),
            }),
            tasks: Mutex::new(Vec::new()),
        };
        (connector, rx)
    }

    /// The address actually bound, once running (useful with port 0).
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self.inner.bound_addr.lock()
    }

    async fn spawn_listeners(&self) -> Result<(), ConnectorError> {
        let cancel = self.inner.harness.begin_run();
        let config = self.inner.config.lock().clone();
        let addr = format!("{}:{}", config.bind_addr, config.port);

        let task = match config.protocol {
            SyslogProtocol::Udp => {
                let socket = UdpSocket::bind(&addr)
                    .await
                    .map_err(|e| ConnectorError::Bind { addr: addr.clone(), source: e })?;
                if let Ok(local) = socket.local_addr() {
                    *self.inner.bound_addr.lock() = Some(local);
                }
                info!(connector = %self.inner.harness.id(), %addr, "syslog udp listening");
                let inner = self.inner.clone();
                tokio::spawn(udp_loop(inner, socket, cancel))
            }
            SyslogProtocol::Tcp => {
                let listener = TcpListener::bind(&addr)
                    .await
                    .map_err(|e| ConnectorError::Bind { addr: addr.clone(), source: e })?;
                if let Ok(local) = listener.local_addr() {
                    *self.inner.bound_addr.lock() = Some(local);
                }
                info!(connector = %self.inner.harness.id(), %addr, "syslog tcp listening");
                let inner = self.inner.clone();
                tokio::spawn(accept_loop(inner, listener, None, cancel))
            }
            SyslogProtocol::Tls => {
                let tls = config
                    .tls
                    .as_ref()
                    .ok_or_else(|| ConnectorError::Tls("tls section missing".into()))?;
                let acceptor = build_acceptor(tls)?;
                let listener = TcpListener::bind(&addr)
                    .await
                    .map_err(|e| ConnectorError::Bind { addr: addr.clone(), source: e })?;
                if let Ok(local) = listener.local_addr() {
                    *self.inner.bound_addr.lock() = Some(local);
                }
                info!(connector = %self.inner.harness.id(), %addr, "syslog tls listening");
                let inner = self.inner.clone();
                tokio::spawn(accept_loop(inner, listener, Some(acceptor), cancel))
            }
        };
        self.tasks.lock().push(task);
        Ok(())
    }

    fn teardown(&self) {
        self.inner.harness.cancel_all();
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }
        *self.inner.bound_addr.lock() = None;
    }
}

#[async_trait]
impl<C: Clock> Connector for SyslogConnector<C> {
    fn id(&self) -> ConnectorId {
        self.inner.harness.id()
    }

    fn name(&self) -> &str {
        self.inner.harness.name()
    }

    fn connector_type(&self) -> ConnectorType {
        ConnectorType::Syslog
    }

    fn status(&self) -> ConnectorStatus {
        self.inner.harness.status()
    }

    fn metrics(&self) -> ConnectorMetrics {
        self.inner.harness.metrics()
    }

    async fn start(&self) -> Result<(), ConnectorError> {
        if self.status() == ConnectorStatus::Active {
            return Ok(());
        }
        match self.spawn_listeners().await {
            Ok(()) => {
                self.inner.harness.set_status(ConnectorStatus::Active, None);
                Ok(())
            }
            Err(e) => {
                self.inner.harness.record_failure(e.to_string());
                Err(e)
            }
        }
    }

    async fn stop(&self) {
        self.teardown();
        self.inner.harness.set_status(ConnectorStatus::Disabled, None);
    }

    async fn pause(&self) -> Result<(), ConnectorError> {
        if self.status() != ConnectorStatus::Active {
            return Err(ConnectorError::InvalidState(self.status()));
        }
        self.teardown();
        self.inner.harness.set_status(ConnectorStatus::Paused, None);
        Ok(())
    }

    async fn resume(&self) -> Result<(), ConnectorError> {
        if self.status() != ConnectorStatus::Paused {
            return Err(ConnectorError::InvalidState(self.status()));
        }
        self.spawn_listeners().await?;
        self.inner.harness.set_status(ConnectorStatus::Active, None);
        Ok(())
    }

    async fn health_check(&self) -> HealthReport {
        let at = self.inner.harness.clock().now_utc();
        let status = self.status();
        if status.is_running() {
            match self.local_addr() {
                Some(addr) => HealthReport::healthy(format!("listening on {addr}"), at),
                None => HealthReport::unhealthy("no bound listener", at),
            }
        } else {
            HealthReport::unhealthy(format!("status {status}"), at)
        }
    }

    async fn test_connection(&self) -> TestOutcome {
        if self.status().is_running() {
            return TestOutcome { success: true, message: "listener is running".into() };
        }
        // Probe that the configured address is bindable.
        let config = self.inner.config.lock().clone();
        let addr = format!("{}:{}", config.bind_addr, config.port);
        let result = match config.protocol {
            SyslogProtocol::Udp => UdpSocket::bind(&addr).await.map(|_| ()),
            SyslogProtocol::Tcp | SyslogProtocol::Tls => {
                TcpListener::bind(&addr).await.map(|_| ())
            }
        };
        match result {
            Ok(()) => TestOutcome { success: true, message: format!("{addr} is bindable") },
            Err(e) => TestOutcome { success: false, message: format!("cannot bind {addr}: {e}") },
        }
    }

    async fn update_config(&self, patch: serde_json::Value) -> Result<(), ConnectorError> {
        let (config, dropped) = ConnectorConfig::parse(ConnectorType::Syslog, &patch, Parse::Lenient)?;
        if !dropped.is_empty() {
            warn!(connector = %self.id(), ?dropped, "ignoring unknown config fields");
        }
        let ConnectorConfig::Syslog(config) = config else {
            return Err(ConnectorError::Invariant("non-syslog config for syslog connector".into()));
        };
        let was_running = self.status() == ConnectorStatus::Active;
        *self.inner.config.lock() = config;
        if was_running {
            self.teardown();
            self.spawn_listeners().await?;
        }
        Ok(())
    }
}

async fn udp_loop<C: Clock>(inner: Arc<Inner<C>>, socket: UdpSocket, cancel: CancellationToken) {
    let mut buf = vec![0u8; 64 * 1024];
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            received = socket.recv_from(&mut buf) => match received {
                Ok((len, peer)) => match std::str::from_utf8(&buf[..len]) {
                    Ok(text) => {
                        let peer = peer.ip().to_string();
                        for line in text.lines() {
                            inner.handle_line(line, &peer);
                        }
                    }
                    Err(_) => inner.harness.record_soft_error("non-utf8 datagram dropped"),
                },
                Err(e) => {
                    inner.harness.record_soft_error(format!("udp recv: {e}"));
                }
            }
        }
    }
}

async fn accept_loop<C: Clock>(
    inner: Arc<Inner<C>>,
    listener: TcpListener,
    acceptor: Option<TlsAcceptor>,
    cancel: CancellationToken,
) {
    loop {
        let (stream, peer) = tokio::select! {
            _ = cancel.cancelled() => return,
            accepted = listener.accept() => match accepted {
                Ok(pair) => pair,
                Err(e) => {
                    inner.harness.record_soft_error(format!("accept: {e}"));
                    continue;
                }
            }
        };
        let peer = peer.ip().to_string();
        debug!(connector = %inner.harness.id(), %peer, "syslog connection accepted");

        let conn_inner = inner.clone();
        let conn_cancel = cancel.clone();
        match &acceptor {
            None => {
                tokio::spawn(async move {
                    connection_loop(conn_inner, stream, peer, conn_cancel).await;
                });
            }
            Some(acceptor) => {
                let acceptor = acceptor.clone();
                tokio::spawn(async move {
                    let tls_stream = tokio::select! {
                        _ = conn_cancel.cancelled() => return,
                        handshake = acceptor.accept(stream) => match handshake {
                            Ok(s) => s,
                            Err(e) => {
                                conn_inner
                                    .harness
                                    .record_soft_error(format!("tls handshake from {peer}: {e}"));
                                return;
                            }
                        }
                    };
                    connection_loop(conn_inner, tls_stream, peer, conn_cancel).await;
                });
            }
        }
    }
}

/// Line-framed read loop for one TCP/TLS connection. Messages on a single
/// connection are parsed and emitted in arrival order.
async fn connection_loop<C: Clock, S: AsyncRead + Unpin>(
    inner: Arc<Inner<C>>,
    stream: S,
    peer: String,
    cancel: CancellationToken,
) {
    let mut reader = BufReader::new(stream);
    let mut line = String::new();
    loop {
        line.clear();
        let read = tokio::select! {
            _ = cancel.cancelled() => return,
            read = reader.read_line(&mut line) => read,
        };
        match read {
            Ok(0) => return,
            Ok(_) => inner.handle_line(&line, &peer),
            Err(e) => {
                inner.harness.record_soft_error(format!("read from {peer}: {e}"));
                return;
            }
        }
    }
}

fn build_acceptor(tls: &TlsConfig) -> Result<TlsAcceptor, ConnectorError> {
    let certs = load_certs(&tls.cert_path)?;
    let key = load_key(&tls.key_path)?;

    let builder = rustls::ServerConfig::builder();
    let config = if tls.require_client_cert {
        let ca_path = tls
            .ca_path
            .as_deref()
            .ok_or_else(|| ConnectorError::Tls("client auth requires ca_path".into()))?;
        let mut roots = rustls::RootCertStore::empty();
        for cert in load_certs(ca_path)? {
            roots
                .add(cert)
                .map_err(|e| ConnectorError::Tls(format!("bad ca certificate: {e}")))?;
        }
        let verifier = rustls::server::WebPkiClientVerifier::builder(Arc::new(roots))
            .build()
            .map_err(|e| ConnectorError::Tls(format!("client verifier: {e}")))?;
        builder.with_client_cert_verifier(verifier)
    } else {
        builder.with_no_client_auth()
    }
    .with_single_cert(certs, key)
    .map_err(|e| ConnectorError::Tls(format!("certificate chain: {e}")))?;

    Ok(TlsAcceptor::from(Arc::new(config)))
}

fn load_certs(
    path: &str,
) -> Result<Vec<rustls::pki_types::CertificateDer<'static>>, ConnectorError> {
    let file = std::fs::File::open(path)
        .map_err(|e| ConnectorError::Tls(format!("open {path}: {e}")))?;
    rustls_pemfile::certs(&mut std::io::BufReader::new(file))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| ConnectorError::Tls(format!("parse {path}: {e}")))
}

fn load_key(path: &str) -> Result<rustls::pki_types::PrivateKeyDer<'static>, ConnectorError> {
    let file = std::fs::File::open(path)
        .map_err(|e| ConnectorError::Tls(format!("open {path}: {e}")))?;
    rustls_pemfile::private_key(&mut std::io::BufReader::new(file))
        .map_err(|e| ConnectorError::Tls(format!("parse {path}: {e}")))?
        .ok_or_else(|| ConnectorError::Tls(format!("no private key in {path}")))
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
