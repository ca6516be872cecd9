// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use sentra_core::{FakeClock, SyslogFilters};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

fn config(protocol: SyslogProtocol) -> SyslogConfig {
    SyslogConfig {
        protocol,
        bind_addr: "127.0.0.1".into(),
        port: 0,
        tls: None,
        filters: SyslogFilters::default(),
    }
}

fn connector(protocol: SyslogProtocol) -> (SyslogConnector<FakeClock>, ConnectorRx) {
    SyslogConnector::new(ConnectorId(1), "syslog-test", config(protocol), FakeClock::new())
}

async fn recv_event(rx: &mut ConnectorRx) -> RawEvent {
    tokio::time::timeout(Duration::from_secs(5), rx.events.recv())
        .await
        .expect("timed out waiting for event")
        .expect("event channel closed")
}

#[tokio::test]
async fn udp_datagram_is_parsed_and_emitted() {
    let (connector, mut rx) = connector(SyslogProtocol::Udp);
    connector.start().await.unwrap();
    let addr = connector.local_addr().unwrap();

    let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    client
        .send_to(
            b"<34>Oct 11 22:14:15 mymachine su: 'su root' failed for lonvick on /dev/pts/8",
            addr,
        )
        .await
        .unwrap();

    let event = recv_event(&mut rx).await;
    assert_eq!(event.severity, EventSeverity::Critical);
    assert_eq!(event.source, "mymachine");
    assert_eq!(event.raw_data["facility"], 4);
    assert_eq!(event.raw_data["severity_code"], 2);
    assert_eq!(event.raw_data["app_name"], "su");
    assert_eq!(event.message, "'su root' failed for lonvick on /dev/pts/8");

    connector.stop().await;
}

#[tokio::test]
async fn tcp_lines_are_framed_and_ordered() {
    let (connector, mut rx) = connector(SyslogProtocol::Tcp);
    connector.start().await.unwrap();
    let addr = connector.local_addr().unwrap();

    let mut stream = TcpStream::connect(addr).await.unwrap();
    // First line split across two writes; the partial tail must carry.
    stream.write_all(b"<13>Feb  5 17:32:18 host app: fir").await.unwrap();
    stream.flush().await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    stream.write_all(b"st\n<13>Feb  5 17:32:19 host app: second\n").await.unwrap();
    stream.flush().await.unwrap();

    let first = recv_event(&mut rx).await;
    let second = recv_event(&mut rx).await;
    assert_eq!(first.message, "first");
    assert_eq!(second.message, "second");

    connector.stop().await;
}

#[tokio::test]
async fn filters_drop_messages_before_emission() {
    let mut cfg = config(SyslogProtocol::Udp);
    cfg.filters.exclude = vec!["noise".into()];
    let (connector, mut rx) =
        SyslogConnector::new(ConnectorId(2), "filtered", cfg, FakeClock::new());
    connector.start().await.unwrap();
    let addr = connector.local_addr().unwrap();

    let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    client.send_to(b"<13>Oct 11 22:14:15 host app: noise line\n", addr).await.unwrap();
    client.send_to(b"<13>Oct 11 22:14:15 host app: real line\n", addr).await.unwrap();

    let event = recv_event(&mut rx).await;
    assert_eq!(event.message, "real line");
    connector.stop().await;
}

#[tokio::test]
async fn unparseable_line_does_not_kill_listener() {
    let (connector, mut rx) = connector(SyslogProtocol::Udp);
    connector.start().await.unwrap();
    let addr = connector.local_addr().unwrap();

    let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    client.send_to(b"garbage without structure", addr).await.unwrap();
    client.send_to(b"<13>Oct 11 22:14:15 host app: after garbage", addr).await.unwrap();

    // Both arrive: the garbage as a raw-format event, then the parsed one.
    let first = recv_event(&mut rx).await;
    assert_eq!(first.raw_data["format"], "raw");
    let second = recv_event(&mut rx).await;
    assert_eq!(second.message, "after garbage");
    connector.stop().await;
}

#[tokio::test]
async fn stop_closes_the_socket_and_stops_emitting() {
    let (connector, mut rx) = connector(SyslogProtocol::Udp);
    connector.start().await.unwrap();
    let addr = connector.local_addr().unwrap();
    connector.stop().await;
    assert_eq!(connector.status(), ConnectorStatus::Disabled);
    assert!(connector.local_addr().is_none());

    let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let _ = client.send_to(b"<13>Oct 11 22:14:15 host app: late", addr).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(rx.events.try_recv().is_err());

    // The port is free again.
    let rebind = UdpSocket::bind(addr).await;
    assert!(rebind.is_ok());
}

#[tokio::test]
async fn pause_and_resume_cycle() {
    let (connector, mut rx) = connector(SyslogProtocol::Udp);
    connector.start().await.unwrap();
    connector.pause().await.unwrap();
    assert_eq!(connector.status(), ConnectorStatus::Paused);

    connector.resume().await.unwrap();
    assert_eq!(connector.status(), ConnectorStatus::Active);
    let addr = connector.local_addr().unwrap();

    let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    client.send_to(b"<13>Oct 11 22:14:15 host app: resumed", addr).await.unwrap();
    assert_eq!(recv_event(&mut rx).await.message, "resumed");
    connector.stop().await;
}

#[tokio::test]
async fn bind_conflict_surfaces_as_failure() {
    let (first, _rx1) = connector(SyslogProtocol::Tcp);
    first.start().await.unwrap();
    let addr = first.local_addr().unwrap();

    let mut cfg = config(SyslogProtocol::Tcp);
    cfg.port = addr.port();
    let (second, _rx2) = SyslogConnector::new(ConnectorId(3), "clash", cfg, FakeClock::new());
    let err = second.start().await.unwrap_err();
    assert!(matches!(err, ConnectorError::Bind { .. }));
    assert_eq!(second.status(), ConnectorStatus::Error);
    first.stop().await;
}

#[tokio::test]
async fn health_reflects_listener_state() {
    let (connector, _rx) = connector(SyslogProtocol::Udp);
    assert!(!connector.health_check().await.healthy);
    connector.start().await.unwrap();
    let health = connector.health_check().await;
    assert!(health.healthy);
    assert!(health.message.contains("listening on"));
    connector.stop().await;
}
