// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[tokio::test]
async fn frames_reach_subscribers_as_tagged_json() {
    let bus = RealtimeBus::default();
    let mut rx = bus.subscribe();
    bus.publish(RealtimePush::Status {
        connector_id: ConnectorId(3),
        status: ConnectorStatus::Active,
        message: None,
    });

    let frame = rx.recv().await.unwrap();
    let json = serde_json::to_value(&frame).unwrap();
    assert_eq!(json["type"], "status");
    assert_eq!(json["connector_id"], 3);
    assert_eq!(json["status"], "active");
    assert!(json.get("message").is_none());
}

#[tokio::test]
async fn publish_without_subscribers_is_fine() {
    let bus = RealtimeBus::new(4);
    bus.publish(RealtimePush::Queue {
        pending: 1,
        in_flight: 0,
        completed_total: 5,
        failed_total: 0,
    });
}

#[tokio::test]
async fn lagged_subscriber_sheds_but_keeps_receiving() {
    let bus = RealtimeBus::new(2);
    let mut rx = bus.subscribe();
    for i in 0..10 {
        bus.publish(RealtimePush::Queue {
            pending: i,
            in_flight: 0,
            completed_total: 0,
            failed_total: 0,
        });
    }
    // The first recv reports the lag, subsequent recvs deliver the tail.
    let mut delivered = 0;
    loop {
        match rx.try_recv() {
            Ok(_) => delivered += 1,
            Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
            Err(_) => break,
        }
    }
    assert!(delivered >= 1 && delivered <= 2);
}
