//! Integration tests for the push connection manager
//!
//! These tests run the manager against a local mock WebSocket server.

mod common;

use common::*;
use realtime::*;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

fn settings() -> PushSettings {
    PushSettings {
        heartbeat_interval: Duration::from_millis(50),
        reconnect_interval: Duration::from_millis(30),
        max_reconnect_attempts: 2,
        ..PushSettings::default()
    }
}

fn manager_for(url: String, settings: PushSettings) -> (ConnectionManager, mpsc::UnboundedReceiver<ConnectionEvent>) {
    ConnectionManager::new(Arc::new(StaticEndpoint::new(url)), settings)
}

/// Skip events until one matches
async fn expect_event<F>(events: &mut mpsc::UnboundedReceiver<ConnectionEvent>, matches: F) -> ConnectionEvent
where
    F: Fn(&ConnectionEvent) -> bool,
{
    loop {
        let event = recv_within(events, Duration::from_secs(2))
            .await
            .expect("timed out waiting for connection event");
        verbose_println!("  event: {:?}", event);
        if matches(&event) {
            return event;
        }
    }
}

#[tokio::test]
async fn test_connect_and_receive_notifications() {
    verbose_println!("Testing push connect and notification forwarding...");

    let server = MockWsServer::start().await;
    let (manager, mut events) = manager_for(server.ws_url(), settings());

    manager.connect().await.unwrap();
    assert!(manager.is_connected());
    assert!(matches!(events.recv().await, Some(ConnectionEvent::Connected)));

    assert!(wait_until(Duration::from_secs(1), || server.open_connections() == 1).await);

    server.send_raw(r#"{"type":"typing","payload":{"user":"a"}}"#);
    server.send_raw("not json");
    server.push_notification(json!({"id": "n-1", "title": "hello"}));

    let error = expect_event(&mut events, |e| matches!(e, ConnectionEvent::Error(_))).await;
    assert!(matches!(error, ConnectionEvent::Error(DeliveryError::Parse(_))));

    match expect_event(&mut events, |e| matches!(e, ConnectionEvent::Message(_))).await {
        ConnectionEvent::Message(message) => assert_eq!(message.payload()["id"], "n-1"),
        other => panic!("unexpected event: {:?}", other),
    }

    let metrics = manager.metrics();
    assert_eq!(metrics.notifications_received, 1);
    assert!(metrics.frames_received >= 3);

    manager.disconnect();
}

#[tokio::test]
async fn test_heartbeat_sent_while_open_and_stopped_on_disconnect() {
    verbose_println!("Testing heartbeat lifecycle...");

    let server = MockWsServer::start().await;
    let (manager, _events) = manager_for(server.ws_url(), settings());

    manager.connect().await.unwrap();
    assert!(wait_until(Duration::from_secs(1), || manager.heartbeat_active()).await);
    assert!(wait_until(Duration::from_secs(1), || server.received().len() >= 2).await);
    assert!(server.received().iter().all(|frame| frame == r#"{"type":"ping"}"#));

    manager.disconnect();
    assert!(!manager.heartbeat_active());
    assert_eq!(manager.connection_state(), ConnectionState::Closed);
    assert!(wait_until(Duration::from_secs(1), || server.open_connections() == 0).await);

    let sent = server.received().len();
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(server.received().len(), sent, "no heartbeat after disconnect");
    verbose_println!("  {} heartbeats before disconnect", sent);
}

#[tokio::test]
async fn test_custom_heartbeat_payload() {
    let server = MockWsServer::start().await;
    let push = PushSettings {
        heartbeat_payload: r#"{"type":"keepalive"}"#.to_string(),
        ..settings()
    };
    let (manager, _events) = manager_for(server.ws_url(), push);

    manager.connect().await.unwrap();
    assert!(wait_until(Duration::from_secs(1), || !server.received().is_empty()).await);
    assert_eq!(server.received()[0], r#"{"type":"keepalive"}"#);
    manager.disconnect();
}

#[tokio::test]
async fn test_reconnects_after_server_drop() {
    verbose_println!("Testing reconnection after a dropped connection...");

    let server = MockWsServer::start().await;
    let (manager, mut events) = manager_for(server.ws_url(), settings());

    manager.connect().await.unwrap();
    expect_event(&mut events, |e| matches!(e, ConnectionEvent::Connected)).await;
    assert!(wait_until(Duration::from_secs(1), || server.open_connections() == 1).await);

    server.drop_connections();

    expect_event(&mut events, |e| matches!(e, ConnectionEvent::Disconnected(_))).await;
    let attempt = expect_event(&mut events, |e| matches!(e, ConnectionEvent::Reconnecting(_))).await;
    assert!(matches!(attempt, ConnectionEvent::Reconnecting(1)));
    expect_event(&mut events, |e| matches!(e, ConnectionEvent::Connected)).await;

    assert!(manager.is_connected());
    assert!(wait_until(Duration::from_secs(1), || server.connection_count() == 2).await);
    assert_eq!(manager.metrics().reconnect_count, 1);
    manager.disconnect();
}

#[tokio::test]
async fn test_reconnect_budget_exhausted_closes_manager() {
    verbose_println!("Testing reconnection budget exhaustion...");

    let server = MockWsServer::start().await;
    let (manager, mut events) = manager_for(server.ws_url(), settings());

    manager.connect().await.unwrap();
    assert!(wait_until(Duration::from_secs(1), || server.open_connections() == 1).await);
    server.shutdown();

    expect_event(&mut events, |e| matches!(e, ConnectionEvent::Disconnected(_))).await;
    let failed = expect_event(&mut events, |e| matches!(e, ConnectionEvent::ReconnectFailed { .. })).await;
    assert!(matches!(failed, ConnectionEvent::ReconnectFailed { attempts: 2 }));

    assert_eq!(manager.connection_state(), ConnectionState::Closed);
    assert!(!manager.is_connected());
    assert!(!manager.heartbeat_active());
}

#[tokio::test]
async fn test_silent_server_detected_by_liveness() {
    verbose_println!("Testing inbound liveness timeout...");

    let server = MockWsServer::start().await;
    let push = PushSettings {
        heartbeat_interval: Duration::from_secs(5),
        heartbeat_timeout: Some(Duration::from_millis(100)),
        max_reconnect_attempts: 0,
        ..settings()
    };
    let (manager, mut events) = manager_for(server.ws_url(), push);

    manager.connect().await.unwrap();
    match expect_event(&mut events, |e| matches!(e, ConnectionEvent::Disconnected(_))).await {
        ConnectionEvent::Disconnected(reason) => assert_eq!(reason, "heartbeat timeout"),
        other => panic!("unexpected event: {:?}", other),
    }
    expect_event(&mut events, |e| matches!(e, ConnectionEvent::ReconnectFailed { attempts: 0 })).await;
}

#[tokio::test]
async fn test_connect_timeout() {
    let resolver = FnResolver::new(|| async {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok::<_, DeliveryError>("ws://127.0.0.1:1".to_string())
    });
    let push = PushSettings {
        connect_timeout: Some(Duration::from_millis(50)),
        ..settings()
    };
    let (manager, _events) = ConnectionManager::new(Arc::new(resolver), push);

    let err = manager.connect().await.unwrap_err();
    assert_eq!(err, DeliveryError::Timeout(Duration::from_millis(50)));
    assert!(err.is_push_unavailable());
}

#[tokio::test]
async fn test_disconnect_cancels_pending_connect() {
    let resolver = FnResolver::new(|| async {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok::<_, DeliveryError>("ws://127.0.0.1:1".to_string())
    });
    let (manager, _events) = ConnectionManager::new(Arc::new(resolver), settings());
    let manager = Arc::new(manager);

    let pending = {
        let manager = manager.clone();
        tokio::spawn(async move { manager.connect().await })
    };
    tokio::time::sleep(Duration::from_millis(30)).await;
    manager.disconnect();

    let result = tokio::time::timeout(Duration::from_secs(1), pending)
        .await
        .expect("connect should return promptly")
        .unwrap();
    assert!(matches!(result, Err(DeliveryError::Connection(_))));
    assert_eq!(manager.connection_state(), ConnectionState::Closed);
}

#[tokio::test]
async fn test_refused_connection_is_tagged() {
    let (manager, _events) = manager_for(unused_ws_url(), settings());
    assert!(matches!(manager.connect().await, Err(DeliveryError::Connection(_))));
}
