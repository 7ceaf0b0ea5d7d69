//! Socket.IO connection tests against a local WebSocket server

mod common;

use common::{TestContext, init_test_logging};
use futures_util::{SinkExt, StreamExt};
use netdesk_console::{
    Namespace, SocketHandle,
    pages::network_monitor::NetworkMonitorPage,
    realtime::spawn_listener,
    socket::{self, DISCONNECT_EVENT},
};
use netdesk_core::{Error, Result};
use parking_lot::RwLock;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::{sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tokio_tungstenite::{accept_async, tungstenite::Message};

const OPEN: &str =
    r#"0{"sid":"s1","upgrades":[],"pingInterval":25000,"pingTimeout":20000,"maxPayload":1000000}"#;

/// How the fake server answers the namespace connect
#[derive(Clone, Copy)]
enum Answer {
    Accept,
    Refuse,
    /// Acknowledge another namespace first, then refuse the requested one
    OtherNamespaceFirst,
}

/// Serve one client: handshake, then after the first client event push
/// `monitoring-data` and close. Returns the frames received from the client.
async fn serve_once(answer: Answer) -> Result<(String, tokio::task::JoinHandle<Vec<String>>)> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;

    let server = tokio::spawn(async move {
        let mut received = Vec::new();
        let Ok((tcp, _)) = listener.accept().await else {
            return received;
        };
        let Ok(mut ws) = accept_async(tcp).await else {
            return received;
        };
        if ws.send(Message::Text(OPEN.to_string())).await.is_err() {
            return received;
        }

        while let Some(Ok(frame)) = ws.next().await {
            let Message::Text(text) = frame else { continue };
            received.push(text.clone());

            if text.starts_with("40/network-monitor,") {
                let replies: &[&str] = match answer {
                    Answer::Accept => &[r#"40/network-monitor,{"sid":"n1"}"#],
                    Answer::Refuse => &[r#"44/network-monitor,{"message":"invalid token"}"#],
                    Answer::OtherNamespaceFirst => &[
                        r#"40/whatsapp,{"sid":"w1"}"#,
                        r#"44/network-monitor,{"message":"invalid token"}"#,
                    ],
                };
                for reply in replies {
                    let _ = ws.send(Message::Text((*reply).to_string())).await;
                }
                if !matches!(answer, Answer::Accept) {
                    break;
                }
            } else if text.starts_with("42/network-monitor,") {
                let push = json!(["monitoring-data", {
                    "system": {"cpuLoad": 42.0, "memoryUsage": 63.0, "diskUsage": 71.0},
                    "activeConnections": 118
                }]);
                let _ = ws
                    .send(Message::Text(format!("42/network-monitor,{push}")))
                    .await;
                let _ = ws.send(Message::Text("2".to_string())).await;
            } else if text == "3" {
                // Pong answered, end the session
                let _ = ws.send(Message::Text("41/network-monitor,".to_string())).await;
            }
        }
        received
    });

    Ok((format!("http://{addr}"), server))
}

async fn connect(base_url: &str) -> Result<SocketHandle> {
    socket::connect(base_url, Namespace::NetworkMonitor, "secret").await
}

#[tokio::test]
async fn test_connect_authenticates_on_namespace() -> Result<()> {
    init_test_logging();
    let (url, server) = serve_once(Answer::Accept).await?;

    let handle = connect(&url).await?;
    let mut events = handle.subscribe();
    handle.emit("subscribe", json!({"interval": 5}));

    let first = tokio::time::timeout(Duration::from_secs(5), events.recv())
        .await
        .map_err(|_| Error::Other("no event pushed".to_string()))?
        .map_err(|e| Error::Other(e.to_string()))?;
    assert_eq!(first.name, "monitoring-data");
    assert_eq!(first.payload["activeConnections"], 118);

    let closed = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match events.recv().await {
                Ok(event) if event.name == DISCONNECT_EVENT => return Some(event),
                Ok(_) => {}
                Err(_) => return None,
            }
        }
    })
    .await
    .map_err(|_| Error::Other("connection never closed".to_string()))?;
    assert!(closed.is_some());

    drop(handle);
    let frames = server.await.map_err(|e| Error::Other(e.to_string()))?;
    assert_eq!(frames[0], r#"40/network-monitor,{"token":"secret"}"#);
    assert_eq!(frames[1], r#"42/network-monitor,["subscribe",{"interval":5}]"#);
    assert_eq!(frames[2], "3");
    Ok(())
}

#[tokio::test]
async fn test_refused_namespace_is_a_protocol_error() -> Result<()> {
    init_test_logging();
    let (url, _server) = serve_once(Answer::Refuse).await?;

    let err = connect(&url).await.unwrap_err();

    match err {
        Error::Protocol(message) => assert!(message.contains("invalid token"), "{message}"),
        other => panic!("unexpected error: {other}"),
    }
    Ok(())
}

#[tokio::test]
async fn test_ack_for_another_namespace_is_not_a_connect() -> Result<()> {
    init_test_logging();
    let (url, _server) = serve_once(Answer::OtherNamespaceFirst).await?;

    let err = connect(&url).await.unwrap_err();

    match err {
        Error::Protocol(message) => assert!(message.contains("invalid token"), "{message}"),
        other => panic!("unexpected error: {other}"),
    }
    Ok(())
}

#[tokio::test]
async fn test_pushed_snapshot_reaches_monitor_page() -> Result<()> {
    init_test_logging();
    let (url, _server) = serve_once(Answer::Accept).await?;
    let test = TestContext::logged_in("http://127.0.0.1:9");

    let handle = connect(&url).await?;
    let page = Arc::new(RwLock::new(NetworkMonitorPage::new(test.ctx.clone())));
    let listener = spawn_listener(&handle, Arc::clone(&page));
    handle.emit("subscribe", json!(null));

    let applied = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if page.read().panel().active_connections() == Some(118) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(applied.is_ok(), "snapshot never applied");

    let page = page.read();
    let gauges = page.panel().gauges();
    assert_eq!(gauges[0].readout_text().as_deref(), Some("42%"));
    assert_eq!(gauges[1].readout_text().as_deref(), Some("63%"));
    listener.abort();
    Ok(())
}
