//! Socket.IO connection shared by the listeners of one page
//!
//! A page opens exactly one connection, on the namespace chosen from its
//! path. Listeners subscribe to the broadcast of incoming events; emits are
//! queued and sent by the connection task without waiting for delivery.

pub mod packet;

use futures_util::{SinkExt, StreamExt};
use netdesk_core::{Error, Result};
use packet::{EnginePacket, PacketError, SocketPacket};
use serde_json::{Value, json};
use std::{fmt, time::Duration};
use tokio::sync::{broadcast, mpsc};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

/// Capacity of the incoming event broadcast
const EVENT_BUFFER: usize = 256;

/// How long to wait for the open and connect packets
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Local event delivered to listeners when the connection ends
pub const DISCONNECT_EVENT: &str = "disconnect";

/// Socket.IO namespace of a page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    /// `/`, dashboard events
    Default,
    /// `/network-monitor`
    NetworkMonitor,
    /// `/whatsapp`, also used by the chat and AI service pages
    WhatsApp,
}

impl Namespace {
    /// Choose the namespace for a page path
    #[must_use]
    pub fn select(page_path: &str) -> Self {
        if page_path.contains("network-monitor") {
            Self::NetworkMonitor
        } else if ["chat", "whatsapp", "ai-service"]
            .iter()
            .any(|marker| page_path.contains(marker))
        {
            Self::WhatsApp
        } else {
            Self::Default
        }
    }

    /// Namespace path on the wire
    #[must_use]
    pub const fn path(self) -> &'static str {
        match self {
            Self::Default => "/",
            Self::NetworkMonitor => "/network-monitor",
            Self::WhatsApp => "/whatsapp",
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// Event pushed by the server
#[derive(Debug, Clone, PartialEq)]
pub struct SocketEvent {
    /// Event name
    pub name: String,
    /// First event argument, `null` when there is none
    pub payload: Value,
}

impl SocketEvent {
    /// Create an event
    pub fn new(name: impl Into<String>, payload: Value) -> Self {
        Self {
            name: name.into(),
            payload,
        }
    }
}

/// Event queued for sending
#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingEvent {
    /// Event name
    pub name: String,
    /// Single event argument
    pub payload: Value,
}

/// Cloneable handle to the page connection
#[derive(Debug, Clone)]
pub struct SocketHandle {
    namespace: Namespace,
    events: broadcast::Sender<SocketEvent>,
    outgoing: mpsc::UnboundedSender<OutgoingEvent>,
}

impl SocketHandle {
    /// Namespace the connection was opened on
    #[must_use]
    pub const fn namespace(&self) -> Namespace {
        self.namespace
    }

    /// Receive every event pushed from now on
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SocketEvent> {
        self.events.subscribe()
    }

    /// Queue an event; failures are logged and the event is dropped
    pub fn emit(&self, name: &str, payload: Value) {
        let event = OutgoingEvent {
            name: name.to_string(),
            payload,
        };
        if self.outgoing.send(event).is_err() {
            debug!(event = name, "Connection closed, dropping emit");
        }
    }

    /// Handle backed by in-process channels instead of a server
    ///
    /// The returned [`Loopback`] plays the server: it delivers events to
    /// subscribers and receives everything the page emits.
    #[must_use]
    pub fn loopback(namespace: Namespace) -> (Self, Loopback) {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        let (outgoing, emitted) = mpsc::unbounded_channel();
        let handle = Self {
            namespace,
            events: events.clone(),
            outgoing,
        };
        (handle, Loopback { events, emitted })
    }
}

/// Server side of a [`SocketHandle::loopback`] handle
#[derive(Debug)]
pub struct Loopback {
    events: broadcast::Sender<SocketEvent>,
    emitted: mpsc::UnboundedReceiver<OutgoingEvent>,
}

impl Loopback {
    /// Push an event to every subscriber
    pub fn deliver(&self, name: &str, payload: Value) {
        let _ = self.events.send(SocketEvent::new(name, payload));
    }

    /// Next event emitted by the page, if one is queued
    pub fn try_next_emit(&mut self) -> Option<OutgoingEvent> {
        self.emitted.try_recv().ok()
    }

    /// Wait for the next emitted event
    pub async fn next_emit(&mut self) -> Option<OutgoingEvent> {
        self.emitted.recv().await
    }
}

/// Build the WebSocket endpoint from an HTTP or WS base URL
///
/// # Errors
///
/// Returns a configuration error for other schemes.
pub fn endpoint_url(base_url: &str) -> Result<String> {
    let base = base_url.trim_end_matches('/');
    let ws_base = if let Some(rest) = base.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = base.strip_prefix("http://") {
        format!("ws://{rest}")
    } else if base.starts_with("ws://") || base.starts_with("wss://") {
        base.to_string()
    } else {
        return Err(Error::configuration(format!(
            "Unsupported socket URL: {base_url}"
        )));
    };

    Ok(format!("{ws_base}/socket.io/?EIO=4&transport=websocket"))
}

/// Open the page connection and authenticate with `token`
///
/// # Errors
///
/// Returns a network error if the server cannot be reached, and a protocol
/// error if the handshake fails or the server refuses the namespace.
pub async fn connect(base_url: &str, namespace: Namespace, token: &str) -> Result<SocketHandle> {
    let url = endpoint_url(base_url)?;
    info!(%url, %namespace, "Connecting to realtime server");

    let (stream, _) = connect_async(url.as_str())
        .await
        .map_err(|e| Error::network(format!("Socket connection failed: {e}")))?;
    let (mut write, mut read) = stream.split();

    let handshake = tokio::time::timeout(HANDSHAKE_TIMEOUT, async {
        loop {
            match read.next().await {
                Some(Ok(Message::Text(text))) => {
                    if let EnginePacket::Open(handshake) = EnginePacket::decode(&text)? {
                        return Ok(handshake);
                    }
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(Error::network(format!("Socket error: {e}"))),
                None => return Err(Error::Protocol("Closed before handshake".to_string())),
            }
        }
    })
    .await
    .map_err(|_| Error::Protocol("Handshake timed out".to_string()))??;
    debug!(sid = %handshake.sid, "Engine.IO session opened");

    let connect = EnginePacket::Message(SocketPacket::Connect {
        namespace: namespace.path().to_string(),
        data: Some(json!({ "token": token })),
    });
    write
        .send(Message::Text(connect.encode()))
        .await
        .map_err(|e| Error::network(format!("Failed to send connect: {e}")))?;

    tokio::time::timeout(HANDSHAKE_TIMEOUT, async {
        loop {
            let text = match read.next().await {
                Some(Ok(Message::Text(text))) => text,
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(Error::network(format!("Socket error: {e}"))),
                None => return Err(Error::Protocol("Closed before connect".to_string())),
            };
            match EnginePacket::decode(&text)? {
                EnginePacket::Ping => {
                    write
                        .send(Message::Text(EnginePacket::Pong.encode()))
                        .await
                        .map_err(|e| Error::network(format!("Failed to send pong: {e}")))?;
                }
                EnginePacket::Message(SocketPacket::Connect { namespace: acked, .. })
                    if acked == namespace.path() =>
                {
                    info!(%namespace, "Realtime connection established");
                    return Ok(());
                }
                EnginePacket::Message(SocketPacket::ConnectError { namespace: refused, data })
                    if refused == namespace.path() =>
                {
                    let message = data
                        .get("message")
                        .and_then(Value::as_str)
                        .unwrap_or("connection refused")
                        .to_string();
                    warn!(%namespace, %message, "Realtime connect_error");
                    return Err(Error::Protocol(format!("connect_error: {message}")));
                }
                _ => {}
            }
        }
    })
    .await
    .map_err(|_| Error::Protocol("Namespace connect timed out".to_string()))??;

    let (handle, Loopback { events, mut emitted }) = SocketHandle::loopback(namespace);
    let heartbeat = Duration::from_millis(handshake.ping_interval + handshake.ping_timeout);

    tokio::spawn(async move {
        let deadline = tokio::time::sleep(heartbeat);
        tokio::pin!(deadline);

        let reason = loop {
            tokio::select! {
                frame = read.next() => {
                    deadline.as_mut().reset(tokio::time::Instant::now() + heartbeat);
                    let text = match frame {
                        Some(Ok(Message::Text(text))) => text,
                        Some(Ok(Message::Close(_))) | None => break "transport close",
                        Some(Ok(_)) => continue,
                        Some(Err(e)) => {
                            warn!("Realtime transport error: {e}");
                            break "transport error";
                        }
                    };
                    match handle_frame(&text, namespace, &events) {
                        Ok(Frame::Ping) => {
                            if let Err(e) = write.send(Message::Text(EnginePacket::Pong.encode())).await {
                                warn!("Failed to answer ping: {e}");
                                break "transport error";
                            }
                        }
                        Ok(Frame::Closed) => break "server disconnect",
                        Ok(Frame::Handled) => {}
                        Err(e) => debug!("Ignoring realtime frame: {e}"),
                    }
                }
                outgoing = emitted.recv() => {
                    let Some(event) = outgoing else { break "client close" };
                    let packet = EnginePacket::Message(SocketPacket::Event {
                        namespace: namespace.path().to_string(),
                        ack_id: None,
                        name: event.name.clone(),
                        args: vec![event.payload],
                    });
                    if let Err(e) = write.send(Message::Text(packet.encode())).await {
                        debug!(event = %event.name, "Dropping emit: {e}");
                    }
                }
                () = &mut deadline => {
                    warn!(%namespace, "No ping from server, closing");
                    break "ping timeout";
                }
            }
        };

        info!(%namespace, reason, "Realtime connection closed");
        let _ = write.send(Message::Close(None)).await;
        let _ = events.send(SocketEvent::new(DISCONNECT_EVENT, json!(reason)));
    });

    Ok(handle)
}

enum Frame {
    Ping,
    Closed,
    Handled,
}

fn handle_frame(
    text: &str,
    namespace: Namespace,
    events: &broadcast::Sender<SocketEvent>,
) -> std::result::Result<Frame, PacketError> {
    match EnginePacket::decode(text)? {
        EnginePacket::Ping => Ok(Frame::Ping),
        EnginePacket::Close => Ok(Frame::Closed),
        EnginePacket::Message(packet) if packet.namespace() != namespace.path() => {
            debug!(ns = packet.namespace(), "Packet for another namespace");
            Ok(Frame::Handled)
        }
        EnginePacket::Message(SocketPacket::Event { name, args, .. }) => {
            let payload = args.into_iter().next().unwrap_or(Value::Null);
            if events.send(SocketEvent::new(name, payload)).is_err() {
                debug!("No listener subscribed");
            }
            Ok(Frame::Handled)
        }
        EnginePacket::Message(SocketPacket::Disconnect { .. }) => Ok(Frame::Closed),
        EnginePacket::Message(SocketPacket::ConnectError { data, .. }) => {
            warn!(%namespace, error = %data, "Realtime connect_error");
            Ok(Frame::Handled)
        }
        _ => Ok(Frame::Handled),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case("/network-monitor.html", Namespace::NetworkMonitor)]
    #[case("/pages/network-monitor", Namespace::NetworkMonitor)]
    #[case("/whatsapp-settings.html", Namespace::WhatsApp)]
    #[case("/chat.html", Namespace::WhatsApp)]
    #[case("/ai-service.html", Namespace::WhatsApp)]
    #[case("/dashboard.html", Namespace::Default)]
    #[case("/billing.html", Namespace::Default)]
    #[case("", Namespace::Default)]
    fn test_namespace_selection(#[case] path: &str, #[case] expected: Namespace) {
        assert_eq!(Namespace::select(path), expected);
    }

    #[rstest]
    #[case(
        "http://localhost:3000",
        "ws://localhost:3000/socket.io/?EIO=4&transport=websocket"
    )]
    #[case(
        "https://isp.example.id/",
        "wss://isp.example.id/socket.io/?EIO=4&transport=websocket"
    )]
    #[case("ws://10.0.0.1:8080", "ws://10.0.0.1:8080/socket.io/?EIO=4&transport=websocket")]
    fn test_endpoint_url(#[case] base: &str, #[case] expected: &str) {
        assert_eq!(endpoint_url(base).unwrap(), expected);
    }

    #[test]
    fn test_endpoint_url_rejects_other_schemes() {
        assert!(endpoint_url("ftp://host").is_err());
    }

    #[tokio::test]
    async fn test_loopback_delivers_to_every_subscriber() {
        let (handle, loopback) = SocketHandle::loopback(Namespace::Default);
        let mut first = handle.subscribe();
        let mut second = handle.clone().subscribe();

        loopback.deliver("bandwidthUpdate", json!({"download": 10}));

        assert_eq!(first.recv().await.unwrap().name, "bandwidthUpdate");
        assert_eq!(
            second.recv().await.unwrap().payload,
            json!({"download": 10})
        );
    }

    #[test]
    fn test_emit_after_close_is_dropped() {
        let (handle, loopback) = SocketHandle::loopback(Namespace::WhatsApp);
        drop(loopback);

        handle.emit("whatsapp:start", Value::Null);
    }

    #[test]
    fn test_frames_for_other_namespaces_are_ignored() {
        let (events, mut rx) = broadcast::channel(4);

        handle_frame(r#"42["whatsapp:qr","x"]"#, Namespace::WhatsApp, &events).unwrap();
        handle_frame(r#"42/whatsapp,["whatsapp:qr","y"]"#, Namespace::WhatsApp, &events).unwrap();

        let event = rx.try_recv().unwrap();
        assert_eq!(event.payload, json!("y"));
        assert!(rx.try_recv().is_err());
    }
}
