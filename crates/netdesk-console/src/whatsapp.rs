//! WhatsApp bot connection widget and chat panel
//!
//! The connection state only moves on server pushes. User intents are
//! emitted on the socket and checked against the current state first.
//!
//! | state         | `whatsapp:qr`  | `whatsapp:ready` | `whatsapp:disconnected` |
//! |---------------|----------------|------------------|-------------------------|
//! | Disconnected  | rejected       | Active           | Disconnected            |
//! | Connecting    | AwaitingScan   | Active           | Disconnected            |
//! | AwaitingScan  | AwaitingScan   | Active           | Disconnected            |
//! | Active        | rejected       | Active           | Disconnected            |

use crate::{
    chart::Chart,
    realtime::RealtimeListener,
    socket::{SocketEvent, SocketHandle},
};
use netdesk_core::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{collections::VecDeque, fmt};
use tracing::info;

/// Emitted to request a session (and a QR code)
pub const EVENT_START: &str = "whatsapp:start";
/// Emitted to log the bot out
pub const EVENT_STOP: &str = "whatsapp:stop";
/// Emitted to wipe the stored session
pub const EVENT_DELETE_SESSION: &str = "whatsapp:deleteSession";
/// Emitted with new bot settings
pub const EVENT_UPDATE_SETTINGS: &str = "whatsapp:updateSettings";

const EVENT_QR: &str = "whatsapp:qr";
const EVENT_READY: &str = "whatsapp:ready";
const EVENT_DISCONNECTED: &str = "whatsapp:disconnected";

/// Connection state of the bot
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "kebab-case")]
pub enum ConnectionState {
    /// No session
    #[default]
    Disconnected,
    /// Start requested, waiting for a QR code
    Connecting,
    /// QR code shown, waiting for the phone to scan it
    AwaitingScan {
        /// Latest QR payload, to be drawn verbatim
        qr: String,
    },
    /// Session bound to a phone
    Active {
        /// Bound phone number
        phone: String,
    },
}

impl ConnectionState {
    /// Short state name
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::AwaitingScan { .. } => "awaiting-scan",
            Self::Active { .. } => "active",
        }
    }

    /// Whether the start control is enabled
    #[must_use]
    pub const fn can_start(&self) -> bool {
        matches!(self, Self::Disconnected | Self::AwaitingScan { .. })
    }

    /// Whether the stop control is enabled
    #[must_use]
    pub const fn can_stop(&self) -> bool {
        !matches!(self, Self::Disconnected)
    }

    /// Whether the QR refresh control is enabled
    #[must_use]
    pub const fn can_refresh(&self) -> bool {
        matches!(self, Self::AwaitingScan { .. })
    }

    fn reject(&self, event: &str) -> Error {
        Error::InvalidTransition {
            from: self.name().to_string(),
            event: event.to_string(),
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active { phone } => write!(f, "active ({phone})"),
            other => f.write_str(other.name()),
        }
    }
}

/// Server push relevant to the connection state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// New QR code
    Qr(String),
    /// Session ready on a phone
    Ready {
        /// Bound phone number
        phone: String,
    },
    /// Session ended
    Disconnected {
        /// Server-supplied reason
        reason: String,
    },
}

impl ConnectionEvent {
    /// Parse a socket event; `None` for unrelated events
    ///
    /// # Errors
    ///
    /// Returns a protocol error for a QR event without a code.
    pub fn from_socket(event: &SocketEvent) -> Option<Result<Self>> {
        let payload = &event.payload;
        match event.name.as_str() {
            EVENT_QR => Some(
                text_field(payload, &["qr", "code"])
                    .map(Self::Qr)
                    .ok_or_else(|| Error::Protocol("QR event without a code".to_string())),
            ),
            EVENT_READY => Some(Ok(Self::Ready {
                phone: text_field(payload, &["phone", "phoneNumber", "number"])
                    .unwrap_or_default(),
            })),
            EVENT_DISCONNECTED => Some(Ok(Self::Disconnected {
                reason: text_field(payload, &["reason", "message"]).unwrap_or_default(),
            })),
            _ => None,
        }
    }
}

/// String payload, or the first string field among `keys`
fn text_field(payload: &Value, keys: &[&str]) -> Option<String> {
    if let Some(text) = payload.as_str() {
        return Some(text.to_string());
    }
    keys.iter()
        .find_map(|key| payload.get(*key).and_then(Value::as_str))
        .map(ToString::to_string)
}

/// Apply a server push to a state
///
/// # Errors
///
/// Returns [`Error::InvalidTransition`] for a QR code while disconnected or
/// active.
pub fn transition(state: &ConnectionState, event: &ConnectionEvent) -> Result<ConnectionState> {
    match (state, event) {
        (
            ConnectionState::Connecting | ConnectionState::AwaitingScan { .. },
            ConnectionEvent::Qr(qr),
        ) => Ok(ConnectionState::AwaitingScan { qr: qr.clone() }),
        (_, ConnectionEvent::Qr(_)) => Err(state.reject(EVENT_QR)),
        (_, ConnectionEvent::Ready { phone }) => Ok(ConnectionState::Active {
            phone: phone.clone(),
        }),
        (_, ConnectionEvent::Disconnected { .. }) => Ok(ConnectionState::Disconnected),
    }
}

/// Connection widget bound to the page socket
#[derive(Debug)]
pub struct ConnectionWidget {
    socket: SocketHandle,
    state: ConnectionState,
    last_reason: Option<String>,
}

impl ConnectionWidget {
    /// Widget in the disconnected state
    #[must_use]
    pub fn new(socket: SocketHandle) -> Self {
        Self {
            socket,
            state: ConnectionState::Disconnected,
            last_reason: None,
        }
    }

    /// Current state
    #[must_use]
    pub const fn state(&self) -> &ConnectionState {
        &self.state
    }

    /// Reason given with the last disconnect
    #[must_use]
    pub fn last_reason(&self) -> Option<&str> {
        self.last_reason.as_deref()
    }

    /// Request a session
    ///
    /// # Errors
    ///
    /// Rejected while connecting or active.
    pub fn start(&mut self) -> Result<()> {
        if !self.state.can_start() {
            return Err(self.state.reject("start"));
        }
        self.socket.emit(EVENT_START, Value::Null);
        self.state = ConnectionState::Connecting;
        Ok(())
    }

    /// Ask for a fresh QR code
    ///
    /// # Errors
    ///
    /// Rejected unless a QR code is shown.
    pub fn refresh_qr(&mut self) -> Result<()> {
        if !self.state.can_refresh() {
            return Err(self.state.reject("refresh"));
        }
        self.socket.emit(EVENT_START, Value::Null);
        self.state = ConnectionState::Connecting;
        Ok(())
    }

    /// Ask the server to end the session; the state changes when the
    /// server confirms with `whatsapp:disconnected`
    ///
    /// # Errors
    ///
    /// Rejected while disconnected.
    pub fn stop(&self) -> Result<()> {
        if !self.state.can_stop() {
            return Err(self.state.reject("stop"));
        }
        self.socket.emit(EVENT_STOP, Value::Null);
        Ok(())
    }

    /// Wipe the stored session on the server
    pub fn delete_session(&self) {
        self.socket.emit(EVENT_DELETE_SESSION, Value::Null);
    }

    /// Push new bot settings
    pub fn update_settings(&self, settings: Value) {
        self.socket.emit(EVENT_UPDATE_SETTINGS, settings);
    }

    /// Apply a server push
    ///
    /// # Errors
    ///
    /// See [`transition`]; the state is unchanged on error.
    pub fn apply(&mut self, event: &ConnectionEvent) -> Result<()> {
        let next = transition(&self.state, event)?;
        if let ConnectionEvent::Disconnected { reason } = event {
            self.last_reason = Some(reason.clone());
        }
        if next.name() != self.state.name() {
            info!(from = self.state.name(), to = next.name(), "WhatsApp state changed");
        }
        self.state = next;
        Ok(())
    }
}

impl RealtimeListener for ConnectionWidget {
    fn handles(&self, name: &str) -> bool {
        matches!(name, EVENT_QR | EVENT_READY | EVENT_DISCONNECTED)
    }

    fn on_event(&mut self, event: &SocketEvent) -> Result<()> {
        match ConnectionEvent::from_socket(event) {
            Some(parsed) => self.apply(&parsed?),
            None => Ok(()),
        }
    }
}

/// Counters pushed on `chat:stats`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChatStats {
    /// Messages received
    pub total_messages: u64,
    /// Replies generated by the AI
    pub ai_responses: u64,
    /// Replies taken from templates
    pub template_responses: u64,
    /// Conversations active now
    pub active_chats: u64,
}

/// Message pushed on `chat:message`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChatMessage {
    /// Sender number
    pub from: String,
    /// Message text
    #[serde(alias = "message", alias = "body")]
    pub text: String,
    /// How the bot answered (`ai`, `template`, ...)
    pub response_type: Option<String>,
    /// Timestamp as sent by the server
    pub timestamp: Option<String>,
}

/// Chat monitor panel
#[derive(Debug, Clone)]
pub struct ChatPanel {
    stats: ChatStats,
    response_types: Chart,
    recent: VecDeque<ChatMessage>,
    capacity: usize,
}

impl Default for ChatPanel {
    fn default() -> Self {
        Self::new(50)
    }
}

impl ChatPanel {
    /// Panel keeping the last `capacity` messages
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            stats: ChatStats::default(),
            response_types: Chart::doughnut("Response types"),
            recent: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    /// Latest counters
    #[must_use]
    pub const fn stats(&self) -> &ChatStats {
        &self.stats
    }

    /// Response type breakdown
    #[must_use]
    pub const fn response_types(&self) -> &Chart {
        &self.response_types
    }

    /// Recent messages, oldest first
    pub fn recent(&self) -> impl Iterator<Item = &ChatMessage> {
        self.recent.iter()
    }

    fn set_response_types(&mut self, payload: &Value) -> Result<()> {
        let pairs: Vec<(String, f64)> = match payload {
            Value::Object(map) => map
                .iter()
                .map(|(name, count)| (name.clone(), count.as_f64().unwrap_or(0.0)))
                .collect(),
            Value::Array(items) => items
                .iter()
                .filter_map(|item| {
                    let name = item.get("type").or_else(|| item.get("name"))?.as_str()?;
                    let count = item.get("count").and_then(Value::as_f64).unwrap_or(0.0);
                    Some((name.to_string(), count))
                })
                .collect(),
            _ => {
                return Err(Error::Protocol(
                    "chat:response_types payload is not an object or array".to_string(),
                ));
            }
        };

        let (labels, counts): (Vec<String>, Vec<f64>) = pairs.into_iter().unzip();
        self.response_types.set_data(labels, &[counts]);
        Ok(())
    }

    fn push_message(&mut self, message: ChatMessage) {
        if self.recent.len() == self.capacity {
            self.recent.pop_front();
        }
        self.recent.push_back(message);
    }
}

impl RealtimeListener for ChatPanel {
    fn handles(&self, name: &str) -> bool {
        matches!(name, "chat:stats" | "chat:response_types" | "chat:message")
    }

    fn on_event(&mut self, event: &SocketEvent) -> Result<()> {
        match event.name.as_str() {
            "chat:stats" => {
                self.stats = serde_json::from_value(event.payload.clone())?;
            }
            "chat:response_types" => self.set_response_types(&event.payload)?,
            "chat:message" => {
                let message = serde_json::from_value(event.payload.clone())?;
                self.push_message(message);
            }
            _ => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::socket::{Loopback, Namespace};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn widget() -> (ConnectionWidget, Loopback) {
        let (socket, loopback) = SocketHandle::loopback(Namespace::WhatsApp);
        (ConnectionWidget::new(socket), loopback)
    }

    fn push(widget: &mut ConnectionWidget, name: &str, payload: Value) -> Result<()> {
        widget.on_event(&SocketEvent::new(name, payload))
    }

    #[test]
    fn test_qr_while_connecting_awaits_scan() {
        let (mut widget, mut server) = widget();
        widget.start().unwrap();
        assert_eq!(server.try_next_emit().unwrap().name, EVENT_START);

        push(&mut widget, EVENT_QR, json!({"qr": "2@abc,def"})).unwrap();

        assert_eq!(
            widget.state(),
            &ConnectionState::AwaitingScan {
                qr: "2@abc,def".to_string()
            }
        );
        assert!(widget.state().can_refresh());
    }

    #[test]
    fn test_ready_from_any_state_activates() {
        for start in [
            ConnectionState::Disconnected,
            ConnectionState::Connecting,
            ConnectionState::AwaitingScan { qr: "x".into() },
            ConnectionState::Active { phone: "1".into() },
        ] {
            let next = transition(
                &start,
                &ConnectionEvent::Ready {
                    phone: "6281234".into(),
                },
            )
            .unwrap();
            assert_eq!(next, ConnectionState::Active {
                phone: "6281234".into()
            });
            assert!(!next.can_start());
            assert!(next.can_stop());
        }
    }

    #[test]
    fn test_disconnect_from_active_reenables_start() {
        let (mut widget, _server) = widget();
        push(&mut widget, EVENT_READY, json!({"phone": "6281234"})).unwrap();
        push(&mut widget, EVENT_DISCONNECTED, json!({"reason": "logout"})).unwrap();

        assert_eq!(widget.state(), &ConnectionState::Disconnected);
        assert!(widget.state().can_start());
        assert!(!widget.state().can_stop());
        assert_eq!(widget.last_reason(), Some("logout"));
    }

    #[test]
    fn test_invalid_transitions_leave_state_unchanged() {
        let (mut widget, mut server) = widget();

        let err = push(&mut widget, EVENT_QR, json!("code")).unwrap_err();
        assert!(matches!(err, Error::InvalidTransition { .. }));
        assert_eq!(widget.state(), &ConnectionState::Disconnected);

        push(&mut widget, EVENT_READY, json!("6281234")).unwrap();
        assert!(widget.start().is_err());
        assert!(push(&mut widget, EVENT_QR, json!("code")).is_err());
        assert_eq!(widget.state().name(), "active");
        assert!(server.try_next_emit().is_none());
    }

    #[test]
    fn test_refresh_re_emits_start() {
        let (mut widget, mut server) = widget();
        widget.start().unwrap();
        push(&mut widget, EVENT_QR, json!("first")).unwrap();

        widget.refresh_qr().unwrap();

        assert_eq!(widget.state(), &ConnectionState::Connecting);
        assert_eq!(server.try_next_emit().unwrap().name, EVENT_START);
        assert_eq!(server.try_next_emit().unwrap().name, EVENT_START);
    }

    #[test]
    fn test_start_while_awaiting_scan_requests_new_session() {
        let (mut widget, mut server) = widget();
        widget.start().unwrap();
        push(&mut widget, EVENT_QR, json!("2@old")).unwrap();
        server.try_next_emit().unwrap();

        widget.start().unwrap();

        assert_eq!(widget.state(), &ConnectionState::Connecting);
        assert_eq!(server.try_next_emit().unwrap().name, EVENT_START);
    }

    #[test]
    fn test_stop_waits_for_server() {
        let (mut widget, mut server) = widget();
        assert!(widget.stop().is_err());

        push(&mut widget, EVENT_READY, json!({"phone": "1"})).unwrap();
        widget.stop().unwrap();
        widget.delete_session();
        widget.update_settings(json!({"autoReply": false}));

        assert_eq!(widget.state().name(), "active");
        let emitted: Vec<String> = std::iter::from_fn(|| server.try_next_emit())
            .map(|e| e.name)
            .collect();
        assert_eq!(
            emitted,
            vec![EVENT_STOP, EVENT_DELETE_SESSION, EVENT_UPDATE_SETTINGS]
        );
    }

    #[test]
    fn test_chat_panel_updates() {
        let mut panel = ChatPanel::new(2);
        panel
            .on_event(&SocketEvent::new(
                "chat:stats",
                json!({"totalMessages": 12, "aiResponses": 4}),
            ))
            .unwrap();
        panel
            .on_event(&SocketEvent::new(
                "chat:response_types",
                json!([{"type": "ai", "count": 4}, {"type": "template", "count": 8}]),
            ))
            .unwrap();
        for text in ["a", "b", "c"] {
            panel
                .on_event(&SocketEvent::new(
                    "chat:message",
                    json!({"from": "62811", "message": text}),
                ))
                .unwrap();
        }

        assert_eq!(panel.stats().total_messages, 12);
        assert_eq!(panel.response_types().labels(), ["ai", "template"]);
        assert_eq!(panel.response_types().series()[0].data, vec![4.0, 8.0]);
        assert_eq!(
            panel.recent().map(|m| m.text.as_str()).collect::<Vec<_>>(),
            vec!["b", "c"]
        );
    }

    #[test]
    fn test_chat_panel_rejects_bad_response_types() {
        let mut panel = ChatPanel::default();
        assert!(
            panel
                .on_event(&SocketEvent::new("chat:response_types", json!(3)))
                .is_err()
        );
    }
}
