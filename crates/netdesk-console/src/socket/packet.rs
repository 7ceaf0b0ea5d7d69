//! Engine.IO v4 / Socket.IO v5 text packet codec
//!
//! A WebSocket frame carries one Engine.IO packet: a type digit followed by
//! its data. Socket.IO packets travel inside Engine.IO `message` packets:
//!
//! ```text
//! 4 2 /whatsapp, 12 ["whatsapp:qr",{"qr":"..."}]
//! | | |          |  +-- JSON data
//! | | |          +----- optional ack id
//! | | +---------------- namespace, omitted for "/"
//! | +------------------ Socket.IO type (event)
//! +-------------------- Engine.IO type (message)
//! ```
//!
//! Binary attachments are not used by the backend and are rejected.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Errors raised while decoding a frame
#[derive(Error, Debug)]
pub enum PacketError {
    /// Empty frame
    #[error("Empty packet")]
    Empty,

    /// Unknown Engine.IO packet type
    #[error("Unknown Engine.IO packet type: {0}")]
    UnknownEngineType(char),

    /// Unknown Socket.IO packet type
    #[error("Unknown Socket.IO packet type: {0}")]
    UnknownSocketType(char),

    /// Binary event or ack
    #[error("Binary packets are not supported")]
    BinaryUnsupported,

    /// Event data is not a non-empty array starting with a string
    #[error("Event packet without a name")]
    MissingEventName,

    /// Ack packet without an id
    #[error("Ack packet without an id")]
    MissingAckId,

    /// Malformed JSON data
    #[error("Invalid packet data: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

impl From<PacketError> for netdesk_core::Error {
    fn from(err: PacketError) -> Self {
        Self::Protocol(err.to_string())
    }
}

/// Data sent by the server in the Engine.IO `open` packet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Handshake {
    /// Engine.IO session id
    pub sid: String,
    /// Transports the server may upgrade to
    #[serde(default)]
    pub upgrades: Vec<String>,
    /// Milliseconds between server pings
    pub ping_interval: u64,
    /// Milliseconds the server waits for a pong
    pub ping_timeout: u64,
    /// Largest payload the server accepts
    #[serde(default)]
    pub max_payload: Option<u64>,
}

/// Engine.IO packet
#[derive(Debug, Clone, PartialEq)]
pub enum EnginePacket {
    /// `0` session opened
    Open(Handshake),
    /// `1` transport closing
    Close,
    /// `2` heartbeat from the server
    Ping,
    /// `3` heartbeat answer
    Pong,
    /// `4` Socket.IO payload
    Message(SocketPacket),
    /// `6` no-op
    Noop,
}

/// Socket.IO packet
#[derive(Debug, Clone, PartialEq)]
pub enum SocketPacket {
    /// `0` namespace connect; the client sends its auth, the server the sid
    Connect {
        /// Namespace path
        namespace: String,
        /// Auth object (client) or `{"sid": ..}` (server)
        data: Option<Value>,
    },
    /// `1` namespace disconnect
    Disconnect {
        /// Namespace path
        namespace: String,
    },
    /// `2` named event
    Event {
        /// Namespace path
        namespace: String,
        /// Ack id requested by the sender
        ack_id: Option<u64>,
        /// Event name
        name: String,
        /// Event arguments
        args: Vec<Value>,
    },
    /// `3` event acknowledgement
    Ack {
        /// Namespace path
        namespace: String,
        /// Acknowledged id
        ack_id: u64,
        /// Ack arguments
        args: Vec<Value>,
    },
    /// `4` namespace connection refused
    ConnectError {
        /// Namespace path
        namespace: String,
        /// Usually `{"message": ..}`
        data: Value,
    },
}

impl SocketPacket {
    /// Namespace the packet belongs to
    #[must_use]
    pub fn namespace(&self) -> &str {
        match self {
            Self::Connect { namespace, .. }
            | Self::Disconnect { namespace }
            | Self::Event { namespace, .. }
            | Self::Ack { namespace, .. }
            | Self::ConnectError { namespace, .. } => namespace,
        }
    }

    const fn type_digit(&self) -> char {
        match self {
            Self::Connect { .. } => '0',
            Self::Disconnect { .. } => '1',
            Self::Event { .. } => '2',
            Self::Ack { .. } => '3',
            Self::ConnectError { .. } => '4',
        }
    }

    /// Encode without the Engine.IO prefix
    #[must_use]
    pub fn encode(&self) -> String {
        let mut out = String::new();
        out.push(self.type_digit());

        let namespace = self.namespace();
        if namespace != "/" && !namespace.is_empty() {
            out.push_str(namespace);
            out.push(',');
        }

        match self {
            Self::Connect { data, .. } => {
                if let Some(data) = data {
                    out.push_str(&data.to_string());
                }
            }
            Self::Disconnect { .. } => {}
            Self::Event {
                ack_id, name, args, ..
            } => {
                if let Some(id) = ack_id {
                    out.push_str(&id.to_string());
                }
                let mut array = Vec::with_capacity(args.len() + 1);
                array.push(Value::String(name.clone()));
                array.extend(args.iter().cloned());
                out.push_str(&Value::Array(array).to_string());
            }
            Self::Ack { ack_id, args, .. } => {
                out.push_str(&ack_id.to_string());
                out.push_str(&Value::Array(args.clone()).to_string());
            }
            Self::ConnectError { data, .. } => out.push_str(&data.to_string()),
        }

        out
    }

    /// Decode a packet without the Engine.IO prefix
    ///
    /// # Errors
    ///
    /// Returns a [`PacketError`] for unknown types, binary packets or
    /// malformed data.
    pub fn decode(raw: &str) -> Result<Self, PacketError> {
        let mut chars = raw.chars();
        let kind = chars.next().ok_or(PacketError::Empty)?;
        let mut rest = chars.as_str();

        let namespace = if rest.starts_with('/') {
            match rest.split_once(',') {
                Some((ns, tail)) => {
                    rest = tail;
                    ns.to_string()
                }
                None => {
                    let ns = rest.to_string();
                    rest = "";
                    ns
                }
            }
        } else {
            "/".to_string()
        };

        let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
        let (id, data) = rest.split_at(digits);
        let ack_id = if id.is_empty() {
            None
        } else {
            id.parse::<u64>().ok()
        };
        let data = if data.is_empty() {
            None
        } else {
            Some(serde_json::from_str::<Value>(data)?)
        };

        match kind {
            '0' => Ok(Self::Connect { namespace, data }),
            '1' => Ok(Self::Disconnect { namespace }),
            '2' => {
                let Some(Value::Array(mut items)) = data else {
                    return Err(PacketError::MissingEventName);
                };
                if items.is_empty() {
                    return Err(PacketError::MissingEventName);
                }
                let Value::String(name) = items.remove(0) else {
                    return Err(PacketError::MissingEventName);
                };
                Ok(Self::Event {
                    namespace,
                    ack_id,
                    name,
                    args: items,
                })
            }
            '3' => {
                let ack_id = ack_id.ok_or(PacketError::MissingAckId)?;
                let args = match data {
                    Some(Value::Array(items)) => items,
                    Some(other) => vec![other],
                    None => Vec::new(),
                };
                Ok(Self::Ack {
                    namespace,
                    ack_id,
                    args,
                })
            }
            '4' => Ok(Self::ConnectError {
                namespace,
                data: data.unwrap_or(Value::Null),
            }),
            '5' | '6' => Err(PacketError::BinaryUnsupported),
            other => Err(PacketError::UnknownSocketType(other)),
        }
    }
}

impl EnginePacket {
    /// Encode as a WebSocket text frame
    #[must_use]
    pub fn encode(&self) -> String {
        match self {
            Self::Open(handshake) => {
                format!("0{}", serde_json::to_string(handshake).unwrap_or_default())
            }
            Self::Close => "1".to_string(),
            Self::Ping => "2".to_string(),
            Self::Pong => "3".to_string(),
            Self::Message(packet) => format!("4{}", packet.encode()),
            Self::Noop => "6".to_string(),
        }
    }

    /// Decode a WebSocket text frame
    ///
    /// # Errors
    ///
    /// Returns a [`PacketError`] if the frame is not a valid packet.
    pub fn decode(raw: &str) -> Result<Self, PacketError> {
        let mut chars = raw.chars();
        let kind = chars.next().ok_or(PacketError::Empty)?;
        let rest = chars.as_str();

        match kind {
            '0' => Ok(Self::Open(serde_json::from_str(rest)?)),
            '1' => Ok(Self::Close),
            // Upgrade check payloads only appear during transport upgrades
            '2' => Ok(Self::Ping),
            '3' => Ok(Self::Pong),
            '4' => Ok(Self::Message(SocketPacket::decode(rest)?)),
            '6' => Ok(Self::Noop),
            other => Err(PacketError::UnknownEngineType(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use serde_json::json;

    #[test]
    fn test_decode_open_handshake() {
        let packet = EnginePacket::decode(
            r#"0{"sid":"lv_VI97HAXpY6yYWAAAC","upgrades":[],"pingInterval":25000,"pingTimeout":20000,"maxPayload":1000000}"#,
        )
        .unwrap();

        let EnginePacket::Open(handshake) = packet else {
            panic!("expected open packet");
        };
        assert_eq!(handshake.sid, "lv_VI97HAXpY6yYWAAAC");
        assert_eq!(handshake.ping_interval, 25_000);
        assert_eq!(handshake.max_payload, Some(1_000_000));
    }

    #[test]
    fn test_encode_connect_with_auth() {
        let packet = EnginePacket::Message(SocketPacket::Connect {
            namespace: "/whatsapp".to_string(),
            data: Some(json!({"token": "abc"})),
        });

        assert_eq!(packet.encode(), r#"40/whatsapp,{"token":"abc"}"#);
    }

    #[test]
    fn test_default_namespace_is_omitted() {
        let packet = SocketPacket::Event {
            namespace: "/".to_string(),
            ack_id: None,
            name: "whatsapp:start".to_string(),
            args: vec![],
        };

        assert_eq!(packet.encode(), r#"2["whatsapp:start"]"#);
    }

    #[test]
    fn test_decode_namespaced_event_with_ack() {
        let packet =
            EnginePacket::decode(r#"42/network-monitor,7["monitoring-data",{"cpu":12}]"#)
                .unwrap();

        assert_eq!(
            packet,
            EnginePacket::Message(SocketPacket::Event {
                namespace: "/network-monitor".to_string(),
                ack_id: Some(7),
                name: "monitoring-data".to_string(),
                args: vec![json!({"cpu": 12})],
            })
        );
    }

    #[test]
    fn test_decode_connect_error() {
        let packet = SocketPacket::decode(r#"4/whatsapp,{"message":"Invalid token"}"#).unwrap();

        assert_eq!(
            packet,
            SocketPacket::ConnectError {
                namespace: "/whatsapp".to_string(),
                data: json!({"message": "Invalid token"}),
            }
        );
    }

    #[test]
    fn test_decode_namespace_without_data() {
        assert_eq!(
            SocketPacket::decode("1/whatsapp").unwrap(),
            SocketPacket::Disconnect {
                namespace: "/whatsapp".to_string()
            }
        );
    }

    #[test]
    fn test_event_round_trip_keeps_args() {
        let packet = SocketPacket::Event {
            namespace: "/whatsapp".to_string(),
            ack_id: None,
            name: "whatsapp:updateSettings".to_string(),
            args: vec![json!({"autoReply": true}), json!(3)],
        };

        assert_eq!(SocketPacket::decode(&packet.encode()).unwrap(), packet);
    }

    #[rstest]
    #[case("")]
    #[case("9")]
    #[case("45")]
    #[case("451-[\"x\",{\"_placeholder\":true,\"num\":0}]")]
    #[case("42")]
    #[case("42[]")]
    #[case("42[1,2]")]
    #[case("42{not json")]
    #[case("43[]")]
    fn test_rejects_malformed_frames(#[case] raw: &str) {
        assert!(EnginePacket::decode(raw).is_err());
    }

    #[test]
    fn test_heartbeat_packets() {
        assert_eq!(EnginePacket::decode("2").unwrap(), EnginePacket::Ping);
        assert_eq!(EnginePacket::Pong.encode(), "3");
    }
}
