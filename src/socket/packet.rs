//! Engine.io and socket.io text packet codec.
//!
//! Engine.io frames every websocket text message with a leading packet type
//! digit; `message` packets carry socket.io packets, which add their own type
//! digit, an optional namespace (`/v1,`), an optional ack ID and a JSON payload:
//!
//! ```text
//! 42/v1,7["subscribe",{"ch":"trades:ticker:all"}]
//! ^^ ^^^^ ^ ^
//! || |    | JSON payload
//! || |    ack ID
//! || namespace
//! |socket.io EVENT
//! engine.io MESSAGE
//! ```

use serde::Deserialize;
use serde_json::Value;

use crate::error::ApiError;

/// Handshake sent by the server in the engine.io `open` packet.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Handshake {
    pub sid: String,
    #[serde(default)]
    pub upgrades: Vec<String>,
    /// Milliseconds.
    pub ping_interval: u64,
    /// Milliseconds.
    pub ping_timeout: u64,
}

/// Engine.io packet.
#[derive(Clone, Debug, PartialEq)]
pub enum EnginePacket {
    Open(Handshake),
    Close,
    Ping(String),
    Pong(String),
    Message(String),
    Upgrade,
    Noop,
}

impl EnginePacket {
    pub fn decode(frame: &str) -> Result<Self, ApiError> {
        let mut chars = frame.chars();
        let kind = chars
            .next()
            .ok_or_else(|| ApiError::Protocol("empty engine.io packet".to_string()))?;
        let data = chars.as_str();
        Ok(match kind {
            '0' => EnginePacket::Open(serde_json::from_str(data)?),
            '1' => EnginePacket::Close,
            '2' => EnginePacket::Ping(data.to_string()),
            '3' => EnginePacket::Pong(data.to_string()),
            '4' => EnginePacket::Message(data.to_string()),
            '5' => EnginePacket::Upgrade,
            '6' => EnginePacket::Noop,
            other => {
                return Err(ApiError::Protocol(format!(
                    "unknown engine.io packet type: {other}"
                )));
            }
        })
    }

    pub fn encode(&self) -> String {
        match self {
            // Only servers send open packets
            EnginePacket::Open(_) => "0".to_string(),
            EnginePacket::Close => "1".to_string(),
            EnginePacket::Ping(data) => format!("2{data}"),
            EnginePacket::Pong(data) => format!("3{data}"),
            EnginePacket::Message(data) => format!("4{data}"),
            EnginePacket::Upgrade => "5".to_string(),
            EnginePacket::Noop => "6".to_string(),
        }
    }
}

/// Socket.io packet type.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PacketKind {
    Connect,
    Disconnect,
    Event,
    Ack,
    ConnectError,
}

impl PacketKind {
    fn digit(&self) -> char {
        match self {
            PacketKind::Connect => '0',
            PacketKind::Disconnect => '1',
            PacketKind::Event => '2',
            PacketKind::Ack => '3',
            PacketKind::ConnectError => '4',
        }
    }
}

/// Socket.io packet.
#[derive(Clone, Debug, PartialEq)]
pub struct SocketPacket {
    pub kind: PacketKind,
    pub namespace: String,
    pub ack_id: Option<u64>,
    pub data: Option<Value>,
}

impl SocketPacket {
    pub fn connect(namespace: &str) -> Self {
        Self {
            kind: PacketKind::Connect,
            namespace: namespace.to_string(),
            ack_id: None,
            data: None,
        }
    }

    pub fn disconnect(namespace: &str) -> Self {
        Self {
            kind: PacketKind::Disconnect,
            namespace: namespace.to_string(),
            ack_id: None,
            data: None,
        }
    }

    pub fn event(namespace: &str, name: &str, data: Value, ack_id: Option<u64>) -> Self {
        Self {
            kind: PacketKind::Event,
            namespace: namespace.to_string(),
            ack_id,
            data: Some(Value::Array(vec![Value::String(name.to_string()), data])),
        }
    }

    /// Event name and first argument of an event packet.
    pub fn event_parts(&self) -> Option<(&str, Value)> {
        if self.kind != PacketKind::Event {
            return None;
        }
        let items = self.data.as_ref()?.as_array()?;
        let name = items.first()?.as_str()?;
        Some((name, items.get(1).cloned().unwrap_or(Value::Null)))
    }

    pub fn decode(data: &str) -> Result<Self, ApiError> {
        let mut chars = data.chars();
        let kind = match chars.next() {
            Some('0') => PacketKind::Connect,
            Some('1') => PacketKind::Disconnect,
            Some('2') => PacketKind::Event,
            Some('3') => PacketKind::Ack,
            Some('4') => PacketKind::ConnectError,
            Some('5') | Some('6') => {
                return Err(ApiError::Protocol(
                    "binary socket.io packets are not supported".to_string(),
                ));
            }
            Some(other) => {
                return Err(ApiError::Protocol(format!(
                    "unknown socket.io packet type: {other}"
                )));
            }
            None => return Err(ApiError::Protocol("empty socket.io packet".to_string())),
        };
        let mut rest = chars.as_str();

        let mut namespace = "/".to_string();
        if rest.starts_with('/') {
            let end = rest.find(',').unwrap_or(rest.len());
            namespace = rest[..end].to_string();
            rest = rest.get(end + 1..).unwrap_or_default();
        }

        let digits = rest.chars().take_while(char::is_ascii_digit).count();
        let ack_id = if digits > 0 {
            let id = rest[..digits]
                .parse()
                .map_err(|_| ApiError::Protocol(format!("invalid ack id: {}", &rest[..digits])))?;
            rest = &rest[digits..];
            Some(id)
        } else {
            None
        };

        let data = if rest.is_empty() {
            None
        } else {
            Some(serde_json::from_str(rest)?)
        };

        Ok(Self {
            kind,
            namespace,
            ack_id,
            data,
        })
    }

    pub fn encode(&self) -> String {
        let mut out = String::new();
        out.push(self.kind.digit());
        if self.namespace != "/" {
            out.push_str(&self.namespace);
            out.push(',');
        }
        if let Some(id) = self.ack_id {
            out.push_str(&id.to_string());
        }
        if let Some(data) = &self.data {
            out.push_str(&data.to_string());
        }
        out
    }

    /// Engine.io frame carrying this packet.
    pub fn to_frame(&self) -> String {
        EnginePacket::Message(self.encode()).encode()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_decode_open() {
        let packet = EnginePacket::decode(
            r#"0{"sid":"abc","upgrades":[],"pingInterval":25000,"pingTimeout":5000}"#,
        )
        .unwrap();
        assert_eq!(
            packet,
            EnginePacket::Open(Handshake {
                sid: "abc".to_string(),
                upgrades: vec![],
                ping_interval: 25000,
                ping_timeout: 5000,
            })
        );
    }

    #[test]
    fn test_engine_ping_pong() {
        assert_eq!(EnginePacket::decode("2").unwrap(), EnginePacket::Ping(String::new()));
        assert_eq!(EnginePacket::Pong(String::new()).encode(), "3");
        assert_eq!(EnginePacket::Ping("probe".to_string()).encode(), "2probe");
        assert!(EnginePacket::decode("").is_err());
        assert!(EnginePacket::decode("9").is_err());
    }

    #[test]
    fn test_encode_subscribe_event() {
        let packet = SocketPacket::event(
            "/v1",
            "subscribe",
            json!({"ch": "trades:ticker:all"}),
            Some(7),
        );
        assert_eq!(
            packet.to_frame(),
            r#"42/v1,7["subscribe",{"ch":"trades:ticker:all"}]"#
        );
    }

    #[test]
    fn test_encode_connect() {
        assert_eq!(SocketPacket::connect("/v1").to_frame(), "40/v1,");
        assert_eq!(SocketPacket::connect("/").to_frame(), "40");
        assert_eq!(SocketPacket::disconnect("/v1").to_frame(), "41/v1,");
    }

    #[test]
    fn test_decode_event() {
        let packet =
            SocketPacket::decode(r#"2/v1,["trades:ticker:all",{"d":[{"tx":"0x1"}]}]"#).unwrap();
        assert_eq!(packet.kind, PacketKind::Event);
        assert_eq!(packet.namespace, "/v1");
        assert_eq!(packet.ack_id, None);
        let (name, data) = packet.event_parts().unwrap();
        assert_eq!(name, "trades:ticker:all");
        assert_eq!(data, json!({"d": [{"tx": "0x1"}]}));
    }

    #[test]
    fn test_decode_ack_and_connect() {
        let packet = SocketPacket::decode(r#"3/v1,12["ok"]"#).unwrap();
        assert_eq!(packet.kind, PacketKind::Ack);
        assert_eq!(packet.ack_id, Some(12));
        assert_eq!(packet.data, Some(json!(["ok"])));

        let packet = SocketPacket::decode("0/v1,").unwrap();
        assert_eq!(packet, SocketPacket::connect("/v1"));

        let packet = SocketPacket::decode(r#"0/v1,{"sid":"x"}"#).unwrap();
        assert_eq!(packet.kind, PacketKind::Connect);
        assert_eq!(packet.data, Some(json!({"sid": "x"})));

        let packet = SocketPacket::decode("0").unwrap();
        assert_eq!(packet.namespace, "/");
    }

    #[test]
    fn test_decode_connect_error_and_binary() {
        let packet = SocketPacket::decode(r#"4/v1,{"message":"not authorized"}"#).unwrap();
        assert_eq!(packet.kind, PacketKind::ConnectError);
        assert!(SocketPacket::decode(r#"51-["file",{"_placeholder":true,"num":0}]"#).is_err());
    }

    #[test]
    fn test_event_parts_without_args() {
        let packet = SocketPacket::decode(r#"2["ping"]"#).unwrap();
        assert_eq!(packet.event_parts(), Some(("ping", Value::Null)));
        assert_eq!(SocketPacket::connect("/v1").event_parts(), None);
    }
}
