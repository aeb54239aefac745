//! Text framing of the relay: Engine.IO v4 packets carrying Socket.IO v5
//! packets, as spoken by the backend's Socket.IO server over a WebSocket.
//!
//! ```text
//! 0{"sid":...}        engine open
//! 2 / 3               engine ping / pong
//! 40 / 40{"sid":..}   socket connect (request / ack)
//! 42["name",{...}]    socket event
//! 41                  socket disconnect
//! ```
//!
//! Only the default namespace is used. Binary attachments are not.

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::models::OutboundEvent;

#[derive(Debug, Error, PartialEq)]
pub enum CodecError {
    #[error("empty frame")]
    Empty,
    #[error("unknown engine packet type '{0}'")]
    UnknownEngineType(char),
    #[error("unknown socket packet type '{0}'")]
    UnknownSocketType(char),
    #[error("malformed packet data: {0}")]
    Malformed(String),
}

/// Handshake data the server sends with the engine `open` packet
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OpenHandshake {
    pub sid: String,
    #[serde(default)]
    pub ping_interval: u64,
    #[serde(default)]
    pub ping_timeout: u64,
    #[serde(default)]
    pub max_payload: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SocketPacket {
    Connect(Option<Value>),
    Disconnect,
    Event { name: String, payload: Value },
    Ack,
    ConnectError(Value),
}

#[derive(Debug, Clone, PartialEq)]
pub enum EnginePacket {
    Open(OpenHandshake),
    Close,
    Ping,
    Pong,
    Message(SocketPacket),
    Noop,
}

impl EnginePacket {
    pub fn decode(frame: &str) -> Result<Self, CodecError> {
        let mut chars = frame.chars();
        let kind = chars.next().ok_or(CodecError::Empty)?;
        let rest = chars.as_str();
        match kind {
            '0' => serde_json::from_str(rest)
                .map(EnginePacket::Open)
                .map_err(|e| CodecError::Malformed(e.to_string())),
            '1' => Ok(EnginePacket::Close),
            '2' => Ok(EnginePacket::Ping),
            '3' => Ok(EnginePacket::Pong),
            '4' => SocketPacket::decode(rest).map(EnginePacket::Message),
            '6' => Ok(EnginePacket::Noop),
            other => Err(CodecError::UnknownEngineType(other)),
        }
    }

    pub fn encode(&self) -> String {
        match self {
            // Only servers send open; clients never need to encode it
            EnginePacket::Open(_) => "0".to_string(),
            EnginePacket::Close => "1".to_string(),
            EnginePacket::Ping => "2".to_string(),
            EnginePacket::Pong => "3".to_string(),
            EnginePacket::Message(packet) => format!("4{}", packet.encode()),
            EnginePacket::Noop => "6".to_string(),
        }
    }
}

impl SocketPacket {
    fn decode(data: &str) -> Result<Self, CodecError> {
        let mut chars = data.chars();
        let kind = chars.next().ok_or(CodecError::Empty)?;
        let body = strip_ack_id(strip_namespace(chars.as_str()));
        match kind {
            '0' => {
                if body.is_empty() {
                    Ok(SocketPacket::Connect(None))
                } else {
                    parse_json(body).map(|v| SocketPacket::Connect(Some(v)))
                }
            }
            '1' => Ok(SocketPacket::Disconnect),
            '2' => {
                let mut items = match parse_json(body)? {
                    Value::Array(items) => items.into_iter(),
                    _ => return Err(CodecError::Malformed("event is not an array".to_string())),
                };
                let name = match items.next() {
                    Some(Value::String(name)) => name,
                    _ => return Err(CodecError::Malformed("event has no name".to_string())),
                };
                let payload = items.next().unwrap_or(Value::Null);
                Ok(SocketPacket::Event { name, payload })
            }
            '3' => Ok(SocketPacket::Ack),
            '4' => parse_json(body)
                .or_else(|_| Ok(Value::String(body.to_string())))
                .map(SocketPacket::ConnectError),
            other => Err(CodecError::UnknownSocketType(other)),
        }
    }

    fn encode(&self) -> String {
        match self {
            SocketPacket::Connect(None) => "0".to_string(),
            SocketPacket::Connect(Some(auth)) => format!("0{}", auth),
            SocketPacket::Disconnect => "1".to_string(),
            SocketPacket::Event { name, payload } => {
                format!("2{}", Value::Array(vec![Value::String(name.clone()), payload.clone()]))
            }
            SocketPacket::Ack => "3[]".to_string(),
            SocketPacket::ConnectError(data) => format!("4{}", data),
        }
    }
}

impl From<&OutboundEvent> for EnginePacket {
    fn from(event: &OutboundEvent) -> Self {
        EnginePacket::Message(SocketPacket::Event {
            name: event.name().to_string(),
            payload: event.payload(),
        })
    }
}

fn parse_json(body: &str) -> Result<Value, CodecError> {
    serde_json::from_str(body).map_err(|e| CodecError::Malformed(e.to_string()))
}

// "/chat,..." prefixes a non-default namespace
fn strip_namespace(body: &str) -> &str {
    if body.starts_with('/') {
        match body.find(',') {
            Some(idx) => &body[idx + 1..],
            None => "",
        }
    } else {
        body
    }
}

// Digits before the payload are an ack id
fn strip_ack_id(body: &str) -> &str {
    body.trim_start_matches(|c: char| c.is_ascii_digit())
}
