//! Socket.IO v5 / Engine.IO v4 text framing, shared by the websocket and
//! long-polling transports.

use serde::Deserialize;

use crate::Error;

// ---------------------------------------------------------------------------
// Packet type constants
// ---------------------------------------------------------------------------

pub mod engine {
    pub const OPEN: char = '0';
    pub const CLOSE: char = '1';
    pub const PING: char = '2';
    pub const PONG: char = '3';
    pub const MESSAGE: char = '4';
    pub const UPGRADE: char = '5';
    pub const NOOP: char = '6';
}

pub mod socket {
    pub const CONNECT: char = '0';
    pub const DISCONNECT: char = '1';
    pub const EVENT: char = '2';
    pub const ACK: char = '3';
    pub const CONNECT_ERROR: char = '4';
    pub const BINARY_EVENT: char = '5';
    pub const BINARY_ACK: char = '6';
}

/// Engine.IO protocol revision sent in the `EIO` query parameter.
pub const ENGINE_IO_VERSION: &str = "4";
pub const DEFAULT_PATH: &str = "/socket.io/";

/// Separates the packets batched into one long-polling payload.
pub const RECORD_SEPARATOR: char = '\x1e';

// ---------------------------------------------------------------------------
// Decoded packets
// ---------------------------------------------------------------------------

/// Payload of the Engine.IO OPEN packet.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OpenPayload {
    pub sid: String,
    #[serde(default)]
    pub upgrades: Vec<String>,
    pub ping_interval: u64,
    pub ping_timeout: u64,
    #[serde(default)]
    pub max_payload: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    Open(OpenPayload),
    Close,
    Ping,
    Pong,
    Noop,
    /// Namespace connect acknowledged. Carries the socket id.
    Connect { sid: Option<String> },
    Disconnect,
    Event {
        name: String,
        data: serde_json::Value,
    },
    ConnectError { message: String },
    /// Acks, binary attachments and upgrade probes; never produced by this client.
    Unsupported(String),
}

#[derive(Deserialize)]
struct ConnectPayload {
    sid: Option<String>,
}

#[derive(Deserialize)]
struct ConnectErrorPayload {
    message: String,
}

pub fn decode_packet(text: &str) -> Result<Packet, Error> {
    let mut chars = text.chars();
    let kind = chars.next().ok_or_else(|| protocol_error("empty packet"))?;
    let rest = chars.as_str();
    match kind {
        engine::OPEN => {
            let open: OpenPayload = serde_json::from_str(rest)?;
            Ok(Packet::Open(open))
        }
        engine::CLOSE => Ok(Packet::Close),
        engine::PING => Ok(Packet::Ping),
        engine::PONG => Ok(Packet::Pong),
        engine::NOOP => Ok(Packet::Noop),
        engine::UPGRADE => Ok(Packet::Unsupported(text.to_string())),
        engine::MESSAGE => decode_socket_packet(rest),
        other => Err(protocol_error(&format!("unknown engine packet type {other:?}"))),
    }
}

fn decode_socket_packet(text: &str) -> Result<Packet, Error> {
    let mut chars = text.chars();
    let kind = chars
        .next()
        .ok_or_else(|| protocol_error("empty socket packet"))?;
    let body = skip_namespace(chars.as_str());
    match kind {
        socket::CONNECT => {
            let sid = if body.is_empty() {
                None
            } else {
                serde_json::from_str::<ConnectPayload>(body)?.sid
            };
            Ok(Packet::Connect { sid })
        }
        socket::DISCONNECT => Ok(Packet::Disconnect),
        socket::EVENT => {
            // An ack id, when present, is a run of digits before the array.
            let args = body.trim_start_matches(|c: char| c.is_ascii_digit());
            let values: Vec<serde_json::Value> = serde_json::from_str(args)?;
            let mut values = values.into_iter();
            let name = match values.next() {
                Some(serde_json::Value::String(name)) => name,
                _ => return Err(protocol_error("event packet without a name")),
            };
            let data = values.next().unwrap_or(serde_json::Value::Null);
            Ok(Packet::Event { name, data })
        }
        socket::CONNECT_ERROR => {
            let message = serde_json::from_str::<ConnectErrorPayload>(body)
                .map(|p| p.message)
                .unwrap_or_else(|_| body.to_string());
            Ok(Packet::ConnectError { message })
        }
        socket::ACK | socket::BINARY_EVENT | socket::BINARY_ACK => {
            Ok(Packet::Unsupported(text.to_string()))
        }
        other => Err(protocol_error(&format!("unknown socket packet type {other:?}"))),
    }
}

/// Strip a `/namespace,` prefix. Only the default namespace is used, but
/// servers may still address it explicitly.
fn skip_namespace(body: &str) -> &str {
    if body.starts_with('/') {
        body.split_once(',').map_or("", |(_, rest)| rest)
    } else {
        body
    }
}

pub(crate) fn protocol_error(message: &str) -> Error {
    Error::Protocol {
        message: message.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Encoders
// ---------------------------------------------------------------------------

pub fn encode_connect() -> String {
    format!("{}{}", engine::MESSAGE, socket::CONNECT)
}

pub fn encode_disconnect() -> String {
    format!("{}{}", engine::MESSAGE, socket::DISCONNECT)
}

pub fn encode_pong() -> String {
    engine::PONG.to_string()
}

/// Engine-level close, sent when a polling session ends.
pub fn encode_close() -> String {
    engine::CLOSE.to_string()
}

pub fn encode_event(name: &str, data: Option<&serde_json::Value>) -> Result<String, Error> {
    let args = match data {
        Some(data) => serde_json::json!([name, data]),
        None => serde_json::json!([name]),
    };
    Ok(format!(
        "{}{}{}",
        engine::MESSAGE,
        socket::EVENT,
        serde_json::to_string(&args)?
    ))
}

// ---------------------------------------------------------------------------
// Long-polling payloads
// ---------------------------------------------------------------------------

/// Packets carried by one polling response body. Empty records are skipped.
pub fn split_payload(payload: &str) -> impl Iterator<Item = &str> {
    payload.split(RECORD_SEPARATOR).filter(|p| !p.is_empty())
}

pub fn encode_payload<I, S>(packets: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut payload = String::new();
    for packet in packets {
        if !payload.is_empty() {
            payload.push(RECORD_SEPARATOR);
        }
        payload.push_str(packet.as_ref());
    }
    payload
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
