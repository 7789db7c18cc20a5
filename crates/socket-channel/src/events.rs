//! Typed channel events: lifecycle notifications, inbound server events, and
//! outbound client events.

use serde::{Deserialize, Serialize};

/// `reason` values carried by [`ChannelEvent::Disconnected`].
pub mod reason {
    /// The server closed the transport.
    pub const TRANSPORT_CLOSE: &str = "transport close";
    /// Read/write failure or an undecodable frame.
    pub const TRANSPORT_ERROR: &str = "transport error";
    /// No traffic within `pingInterval + pingTimeout`.
    pub const PING_TIMEOUT: &str = "ping timeout";
    /// The server disconnected this client; no automatic reconnect follows.
    pub const SERVER_DISCONNECT: &str = "io server disconnect";
    /// [`ConnectionManager::disconnect`](crate::ConnectionManager::disconnect).
    pub const CLIENT_DISCONNECT: &str = "io client disconnect";
}

/// A chat message as broadcast by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: Option<i64>,
    #[serde(rename = "contenido")]
    pub content: String,
    #[serde(rename = "es_usuario")]
    pub from_user: bool,
    /// ISO-8601 timestamp, as sent by the server.
    #[serde(rename = "fecha_creacion")]
    pub created_at: String,
    #[serde(rename = "documento_id", default)]
    pub document_id: Option<i64>,
}

/// Events pushed by the server.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    /// `conectado`: greeting sent right after the namespace connect.
    Welcome { message: String },
    /// `unido_sala`
    RoomJoined { room: String, message: String },
    /// `salido_sala`
    RoomLeft { room: String, message: String },
    /// `mensaje_recibido`: the assistant's reply to an `enviar_mensaje`.
    MessageReceived(ChatMessage),
    /// `historial_enviado`
    History(Vec<ChatMessage>),
    /// `historial_limpiado`
    HistoryCleared { message: String },
    /// `error`: an application-level failure reported by the server.
    Error { message: String },
}

#[derive(Deserialize)]
struct Notice {
    mensaje: String,
}

#[derive(Deserialize)]
struct RoomNotice {
    sala: String,
    mensaje: String,
}

impl ServerEvent {
    /// Decode a wire event. Returns `Ok(None)` for event names this client does
    /// not know about.
    pub fn from_wire(
        name: &str,
        data: serde_json::Value,
    ) -> Result<Option<Self>, serde_json::Error> {
        let event = match name {
            "conectado" => {
                let n: Notice = serde_json::from_value(data)?;
                ServerEvent::Welcome { message: n.mensaje }
            }
            "unido_sala" => {
                let n: RoomNotice = serde_json::from_value(data)?;
                ServerEvent::RoomJoined {
                    room: n.sala,
                    message: n.mensaje,
                }
            }
            "salido_sala" => {
                let n: RoomNotice = serde_json::from_value(data)?;
                ServerEvent::RoomLeft {
                    room: n.sala,
                    message: n.mensaje,
                }
            }
            "mensaje_recibido" => ServerEvent::MessageReceived(serde_json::from_value(data)?),
            "historial_enviado" => ServerEvent::History(serde_json::from_value(data)?),
            "historial_limpiado" => {
                let n: Notice = serde_json::from_value(data)?;
                ServerEvent::HistoryCleared { message: n.mensaje }
            }
            "error" => {
                let n: Notice = serde_json::from_value(data)?;
                ServerEvent::Error { message: n.mensaje }
            }
            _ => return Ok(None),
        };
        Ok(Some(event))
    }

    pub fn kind(&self) -> EventKind {
        match self {
            ServerEvent::Welcome { .. } => EventKind::Welcome,
            ServerEvent::RoomJoined { .. } => EventKind::RoomJoined,
            ServerEvent::RoomLeft { .. } => EventKind::RoomLeft,
            ServerEvent::MessageReceived(_) => EventKind::MessageReceived,
            ServerEvent::History(_) => EventKind::History,
            ServerEvent::HistoryCleared { .. } => EventKind::HistoryCleared,
            ServerEvent::Error { .. } => EventKind::ServerError,
        }
    }
}

/// Events sent to the server with [`ConnectionManager::emit`](crate::ConnectionManager::emit).
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    JoinRoom { room: String },
    LeaveRoom { room: String },
    SendMessage {
        message: String,
        document_id: Option<i64>,
    },
    RequestHistory { limit: u32 },
    ClearHistory,
}

impl ClientEvent {
    /// Wire event name and optional payload argument.
    pub fn to_wire(&self) -> (&'static str, Option<serde_json::Value>) {
        match self {
            ClientEvent::JoinRoom { room } => ("unirse_sala", Some(serde_json::json!(room))),
            ClientEvent::LeaveRoom { room } => ("salir_sala", Some(serde_json::json!(room))),
            ClientEvent::SendMessage {
                message,
                document_id,
            } => (
                "enviar_mensaje",
                Some(serde_json::json!({
                    "mensaje": message,
                    "documento_id": document_id,
                })),
            ),
            ClientEvent::RequestHistory { limit } => (
                "solicitar_historial",
                Some(serde_json::json!({ "limite": limit })),
            ),
            ClientEvent::ClearHistory => ("limpiar_historial", None),
        }
    }
}

/// Everything a channel reports to its listeners.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    /// The namespace handshake completed (initially or after a reconnect).
    Connected,
    /// The connection went away. `reason` uses the Socket.IO vocabulary:
    /// `transport close`, `transport error`, `ping timeout`,
    /// `io server disconnect`, `io client disconnect`.
    Disconnected { reason: String },
    /// The first connection attempt after `connect()` failed.
    ConnectError { message: String },
    /// A reconnect attempt succeeded; `attempt` is its 1-based number.
    Reconnected { attempt: u32 },
    /// A reconnect attempt failed.
    ReconnectError { attempt: u32, message: String },
    /// Every reconnect attempt failed; the channel is now `Failed`.
    ReconnectFailed { attempts: u32 },
    /// An application event pushed by the server.
    Server(ServerEvent),
}

impl ChannelEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            ChannelEvent::Connected => EventKind::Connected,
            ChannelEvent::Disconnected { .. } => EventKind::Disconnected,
            ChannelEvent::ConnectError { .. } => EventKind::ConnectError,
            ChannelEvent::Reconnected { .. } => EventKind::Reconnected,
            ChannelEvent::ReconnectError { .. } => EventKind::ReconnectError,
            ChannelEvent::ReconnectFailed { .. } => EventKind::ReconnectFailed,
            ChannelEvent::Server(event) => event.kind(),
        }
    }
}

/// Closed set of event kinds listeners can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Connected,
    Disconnected,
    ConnectError,
    Reconnected,
    ReconnectError,
    ReconnectFailed,
    Welcome,
    RoomJoined,
    RoomLeft,
    MessageReceived,
    History,
    HistoryCleared,
    ServerError,
}

impl EventKind {
    pub const ALL: [EventKind; 13] = [
        EventKind::Connected,
        EventKind::Disconnected,
        EventKind::ConnectError,
        EventKind::Reconnected,
        EventKind::ReconnectError,
        EventKind::ReconnectFailed,
        EventKind::Welcome,
        EventKind::RoomJoined,
        EventKind::RoomLeft,
        EventKind::MessageReceived,
        EventKind::History,
        EventKind::HistoryCleared,
        EventKind::ServerError,
    ];
}
