//! Public types for the socket-channel crate.

use std::time::Duration;

use tokio_tungstenite::tungstenite;

use crate::protocol::DEFAULT_PATH;

pub(crate) const DEFAULT_MAX_ATTEMPTS: u32 = 5;
pub(crate) const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_millis(1000);
pub(crate) const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(20);

/// Lifecycle state of the channel owned by a
/// [`ConnectionManager`](crate::ConnectionManager).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
    /// Automatic reconnection gave up. Only an explicit `connect()` retries.
    Failed,
}

impl ChannelState {
    /// True while the channel owns (or is establishing) a connection, i.e. when
    /// `connect()` must not start another one.
    pub fn is_active(self) -> bool {
        matches!(
            self,
            ChannelState::Connecting | ChannelState::Connected | ChannelState::Reconnecting
        )
    }

    pub fn is_connected(self) -> bool {
        self == ChannelState::Connected
    }
}

/// Automatic reconnection: a fixed delay between attempts, bounded count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Consecutive failed attempts before the channel enters
    /// [`ChannelState::Failed`]. Zero disables automatic reconnection.
    pub max_attempts: u32,
    /// Delay before every attempt.
    pub delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            delay: DEFAULT_RECONNECT_DELAY,
        }
    }
}

/// Engine.IO transport used to carry the channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    WebSocket,
    /// HTTP long-polling: one GET held open for server packets, a POST per
    /// client packet.
    Polling,
}

impl Transport {
    /// Value of the `transport` query parameter.
    pub fn as_str(self) -> &'static str {
        match self {
            Transport::WebSocket => "websocket",
            Transport::Polling => "polling",
        }
    }
}

/// Configuration for a [`ConnectionManager`](crate::ConnectionManager).
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Server address, e.g. `http://localhost:5000`. `http`/`https` are mapped
    /// to `ws`/`wss` for the websocket transport and back for polling.
    pub url: String,
    /// Socket.IO endpoint path. Defaults to `/socket.io/`.
    pub path: String,
    pub reconnect: ReconnectPolicy,
    /// Upper bound for opening a transport and completing the handshake,
    /// fallbacks included.
    pub connect_timeout: Duration,
    /// Transports tried in order on every connection attempt. The next one is
    /// used when a transport cannot be opened or its handshake fails; a
    /// rejection by the server ends the attempt.
    pub transports: Vec<Transport>,
}

impl ChannelConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            path: DEFAULT_PATH.to_string(),
            reconnect: ReconnectPolicy::default(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            transports: vec![Transport::WebSocket, Transport::Polling],
        }
    }
}

/// Errors returned by this crate.
///
/// Transport failures after `connect()` are never returned to the caller;
/// they surface as [`ChannelEvent`](crate::ChannelEvent)s instead.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("WebSocket error: {0}")]
    WebSocket(Box<tungstenite::Error>),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("polling request failed with status {0}")]
    HttpStatus(u16),

    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("unsupported URL scheme: {0}")]
    UnsupportedScheme(String),

    #[error("Socket.IO protocol error: {message}")]
    Protocol { message: String },

    #[error("connection rejected by server: {0}")]
    Rejected(String),

    #[error("connection timed out after {0:?}")]
    Timeout(Duration),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("no Tokio runtime available to drive the channel")]
    NoRuntime,

    #[error("no transport configured")]
    NoTransport,
}

impl From<tungstenite::Error> for Error {
    fn from(e: tungstenite::Error) -> Self {
        Error::WebSocket(Box::new(e))
    }
}
