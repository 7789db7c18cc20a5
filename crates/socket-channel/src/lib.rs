//! Realtime event channel over Socket.IO.
//!
//! A [`ConnectionManager`] owns a single channel speaking the Socket.IO v5
//! protocol (Engine.IO v4 framing) and drives it from one background task.
//! The channel runs over a websocket and falls back to HTTP long-polling when
//! the websocket cannot be opened.
//!
//! # Features
//! - Idempotent connect, unconditional disconnect
//! - Automatic reconnection with a fixed delay and a bounded attempt count
//! - Heartbeat-based liveness detection
//! - Typed inbound/outbound events dispatched to registered listeners
//! - Fire-and-forget emit: events are dropped while not connected
//!
//! # Example
//! ```no_run
//! # async fn example() -> Result<(), socket_channel::Error> {
//! use socket_channel::{ChannelConfig, ChannelEvent, ClientEvent, ConnectionManager, EventKind};
//!
//! let mut manager = ConnectionManager::new(ChannelConfig::new("http://localhost:5000"));
//! manager.on(EventKind::Disconnected, |event| {
//!     if let ChannelEvent::Disconnected { reason } = event {
//!         eprintln!("lost connection: {reason}");
//!     }
//! });
//! manager.connect()?;
//! manager.emit(&ClientEvent::JoinRoom { room: "general".to_string() });
//! manager.disconnect();
//! # Ok(())
//! # }
//! ```

mod connection;
mod events;
mod listeners;
mod manager;
pub mod protocol;
mod transport;
mod types;

pub use events::{ChannelEvent, ChatMessage, ClientEvent, EventKind, ServerEvent, reason};
pub use listeners::{Handler, ListenerId};
pub use manager::ConnectionManager;
pub use types::{ChannelConfig, ChannelState, Error, ReconnectPolicy, Transport};
