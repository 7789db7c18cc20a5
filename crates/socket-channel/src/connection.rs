//! Channel driver: heartbeat, event dispatch, and reconnection.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::Instant;

use crate::Error;
use crate::events::{ChannelEvent, ServerEvent, reason};
use crate::listeners::Listeners;
use crate::protocol::{Packet, encode_pong};
use crate::transport::{Endpoint, Inbound, Link, open_link};
use crate::types::{ChannelState, ReconnectPolicy};

// ---------------------------------------------------------------------------
// Background driver
// ---------------------------------------------------------------------------

pub(crate) struct Driver {
    pub endpoint: Endpoint,
    /// Listener generation this driver dispatches for. Once the manager moves
    /// past it the driver's events are dropped.
    pub generation: u64,
    pub policy: ReconnectPolicy,
    pub connect_timeout: Duration,
    pub state: watch::Sender<ChannelState>,
    pub listeners: Arc<Listeners>,
    pub outbound: mpsc::UnboundedReceiver<String>,
}

enum SessionEnd {
    /// The manager asked for (or was dropped into) a disconnect.
    Closed,
    /// The server disconnected this socket on purpose; no automatic reconnect.
    ServerDisconnect,
    /// The connection was lost; reconnect.
    Lost(&'static str),
}

/// Drive one channel from the first connection attempt until it is closed,
/// disconnected by the server, or reconnection gives up.
pub(crate) async fn run_channel(mut d: Driver, mut close_rx: oneshot::Receiver<()>) {
    let first = tokio::select! {
        result = d.connect_once() => result,
        _ = &mut close_rx => {
            tracing::info!("Close requested while connecting");
            return;
        }
    };

    let mut link = match first {
        Ok(link) => {
            tracing::info!(sid = ?link.sid, transport = link.transport().as_str(), "Connected");
            d.state.send_replace(ChannelState::Connected);
            d.report(ChannelEvent::Connected);
            link
        }
        Err(e) => {
            tracing::error!("Connection error: {e}");
            d.report(ChannelEvent::ConnectError {
                message: e.to_string(),
            });
            match d.reconnect(&mut close_rx).await {
                Some(link) => link,
                None => return,
            }
        }
    };

    loop {
        match d.session(&mut link, &mut close_rx).await {
            SessionEnd::Closed => {
                // The manager reports the client disconnect itself.
                tracing::info!("Close requested");
                link.close().await;
                return;
            }
            SessionEnd::ServerDisconnect => {
                tracing::warn!("Disconnected by server");
                d.state.send_replace(ChannelState::Disconnected);
                d.report(ChannelEvent::Disconnected {
                    reason: reason::SERVER_DISCONNECT.to_string(),
                });
                return;
            }
            SessionEnd::Lost(reason) => {
                tracing::warn!(reason, "Disconnected");
                d.state.send_replace(ChannelState::Reconnecting);
                d.report(ChannelEvent::Disconnected {
                    reason: reason.to_string(),
                });
                match d.reconnect(&mut close_rx).await {
                    Some(new_link) => link = new_link,
                    None => return,
                }
            }
        }
    }
}

impl Driver {
    fn report(&self, event: ChannelEvent) {
        self.listeners.dispatch_from(self.generation, &event);
    }

    async fn connect_once(&self) -> Result<Link, Error> {
        tokio::time::timeout(self.connect_timeout, open_link(&self.endpoint))
            .await
            .map_err(|_| Error::Timeout(self.connect_timeout))?
    }

    async fn session(
        &mut self,
        link: &mut Link,
        close_rx: &mut oneshot::Receiver<()>,
    ) -> SessionEnd {
        let mut last_seen = Instant::now();
        loop {
            let idle_deadline = last_seen + link.idle_timeout;

            tokio::select! {
                inbound = link.recv() => {
                    last_seen = Instant::now();
                    match inbound {
                        Ok(Inbound::Packet(packet)) => {
                            if let Some(end) = self.handle_packet(link, packet).await {
                                return end;
                            }
                        }
                        Ok(Inbound::Malformed(e)) => {
                            tracing::warn!("Failed to decode packet: {e}");
                        }
                        Ok(Inbound::Closed) => return SessionEnd::Lost(reason::TRANSPORT_CLOSE),
                        Err(e) => {
                            tracing::warn!("Transport error: {e}");
                            return SessionEnd::Lost(reason::TRANSPORT_ERROR);
                        }
                    }
                }

                outbound = self.outbound.recv() => {
                    match outbound {
                        Some(frame) => {
                            if let Err(e) = link.send(frame).await {
                                tracing::warn!("Failed to send event: {e}");
                                return SessionEnd::Lost(reason::TRANSPORT_ERROR);
                            }
                        }
                        None => return SessionEnd::Closed,
                    }
                }

                _ = tokio::time::sleep_until(idle_deadline) => {
                    tracing::warn!("Heartbeat timeout");
                    return SessionEnd::Lost(reason::PING_TIMEOUT);
                }

                _ = &mut *close_rx => return SessionEnd::Closed,
            }
        }
    }

    async fn handle_packet(&self, link: &mut Link, packet: Packet) -> Option<SessionEnd> {
        match packet {
            Packet::Ping => {
                if let Err(e) = link.send(encode_pong()).await {
                    tracing::warn!("Failed to answer ping: {e}");
                    return Some(SessionEnd::Lost(reason::TRANSPORT_ERROR));
                }
                tracing::trace!("Ping answered");
            }
            Packet::Event { name, data } => match ServerEvent::from_wire(&name, data) {
                Ok(Some(event)) => self.report(ChannelEvent::Server(event)),
                Ok(None) => tracing::debug!(event = %name, "Ignoring unknown event"),
                Err(e) => tracing::warn!(event = %name, "Failed to decode event payload: {e}"),
            },
            Packet::Disconnect => return Some(SessionEnd::ServerDisconnect),
            Packet::Close => return Some(SessionEnd::Lost(reason::TRANSPORT_CLOSE)),
            Packet::ConnectError { message } => {
                tracing::warn!("Server reported connect error on live socket: {message}");
            }
            other => {
                tracing::debug!(packet = ?other, "Ignoring packet");
            }
        }
        None
    }

    /// Retry with a fixed delay until an attempt succeeds, the policy is
    /// exhausted, or close is requested. Returns the new link on success.
    async fn reconnect(&mut self, close_rx: &mut oneshot::Receiver<()>) -> Option<Link> {
        let max_attempts = self.policy.max_attempts;

        for attempt in 1..=max_attempts {
            self.state.send_replace(ChannelState::Reconnecting);

            tokio::select! {
                _ = tokio::time::sleep(self.policy.delay) => {}
                _ = &mut *close_rx => {
                    tracing::info!("Close requested during reconnect");
                    return None;
                }
            }

            let result = tokio::select! {
                result = self.connect_once() => result,
                _ = &mut *close_rx => {
                    tracing::info!("Close requested during reconnect");
                    return None;
                }
            };

            match result {
                Ok(link) => {
                    tracing::info!(
                        attempt,
                        sid = ?link.sid,
                        transport = link.transport().as_str(),
                        "Reconnected"
                    );
                    // Emits accepted while the link was down are not replayed.
                    while self.outbound.try_recv().is_ok() {}
                    self.state.send_replace(ChannelState::Connected);
                    self.report(ChannelEvent::Connected);
                    self.report(ChannelEvent::Reconnected { attempt });
                    return Some(link);
                }
                Err(e) => {
                    tracing::warn!(attempt, max_attempts, "Reconnect attempt failed: {e}");
                    self.report(ChannelEvent::ReconnectError {
                        attempt,
                        message: e.to_string(),
                    });
                }
            }
        }

        tracing::error!("Reconnection failed after {max_attempts} attempts");
        self.state.send_replace(ChannelState::Failed);
        self.report(ChannelEvent::ReconnectFailed {
            attempts: max_attempts,
        });
        None
    }
}
