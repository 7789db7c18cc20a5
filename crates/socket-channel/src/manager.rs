//! Public entry point: [`ConnectionManager`].

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};

use crate::Error;
use crate::connection::{Driver, run_channel};
use crate::events::{ChannelEvent, ClientEvent, EventKind, reason};
use crate::listeners::{ListenerId, Listeners};
use crate::protocol::encode_event;
use crate::transport::Endpoint;
use crate::types::{ChannelConfig, ChannelState};

/// The live half of a channel: the driver task listens on the other ends.
struct ChannelHandle {
    outbound: mpsc::UnboundedSender<String>,
    close_tx: Option<oneshot::Sender<()>>,
    state: watch::Receiver<ChannelState>,
}

impl ChannelHandle {
    fn state(&self) -> ChannelState {
        *self.state.borrow()
    }

    fn close(&mut self) {
        if let Some(tx) = self.close_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for ChannelHandle {
    fn drop(&mut self) {
        self.close();
    }
}

/// Owns at most one realtime channel and the listeners attached to it.
///
/// Transport failures never surface as `Err`: they are reported to listeners
/// as [`ChannelEvent`]s. Listeners survive `disconnect()`/`connect()` cycles.
pub struct ConnectionManager {
    config: ChannelConfig,
    listeners: Arc<Listeners>,
    channel: Option<ChannelHandle>,
}

impl ConnectionManager {
    pub fn new(config: ChannelConfig) -> Self {
        Self {
            config,
            listeners: Arc::new(Listeners::default()),
            channel: None,
        }
    }

    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    pub fn state(&self) -> ChannelState {
        self.channel
            .as_ref()
            .map_or(ChannelState::Disconnected, ChannelHandle::state)
    }

    /// Watch state transitions of the current channel, if one exists.
    pub fn state_changes(&self) -> Option<watch::Receiver<ChannelState>> {
        self.channel.as_ref().map(|c| c.state.clone())
    }

    /// Start the channel unless one is already connecting, connected, or
    /// reconnecting, in which case this is a no-op.
    ///
    /// Must be called from within a Tokio runtime. Only configuration problems
    /// (bad URL, no runtime) are returned; connection failures are reported as
    /// [`ChannelEvent::ConnectError`].
    pub fn connect(&mut self) -> Result<(), Error> {
        let state = self.state();
        if state.is_active() {
            tracing::debug!(?state, "Channel already active, ignoring connect");
            return Ok(());
        }

        let runtime = tokio::runtime::Handle::try_current().map_err(|_| Error::NoRuntime)?;
        let endpoint = Endpoint::new(&self.config.url, &self.config.path, &self.config.transports)?;

        let (state_tx, state_rx) = watch::channel(ChannelState::Connecting);
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel::<String>();
        let (close_tx, close_rx) = oneshot::channel::<()>();

        tracing::info!(url = endpoint.primary(), "Connecting");
        runtime.spawn(run_channel(
            Driver {
                endpoint,
                generation: self.listeners.advance(),
                policy: self.config.reconnect.clone(),
                connect_timeout: self.config.connect_timeout,
                state: state_tx,
                listeners: Arc::clone(&self.listeners),
                outbound: outbound_rx,
            },
            close_rx,
        ));

        // Replaces a Failed or server-disconnected handle, whose driver has exited.
        self.channel = Some(ChannelHandle {
            outbound: outbound_tx,
            close_tx: Some(close_tx),
            state: state_rx,
        });
        Ok(())
    }

    /// Tear down the channel, cancelling any pending reconnect. No-op when no
    /// channel exists.
    ///
    /// A connected channel reports [`ChannelEvent::Disconnected`] before this
    /// returns. The old driver finishes closing its transport in the
    /// background but delivers no further events, so a `connect()` right
    /// after never sees them interleaved with the new channel's.
    pub fn disconnect(&mut self) {
        if let Some(mut channel) = self.channel.take() {
            let state = channel.state();
            tracing::info!(?state, "Disconnecting");
            self.listeners.advance();
            channel.close();
            if state.is_connected() {
                self.listeners.dispatch(&ChannelEvent::Disconnected {
                    reason: reason::CLIENT_DISCONNECT.to_string(),
                });
            }
        }
    }

    /// Send an event if the channel is connected; otherwise drop it silently.
    ///
    /// Delivery is at-most-once. Returns `true` if the frame was handed to the
    /// transport.
    pub fn emit(&self, event: &ClientEvent) -> bool {
        let Some(channel) = self.channel.as_ref().filter(|c| c.state().is_connected()) else {
            tracing::debug!(?event, "Channel not connected, dropping emit");
            return false;
        };
        let (name, data) = event.to_wire();
        match encode_event(name, data.as_ref()) {
            Ok(frame) => channel.outbound.send(frame).is_ok(),
            Err(e) => {
                tracing::warn!(event = name, "Failed to encode event: {e}");
                false
            }
        }
    }

    /// Register `handler` for every event of `kind`. Handlers for the same kind
    /// run in subscription order, on the channel's driver task.
    pub fn on<F>(&self, kind: EventKind, handler: F) -> ListenerId
    where
        F: Fn(&ChannelEvent) + Send + Sync + 'static,
    {
        self.listeners.add(kind, Arc::new(handler))
    }

    /// Remove a handler registered with [`on`](Self::on). Returns whether it
    /// was registered.
    pub fn off(&self, kind: EventKind, id: ListenerId) -> bool {
        self.listeners.remove(kind, id)
    }
}
