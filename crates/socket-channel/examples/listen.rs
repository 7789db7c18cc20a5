//! Connect to a Socket.IO chat server, join a room and print every event.
//!
//! ```sh
//! cargo run -p socket-channel --example listen -- [URL] [ROOM]
//! ```
//!
//! `URL` defaults to `http://localhost:5000`, `ROOM` to `general`. Stops on
//! Ctrl-C or when reconnection gives up.

use socket_channel::{ChannelConfig, ChannelEvent, ClientEvent, ConnectionManager, EventKind};
use tokio::sync::mpsc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let mut args = std::env::args().skip(1);
    let url = args
        .next()
        .unwrap_or_else(|| "http://localhost:5000".to_string());
    let room = args.next().unwrap_or_else(|| "general".to_string());

    let mut manager = ConnectionManager::new(ChannelConfig::new(url.clone()));
    let (tx, mut rx) = mpsc::unbounded_channel();
    for kind in EventKind::ALL {
        let tx = tx.clone();
        manager.on(kind, move |event| {
            let _ = tx.send(event.clone());
        });
    }

    eprintln!("connecting to {url} ...");
    manager.connect()?;

    loop {
        tokio::select! {
            Some(event) = rx.recv() => {
                eprintln!("[{:?}] {event:?}", event.kind());
                match event {
                    ChannelEvent::Connected => {
                        manager.emit(&ClientEvent::JoinRoom { room: room.clone() });
                    }
                    ChannelEvent::ReconnectFailed { .. } => break,
                    _ => {}
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    manager.disconnect();
    Ok(())
}
