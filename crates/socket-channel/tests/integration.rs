use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use socket_channel::protocol::{Packet, decode_packet, encode_event, split_payload};
use socket_channel::{
    ChannelConfig, ChannelEvent, ChannelState, ClientEvent, ConnectionManager, EventKind,
    ReconnectPolicy, ServerEvent, Transport,
};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Mutex, mpsc};
use tokio_tungstenite::tungstenite;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

type WsStream = tokio_tungstenite::WebSocketStream<tokio::net::TcpStream>;

struct HandshakeOptions {
    ping_interval_ms: u64,
    ping_timeout_ms: u64,
}

impl Default for HandshakeOptions {
    fn default() -> Self {
        Self {
            ping_interval_ms: 25_000,
            ping_timeout_ms: 20_000,
        }
    }
}

struct MockSocketServer {
    listener: TcpListener,
    port: u16,
}

impl MockSocketServer {
    async fn start() -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let port = listener.local_addr()?.port();
        Ok(Self { listener, port })
    }

    /// Accept one connection and run the Engine.IO OPEN + Socket.IO CONNECT
    /// handshake.
    async fn accept_and_handshake(
        &self,
        sid: &str,
    ) -> Result<WsStream, Box<dyn std::error::Error>> {
        self.accept_and_handshake_with_opts(sid, HandshakeOptions::default())
            .await
    }

    async fn accept_and_handshake_with_opts(
        &self,
        sid: &str,
        opts: HandshakeOptions,
    ) -> Result<WsStream, Box<dyn std::error::Error>> {
        let mut ws = self.accept_raw().await?;
        send_open(&mut ws, sid, &opts).await?;

        let connect = read_packet(&mut ws).await?;
        assert_eq!(connect, Packet::Connect { sid: None });

        send_text(&mut ws, format!(r#"40{{"sid":"{sid}-ns"}}"#)).await?;
        Ok(ws)
    }

    /// Accept one TCP connection and return the raw WebSocket (no handshake).
    async fn accept_raw(&self) -> Result<WsStream, Box<dyn std::error::Error>> {
        let (tcp, _) = self.listener.accept().await?;
        let ws = tokio_tungstenite::accept_async(tcp).await?;
        Ok(ws)
    }
}

fn open_packet(sid: &str, opts: &HandshakeOptions) -> String {
    let open = serde_json::json!({
        "sid": sid,
        "upgrades": [],
        "pingInterval": opts.ping_interval_ms,
        "pingTimeout": opts.ping_timeout_ms,
        "maxPayload": 1_000_000,
    });
    format!("0{open}")
}

async fn send_open(
    ws: &mut WsStream,
    sid: &str,
    opts: &HandshakeOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    send_text(ws, open_packet(sid, opts)).await
}

async fn send_text(ws: &mut WsStream, text: String) -> Result<(), Box<dyn std::error::Error>> {
    ws.send(tungstenite::Message::Text(text.into())).await?;
    Ok(())
}

async fn send_event(
    ws: &mut WsStream,
    name: &str,
    data: serde_json::Value,
) -> Result<(), Box<dyn std::error::Error>> {
    send_text(ws, encode_event(name, Some(&data))?).await
}

async fn read_packet(ws: &mut WsStream) -> Result<Packet, Box<dyn std::error::Error>> {
    loop {
        let frame = ws.next().await.ok_or("WebSocket closed unexpectedly")??;
        if let tungstenite::Message::Text(text) = frame {
            return Ok(decode_packet(text.as_str())?);
        }
    }
}

/// Collect every packet until the client closes the stream.
async fn drain_packets(mut ws: WsStream) -> Vec<Packet> {
    let mut packets = Vec::new();
    while let Some(Ok(frame)) = ws.next().await {
        if let tungstenite::Message::Text(text) = frame
            && let Ok(packet) = decode_packet(text.as_str())
        {
            packets.push(packet);
        }
    }
    packets
}

fn test_config(port: u16, max_attempts: u32, delay_ms: u64) -> ChannelConfig {
    let mut config = ChannelConfig::new(format!("http://127.0.0.1:{port}"));
    config.reconnect = ReconnectPolicy {
        max_attempts,
        delay: Duration::from_millis(delay_ms),
    };
    config.connect_timeout = Duration::from_secs(2);
    // The websocket mock cannot answer polling requests.
    config.transports = vec![Transport::WebSocket];
    config
}

/// A port with nothing listening on it.
async fn refused_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

fn record_events(manager: &ConnectionManager) -> mpsc::UnboundedReceiver<ChannelEvent> {
    let (tx, rx) = mpsc::unbounded_channel();
    for kind in EventKind::ALL {
        let tx = tx.clone();
        manager.on(kind, move |event| {
            let _ = tx.send(event.clone());
        });
    }
    rx
}

async fn next_event(rx: &mut mpsc::UnboundedReceiver<ChannelEvent>) -> ChannelEvent {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for channel event")
        .expect("listener channel closed")
}

// ---------------------------------------------------------------------------
// Long-polling mock
// ---------------------------------------------------------------------------

/// HTTP server speaking Engine.IO long-polling, one request per connection.
/// Websocket upgrades are refused, the handshake is answered automatically,
/// and every other GET is held until the test pushes a payload.
struct MockPollingServer {
    port: u16,
    state: Arc<PollingState>,
    /// Packets the client POSTed, in order.
    received: mpsc::UnboundedReceiver<Packet>,
}

struct PollingState {
    sid: String,
    outbox_tx: mpsc::UnboundedSender<String>,
    outbox_rx: Mutex<mpsc::UnboundedReceiver<String>>,
    received_tx: mpsc::UnboundedSender<Packet>,
    websocket_attempts: AtomicUsize,
}

impl MockPollingServer {
    async fn start(sid: &str) -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let port = listener.local_addr()?.port();
        let (outbox_tx, outbox_rx) = mpsc::unbounded_channel();
        let (received_tx, received) = mpsc::unbounded_channel();
        let state = Arc::new(PollingState {
            sid: sid.to_string(),
            outbox_tx,
            outbox_rx: Mutex::new(outbox_rx),
            received_tx,
            websocket_attempts: AtomicUsize::new(0),
        });

        let accept_state = Arc::clone(&state);
        tokio::spawn(async move {
            while let Ok((tcp, _)) = listener.accept().await {
                let state = Arc::clone(&accept_state);
                tokio::spawn(async move {
                    let _ = serve_polling_request(tcp, &state).await;
                });
            }
        });
        Ok(Self {
            port,
            state,
            received,
        })
    }

    /// Answer the next pending GET with `packet`.
    fn push(&self, packet: String) {
        let _ = self.state.outbox_tx.send(packet);
    }

    fn websocket_attempts(&self) -> usize {
        self.state.websocket_attempts.load(Ordering::SeqCst)
    }

    async fn next_received(&mut self) -> Packet {
        tokio::time::timeout(Duration::from_secs(5), self.received.recv())
            .await
            .expect("timed out waiting for a polled packet")
            .expect("polling server stopped")
    }
}

async fn serve_polling_request(
    tcp: TcpStream,
    state: &PollingState,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut reader = BufReader::new(tcp);
    let mut request_line = String::new();
    reader.read_line(&mut request_line).await?;

    let mut content_length = 0;
    loop {
        let mut line = String::new();
        reader.read_line(&mut line).await?;
        let line = line.trim_end();
        if line.is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':')
            && name.eq_ignore_ascii_case("content-length")
        {
            content_length = value.trim().parse()?;
        }
    }
    let mut body = vec![0; content_length];
    reader.read_exact(&mut body).await?;
    let body = String::from_utf8(body)?;

    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or_default();
    let target = parts.next().unwrap_or_default();

    let (status, payload) = if target.contains("transport=websocket") {
        state.websocket_attempts.fetch_add(1, Ordering::SeqCst);
        ("400 Bad Request", String::new())
    } else if method == "POST" {
        for packet in split_payload(&body) {
            if packet == "40" {
                let _ = state
                    .outbox_tx
                    .send(format!(r#"40{{"sid":"{}-ns"}}"#, state.sid));
            }
            if let Ok(packet) = decode_packet(packet) {
                let _ = state.received_tx.send(packet);
            }
        }
        ("200 OK", "ok".to_string())
    } else if !target.contains("sid=") {
        ("200 OK", open_packet(&state.sid, &HandshakeOptions::default()))
    } else {
        assert!(target.contains(&format!("sid={}", state.sid)));
        let next = state.outbox_rx.lock().await.recv().await;
        ("200 OK", next.unwrap_or_else(|| "1".to_string()))
    };

    let response = format!(
        "HTTP/1.1 {status}\r\nContent-Type: text/plain; charset=UTF-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{payload}",
        payload.len()
    );
    let tcp = reader.get_mut();
    tcp.write_all(response.as_bytes()).await?;
    tcp.shutdown().await?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Test 1: connect and receive a server event
// ---------------------------------------------------------------------------

#[tokio::test]
async fn connect_and_receive_server_event() {
    let server = MockSocketServer::start().await.unwrap();
    let port = server.port;
    tokio::spawn(async move {
        let mut conn = server.accept_and_handshake("s1").await.unwrap();
        send_event(&mut conn, "conectado", serde_json::json!({"mensaje": "Conectado al chat"}))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;
    });

    let mut manager = ConnectionManager::new(test_config(port, 5, 50));
    let mut events = record_events(&manager);
    manager.connect().unwrap();
    assert_eq!(manager.state(), ChannelState::Connecting);

    assert_eq!(next_event(&mut events).await, ChannelEvent::Connected);
    assert_eq!(manager.state(), ChannelState::Connected);
    assert_eq!(
        next_event(&mut events).await,
        ChannelEvent::Server(ServerEvent::Welcome {
            message: "Conectado al chat".to_string()
        })
    );

    manager.disconnect();
    assert_eq!(manager.state(), ChannelState::Disconnected);
}

// ---------------------------------------------------------------------------
// Test 2: events arrive in transport order, unknown events are skipped
// ---------------------------------------------------------------------------

#[tokio::test]
async fn events_delivered_in_order() {
    let server = MockSocketServer::start().await.unwrap();
    let port = server.port;
    tokio::spawn(async move {
        let mut conn = server.accept_and_handshake("s1").await.unwrap();
        send_event(
            &mut conn,
            "unido_sala",
            serde_json::json!({"sala": "general", "mensaje": "Te has unido a la sala general"}),
        )
        .await
        .unwrap();
        send_event(&mut conn, "not_a_known_event", serde_json::json!(1))
            .await
            .unwrap();
        send_event(
            &mut conn,
            "mensaje_recibido",
            serde_json::json!({
                "id": 1,
                "contenido": "Hola",
                "es_usuario": false,
                "fecha_creacion": "2025-10-13T10:00:00",
                "documento_id": null,
            }),
        )
        .await
        .unwrap();
        send_event(
            &mut conn,
            "historial_limpiado",
            serde_json::json!({"mensaje": "Historial limpiado exitosamente"}),
        )
        .await
        .unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;
    });

    let mut manager = ConnectionManager::new(test_config(port, 5, 50));
    let mut events = record_events(&manager);
    manager.connect().unwrap();

    assert_eq!(next_event(&mut events).await, ChannelEvent::Connected);
    let kinds = [
        next_event(&mut events).await.kind(),
        next_event(&mut events).await.kind(),
        next_event(&mut events).await.kind(),
    ];
    assert_eq!(
        kinds,
        [
            EventKind::RoomJoined,
            EventKind::MessageReceived,
            EventKind::HistoryCleared
        ]
    );
}

// ---------------------------------------------------------------------------
// Test 3: emit while connected reaches the server
// ---------------------------------------------------------------------------

#[tokio::test]
async fn emit_reaches_server() {
    let server = MockSocketServer::start().await.unwrap();
    let port = server.port;
    let (got_tx, got_rx) = tokio::sync::oneshot::channel();
    tokio::spawn(async move {
        let mut conn = server.accept_and_handshake("s1").await.unwrap();
        let packet = read_packet(&mut conn).await.unwrap();
        let _ = got_tx.send(packet);
        tokio::time::sleep(Duration::from_secs(5)).await;
    });

    let mut manager = ConnectionManager::new(test_config(port, 5, 50));
    let mut events = record_events(&manager);
    manager.connect().unwrap();
    assert_eq!(next_event(&mut events).await, ChannelEvent::Connected);

    assert!(manager.emit(&ClientEvent::SendMessage {
        message: "¿Qué dice el documento?".to_string(),
        document_id: Some(4),
    }));

    let packet = tokio::time::timeout(Duration::from_secs(5), got_rx)
        .await
        .expect("timed out waiting for emitted event")
        .unwrap();
    assert_eq!(
        packet,
        Packet::Event {
            name: "enviar_mensaje".to_string(),
            data: serde_json::json!({"mensaje": "¿Qué dice el documento?", "documento_id": 4}),
        }
    );
}

// ---------------------------------------------------------------------------
// Test 4: connect() while connecting does not open a second connection
// ---------------------------------------------------------------------------

#[tokio::test]
async fn connect_twice_opens_one_connection() {
    let server = MockSocketServer::start().await.unwrap();
    let port = server.port;
    let (extra_tx, extra_rx) = tokio::sync::oneshot::channel();
    tokio::spawn(async move {
        let _conn = server.accept_and_handshake("s1").await.unwrap();
        let extra = tokio::time::timeout(Duration::from_millis(500), server.listener.accept())
            .await
            .is_ok();
        let _ = extra_tx.send(extra);
    });

    let mut manager = ConnectionManager::new(test_config(port, 5, 50));
    let mut events = record_events(&manager);
    manager.connect().unwrap();
    assert_eq!(manager.state(), ChannelState::Connecting);
    manager.connect().unwrap();

    assert_eq!(next_event(&mut events).await, ChannelEvent::Connected);
    manager.connect().unwrap();
    assert_eq!(manager.state(), ChannelState::Connected);

    let extra_connection = extra_rx.await.unwrap();
    assert!(!extra_connection, "a second connection was opened");
}

// ---------------------------------------------------------------------------
// Test 5: disconnect followed by emit transmits nothing
// ---------------------------------------------------------------------------

#[tokio::test]
async fn disconnect_then_emit_is_dropped() {
    let server = MockSocketServer::start().await.unwrap();
    let port = server.port;
    let (packets_tx, packets_rx) = tokio::sync::oneshot::channel();
    tokio::spawn(async move {
        let conn = server.accept_and_handshake("s1").await.unwrap();
        let _ = packets_tx.send(drain_packets(conn).await);
    });

    let mut manager = ConnectionManager::new(test_config(port, 5, 50));
    let mut events = record_events(&manager);
    manager.connect().unwrap();
    assert_eq!(next_event(&mut events).await, ChannelEvent::Connected);

    manager.disconnect();
    assert!(!manager.emit(&ClientEvent::JoinRoom {
        room: "general".to_string()
    }));
    assert_eq!(manager.state(), ChannelState::Disconnected);

    assert_eq!(
        next_event(&mut events).await,
        ChannelEvent::Disconnected {
            reason: "io client disconnect".to_string()
        }
    );

    let packets = tokio::time::timeout(Duration::from_secs(5), packets_rx)
        .await
        .expect("server never saw the connection close")
        .unwrap();
    assert_eq!(packets, vec![Packet::Disconnect]);
}

// ---------------------------------------------------------------------------
// Test 6: reconnect after the server drops the connection
// ---------------------------------------------------------------------------

#[tokio::test]
async fn reconnect_after_server_drop() {
    let server = MockSocketServer::start().await.unwrap();
    let port = server.port;
    tokio::spawn(async move {
        let conn = server.accept_and_handshake("s1").await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        drop(conn);

        let mut conn2 = server.accept_and_handshake("s2").await.unwrap();
        send_event(&mut conn2, "conectado", serde_json::json!({"mensaje": "again"}))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;
    });

    let mut manager = ConnectionManager::new(test_config(port, 5, 50));
    let mut events = record_events(&manager);
    manager.connect().unwrap();

    assert_eq!(next_event(&mut events).await, ChannelEvent::Connected);

    let event = next_event(&mut events).await;
    assert!(
        matches!(event, ChannelEvent::Disconnected { ref reason } if reason.starts_with("transport")),
        "expected transport Disconnected, got {event:?}"
    );

    assert_eq!(next_event(&mut events).await, ChannelEvent::Connected);
    assert_eq!(
        next_event(&mut events).await,
        ChannelEvent::Reconnected { attempt: 1 }
    );
    assert_eq!(manager.state(), ChannelState::Connected);
    assert_eq!(
        next_event(&mut events).await,
        ChannelEvent::Server(ServerEvent::Welcome {
            message: "again".to_string()
        })
    );
}

// ---------------------------------------------------------------------------
// Test 7: bounded reconnection ends in Failed
// ---------------------------------------------------------------------------

#[tokio::test]
async fn reconnect_exhausted_enters_failed() {
    let port = refused_port().await;
    let mut manager = ConnectionManager::new(test_config(port, 3, 20));
    let mut events = record_events(&manager);
    manager.connect().unwrap();

    assert!(matches!(
        next_event(&mut events).await,
        ChannelEvent::ConnectError { .. }
    ));
    for expected in 1..=3 {
        match next_event(&mut events).await {
            ChannelEvent::ReconnectError { attempt, .. } => assert_eq!(attempt, expected),
            other => panic!("expected ReconnectError, got {other:?}"),
        }
    }
    assert_eq!(
        next_event(&mut events).await,
        ChannelEvent::ReconnectFailed { attempts: 3 }
    );
    assert_eq!(manager.state(), ChannelState::Failed);

    // No further automatic attempts.
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(events.try_recv().is_err());
    assert_eq!(manager.state(), ChannelState::Failed);

    // A manual connect() starts over.
    manager.connect().unwrap();
    assert_eq!(manager.state(), ChannelState::Connecting);
    assert!(matches!(
        next_event(&mut events).await,
        ChannelEvent::ConnectError { .. }
    ));
    manager.disconnect();
}

// ---------------------------------------------------------------------------
// Test 8: disconnect cancels a pending reconnect
// ---------------------------------------------------------------------------

#[tokio::test]
async fn disconnect_cancels_pending_reconnect() {
    let port = refused_port().await;
    let mut manager = ConnectionManager::new(test_config(port, 5, 300));
    let mut events = record_events(&manager);
    manager.connect().unwrap();

    assert!(matches!(
        next_event(&mut events).await,
        ChannelEvent::ConnectError { .. }
    ));
    manager.disconnect();

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(events.try_recv().is_err());
    assert_eq!(manager.state(), ChannelState::Disconnected);
}

// ---------------------------------------------------------------------------
// Test 9: server-initiated disconnect does not reconnect
// ---------------------------------------------------------------------------

#[tokio::test]
async fn server_disconnect_does_not_reconnect() {
    let server = MockSocketServer::start().await.unwrap();
    let port = server.port;
    let (extra_tx, extra_rx) = tokio::sync::oneshot::channel();
    tokio::spawn(async move {
        let mut conn = server.accept_and_handshake("s1").await.unwrap();
        send_text(&mut conn, "41".to_string()).await.unwrap();
        let extra = tokio::time::timeout(Duration::from_millis(300), server.listener.accept())
            .await
            .is_ok();
        let _ = extra_tx.send(extra);
    });

    let mut manager = ConnectionManager::new(test_config(port, 5, 20));
    let mut events = record_events(&manager);
    manager.connect().unwrap();

    assert_eq!(next_event(&mut events).await, ChannelEvent::Connected);
    assert_eq!(
        next_event(&mut events).await,
        ChannelEvent::Disconnected {
            reason: "io server disconnect".to_string()
        }
    );
    assert_eq!(manager.state(), ChannelState::Disconnected);
    assert!(!extra_rx.await.unwrap(), "client reconnected after server disconnect");
}

// ---------------------------------------------------------------------------
// Test 10: pings are answered with pongs
// ---------------------------------------------------------------------------

#[tokio::test]
async fn ping_answered_with_pong() {
    let server = MockSocketServer::start().await.unwrap();
    let port = server.port;
    let (got_tx, got_rx) = tokio::sync::oneshot::channel();
    tokio::spawn(async move {
        let mut conn = server.accept_and_handshake("s1").await.unwrap();
        send_text(&mut conn, "2".to_string()).await.unwrap();
        let _ = got_tx.send(read_packet(&mut conn).await.unwrap());
        tokio::time::sleep(Duration::from_secs(5)).await;
    });

    let mut manager = ConnectionManager::new(test_config(port, 5, 50));
    manager.connect().unwrap();

    let packet = tokio::time::timeout(Duration::from_secs(5), got_rx)
        .await
        .expect("timed out waiting for pong")
        .unwrap();
    assert_eq!(packet, Packet::Pong);
}

// ---------------------------------------------------------------------------
// Test 11: heartbeat timeout triggers reconnect
// ---------------------------------------------------------------------------

#[tokio::test]
async fn heartbeat_timeout_triggers_reconnect() {
    let server = MockSocketServer::start().await.unwrap();
    let port = server.port;
    tokio::spawn(async move {
        // Silent server: no pings within pingInterval + pingTimeout.
        let _conn = server
            .accept_and_handshake_with_opts(
                "s1",
                HandshakeOptions {
                    ping_interval_ms: 100,
                    ping_timeout_ms: 100,
                },
            )
            .await
            .unwrap();
        let _conn2 = server.accept_and_handshake("s2").await.unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;
    });

    let mut manager = ConnectionManager::new(test_config(port, 5, 50));
    let mut events = record_events(&manager);
    manager.connect().unwrap();

    assert_eq!(next_event(&mut events).await, ChannelEvent::Connected);
    assert_eq!(
        next_event(&mut events).await,
        ChannelEvent::Disconnected {
            reason: "ping timeout".to_string()
        }
    );
    assert_eq!(next_event(&mut events).await, ChannelEvent::Connected);
    assert_eq!(
        next_event(&mut events).await,
        ChannelEvent::Reconnected { attempt: 1 }
    );
}

// ---------------------------------------------------------------------------
// Test 12: handshake rejection is a connect error
// ---------------------------------------------------------------------------

#[tokio::test]
async fn rejected_handshake_reports_connect_error() {
    let server = MockSocketServer::start().await.unwrap();
    let port = server.port;
    tokio::spawn(async move {
        let mut conn = server.accept_raw().await.unwrap();
        send_open(&mut conn, "s1", &HandshakeOptions::default())
            .await
            .unwrap();
        let _ = read_packet(&mut conn).await.unwrap();
        send_text(&mut conn, r#"44{"message":"Not authorized"}"#.to_string())
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;
    });

    let mut manager = ConnectionManager::new(test_config(port, 0, 20));
    let mut events = record_events(&manager);
    manager.connect().unwrap();

    match next_event(&mut events).await {
        ChannelEvent::ConnectError { message } => assert!(
            message.contains("Not authorized"),
            "unexpected message: {message}"
        ),
        other => panic!("expected ConnectError, got {other:?}"),
    }
    assert_eq!(
        next_event(&mut events).await,
        ChannelEvent::ReconnectFailed { attempts: 0 }
    );
    assert_eq!(manager.state(), ChannelState::Failed);
}

// ---------------------------------------------------------------------------
// Test 13: off() stops delivery to that handler only
// ---------------------------------------------------------------------------

#[tokio::test]
async fn off_stops_delivery() {
    let server = MockSocketServer::start().await.unwrap();
    let port = server.port;
    tokio::spawn(async move {
        let mut conn = server.accept_and_handshake("s1").await.unwrap();
        send_event(&mut conn, "error", serde_json::json!({"mensaje": "vacío"}))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;
    });

    let mut manager = ConnectionManager::new(test_config(port, 5, 50));
    let (removed_tx, mut removed_rx) = mpsc::unbounded_channel::<ChannelEvent>();
    let removed = manager.on(EventKind::ServerError, move |event| {
        let _ = removed_tx.send(event.clone());
    });
    let mut events = record_events(&manager);
    assert!(manager.off(EventKind::ServerError, removed));

    manager.connect().unwrap();
    assert_eq!(next_event(&mut events).await, ChannelEvent::Connected);
    assert_eq!(
        next_event(&mut events).await,
        ChannelEvent::Server(ServerEvent::Error {
            message: "vacío".to_string()
        })
    );
    assert!(removed_rx.try_recv().is_err());
}

// ---------------------------------------------------------------------------
// Test 14: the attempt counter restarts after a successful reconnect
// ---------------------------------------------------------------------------

#[tokio::test]
async fn reconnect_attempt_counter_resets_after_success() {
    let server = MockSocketServer::start().await.unwrap();
    let port = server.port;
    tokio::spawn(async move {
        let conn = server.accept_and_handshake("s1").await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        drop(conn);

        // First reconnect attempt: TCP accepted, websocket upgrade never answered.
        let (tcp, _) = server.listener.accept().await.unwrap();
        drop(tcp);

        let conn2 = server.accept_and_handshake("s2").await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        drop(conn2);

        let _conn3 = server.accept_and_handshake("s3").await.unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;
    });

    let mut manager = ConnectionManager::new(test_config(port, 3, 50));
    let mut events = record_events(&manager);
    manager.connect().unwrap();

    assert_eq!(next_event(&mut events).await, ChannelEvent::Connected);
    let event = next_event(&mut events).await;
    assert!(
        matches!(event, ChannelEvent::Disconnected { ref reason } if reason.starts_with("transport")),
        "expected transport Disconnected, got {event:?}"
    );
    match next_event(&mut events).await {
        ChannelEvent::ReconnectError { attempt, .. } => assert_eq!(attempt, 1),
        other => panic!("expected ReconnectError, got {other:?}"),
    }
    assert_eq!(next_event(&mut events).await, ChannelEvent::Connected);
    assert_eq!(
        next_event(&mut events).await,
        ChannelEvent::Reconnected { attempt: 2 }
    );

    let event = next_event(&mut events).await;
    assert!(
        matches!(event, ChannelEvent::Disconnected { ref reason } if reason.starts_with("transport")),
        "expected transport Disconnected, got {event:?}"
    );
    assert_eq!(next_event(&mut events).await, ChannelEvent::Connected);
    assert_eq!(
        next_event(&mut events).await,
        ChannelEvent::Reconnected { attempt: 1 }
    );
    assert_eq!(manager.state(), ChannelState::Connected);
}

// ---------------------------------------------------------------------------
// Test 15: disconnect + immediate connect keeps the channels' events apart
// ---------------------------------------------------------------------------

#[tokio::test]
async fn reconnect_right_after_disconnect_sees_only_new_channel() {
    let server = MockSocketServer::start().await.unwrap();
    let port = server.port;
    let (first_tx, first_rx) = tokio::sync::oneshot::channel();
    tokio::spawn(async move {
        let conn = server.accept_and_handshake("s1").await.unwrap();
        tokio::spawn(async move {
            let _ = first_tx.send(drain_packets(conn).await);
        });

        let mut conn2 = server.accept_and_handshake("s2").await.unwrap();
        send_event(&mut conn2, "conectado", serde_json::json!({"mensaje": "second"}))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;
    });

    let mut manager = ConnectionManager::new(test_config(port, 5, 50));
    let mut events = record_events(&manager);
    manager.connect().unwrap();
    assert_eq!(next_event(&mut events).await, ChannelEvent::Connected);

    manager.disconnect();
    // Reported synchronously, before the old transport has closed.
    assert_eq!(
        events.try_recv().unwrap(),
        ChannelEvent::Disconnected {
            reason: "io client disconnect".to_string()
        }
    );
    manager.connect().unwrap();

    assert_eq!(next_event(&mut events).await, ChannelEvent::Connected);
    assert_eq!(
        next_event(&mut events).await,
        ChannelEvent::Server(ServerEvent::Welcome {
            message: "second".to_string()
        })
    );

    let first_packets = tokio::time::timeout(Duration::from_secs(5), first_rx)
        .await
        .expect("first connection never closed")
        .unwrap();
    assert_eq!(first_packets, vec![Packet::Disconnect]);

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(events.try_recv().is_err());
    assert_eq!(manager.state(), ChannelState::Connected);
}

// ---------------------------------------------------------------------------
// Test 16: long-polling fallback when the websocket is refused
// ---------------------------------------------------------------------------

#[tokio::test]
async fn falls_back_to_polling_when_websocket_refused() {
    let mut server = MockPollingServer::start("p1").await.unwrap();
    let mut config = test_config(server.port, 0, 50);
    config.transports = vec![Transport::WebSocket, Transport::Polling];

    let mut manager = ConnectionManager::new(config);
    let mut events = record_events(&manager);
    manager.connect().unwrap();

    assert_eq!(next_event(&mut events).await, ChannelEvent::Connected);
    assert_eq!(server.websocket_attempts(), 1);
    assert_eq!(server.next_received().await, Packet::Connect { sid: None });

    let welcome = serde_json::json!({"mensaje": "polling"});
    server.push(encode_event("conectado", Some(&welcome)).unwrap());
    assert_eq!(
        next_event(&mut events).await,
        ChannelEvent::Server(ServerEvent::Welcome {
            message: "polling".to_string()
        })
    );

    assert!(manager.emit(&ClientEvent::JoinRoom {
        room: "general".to_string()
    }));
    assert_eq!(
        server.next_received().await,
        Packet::Event {
            name: "unirse_sala".to_string(),
            data: serde_json::json!("general"),
        }
    );

    manager.disconnect();
    assert_eq!(server.next_received().await, Packet::Disconnect);
    assert_eq!(server.next_received().await, Packet::Close);
}

// ---------------------------------------------------------------------------
// Test 17: polling sessions answer pings and honour server disconnects
// ---------------------------------------------------------------------------

#[tokio::test]
async fn polling_session_heartbeat_and_server_disconnect() {
    let mut server = MockPollingServer::start("p2").await.unwrap();
    let mut config = test_config(server.port, 5, 20);
    config.transports = vec![Transport::Polling];

    let mut manager = ConnectionManager::new(config);
    let mut events = record_events(&manager);
    manager.connect().unwrap();

    assert_eq!(next_event(&mut events).await, ChannelEvent::Connected);
    assert_eq!(server.websocket_attempts(), 0);
    assert_eq!(server.next_received().await, Packet::Connect { sid: None });

    // Two packets batched into one response.
    server.push("2\u{1e}2".to_string());
    assert_eq!(server.next_received().await, Packet::Pong);
    assert_eq!(server.next_received().await, Packet::Pong);

    server.push("41".to_string());
    assert_eq!(
        next_event(&mut events).await,
        ChannelEvent::Disconnected {
            reason: "io server disconnect".to_string()
        }
    );
    assert_eq!(manager.state(), ChannelState::Disconnected);
}
