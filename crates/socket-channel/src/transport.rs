//! Engine.IO transports: a websocket, or HTTP long-polling when the websocket
//! cannot be opened.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use reqwest::header::CONTENT_TYPE;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite;

use crate::Error;
use crate::protocol::{
    ENGINE_IO_VERSION, OpenPayload, Packet, decode_packet, encode_close, encode_connect,
    encode_disconnect, encode_payload, encode_pong, protocol_error, split_payload,
};
use crate::types::Transport;

// ---------------------------------------------------------------------------
// Type aliases for WebSocket split halves
// ---------------------------------------------------------------------------

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

type WsRead = futures_util::stream::SplitStream<WsStream>;
type WsWrite = futures_util::stream::SplitSink<WsStream, tungstenite::Message>;

// ---------------------------------------------------------------------------
// URL construction
// ---------------------------------------------------------------------------

/// Map the configured server address onto the Engine.IO endpoint for one
/// transport.
pub(crate) fn build_url(base: &str, path: &str, transport: Transport) -> Result<String, Error> {
    let mut u = url::Url::parse(base)?;
    let secure = match u.scheme() {
        "http" | "ws" => false,
        "https" | "wss" => true,
        other => return Err(Error::UnsupportedScheme(other.to_string())),
    };
    let scheme = match (transport, secure) {
        (Transport::WebSocket, false) => "ws",
        (Transport::WebSocket, true) => "wss",
        (Transport::Polling, false) => "http",
        (Transport::Polling, true) => "https",
    };
    u.set_scheme(scheme)
        .map_err(|()| Error::UnsupportedScheme(scheme.to_string()))?;
    u.set_path(path);
    u.set_query(None);
    u.query_pairs_mut()
        .append_pair("EIO", ENGINE_IO_VERSION)
        .append_pair("transport", transport.as_str());
    Ok(u.to_string())
}

/// Resolved URLs for the configured transports, in preference order.
#[derive(Debug, Clone)]
pub(crate) struct Endpoint {
    urls: Vec<(Transport, String)>,
}

impl Endpoint {
    pub(crate) fn new(base: &str, path: &str, transports: &[Transport]) -> Result<Self, Error> {
        if transports.is_empty() {
            return Err(Error::NoTransport);
        }
        let urls = transports
            .iter()
            .map(|&t| build_url(base, path, t).map(|url| (t, url)))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { urls })
    }

    pub(crate) fn primary(&self) -> &str {
        self.urls.first().map_or("", |(_, url)| url.as_str())
    }
}

// ---------------------------------------------------------------------------
// Link
// ---------------------------------------------------------------------------

pub(crate) enum Inbound {
    Packet(Packet),
    /// A frame arrived but did not decode.
    Malformed(Error),
    Closed,
}

fn decode(text: &str) -> Inbound {
    match decode_packet(text) {
        Ok(packet) => Inbound::Packet(packet),
        Err(e) => Inbound::Malformed(e),
    }
}

/// An open transport with a completed namespace handshake.
pub(crate) struct Link {
    wire: Wire,
    pub sid: Option<String>,
    /// No inbound traffic for this long means the server is gone.
    pub idle_timeout: Duration,
}

enum Wire {
    WebSocket { write: WsWrite, read: WsRead },
    Polling(Polling),
}

/// A long-polling session. A reader task keeps one GET outstanding and queues
/// every packet it returns.
struct Polling {
    http: reqwest::Client,
    url: String,
    inbound: mpsc::UnboundedReceiver<Result<String, Error>>,
    reader: JoinHandle<()>,
}

impl Drop for Polling {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

impl Link {
    pub(crate) fn transport(&self) -> Transport {
        match self.wire {
            Wire::WebSocket { .. } => Transport::WebSocket,
            Wire::Polling(_) => Transport::Polling,
        }
    }

    pub(crate) async fn send(&mut self, text: String) -> Result<(), Error> {
        match &mut self.wire {
            Wire::WebSocket { write, .. } => {
                write.send(tungstenite::Message::Text(text.into())).await?;
                Ok(())
            }
            Wire::Polling(polling) => post_payload(&polling.http, &polling.url, text).await,
        }
    }

    /// Next inbound packet. Cancel-safe: a packet is only consumed when this
    /// resolves.
    pub(crate) async fn recv(&mut self) -> Result<Inbound, Error> {
        match &mut self.wire {
            Wire::WebSocket { read, .. } => loop {
                match read.next().await {
                    Some(Ok(tungstenite::Message::Text(text))) => {
                        return Ok(decode(text.as_str()));
                    }
                    Some(Ok(tungstenite::Message::Close(_))) | None => return Ok(Inbound::Closed),
                    // Binary attachments and websocket-level ping/pong
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return Err(e.into()),
                }
            },
            Wire::Polling(polling) => match polling.inbound.recv().await {
                Some(Ok(text)) => Ok(decode(&text)),
                Some(Err(e)) => Err(e),
                None => Ok(Inbound::Closed),
            },
        }
    }

    /// Leave the namespace and close the transport. Failures are ignored.
    pub(crate) async fn close(&mut self) {
        match &mut self.wire {
            Wire::WebSocket { write, .. } => {
                let _ = write
                    .send(tungstenite::Message::Text(encode_disconnect().into()))
                    .await;
                let _ = write.close().await;
            }
            Wire::Polling(polling) => {
                polling.reader.abort();
                let payload = encode_payload([encode_disconnect(), encode_close()]);
                let _ = post_payload(&polling.http, &polling.url, payload).await;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Connect + handshake
// ---------------------------------------------------------------------------

/// Try each configured transport in turn. A server rejection is final; any
/// other failure moves on to the next transport.
pub(crate) async fn open_link(endpoint: &Endpoint) -> Result<Link, Error> {
    let mut last_error = Error::NoTransport;
    for (transport, url) in &endpoint.urls {
        match connect_transport(*transport, url).await {
            Ok(link) => return Ok(link),
            Err(e @ Error::Rejected(_)) => return Err(e),
            Err(e) => {
                tracing::warn!(transport = transport.as_str(), "Transport unavailable: {e}");
                last_error = e;
            }
        }
    }
    Err(last_error)
}

async fn connect_transport(transport: Transport, url: &str) -> Result<Link, Error> {
    let mut link = match transport {
        Transport::WebSocket => open_websocket(url).await?,
        Transport::Polling => open_polling(url).await?,
    };
    link.sid = join_namespace(&mut link).await?;
    tracing::debug!(transport = transport.as_str(), sid = ?link.sid, "Handshake complete");
    Ok(link)
}

fn idle_timeout(open: &OpenPayload) -> Duration {
    Duration::from_millis(open.ping_interval.saturating_add(open.ping_timeout))
}

async fn open_websocket(url: &str) -> Result<Link, Error> {
    let (ws, _resp) = tokio_tungstenite::connect_async(url).await?;
    let (write, read) = ws.split();
    let mut link = Link {
        wire: Wire::WebSocket { write, read },
        sid: None,
        idle_timeout: Duration::ZERO,
    };

    let open = loop {
        match link.recv().await? {
            Inbound::Packet(Packet::Open(open)) => break open,
            Inbound::Packet(other) => {
                tracing::debug!(packet = ?other, "Ignoring pre-OPEN packet");
            }
            Inbound::Malformed(e) => return Err(e),
            Inbound::Closed => {
                return Err(protocol_error("Connection closed before OPEN received"));
            }
        }
    };
    link.idle_timeout = idle_timeout(&open);
    Ok(link)
}

async fn open_polling(url: &str) -> Result<Link, Error> {
    let http = reqwest::Client::builder().build()?;
    let payload = poll(&http, url, None).await?;
    let mut packets = split_payload(&payload);
    let open = match packets.next().map(decode_packet).transpose()? {
        Some(Packet::Open(open)) => open,
        _ => return Err(protocol_error("Polling handshake did not start with OPEN")),
    };
    let idle_timeout = idle_timeout(&open);

    let mut session = url::Url::parse(url)?;
    session.query_pairs_mut().append_pair("sid", &open.sid);
    let url = session.to_string();

    let (tx, rx) = mpsc::unbounded_channel();
    for packet in packets {
        let _ = tx.send(Ok(packet.to_string()));
    }
    let reader = tokio::spawn(poll_loop(http.clone(), url.clone(), idle_timeout, tx));
    tracing::debug!(sid = %open.sid, "Polling session opened");

    Ok(Link {
        wire: Wire::Polling(Polling {
            http,
            url,
            inbound: rx,
            reader,
        }),
        sid: None,
        idle_timeout,
    })
}

/// Send the namespace CONNECT and wait for the server's answer.
async fn join_namespace(link: &mut Link) -> Result<Option<String>, Error> {
    link.send(encode_connect()).await?;
    loop {
        match link.recv().await? {
            Inbound::Packet(Packet::Connect { sid }) => return Ok(sid),
            Inbound::Packet(Packet::ConnectError { message }) => {
                return Err(Error::Rejected(message));
            }
            Inbound::Packet(Packet::Ping) => link.send(encode_pong()).await?,
            Inbound::Packet(other) => {
                tracing::debug!(packet = ?other, "Ignoring pre-CONNECT packet");
            }
            Inbound::Malformed(e) => return Err(e),
            Inbound::Closed => {
                return Err(protocol_error("Connection closed before CONNECT received"));
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Long-polling requests
// ---------------------------------------------------------------------------

async fn poll(
    http: &reqwest::Client,
    url: &str,
    timeout: Option<Duration>,
) -> Result<String, Error> {
    let mut request = http.get(url);
    if let Some(timeout) = timeout {
        request = request.timeout(timeout);
    }
    let response = request.send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(Error::HttpStatus(status.as_u16()));
    }
    Ok(response.text().await?)
}

async fn post_payload(http: &reqwest::Client, url: &str, payload: String) -> Result<(), Error> {
    let response = http
        .post(url)
        .header(CONTENT_TYPE, "text/plain;charset=UTF-8")
        .body(payload)
        .send()
        .await?;
    let status = response.status();
    if !status.is_success() {
        return Err(Error::HttpStatus(status.as_u16()));
    }
    Ok(())
}

/// Keep one GET outstanding until the link is dropped or a request fails.
/// A failure is queued after any packets already received.
async fn poll_loop(
    http: reqwest::Client,
    url: String,
    timeout: Duration,
    tx: mpsc::UnboundedSender<Result<String, Error>>,
) {
    loop {
        match poll(&http, &url, Some(timeout)).await {
            Ok(payload) => {
                for packet in split_payload(&payload) {
                    if tx.send(Ok(packet.to_string())).is_err() {
                        return;
                    }
                }
            }
            Err(e) => {
                let _ = tx.send(Err(e));
                return;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
