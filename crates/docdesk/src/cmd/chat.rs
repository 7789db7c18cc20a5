use std::collections::HashSet;

use clap::Args;
use notify_queue::{
    ExecutionContext, Notification, NotificationId, NotificationKind, NotificationQueue,
    NotifyOptions,
};
use socket_channel::{
    ChannelEvent, ChatMessage, ClientEvent, ConnectionManager, EventKind, ServerEvent, reason,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::config::ServerArgs;
use crate::error::DeskResult;

const DEFAULT_HISTORY_LIMIT: u32 = 50;

#[derive(Args, Debug)]
pub struct ChatArgs {
    /// Room joined on every (re)connect
    #[arg(long, default_value = "general")]
    room: String,
    /// Document the questions refer to
    #[arg(long)]
    document_id: Option<i64>,
}

#[derive(Debug, PartialEq)]
enum Input {
    Send(String),
    History(u32),
    Clear,
    Quit,
    Empty,
    Unknown(String),
}

fn parse_input(line: &str) -> Input {
    let line = line.trim();
    let Some(command) = line.strip_prefix('/') else {
        return if line.is_empty() {
            Input::Empty
        } else {
            Input::Send(line.to_string())
        };
    };

    let mut parts = command.split_whitespace();
    match (parts.next(), parts.next()) {
        (Some("quit"), None) => Input::Quit,
        (Some("clear"), None) => Input::Clear,
        (Some("history"), None) => Input::History(DEFAULT_HISTORY_LIMIT),
        (Some("history"), Some(n)) => match n.parse() {
            Ok(limit) if parts.next().is_none() => Input::History(limit),
            _ => Input::Unknown(line.to_string()),
        },
        _ => Input::Unknown(line.to_string()),
    }
}

const NOTIFYING_KINDS: [EventKind; 5] = [
    EventKind::Disconnected,
    EventKind::Reconnected,
    EventKind::ConnectError,
    EventKind::ReconnectFailed,
    EventKind::ServerError,
];

/// Notification raised for a channel event: kind, title, message.
fn lifecycle_notice(event: &ChannelEvent) -> Option<(NotificationKind, &'static str, String)> {
    let notice = match event {
        ChannelEvent::Disconnected { reason: why } if why != reason::CLIENT_DISCONNECT => (
            NotificationKind::Warning,
            "Connection",
            format!("Connection lost ({why})"),
        ),
        ChannelEvent::Reconnected { attempt } => (
            NotificationKind::Success,
            "Connection",
            format!("Reconnected on attempt {attempt}"),
        ),
        ChannelEvent::ConnectError { message } => (
            NotificationKind::Error,
            "Connection",
            format!("Could not connect: {message}"),
        ),
        ChannelEvent::ReconnectFailed { attempts } => (
            NotificationKind::Error,
            "Connection",
            format!("Gave up after {attempts} reconnect attempts"),
        ),
        ChannelEvent::Server(ServerEvent::Error { message }) => {
            (NotificationKind::Error, "Server", message.clone())
        }
        _ => return None,
    };
    Some(notice)
}

fn wire_notifications(manager: &ConnectionManager, queue: &NotificationQueue) {
    for kind in NOTIFYING_KINDS {
        let queue = queue.clone();
        manager.on(kind, move |event| {
            let Some((kind, title, message)) = lifecycle_notice(event) else {
                return;
            };
            let options = NotifyOptions::titled(title);
            match kind {
                NotificationKind::Success => queue.success(message, options),
                NotificationKind::Error => queue.error(message, options),
                NotificationKind::Warning => queue.warning(message, options),
                NotificationKind::Info => queue.info(message, options),
            };
        });
    }
}

/// Run an interactive chat session until `/quit`, EOF, or Ctrl-C.
pub async fn run_chat(server: &ServerArgs, args: ChatArgs) -> DeskResult<()> {
    let queue = NotificationQueue::new(ExecutionContext::current());
    let mut manager = ConnectionManager::new(server.channel_config()?);
    wire_notifications(&manager, &queue);

    let (events_tx, mut events) = mpsc::unbounded_channel::<ChannelEvent>();
    for kind in EventKind::ALL {
        let tx = events_tx.clone();
        manager.on(kind, move |event| {
            let _ = tx.send(event.clone());
        });
    }
    drop(events_tx);

    manager.connect()?;
    info!(room = %args.room, document_id = ?args.document_id, "chat started");

    let mut view = queue.subscribe();
    let mut shown = HashSet::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    info!("stdin closed");
                    break;
                };
                match parse_input(&line) {
                    Input::Quit => break,
                    Input::Empty => {}
                    Input::Unknown(text) => {
                        queue.info(
                            format!("Unknown command: {text}"),
                            NotifyOptions::default(),
                        );
                    }
                    Input::Clear => send(&manager, &queue, &ClientEvent::ClearHistory),
                    Input::History(limit) => {
                        send(&manager, &queue, &ClientEvent::RequestHistory { limit });
                    }
                    Input::Send(message) => {
                        let event = ClientEvent::SendMessage {
                            message,
                            document_id: args.document_id,
                        };
                        send(&manager, &queue, &event);
                    }
                }
            }
            Some(event) = events.recv() => {
                if matches!(event, ChannelEvent::Connected) {
                    let join = ClientEvent::JoinRoom { room: args.room.clone() };
                    manager.emit(&join);
                }
                if let Some(text) = describe_event(&event) {
                    println!("{text}");
                }
            }
            Ok(()) = view.changed() => {
                let current = view.borrow_and_update().clone();
                for n in fresh(&current, &mut shown) {
                    println!("{}", format_notification(n));
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                break;
            }
        }
    }

    manager.disconnect();
    info!("chat ended");
    Ok(())
}

fn send(manager: &ConnectionManager, queue: &NotificationQueue, event: &ClientEvent) {
    if !manager.emit(event) {
        warn!(state = ?manager.state(), "not connected, event dropped");
        queue.warning("Not connected, nothing was sent", NotifyOptions::default());
    }
}

/// Chat output for server events. Lifecycle events are shown as
/// notifications instead.
fn describe_event(event: &ChannelEvent) -> Option<String> {
    let ChannelEvent::Server(server) = event else {
        return None;
    };
    match server {
        ServerEvent::Welcome { message }
        | ServerEvent::RoomJoined { message, .. }
        | ServerEvent::RoomLeft { message, .. }
        | ServerEvent::HistoryCleared { message } => Some(format!("* {message}")),
        ServerEvent::MessageReceived(msg) => Some(format_message(msg)),
        ServerEvent::History(messages) if messages.is_empty() => {
            Some("* history is empty".to_string())
        }
        ServerEvent::History(messages) => Some(
            messages
                .iter()
                .map(format_message)
                .collect::<Vec<_>>()
                .join("\n"),
        ),
        ServerEvent::Error { .. } => None,
    }
}

fn format_message(msg: &ChatMessage) -> String {
    let who = if msg.from_user { "you" } else { "assistant" };
    format!("{who}: {}", msg.content)
}

fn format_notification(n: &Notification) -> String {
    if n.title.is_empty() {
        format!("[{}] {}", n.kind, n.message)
    } else {
        format!("[{}] {}: {}", n.kind, n.title, n.message)
    }
}

/// Entries of `current` not yet in `shown`. Forgets ids that left the view.
fn fresh<'a>(
    current: &'a [Notification],
    shown: &mut HashSet<NotificationId>,
) -> Vec<&'a Notification> {
    shown.retain(|id| current.iter().any(|n| n.id == *id));
    current.iter().filter(|n| shown.insert(n.id)).collect()
}
