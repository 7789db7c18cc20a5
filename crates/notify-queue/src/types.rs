//! Public types for the notify-queue crate.

use std::fmt;
use std::time::Duration;

/// Time-to-live applied when a notification does not specify one.
pub const DEFAULT_DURATION: Duration = Duration::from_millis(5000);

/// Category of a notification; decides how a host renders it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum NotificationKind {
    Success,
    Error,
    Warning,
    #[default]
    Info,
}

impl NotificationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            NotificationKind::Success => "success",
            NotificationKind::Error => "error",
            NotificationKind::Warning => "warning",
            NotificationKind::Info => "info",
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifier assigned by [`NotificationQueue::add`](crate::NotificationQueue::add).
/// Ids are never reused within a queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NotificationId(pub(crate) u64);

impl fmt::Display for NotificationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A queued notification. Values handed out by the queue are copies; the
/// queued entry itself never changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub id: NotificationId,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    /// Zero means the notification stays until removed explicitly.
    pub duration: Duration,
}

/// Input to [`NotificationQueue::add`](crate::NotificationQueue::add). Absent
/// fields take their defaults: kind `info`, empty strings, [`DEFAULT_DURATION`].
#[derive(Debug, Clone, Default)]
pub struct NewNotification {
    pub kind: Option<NotificationKind>,
    pub title: Option<String>,
    pub message: Option<String>,
    pub duration: Option<Duration>,
}

/// Overrides accepted by the `success`/`error`/`warning`/`info` shortcuts.
#[derive(Debug, Clone, Default)]
pub struct NotifyOptions {
    pub title: Option<String>,
    pub duration: Option<Duration>,
}

impl NotifyOptions {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            duration: None,
        }
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }
}

/// Where a queue lives. Expiry timers need a runtime; without one the queue
/// accepts nothing.
#[derive(Debug, Clone)]
pub enum ExecutionContext {
    /// Interactive host: expiry timers are spawned on this runtime.
    Live(tokio::runtime::Handle),
    /// Non-interactive host (e.g. rendering a static snapshot). `add` returns
    /// `None` and schedules nothing.
    Detached,
}

impl ExecutionContext {
    /// `Live` on the runtime this is called from, `Detached` outside one.
    pub fn current() -> Self {
        tokio::runtime::Handle::try_current().map_or(Self::Detached, Self::Live)
    }

    pub fn is_live(&self) -> bool {
        matches!(self, ExecutionContext::Live(_))
    }
}
