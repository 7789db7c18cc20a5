//! [`NotificationQueue`]: ordered notifications with independent expiry timers.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use crate::types::{
    DEFAULT_DURATION, ExecutionContext, NewNotification, Notification, NotificationId,
    NotificationKind, NotifyOptions,
};

/// Ordered collection of transient notifications.
///
/// Cloning is cheap and every clone shares the same entries, so one queue can
/// be handed to each part of a host that raises notifications. The entries
/// can only be changed through the methods here; readers get snapshots
/// ([`list`](Self::list)) or a change-notifying view
/// ([`subscribe`](Self::subscribe)).
///
/// Expiry timers are never cancelled. A timer that fires for an id that was
/// already removed (or cleared) does nothing.
#[derive(Clone)]
pub struct NotificationQueue {
    inner: Arc<Inner>,
}

struct Inner {
    context: ExecutionContext,
    next_id: AtomicU64,
    entries: watch::Sender<Vec<Notification>>,
}

impl Inner {
    fn remove(&self, id: NotificationId) -> bool {
        self.entries
            .send_if_modified(|list| match list.iter().position(|n| n.id == id) {
                Some(pos) => {
                    list.remove(pos);
                    true
                }
                None => false,
            })
    }
}

impl NotificationQueue {
    pub fn new(context: ExecutionContext) -> Self {
        let (entries, _) = watch::channel(Vec::new());
        Self {
            inner: Arc::new(Inner {
                context,
                next_id: AtomicU64::new(1),
                entries,
            }),
        }
    }

    pub fn context(&self) -> &ExecutionContext {
        &self.inner.context
    }

    /// Queue a notification and, unless its duration is zero, schedule its
    /// removal. Returns `None` in a detached context.
    pub fn add(&self, new: NewNotification) -> Option<NotificationId> {
        let ExecutionContext::Live(runtime) = &self.inner.context else {
            tracing::debug!("Detached context, notification not queued");
            return None;
        };

        let id = NotificationId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        let notification = Notification {
            id,
            kind: new.kind.unwrap_or_default(),
            title: new.title.unwrap_or_default(),
            message: new.message.unwrap_or_default(),
            duration: new.duration.unwrap_or(DEFAULT_DURATION),
        };
        let duration = notification.duration;
        tracing::debug!(%id, kind = %notification.kind, ?duration, "Notification added");
        self.inner.entries.send_modify(|list| list.push(notification));

        if !duration.is_zero() {
            let inner = Arc::downgrade(&self.inner);
            runtime.spawn(async move {
                tokio::time::sleep(duration).await;
                if let Some(inner) = inner.upgrade()
                    && inner.remove(id)
                {
                    tracing::debug!(%id, "Notification expired");
                }
            });
        }
        Some(id)
    }

    /// Remove the notification with `id`. Returns `false` (and changes
    /// nothing) if it is not queued.
    pub fn remove(&self, id: NotificationId) -> bool {
        self.inner.remove(id)
    }

    pub fn clear(&self) {
        self.inner.entries.send_if_modified(|list| {
            let had_entries = !list.is_empty();
            list.clear();
            had_entries
        });
    }

    pub fn success(
        &self,
        message: impl Into<String>,
        options: NotifyOptions,
    ) -> Option<NotificationId> {
        self.preset(NotificationKind::Success, message.into(), options, None)
    }

    /// Errors stay until dismissed unless `options` sets a duration.
    pub fn error(
        &self,
        message: impl Into<String>,
        options: NotifyOptions,
    ) -> Option<NotificationId> {
        self.preset(
            NotificationKind::Error,
            message.into(),
            options,
            Some(Duration::ZERO),
        )
    }

    pub fn warning(
        &self,
        message: impl Into<String>,
        options: NotifyOptions,
    ) -> Option<NotificationId> {
        self.preset(NotificationKind::Warning, message.into(), options, None)
    }

    pub fn info(
        &self,
        message: impl Into<String>,
        options: NotifyOptions,
    ) -> Option<NotificationId> {
        self.preset(NotificationKind::Info, message.into(), options, None)
    }

    fn preset(
        &self,
        kind: NotificationKind,
        message: String,
        options: NotifyOptions,
        duration: Option<Duration>,
    ) -> Option<NotificationId> {
        self.add(NewNotification {
            kind: Some(kind),
            title: options.title,
            message: Some(message),
            duration: options.duration.or(duration),
        })
    }

    /// Snapshot of the queued notifications, oldest first.
    pub fn list(&self) -> Vec<Notification> {
        self.inner.entries.borrow().clone()
    }

    pub fn get(&self, id: NotificationId) -> Option<Notification> {
        self.inner
            .entries
            .borrow()
            .iter()
            .find(|n| n.id == id)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.entries.borrow().is_empty()
    }

    /// Read-only view that is marked changed whenever the list changes.
    pub fn subscribe(&self) -> watch::Receiver<Vec<Notification>> {
        self.inner.entries.subscribe()
    }
}
