//! Listener registry shared between a manager and its driver task.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::events::{ChannelEvent, EventKind};

/// Callback invoked with every event of the kind it was registered for.
pub type Handler = Arc<dyn Fn(&ChannelEvent) + Send + Sync>;

/// Token returned by [`ConnectionManager::on`](crate::ConnectionManager::on),
/// used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

struct Entry {
    kind: EventKind,
    id: ListenerId,
    handler: Handler,
}

#[derive(Default)]
pub(crate) struct Listeners {
    next_id: AtomicU64,
    /// Bumped whenever a channel starts or is torn down. Only the driver
    /// holding the current value may dispatch.
    generation: AtomicU64,
    entries: Mutex<Vec<Entry>>,
}

impl Listeners {
    fn entries(&self) -> MutexGuard<'_, Vec<Entry>> {
        // A handler that panicked mid-dispatch never held this lock.
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn add(&self, kind: EventKind, handler: Handler) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.entries().push(Entry { kind, id, handler });
        id
    }

    pub(crate) fn remove(&self, kind: EventKind, id: ListenerId) -> bool {
        let mut entries = self.entries();
        let before = entries.len();
        entries.retain(|e| !(e.kind == kind && e.id == id));
        entries.len() != before
    }

    /// Retire the current driver and return the generation for the next one.
    pub(crate) fn advance(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Dispatch on behalf of the driver started at `generation`. Events from a
    /// retired driver are dropped.
    pub(crate) fn dispatch_from(&self, generation: u64, event: &ChannelEvent) {
        if self.generation.load(Ordering::SeqCst) != generation {
            tracing::debug!(kind = ?event.kind(), "Dropping event from retired channel");
            return;
        }
        self.dispatch(event);
    }

    /// Invoke every handler registered for the event's kind, in subscription
    /// order. The lock is released before handlers run so they may register or
    /// remove listeners themselves.
    pub(crate) fn dispatch(&self, event: &ChannelEvent) {
        let kind = event.kind();
        let handlers: Vec<Handler> = self
            .entries()
            .iter()
            .filter(|e| e.kind == kind)
            .map(|e| Arc::clone(&e.handler))
            .collect();
        for handler in handlers {
            handler(event);
        }
    }
}
