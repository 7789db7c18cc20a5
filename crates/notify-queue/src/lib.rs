//! In-process queue of transient user-facing notifications.
//!
//! Each notification carries a kind, a title, a message and a time-to-live.
//! Entries with a non-zero duration remove themselves when it elapses; a zero
//! duration keeps the entry until [`NotificationQueue::remove`] or
//! [`NotificationQueue::clear`].
//!
//! ```no_run
//! use notify_queue::{ExecutionContext, NotificationQueue, NotifyOptions};
//!
//! # async fn example() {
//! let queue = NotificationQueue::new(ExecutionContext::current());
//! queue.success("Document uploaded", NotifyOptions::default());
//! queue.error("Processing failed", NotifyOptions::titled("Error"));
//!
//! let mut view = queue.subscribe();
//! while view.changed().await.is_ok() {
//!     for n in view.borrow().iter() {
//!         println!("[{}] {}", n.kind, n.message);
//!     }
//! }
//! # }
//! ```

mod queue;
mod types;

pub use queue::NotificationQueue;
pub use types::{
    DEFAULT_DURATION, ExecutionContext, NewNotification, Notification, NotificationId,
    NotificationKind, NotifyOptions,
};
