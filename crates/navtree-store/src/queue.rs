//! Producer to owner hand-off for tree notifications
//!
//! Any thread or task may submit notifications through a [`TreeHandle`]. They
//! are appended to one mutex-guarded FIFO; the append that finds the queue
//! empty sends a single wake token to the owner, which then drains everything
//! queued so far. Notifications are never reordered or dropped.

use navtree_core::Notification;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

pub struct NotificationQueue {
    pending: Mutex<VecDeque<Notification>>,
    wake: mpsc::UnboundedSender<()>,
}

impl NotificationQueue {
    /// Create a queue and the receiving end of its wake channel.
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<()>) {
        let (wake, wake_rx) = mpsc::unbounded_channel();
        let queue = Arc::new(Self {
            pending: Mutex::new(VecDeque::new()),
            wake,
        });
        (queue, wake_rx)
    }

    /// Append a notification. Returns true if this call scheduled a drain.
    pub fn push(&self, notification: Notification) -> bool {
        let was_empty = {
            let mut pending = self.pending.lock();
            let was_empty = pending.is_empty();
            pending.push_back(notification);
            was_empty
        };
        if was_empty {
            // The owner may be gone; queued items then wait for an explicit drain.
            let _ = self.wake.send(());
        }
        was_empty
    }

    /// Take everything queued so far, in arrival order.
    pub fn take_all(&self) -> VecDeque<Notification> {
        std::mem::take(&mut *self.pending.lock())
    }

    /// Put unprocessed notifications back in front of anything queued since.
    pub fn requeue_front(&self, rest: VecDeque<Notification>) {
        if rest.is_empty() {
            return;
        }
        debug!(count = rest.len(), "requeueing unprocessed notifications");
        let mut pending = self.pending.lock();
        for notification in rest.into_iter().rev() {
            pending.push_front(notification);
        }
    }

    pub fn len(&self) -> usize { self.pending.lock().len() }

    pub fn is_empty(&self) -> bool { self.pending.lock().is_empty() }
}

/// Cloneable, `Send` submission handle for one tree.
#[derive(Clone)]
pub struct TreeHandle {
    tree: Arc<str>,
    queue: Arc<NotificationQueue>,
}

impl TreeHandle {
    pub(crate) fn new(tree: Arc<str>, queue: Arc<NotificationQueue>) -> Self {
        Self { tree, queue }
    }

    pub fn tree_name(&self) -> &str { &self.tree }

    /// Submit a notification from any context. It is applied later, on the
    /// tree's owner, after everything submitted before it.
    pub fn tree_changed(&self, notification: Notification) {
        debug!(tree = %self.tree, kind = %notification.kind(), "notification queued");
        self.queue.push(notification);
    }

    /// Notifications waiting to be applied.
    pub fn pending(&self) -> usize { self.queue.len() }
}
