use crate::queue::Registry;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;
use vigil_core::Change;

/// A consumer handle bound to an [`EventQueue`](crate::EventQueue).
///
/// Changes matching any of the subscription's selectors arrive on
/// [`recv`](Self::recv) in strictly ascending `seq` order. The handle is
/// jointly referenced by its creator and the queue; [`close`](Self::close)
/// (or dropping the handle) removes the queue's side, after which the output
/// channel closes. Closing is idempotent.
pub struct Subscription {
    id: u64,
    changes: mpsc::Receiver<Change>,
    registry: Arc<Mutex<Registry>>,
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish_non_exhaustive()
    }
}

impl Subscription {
    pub(crate) fn new(
        id: u64,
        changes: mpsc::Receiver<Change>,
        registry: Arc<Mutex<Registry>>,
    ) -> Self {
        Self {
            id,
            changes,
            registry,
        }
    }

    /// Identifier unique within the owning queue.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Receive the next matching change. Returns `None` once the
    /// subscription is closed, by either side.
    pub async fn recv(&mut self) -> Option<Change> {
        self.changes.recv().await
    }

    /// Remove this subscription from the queue. Idempotent; safe to call
    /// after the queue has shut down.
    pub fn close(&mut self) {
        Registry::unsubscribe(&self.registry, self.id);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.close();
    }
}
