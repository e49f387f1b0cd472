use crate::error::{QueueError, Result};
use crate::selector::{Predicate, Selector};
use crate::subscription::Subscription;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use vigil_core::{Change, ChangeKind, Lifecycle};

/// One registered selector, resolved to its owning subscription.
struct EventFilter {
    sub_id: u64,
    mask: ChangeKind,
    predicate: Option<Predicate>,
}

struct SubEntry {
    sender: mpsc::Sender<Change>,
    topics: Vec<String>,
}

/// The subscription index. The only shared-mutable state in the pipeline;
/// guarded by one mutex, held only for non-blocking windows.
pub(crate) struct Registry {
    next_id: u64,
    subs: HashMap<u64, SubEntry>,
    by_topic: HashMap<String, Vec<EventFilter>>,
    closed: bool,
}

impl Registry {
    fn new() -> Self {
        Self {
            next_id: 0,
            subs: HashMap::new(),
            by_topic: HashMap::new(),
            closed: false,
        }
    }

    pub(crate) fn unsubscribe(registry: &Mutex<Registry>, id: u64) {
        let mut reg = registry.lock();
        let Some(entry) = reg.subs.remove(&id) else {
            return;
        };
        for topic in entry.topics {
            if let Some(filters) = reg.by_topic.get_mut(&topic) {
                filters.retain(|f| f.sub_id != id);
                if filters.is_empty() {
                    reg.by_topic.remove(&topic);
                }
            }
        }
        // Dropping the entry drops the queue-held sender; once any in-flight
        // clone is gone the subscriber's channel closes.
    }

    /// Senders for every subscription matching `change`, at most one per
    /// subscription. Evaluated under the lock; sends happen outside it.
    fn matching(&self, change: &Change) -> Vec<(u64, mpsc::Sender<Change>)> {
        let Some(filters) = self.by_topic.get(change.entity_type.as_str()) else {
            return Vec::new();
        };

        let mut targets: Vec<(u64, mpsc::Sender<Change>)> = Vec::new();
        for filter in filters {
            if !change.kind.intersects(filter.mask) {
                continue;
            }
            if let Some(predicate) = &filter.predicate {
                if !predicate(change) {
                    continue;
                }
            }
            if targets.iter().any(|(id, _)| *id == filter.sub_id) {
                continue;
            }
            if let Some(entry) = self.subs.get(&filter.sub_id) {
                targets.push((filter.sub_id, entry.sender.clone()));
            }
        }
        targets
    }
}

/// Multiplexes the single change stream into filtered subscriptions.
///
/// One dispatcher task consumes the upstream channel; `subscribe` and
/// subscription closes may happen concurrently from any task.
pub struct EventQueue {
    registry: Arc<Mutex<Registry>>,
    lifecycle: Lifecycle<QueueError>,
}

impl EventQueue {
    /// Start the queue over the reader's output stream.
    pub fn spawn(changes: mpsc::Receiver<Change>) -> Self {
        let registry = Arc::new(Mutex::new(Registry::new()));
        let lifecycle = Lifecycle::new();
        let token = lifecycle.token();
        lifecycle.spawn(dispatch(changes, Arc::clone(&registry), token));
        Self {
            registry,
            lifecycle,
        }
    }

    /// Register a subscription over one or more selectors.
    ///
    /// Fails with [`QueueError::NoSelectors`] on an empty selector list and
    /// [`QueueError::Closed`] once the queue has shut down.
    pub fn subscribe(&self, selectors: impl IntoIterator<Item = Selector>) -> Result<Subscription> {
        let selectors: Vec<Selector> = selectors.into_iter().collect();
        if selectors.is_empty() {
            return Err(QueueError::NoSelectors);
        }

        let mut reg = self.registry.lock();
        if reg.closed {
            return Err(QueueError::Closed);
        }

        let id = reg.next_id;
        reg.next_id += 1;

        let (tx, rx) = mpsc::channel(1);
        let mut topics = Vec::with_capacity(selectors.len());
        for selector in selectors {
            reg.by_topic
                .entry(selector.entity_type.clone())
                .or_default()
                .push(EventFilter {
                    sub_id: id,
                    mask: selector.mask,
                    predicate: selector.predicate,
                });
            topics.push(selector.entity_type);
        }
        reg.subs.insert(id, SubEntry { sender: tx, topics });
        drop(reg);

        tracing::debug!(subscription = id, "subscription registered");
        Ok(Subscription::new(id, rx, Arc::clone(&self.registry)))
    }

    /// Signal shutdown without blocking.
    pub fn kill(&self) {
        self.lifecycle.kill();
    }

    /// Wait for the dispatcher to return. Every live subscription's channel
    /// has closed by then.
    pub async fn wait(&self) -> std::result::Result<(), Arc<QueueError>> {
        self.lifecycle.wait().await
    }

    /// Kill and wait.
    pub async fn close(&self) -> std::result::Result<(), Arc<QueueError>> {
        self.lifecycle.close().await
    }

    /// The error that terminated the dispatcher, if any.
    pub fn err(&self) -> Option<Arc<QueueError>> {
        self.lifecycle.err()
    }
}

async fn dispatch(
    mut changes: mpsc::Receiver<Change>,
    registry: Arc<Mutex<Registry>>,
    token: CancellationToken,
) -> Result<()> {
    tracing::info!("event queue dispatcher started");

    'outer: loop {
        let change = tokio::select! {
            _ = token.cancelled() => break 'outer,
            next = changes.recv() => match next {
                Some(change) => change,
                None => break 'outer, // upstream EOF
            },
        };

        let targets = registry.lock().matching(&change);
        for (sub_id, sender) in targets {
            tokio::select! {
                _ = token.cancelled() => break 'outer,
                sent = sender.send(change.clone()) => {
                    if sent.is_err() {
                        // The subscriber closed mid-flight; not an error.
                        tracing::debug!(subscription = sub_id, "dropped send to closed subscription");
                    }
                }
            }
        }
    }

    // Terminating: close every live subscription exactly once and drop the
    // index entries.
    let mut reg = registry.lock();
    reg.closed = true;
    reg.subs.clear();
    reg.by_topic.clear();
    tracing::info!("event queue dispatcher stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn change(seq: i64, kind: ChangeKind, entity_id: i64) -> Change {
        Change {
            seq,
            kind,
            entity_type: "model_config".into(),
            entity_id,
            created_at: String::new(),
        }
    }

    async fn recv(sub: &mut Subscription) -> Option<Change> {
        tokio::time::timeout(Duration::from_secs(2), sub.recv())
            .await
            .expect("timed out waiting for change")
    }

    fn pipeline() -> (mpsc::Sender<Change>, EventQueue) {
        let (tx, rx) = mpsc::channel(1);
        (tx, EventQueue::spawn(rx))
    }

    #[tokio::test]
    async fn subscribe_requires_selectors() {
        let (_tx, queue) = pipeline();
        let err = queue.subscribe([]).unwrap_err();
        assert!(matches!(err, QueueError::NoSelectors));
        queue.close().await.unwrap();
    }

    #[tokio::test]
    async fn kind_mask_filters_deliveries() {
        let (tx, queue) = pipeline();
        let mut sub = queue
            .subscribe([Selector::topic(
                "model_config",
                ChangeKind::CREATE | ChangeKind::UPDATE,
            )])
            .unwrap();

        tx.send(change(1, ChangeKind::CREATE, 1)).await.unwrap();
        tx.send(change(2, ChangeKind::DELETE, 1)).await.unwrap();
        tx.send(change(3, ChangeKind::UPDATE, 1)).await.unwrap();

        assert_eq!(recv(&mut sub).await.unwrap().seq, 1);
        assert_eq!(recv(&mut sub).await.unwrap().seq, 3);

        queue.close().await.unwrap();
    }

    #[tokio::test]
    async fn predicate_narrows_the_topic() {
        let (tx, queue) = pipeline();
        let mut sub = queue
            .subscribe([Selector::filtered(
                "model_config",
                ChangeKind::ALL,
                |c| c.entity_id % 2 == 0,
            )])
            .unwrap();

        for seq in 1..=4 {
            tx.send(change(seq, ChangeKind::CREATE, seq)).await.unwrap();
        }

        assert_eq!(recv(&mut sub).await.unwrap().entity_id, 2);
        assert_eq!(recv(&mut sub).await.unwrap().entity_id, 4);

        queue.close().await.unwrap();
    }

    #[tokio::test]
    async fn fan_out_by_kind() {
        let (tx, queue) = pipeline();
        let mut creates = queue
            .subscribe([Selector::topic(
                "model_config",
                ChangeKind::CREATE | ChangeKind::UPDATE,
            )])
            .unwrap();
        let mut deletes = queue
            .subscribe([Selector::topic("model_config", ChangeKind::DELETE)])
            .unwrap();

        tx.send(change(1, ChangeKind::CREATE, 1)).await.unwrap();
        tx.send(change(2, ChangeKind::DELETE, 1)).await.unwrap();

        let created = recv(&mut creates).await.unwrap();
        assert_eq!(created.kind, ChangeKind::CREATE);
        let deleted = recv(&mut deletes).await.unwrap();
        assert_eq!(deleted.kind, ChangeKind::DELETE);

        queue.close().await.unwrap();
    }

    #[tokio::test]
    async fn per_subscription_order_is_ascending() {
        let (tx, queue) = pipeline();
        let mut sub = queue
            .subscribe([Selector::topic("model_config", ChangeKind::ALL)])
            .unwrap();

        let feeder = tokio::spawn(async move {
            for seq in 1..=20 {
                tx.send(change(seq, ChangeKind::UPDATE, seq % 3)).await.unwrap();
            }
        });

        let mut last = 0;
        for _ in 0..20 {
            let c = recv(&mut sub).await.unwrap();
            assert!(c.seq > last);
            last = c.seq;
        }
        feeder.await.unwrap();

        queue.close().await.unwrap();
    }

    #[tokio::test]
    async fn overlapping_selectors_deliver_once() {
        let (tx, queue) = pipeline();
        let mut sub = queue
            .subscribe([
                Selector::topic("model_config", ChangeKind::CREATE),
                Selector::topic("model_config", ChangeKind::ALL),
            ])
            .unwrap();

        tx.send(change(1, ChangeKind::CREATE, 1)).await.unwrap();
        tx.send(change(2, ChangeKind::UPDATE, 1)).await.unwrap();

        assert_eq!(recv(&mut sub).await.unwrap().seq, 1);
        // A duplicate of seq 1 would arrive before seq 2.
        assert_eq!(recv(&mut sub).await.unwrap().seq, 2);

        queue.close().await.unwrap();
    }

    #[tokio::test]
    async fn closing_a_subscription_is_idempotent() {
        let (tx, queue) = pipeline();
        let mut sub = queue
            .subscribe([Selector::topic("model_config", ChangeKind::ALL)])
            .unwrap();

        sub.close();
        sub.close();
        assert!(recv(&mut sub).await.is_none());

        // The dispatcher keeps running for other subscriptions.
        let mut other = queue
            .subscribe([Selector::topic("model_config", ChangeKind::ALL)])
            .unwrap();
        tx.send(change(1, ChangeKind::CREATE, 1)).await.unwrap();
        assert_eq!(recv(&mut other).await.unwrap().seq, 1);

        queue.close().await.unwrap();
    }

    #[tokio::test]
    async fn queue_close_closes_every_subscription() {
        let (_tx, queue) = pipeline();
        let mut a = queue
            .subscribe([Selector::topic("model_config", ChangeKind::ALL)])
            .unwrap();
        let mut b = queue
            .subscribe([Selector::topic("model_config", ChangeKind::DELETE)])
            .unwrap();

        queue.close().await.unwrap();

        assert!(recv(&mut a).await.is_none());
        assert!(recv(&mut b).await.is_none());
        assert!(matches!(queue.subscribe([Selector::topic("model_config", ChangeKind::ALL)]),
            Err(QueueError::Closed)));
    }

    #[tokio::test]
    async fn upstream_eof_terminates_the_queue() {
        let (tx, queue) = pipeline();
        let mut sub = queue
            .subscribe([Selector::topic("model_config", ChangeKind::ALL)])
            .unwrap();

        drop(tx);

        assert!(recv(&mut sub).await.is_none());
        queue.wait().await.unwrap();
        assert!(queue.err().is_none());
    }

    #[tokio::test]
    async fn slow_subscriber_stalls_without_loss() {
        let (tx, queue) = pipeline();
        let mut sub = queue
            .subscribe([Selector::topic("model_config", ChangeKind::ALL)])
            .unwrap();

        // Nobody reads yet; the feeder makes progress only as capacity frees.
        let feeder = tokio::spawn(async move {
            for seq in 1..=5 {
                tx.send(change(seq, ChangeKind::CREATE, seq)).await.unwrap();
            }
        });

        tokio::time::sleep(Duration::from_millis(50)).await;

        for expected in 1..=5 {
            assert_eq!(recv(&mut sub).await.unwrap().seq, expected);
        }
        feeder.await.unwrap();

        queue.close().await.unwrap();
    }
}
