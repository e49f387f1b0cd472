//! Shadow-state maintenance for one tracked entity type.

use crate::error::{Result, WatcherError};
use crate::source::EntitySource;
use std::collections::HashMap;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use vigil_core::{Change, ChangeKind};
use vigil_store::{RowFields, RowMap};

/// What the differ hands the batching stage.
#[derive(Debug)]
pub(crate) enum DifferEvent {
    /// The full table image loaded at startup.
    Snapshot(Vec<RowMap>),
    /// One row whose content actually changed; for a delete, the previous
    /// image.
    Changed(RowMap),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DifferState {
    Loading,
    Snapshotting,
    Streaming,
    Stopped,
}

/// Maintains the last-known row image per entity and suppresses no-op
/// updates. Owned by exactly one watcher; the shadow is never shared.
pub(crate) struct Differ {
    source: EntitySource,
    shadow: HashMap<i64, RowMap>,
    subscription: vigil_queue::Subscription,
    out: mpsc::Sender<DifferEvent>,
    token: CancellationToken,
}

impl Differ {
    pub(crate) fn new(
        source: EntitySource,
        subscription: vigil_queue::Subscription,
        out: mpsc::Sender<DifferEvent>,
        token: CancellationToken,
    ) -> Self {
        Self {
            source,
            shadow: HashMap::new(),
            subscription,
            out,
            token,
        }
    }

    pub(crate) async fn run(mut self) -> Result<()> {
        transition(DifferState::Loading);
        self.initialize().await?;

        transition(DifferState::Snapshotting);
        if !self.shadow.is_empty() {
            let rows: Vec<RowMap> = self.shadow.values().cloned().collect();
            tokio::select! {
                _ = self.token.cancelled() => {
                    transition(DifferState::Stopped);
                    return Ok(());
                }
                sent = self.out.send(DifferEvent::Snapshot(rows)) => {
                    if sent.is_err() {
                        transition(DifferState::Stopped);
                        return Ok(());
                    }
                }
            }
        }

        transition(DifferState::Streaming);
        loop {
            let change = tokio::select! {
                _ = self.token.cancelled() => break,
                next = self.subscription.recv() => match next {
                    Some(change) => change,
                    None => break, // EOF from the queue
                },
            };

            let Some(row) = self.process_change(&change).await? else {
                continue;
            };
            tokio::select! {
                _ = self.token.cancelled() => break,
                sent = self.out.send(DifferEvent::Changed(row)) => {
                    if sent.is_err() {
                        break;
                    }
                }
            }
        }

        transition(DifferState::Stopped);
        Ok(())
    }

    /// Populate the shadow with the current table contents.
    async fn initialize(&mut self) -> Result<()> {
        let rows = self.source.find_all().await?;
        for row in rows {
            let id = self.pk_of(&row)?;
            self.shadow.insert(id, row);
        }
        tracing::debug!(entities = self.shadow.len(), "differ loaded initial state");
        Ok(())
    }

    /// Apply one change to the shadow. Returns the row image to emit, if the
    /// change represents real content movement.
    async fn process_change(&mut self, change: &Change) -> Result<Option<RowMap>> {
        let id = change.entity_id;

        if change.kind.intersects(ChangeKind::DELETE) {
            // Emit the previous image; an unknown entity is a no-op.
            return Ok(self.shadow.remove(&id));
        }

        let Some(new_row) = self.source.find_one(id).await? else {
            // The row vanished between the change and the read.
            return Ok(None);
        };

        match self.shadow.get(&id) {
            // Same key set, same values in both directions: suppress.
            Some(old_row) if *old_row == new_row => Ok(None),
            _ => {
                self.shadow.insert(id, new_row.clone());
                Ok(Some(new_row))
            }
        }
    }

    fn pk_of(&self, row: &RowMap) -> Result<i64> {
        row.integer(self.source.pk_field()).ok_or_else(|| {
            WatcherError::Decode(format!(
                "row has no integer primary key column {:?}",
                self.source.pk_field()
            ))
        })
    }
}

fn transition(state: DifferState) {
    tracing::trace!(?state, "differ state");
}
