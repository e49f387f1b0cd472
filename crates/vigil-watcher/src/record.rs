//! Typed record watcher over the differ.

use crate::differ::{Differ, DifferEvent};
use crate::error::{Result, WatcherError};
use crate::source::EntitySource;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use vigil_core::{ChangeKind, Lifecycle};
use vigil_queue::{EventQueue, Selector};
use vigil_store::RowMap;

/// A typed view of one tracked row.
pub trait EntityRecord: Sized + Send + 'static {
    fn from_row(row: &RowMap) -> Result<Self>;
}

/// Materialized watcher emitting batches of fully-typed row values.
///
/// The first batch is the table snapshot (emitted only when non-empty);
/// every batch after that carries the rows whose content actually changed
/// since the previous batch was accepted.
pub struct RecordWatcher<T> {
    lifecycle: Lifecycle<WatcherError>,
    changes: mpsc::Receiver<Vec<T>>,
}

impl<T: EntityRecord> RecordWatcher<T> {
    /// Start a watcher over `table` observing creates, updates, and deletes.
    pub fn spawn(queue: &EventQueue, source: EntitySource, table: impl Into<String>) -> Result<Self> {
        Self::spawn_with_mask(queue, source, table, ChangeKind::ALL)
    }

    /// Start a watcher with a caller-chosen kind mask.
    pub fn spawn_with_mask(
        queue: &EventQueue,
        source: EntitySource,
        table: impl Into<String>,
        mask: ChangeKind,
    ) -> Result<Self> {
        let subscription = queue.subscribe([Selector::topic(table, mask)])?;

        let lifecycle = Lifecycle::new();
        let (differ_tx, differ_rx) = mpsc::channel(1);
        let (out_tx, out_rx) = mpsc::channel(1);

        let pk_field = source.pk_field().to_string();
        let differ = Differ::new(source, subscription, differ_tx, lifecycle.child_token());
        lifecycle.spawn(differ.run());
        lifecycle.spawn(pump(
            differ_rx,
            out_tx,
            pk_field,
            lifecycle.child_token(),
            |rows: &[RowMap]| rows.iter().map(T::from_row).collect(),
        ));

        Ok(Self {
            lifecycle,
            changes: out_rx,
        })
    }

    /// Receive the next batch. Returns `None` once the watcher terminates.
    pub async fn recv(&mut self) -> Option<Vec<T>> {
        self.changes.recv().await
    }

    pub fn kill(&self) {
        self.lifecycle.kill();
    }

    pub async fn wait(&self) -> std::result::Result<(), Arc<WatcherError>> {
        self.lifecycle.wait().await
    }

    pub async fn close(&self) -> std::result::Result<(), Arc<WatcherError>> {
        self.lifecycle.close().await
    }

    pub fn err(&self) -> Option<Arc<WatcherError>> {
        self.lifecycle.err()
    }
}

/// Gated-send batching stage shared by the watcher shapes.
///
/// The pending batch is offered downstream only while non-empty (a channel
/// permit is reserved only then) and cleared once accepted. A change arriving
/// while the previous batch is still unsent merges into it: a row replacing
/// its own older image keeps that image's slot, so per-entity order is
/// preserved and nothing is dropped.
pub(crate) async fn pump<T, F>(
    mut events: mpsc::Receiver<DifferEvent>,
    out: mpsc::Sender<Vec<T>>,
    pk_field: String,
    token: CancellationToken,
    map: F,
) -> Result<()>
where
    T: Send + 'static,
    F: Fn(&[RowMap]) -> Result<Vec<T>> + Send + 'static,
{
    let mut pending: Vec<RowMap> = Vec::new();
    loop {
        if pending.is_empty() {
            tokio::select! {
                _ = token.cancelled() => return Ok(()),
                event = events.recv() => match event {
                    Some(event) => merge(&mut pending, event, &pk_field),
                    None => return Ok(()),
                },
            }
        } else {
            tokio::select! {
                _ = token.cancelled() => return Ok(()),
                event = events.recv() => match event {
                    Some(event) => merge(&mut pending, event, &pk_field),
                    None => return Ok(()),
                },
                permit = out.reserve() => match permit {
                    Ok(permit) => {
                        let batch = map(&pending)?;
                        pending.clear();
                        permit.send(batch);
                    }
                    // The consumer dropped its receiver.
                    Err(_) => return Ok(()),
                },
            }
        }
    }
}

fn merge(pending: &mut Vec<RowMap>, event: DifferEvent, pk_field: &str) {
    match event {
        DifferEvent::Snapshot(rows) => pending.extend(rows),
        DifferEvent::Changed(row) => {
            let position = match row.get(pk_field) {
                Some(pk) => pending.iter().position(|r| r.get(pk_field) == Some(pk)),
                None => None,
            };
            match position {
                Some(idx) => pending[idx] = row,
                None => pending.push(row),
            }
        }
    }
}
