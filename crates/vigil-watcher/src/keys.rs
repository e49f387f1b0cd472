//! Key watcher: primary-key projections instead of full rows.

use crate::differ::Differ;
use crate::error::{Result, WatcherError};
use crate::record::pump;
use crate::source::EntitySource;
use std::sync::Arc;
use tokio::sync::mpsc;
use vigil_core::{ChangeKind, Lifecycle};
use vigil_queue::{EventQueue, Selector};
use vigil_store::{RowMap, RowValue};

/// Materialized watcher emitting batches of key projections.
///
/// Same differ machinery as [`RecordWatcher`](crate::RecordWatcher), but each
/// row is projected down to one column rendered as a string. The default
/// mask is narrower: creates and updates only.
pub struct KeyWatcher {
    lifecycle: Lifecycle<WatcherError>,
    changes: mpsc::Receiver<Vec<String>>,
}

impl KeyWatcher {
    /// Start a key watcher over `table`, projecting `field`.
    pub fn spawn(
        queue: &EventQueue,
        source: EntitySource,
        table: impl Into<String>,
        field: impl Into<String>,
    ) -> Result<Self> {
        Self::spawn_with_mask(
            queue,
            source,
            table,
            field,
            ChangeKind::CREATE | ChangeKind::UPDATE,
        )
    }

    /// Start a key watcher with a caller-chosen kind mask.
    pub fn spawn_with_mask(
        queue: &EventQueue,
        source: EntitySource,
        table: impl Into<String>,
        field: impl Into<String>,
        mask: ChangeKind,
    ) -> Result<Self> {
        let subscription = queue.subscribe([Selector::topic(table, mask)])?;

        let lifecycle = Lifecycle::new();
        let (differ_tx, differ_rx) = mpsc::channel(1);
        let (out_tx, out_rx) = mpsc::channel(1);

        let pk_field = source.pk_field().to_string();
        let field = field.into();
        let differ = Differ::new(source, subscription, differ_tx, lifecycle.child_token());
        lifecycle.spawn(differ.run());
        lifecycle.spawn(pump(
            differ_rx,
            out_tx,
            pk_field,
            lifecycle.child_token(),
            move |rows: &[RowMap]| rows.iter().map(|row| project(row, &field)).collect(),
        ));

        Ok(Self {
            lifecycle,
            changes: out_rx,
        })
    }

    /// Receive the next batch of keys. Returns `None` once the watcher
    /// terminates.
    pub async fn recv(&mut self) -> Option<Vec<String>> {
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

fn project(row: &RowMap, field: &str) -> Result<String> {
    match row.get(field) {
        Some(RowValue::Text(s)) => Ok(s.clone()),
        Some(RowValue::Integer(i)) => Ok(i.to_string()),
        Some(other) => Err(WatcherError::Decode(format!(
            "column {field:?} does not project to a key: {other:?}"
        ))),
        None => Err(WatcherError::Decode(format!("missing column {field:?}"))),
    }
}
