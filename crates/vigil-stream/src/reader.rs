use crate::error::{Result, StreamError};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use vigil_core::{Change, ChangeKind, Lifecycle, ReaderConfig, Seq};
use vigil_store::{RowFields, RowMap, Store};

/// Rows for the same `(kind, entity_type, entity_id)` that piled up between
/// two polls carry no extra information beyond their newest occurrence, so
/// they are collapsed in the query itself. A Create followed by an Update in
/// the same window still yields two rows: downstream shadows must observe the
/// Create before the Update.
const COALESCED_QUERY: &str = "\
SELECT MAX(seq) AS seq, kind, entity_type, entity_id, MAX(created_at) AS created_at \
FROM change_log WHERE seq > ?1 \
GROUP BY kind, entity_type, entity_id \
ORDER BY MAX(seq) ASC";

/// Polls the change log and emits an ordered, coalesced stream of changes.
///
/// The reader owns a single long-running task. Its cursor only advances once
/// the downstream has accepted a row, so a slow consumer makes the next poll
/// re-observe the unsent tail instead of losing it.
pub struct ChangeLogReader {
    lifecycle: Lifecycle<StreamError>,
}

impl ChangeLogReader {
    /// Start the reader. The returned receiver is the single output stream;
    /// it closes when the reader terminates.
    pub fn spawn(store: Store, config: ReaderConfig) -> (Self, mpsc::Receiver<Change>) {
        let (tx, rx) = mpsc::channel(1);
        let lifecycle = Lifecycle::new();
        let token = lifecycle.token();
        lifecycle.spawn(run(store, config, tx, token));
        (Self { lifecycle }, rx)
    }

    /// Signal termination without blocking.
    pub fn kill(&self) {
        self.lifecycle.kill();
    }

    /// Wait for the reader task to return.
    pub async fn wait(&self) -> std::result::Result<(), Arc<StreamError>> {
        self.lifecycle.wait().await
    }

    /// Kill and wait.
    pub async fn close(&self) -> std::result::Result<(), Arc<StreamError>> {
        self.lifecycle.close().await
    }

    /// The error that terminated the reader, if any.
    pub fn err(&self) -> Option<Arc<StreamError>> {
        self.lifecycle.err()
    }
}

async fn run(
    store: Store,
    config: ReaderConfig,
    tx: mpsc::Sender<Change>,
    token: CancellationToken,
) -> Result<()> {
    tracing::info!(poll_interval_ms = config.poll_interval_ms, "change log reader started");

    let mut cursor: Seq = 0;
    loop {
        tokio::select! {
            _ = token.cancelled() => {
                tracing::info!("change log reader stopped");
                return Ok(());
            }
            _ = tokio::time::sleep(config.poll_interval()) => {}
        }

        // The store retries transient errors internally; an error here is
        // terminal for the reader.
        let rows = store.query(COALESCED_QUERY, vec![cursor.into()]).await?;
        if !rows.is_empty() {
            tracing::debug!(count = rows.len(), cursor, "observed change log rows");
        }

        for row in rows {
            let change = decode_change(&row)?;
            let seq = change.seq;
            tokio::select! {
                _ = token.cancelled() => {
                    tracing::info!("change log reader stopped");
                    return Ok(());
                }
                sent = tx.send(change) => {
                    if sent.is_err() {
                        // Downstream dropped its receiver: EOF for us.
                        return Ok(());
                    }
                }
            }
            // The cursor moves only after the downstream accepted the row.
            cursor = seq;
        }
    }
}

fn decode_change(row: &RowMap) -> Result<Change> {
    let seq = row
        .integer("seq")
        .ok_or_else(|| StreamError::Decode("missing seq".into()))?;
    let kind_bits = row
        .integer("kind")
        .ok_or_else(|| StreamError::Decode("missing kind".into()))?;
    let kind = ChangeKind::from_bits(kind_bits)
        .ok_or_else(|| StreamError::Decode(format!("unknown change kind {kind_bits}")))?;
    let entity_type = row
        .text("entity_type")
        .ok_or_else(|| StreamError::Decode("missing entity_type".into()))?
        .to_string();
    let entity_id = row
        .integer("entity_id")
        .ok_or_else(|| StreamError::Decode("missing entity_id".into()))?;
    let created_at = row.text("created_at").unwrap_or_default().to_string();

    Ok(Change {
        seq,
        kind,
        entity_type,
        entity_id,
        created_at,
    })
}
