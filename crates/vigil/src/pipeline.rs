use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use vigil_core::ReaderConfig;
use vigil_queue::{EventQueue, QueueError, Selector, Subscription};
use vigil_store::{schema, Store, StoreError};
use vigil_stream::{ChangeLogReader, StreamError};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("change log reader failed: {0}")]
    Reader(Arc<StreamError>),

    #[error("event queue failed: {0}")]
    Queue(Arc<QueueError>),
}

/// The wired pipeline: store, schema, change-log reader, event queue.
///
/// Data flows one way: change-log rows into the reader, the reader into the
/// queue, the queue into subscriptions. Watchers are built on top via
/// [`queue`](Self::queue) and [`store`](Self::store).
pub struct Pipeline {
    store: Store,
    reader: ChangeLogReader,
    queue: EventQueue,
}

impl Pipeline {
    /// Open the database at `path`, install the schema, and start the reader
    /// and queue with default configuration.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, PipelineError> {
        Self::open_with(path, ReaderConfig::default()).await
    }

    /// Like [`open`](Self::open) with an explicit reader configuration.
    pub async fn open_with(
        path: impl AsRef<Path>,
        config: ReaderConfig,
    ) -> Result<Self, PipelineError> {
        let store = Store::open(path)?;
        schema::install(&store).await?;

        let (reader, changes) = ChangeLogReader::spawn(store.clone(), config);
        let queue = EventQueue::spawn(changes);

        tracing::info!("pipeline started");
        Ok(Self {
            store,
            reader,
            queue,
        })
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn queue(&self) -> &EventQueue {
        &self.queue
    }

    /// Subscribe to the change stream. See [`EventQueue::subscribe`].
    pub fn subscribe(
        &self,
        selectors: impl IntoIterator<Item = Selector>,
    ) -> Result<Subscription, QueueError> {
        self.queue.subscribe(selectors)
    }

    /// Tear the pipeline down in dependency order: the reader first, so the
    /// queue observes EOF, then the queue itself. Returns the first
    /// component error encountered.
    pub async fn close(&self) -> Result<(), PipelineError> {
        let reader_result = self.reader.close().await;
        let queue_result = self.queue.close().await;

        reader_result.map_err(PipelineError::Reader)?;
        queue_result.map_err(PipelineError::Queue)?;
        Ok(())
    }
}
