use thiserror::Error;
use vigil_queue::QueueError;
use vigil_store::StoreError;

#[derive(Debug, Error)]
pub enum WatcherError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Queue(#[from] QueueError),

    /// A row did not map into the watcher's typed shape.
    #[error("bad row: {0}")]
    Decode(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, WatcherError>;
