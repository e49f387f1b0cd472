use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueueError {
    /// `subscribe` was called with an empty selector list.
    #[error("no subscription selectors specified")]
    NoSelectors,

    /// `subscribe` was called after the queue shut down.
    #[error("event queue is closed")]
    Closed,
}

pub type Result<T> = std::result::Result<T, QueueError>;
