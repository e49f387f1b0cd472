use thiserror::Error;
use vigil_store::StoreError;

#[derive(Debug, Error)]
pub enum StreamError {
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A change-log row did not decode into a change, e.g. an unknown kind
    /// encoding.
    #[error("bad change-log row: {0}")]
    Decode(String),
}

pub type Result<T> = std::result::Result<T, StreamError>;
