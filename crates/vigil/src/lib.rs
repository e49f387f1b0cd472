//! Live change notifications over a SQLite change log.
//!
//! Vigil turns row-level mutations of a SQLite database into an in-process
//! publish/subscribe stream of typed change notifications:
//!
//! - a **change log reader** coalesces the append-only `change_log` table
//!   into a monotonically advancing stream
//! - an **event queue** multiplexes that stream into filtered subscriptions
//! - **materialized watchers** keep a shadow of each tracked row and emit
//!   only real content changes, starting with a snapshot batch
//!
//! # Quick start
//!
//! ```no_run
//! use vigil::{ChangeKind, Pipeline, Selector};
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let pipeline = Pipeline::open("./data/demo.db").await?;
//!
//! // Raw change subscription.
//! let mut sub = pipeline.subscribe([Selector::topic(
//!     "model_config",
//!     ChangeKind::CREATE | ChangeKind::UPDATE,
//! )])?;
//!
//! // Typed materialized view.
//! let mut watcher = vigil::model_config_watcher(pipeline.queue(), pipeline.store())?;
//!
//! while let Some(batch) = watcher.recv().await {
//!     for row in batch {
//!         println!("{} = {}", row.key, row.value);
//!     }
//! }
//!
//! drop(sub);
//! pipeline.close().await?;
//! # Ok(())
//! # }
//! ```

pub mod pipeline;

pub use pipeline::{Pipeline, PipelineError};

pub use vigil_core::{Change, ChangeKind, Lifecycle, ReaderConfig, RetryConfig, Seq};
pub use vigil_queue::{EventQueue, QueueError, Selector, Subscription};
pub use vigil_store::{schema, ExecInfo, RowFields, RowMap, RowValue, Store, StoreError};
pub use vigil_stream::{ChangeLogReader, StreamError};
pub use vigil_watcher::{
    model_config_key_watcher, model_config_watcher, EntityRecord, EntitySource, KeyWatcher,
    ModelConfigValue, RecordWatcher, WatcherError,
};
