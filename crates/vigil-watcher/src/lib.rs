//! Differ-backed materialized watchers.
//!
//! A watcher subscribes to the event queue for one tracked table, keeps a
//! shadow of the last-known row image per entity, and emits only the
//! transitions that represent real content changes:
//!
//! - [`RecordWatcher`] emits batches of fully-typed row values
//! - [`KeyWatcher`] emits batches of primary-key projections
//! - [`model_config`] provides both shapes over the `model_config` table
//!
//! On startup a watcher loads the full table, emits it as one initial batch
//! (only when non-empty), then streams individual changes. A deleted row is
//! emitted as its previous image; consumers that do not care filter with a
//! subscription predicate.

mod differ;

pub mod error;
pub mod keys;
pub mod model_config;
pub mod record;
pub mod source;

pub use error::{Result, WatcherError};
pub use keys::KeyWatcher;
pub use model_config::{model_config_key_watcher, model_config_watcher, ModelConfigValue};
pub use record::{EntityRecord, RecordWatcher};
pub use source::EntitySource;
