//! SQLite store adapter for the vigil watcher pipeline.
//!
//! Wraps a single shared `rusqlite` connection behind an async API:
//! - [`Store::query`] / [`Store::query_one`] / [`Store::execute`] /
//!   [`Store::with_txn`], all routed through `spawn_blocking`
//! - every call retried internally on transient errors (busy, locked,
//!   checkpoint in progress) with jittered backoff; `NotFound` is surfaced
//!   verbatim and never retried
//! - rows decoded into driver-normalised [`RowMap`] values so equality
//!   comparisons downstream are value-wise regardless of column affinity
//!
//! [`schema::install`] sets up the tracked table, the change log, and the
//! triggers that populate it.

pub mod error;
pub mod retry;
pub mod row;
pub mod schema;
pub mod store;

pub use error::{Result, StoreError};
pub use row::{RowFields, RowMap, RowValue};
pub use store::{ExecInfo, Store};
