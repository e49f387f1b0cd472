//! Core types and task plumbing for the vigil watcher pipeline.
//!
//! This crate defines the vocabulary shared by every stage of the pipeline:
//! - [`Change`] / [`ChangeKind`]: a single row mutation read from the change log
//! - [`config`]: retry and polling knobs with serde-backed defaults
//! - [`Lifecycle`]: the start/kill/wait discipline every long-lived component
//!   in the pipeline follows

pub mod config;
pub mod lifecycle;
pub mod types;

pub use config::{ReaderConfig, RetryConfig};
pub use lifecycle::Lifecycle;
pub use types::{Change, ChangeKind, Seq};
