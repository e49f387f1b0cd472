//! Change-log reader for the vigil watcher pipeline.
//!
//! [`ChangeLogReader`] converts the append-only `change_log` table into a
//! single in-process stream of [`vigil_core::Change`] values in `seq` order,
//! coalescing duplicate `(kind, entity_type, entity_id)` rows at the source.

pub mod error;
pub mod reader;

pub use error::{Result, StreamError};
pub use reader::ChangeLogReader;
