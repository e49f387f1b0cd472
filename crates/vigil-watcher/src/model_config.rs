//! Ready-made watcher shapes over the `model_config` table.

use crate::error::{Result, WatcherError};
use crate::keys::KeyWatcher;
use crate::record::{EntityRecord, RecordWatcher};
use crate::source::EntitySource;
use vigil_queue::EventQueue;
use vigil_store::{schema, RowFields, RowMap, Store};

/// One fully-typed `model_config` row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelConfigValue {
    pub id: i64,
    pub key: String,
    pub value: String,
}

impl EntityRecord for ModelConfigValue {
    fn from_row(row: &RowMap) -> Result<Self> {
        Ok(Self {
            id: row
                .integer("id")
                .ok_or_else(|| WatcherError::Decode("model_config row missing id".into()))?,
            key: row
                .text("key")
                .ok_or_else(|| WatcherError::Decode("model_config row missing key".into()))?
                .to_string(),
            value: row
                .text("value")
                .ok_or_else(|| WatcherError::Decode("model_config row missing value".into()))?
                .to_string(),
        })
    }
}

const FIND_ONE: &str = "SELECT id, key, value FROM model_config WHERE id = ?1";
const FIND_ALL: &str = "SELECT id, key, value FROM model_config";

const KEY_FIND_ONE: &str = "SELECT id, key FROM model_config WHERE id = ?1";
const KEY_FIND_ALL: &str = "SELECT id, key FROM model_config";

/// Watch `model_config` rows as typed values.
pub fn model_config_watcher(
    queue: &EventQueue,
    store: &Store,
) -> Result<RecordWatcher<ModelConfigValue>> {
    let source = EntitySource::new(store.clone(), "id", FIND_ONE, FIND_ALL);
    RecordWatcher::spawn(queue, source, schema::MODEL_CONFIG_TABLE)
}

/// Watch `model_config` keys. Creates and updates only; deletions do not
/// produce key batches.
pub fn model_config_key_watcher(queue: &EventQueue, store: &Store) -> Result<KeyWatcher> {
    let source = EntitySource::new(store.clone(), "id", KEY_FIND_ONE, KEY_FIND_ALL);
    KeyWatcher::spawn(queue, source, schema::MODEL_CONFIG_TABLE, "key")
}
