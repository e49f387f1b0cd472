//! Tracked-table schema and the triggers that feed the change log.
//!
//! Every logical mutation of a tracked row inserts exactly one row into
//! `change_log`; `seq` values are assigned by SQLite in commit order, which
//! is what makes the reader's cursor a total order.

use crate::error::Result;
use crate::store::Store;
use vigil_core::ChangeKind;

pub const MODEL_CONFIG_TABLE: &str = "model_config";

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS model_config (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    key TEXT,
    value TEXT,
    UNIQUE(key)
);

CREATE TABLE IF NOT EXISTS change_log (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    kind INTEGER NOT NULL,
    entity_type TEXT NOT NULL,
    entity_id INTEGER NOT NULL,
    created_at DATETIME NOT NULL
);

CREATE TRIGGER IF NOT EXISTS model_config_insert_trigger
AFTER INSERT ON model_config FOR EACH ROW
BEGIN
    INSERT INTO change_log (kind, entity_type, entity_id, created_at)
    VALUES (1, 'model_config', NEW.id, DATETIME('now'));
END;

CREATE TRIGGER IF NOT EXISTS model_config_update_trigger
AFTER UPDATE ON model_config FOR EACH ROW
BEGIN
    INSERT INTO change_log (kind, entity_type, entity_id, created_at)
    VALUES (2, 'model_config', OLD.id, DATETIME('now'));
END;

CREATE TRIGGER IF NOT EXISTS model_config_delete_trigger
AFTER DELETE ON model_config FOR EACH ROW
BEGIN
    INSERT INTO change_log (kind, entity_type, entity_id, created_at)
    VALUES (4, 'model_config', OLD.id, DATETIME('now'));
END;
"#;

/// Install the tracked table, the change log, and the change-log triggers.
/// Idempotent.
pub async fn install(store: &Store) -> Result<()> {
    store.execute_batch(SCHEMA).await
}

/// Record one logical mutation in the change log directly, for producers that
/// track entities without triggers.
pub async fn log_change(
    store: &Store,
    kind: ChangeKind,
    entity_type: &str,
    entity_id: i64,
) -> Result<()> {
    store
        .execute(
            "INSERT INTO change_log (kind, entity_type, entity_id, created_at) \
             VALUES (?1, ?2, ?3, DATETIME('now'))",
            vec![
                (kind.bits() as i64).into(),
                entity_type.into(),
                entity_id.into(),
            ],
        )
        .await?;
    Ok(())
}
