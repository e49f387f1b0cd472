use vigil_store::{RowMap, Store, StoreError};

/// Store-bound lookups for one tracked entity type.
///
/// The differ is generic over row shapes; a source pairs the two queries it
/// needs (single row by primary key, full table scan) with the name of the
/// primary-key column used to index the shadow.
#[derive(Clone)]
pub struct EntitySource {
    store: Store,
    pk_field: String,
    find_one_sql: String,
    find_all_sql: String,
}

impl EntitySource {
    pub fn new(
        store: Store,
        pk_field: impl Into<String>,
        find_one_sql: impl Into<String>,
        find_all_sql: impl Into<String>,
    ) -> Self {
        Self {
            store,
            pk_field: pk_field.into(),
            find_one_sql: find_one_sql.into(),
            find_all_sql: find_all_sql.into(),
        }
    }

    pub fn pk_field(&self) -> &str {
        &self.pk_field
    }

    /// Look up one row by primary key. A row that vanished between the
    /// change and the read is `None`, not an error.
    pub(crate) async fn find_one(&self, id: i64) -> Result<Option<RowMap>, StoreError> {
        match self
            .store
            .query_one(self.find_one_sql.clone(), vec![id.into()])
            .await
        {
            Ok(row) => Ok(Some(row)),
            Err(StoreError::NotFound) => Ok(None),
            Err(err) => Err(err),
        }
    }

    pub(crate) async fn find_all(&self) -> Result<Vec<RowMap>, StoreError> {
        self.store.query(self.find_all_sql.clone(), vec![]).await
    }
}
