use crate::error::{Result, StoreError};
use crate::retry;
use crate::row::{decode_row, RowMap, RowValue};
use parking_lot::Mutex;
use rusqlite::{Connection, OpenFlags};
use std::path::Path;
use std::sync::Arc;
use vigil_core::RetryConfig;

/// Outcome of a write statement.
#[derive(Debug, Clone, Copy)]
pub struct ExecInfo {
    pub rows_affected: usize,
    pub last_insert_id: i64,
}

/// Shared handle to the SQLite database.
///
/// All access goes through the blocking pool; every call is retried
/// internally on transient errors per the [`RetryConfig`]. Cloning is cheap
/// and clones share the same underlying connection.
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
    retry: RetryConfig,
}

impl Store {
    /// Open (or create) the database at `path`, in WAL mode.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE,
        )?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Self::configure(&conn)?;

        Ok(Self::from_connection(conn))
    }

    /// Open an in-memory database. Useful for tests; WAL does not apply.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::configure(&conn)?;
        Ok(Self::from_connection(conn))
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
            retry: RetryConfig::default(),
        }
    }

    fn configure(conn: &Connection) -> Result<()> {
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(())
    }

    /// Replace the retry configuration.
    pub fn with_retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Run a query and decode every row.
    pub async fn query(&self, sql: impl Into<String>, params: Vec<RowValue>) -> Result<Vec<RowMap>> {
        let sql = sql.into();
        self.run_blocking(move |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();
            let mut rows = stmt.query(rusqlite::params_from_iter(params.iter()))?;
            let mut out = Vec::new();
            while let Some(row) = rows.next()? {
                out.push(decode_row(row, &columns)?);
            }
            Ok(out)
        })
        .await
    }

    /// Run a query expected to produce one row. Absence is
    /// [`StoreError::NotFound`], surfaced without retry.
    pub async fn query_one(&self, sql: impl Into<String>, params: Vec<RowValue>) -> Result<RowMap> {
        let sql = sql.into();
        self.run_blocking(move |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();
            let mut rows = stmt.query(rusqlite::params_from_iter(params.iter()))?;
            match rows.next()? {
                Some(row) => Ok(decode_row(row, &columns)?),
                None => Err(StoreError::NotFound),
            }
        })
        .await
    }

    /// Run a single write statement.
    pub async fn execute(&self, sql: impl Into<String>, params: Vec<RowValue>) -> Result<ExecInfo> {
        let sql = sql.into();
        self.run_blocking(move |conn| {
            let rows_affected = conn.execute(&sql, rusqlite::params_from_iter(params.iter()))?;
            Ok(ExecInfo {
                rows_affected,
                last_insert_id: conn.last_insert_rowid(),
            })
        })
        .await
    }

    /// Run a batch of statements, e.g. schema installation.
    pub async fn execute_batch(&self, sql: impl Into<String>) -> Result<()> {
        let sql = sql.into();
        self.run_blocking(move |conn| {
            conn.execute_batch(&sql)?;
            Ok(())
        })
        .await
    }

    /// Run `body` inside a transaction. The transaction commits if `body`
    /// returns `Ok` and rolls back otherwise. The whole unit is retried on
    /// transient failure, so `body` must be safe to run more than once.
    pub async fn with_txn<T, F>(&self, body: F) -> Result<T>
    where
        T: Send + 'static,
        F: Fn(&rusqlite::Transaction<'_>) -> Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        let cfg = self.retry.clone();
        tokio::task::spawn_blocking(move || {
            retry::run(&cfg, || {
                let mut conn = conn.lock();
                let txn = conn.transaction()?;
                let value = body(&txn)?;
                txn.commit()?;
                Ok(value)
            })
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }

    async fn run_blocking<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: Fn(&Connection) -> Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        let cfg = self.retry.clone();
        tokio::task::spawn_blocking(move || {
            retry::run(&cfg, || {
                let conn = conn.lock();
                op(&conn)
            })
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }
}
