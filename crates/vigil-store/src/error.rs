use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    /// A query expecting a row found none. Never retried; callers that treat
    /// absence as data (rather than failure) match on this variant.
    #[error("not found")]
    NotFound,

    #[error("sqlite error: {0}")]
    Sqlite(#[source] rusqlite::Error),

    /// The retry loop gave up. Carries the last underlying error.
    #[error("unable to complete request after {attempts} attempts: {source}")]
    ExhaustedRetries {
        attempts: usize,
        #[source]
        source: Box<StoreError>,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A blocking task failed to run to completion.
    #[error("store task failed: {0}")]
    Task(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
            other => StoreError::Sqlite(other),
        }
    }
}

/// Error strings the driver reports for conditions that are safe to retry.
const TRANSIENT_NEEDLES: &[&str] = &[
    "database is locked",
    "cannot start a transaction within a transaction",
    "bad connection",
    "checkpoint in progress",
];

impl StoreError {
    /// True if the interaction can be safely retried.
    pub fn is_transient(&self) -> bool {
        let StoreError::Sqlite(err) = self else {
            return false;
        };

        if let rusqlite::Error::SqliteFailure(failure, _) = err {
            if matches!(
                failure.code,
                rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
            ) {
                return true;
            }
        }

        let message = err.to_string();
        TRANSIENT_NEEDLES
            .iter()
            .any(|needle| message.contains(needle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sqlite_failure(code: std::os::raw::c_int, message: &str) -> StoreError {
        StoreError::Sqlite(rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(code),
            Some(message.to_string()),
        ))
    }

    #[test]
    fn busy_and_locked_are_transient() {
        assert!(sqlite_failure(rusqlite::ffi::SQLITE_BUSY, "database is locked").is_transient());
        assert!(
            sqlite_failure(rusqlite::ffi::SQLITE_LOCKED, "database table is locked").is_transient()
        );
    }

    #[test]
    fn transient_message_needles() {
        let err = sqlite_failure(
            rusqlite::ffi::SQLITE_ERROR,
            "cannot start a transaction within a transaction",
        );
        assert!(err.is_transient());

        let err = sqlite_failure(rusqlite::ffi::SQLITE_ERROR, "checkpoint in progress");
        assert!(err.is_transient());
    }

    #[test]
    fn not_found_is_not_transient() {
        assert!(!StoreError::NotFound.is_transient());
    }

    #[test]
    fn no_rows_maps_to_not_found() {
        let err: StoreError = rusqlite::Error::QueryReturnedNoRows.into();
        assert!(matches!(err, StoreError::NotFound));
    }

    #[test]
    fn constraint_violation_is_not_transient() {
        let err = sqlite_failure(rusqlite::ffi::SQLITE_CONSTRAINT, "UNIQUE constraint failed");
        assert!(!err.is_transient());
    }
}
