use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),
}

impl StorageError {
    /// Failures a later attempt can get past: I/O, pool checkout timeouts and
    /// a database held by another writer. Everything else means bad data or
    /// a broken schema.
    pub fn is_transient(&self) -> bool {
        match self {
            StorageError::Io(_) | StorageError::Pool(_) => true,
            StorageError::Sqlite(rusqlite::Error::SqliteFailure(err, _)) => matches!(
                err.code,
                rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
            ),
            StorageError::Sqlite(_) | StorageError::Serialization(_) => false,
        }
    }
}

pub type StorageResult<T> = Result<T, StorageError>;
