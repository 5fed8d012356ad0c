//! Pooled SQLite handle shared by every keyspace of one store.

use crate::error::StorageResult;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;
use std::path::Path;
use tracing::debug;

pub type PooledConnection = r2d2::PooledConnection<SqliteConnectionManager>;

/// Clones share the pool.
#[derive(Clone)]
pub struct Database {
    pool: Pool<SqliteConnectionManager>,
}

impl Database {
    /// Open or create the database file, creating parent directories.
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        // A commit is on disk once `set` returns.
        let manager = SqliteConnectionManager::file(path)
            .with_init(|conn| conn.execute_batch("PRAGMA synchronous = FULL;"));
        let pool = Pool::builder().max_size(8).build(manager)?;

        let db = Self { pool };
        db.with_connection(|conn| {
            conn.execute_batch("PRAGMA journal_mode = WAL;")?;
            Ok(())
        })?;
        debug!(path = %path.display(), "Opened index database");
        Ok(db)
    }

    /// In-memory database. One connection, since each in-memory connection
    /// is its own database.
    pub fn open_in_memory() -> StorageResult<Self> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder().max_size(1).build(manager)?;
        Ok(Self { pool })
    }

    pub fn connection(&self) -> StorageResult<PooledConnection> {
        Ok(self.pool.get()?)
    }

    pub fn with_connection<T, F>(&self, f: F) -> StorageResult<T>
    where
        F: FnOnce(&Connection) -> StorageResult<T>,
    {
        let conn = self.connection()?;
        f(&conn)
    }
}
