//! Keyspace backed by one SQLite table.
//!
//! Keys and values are stored as their JSON text. `set` replaces the row in
//! place, so repeated cursor writes never grow the table.

use crate::db::Database;
use crate::error::StorageResult;
use crate::keyspace::Keyspace;
use rusqlite::{params, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::marker::PhantomData;

pub struct SqliteKeyspace<K, V> {
    db: Database,
    table: &'static str,
    _marker: PhantomData<fn() -> (K, V)>,
}

impl<K, V> SqliteKeyspace<K, V> {
    /// Bind to `table`, creating it if needed. `table` must be a plain
    /// identifier; it is spliced into the SQL text.
    pub fn open(db: Database, table: &'static str) -> StorageResult<Self> {
        db.with_connection(|conn| {
            conn.execute_batch(&format!(
                "CREATE TABLE IF NOT EXISTS {table} (
                    key   TEXT PRIMARY KEY NOT NULL,
                    value TEXT NOT NULL
                );"
            ))?;
            Ok(())
        })?;
        Ok(Self {
            db,
            table,
            _marker: PhantomData,
        })
    }

    pub fn table(&self) -> &'static str {
        self.table
    }
}

impl<K, V> Keyspace<K, V> for SqliteKeyspace<K, V>
where
    K: Serialize,
    V: Serialize + DeserializeOwned,
{
    fn has(&self, key: &K) -> StorageResult<bool> {
        let key = serde_json::to_string(key)?;
        self.db.with_connection(|conn| {
            let found: bool = conn.query_row(
                &format!("SELECT EXISTS(SELECT 1 FROM {} WHERE key = ?1)", self.table),
                params![key],
                |row| row.get(0),
            )?;
            Ok(found)
        })
    }

    fn get(&self, key: &K) -> StorageResult<Option<V>> {
        let key = serde_json::to_string(key)?;
        let raw: Option<String> = self.db.with_connection(|conn| {
            Ok(conn
                .query_row(
                    &format!("SELECT value FROM {} WHERE key = ?1", self.table),
                    params![key],
                    |row| row.get(0),
                )
                .optional()?)
        })?;
        match raw {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    fn set(&self, key: K, value: V) -> StorageResult<()> {
        let key = serde_json::to_string(&key)?;
        let value = serde_json::to_string(&value)?;
        self.db.with_connection(|conn| {
            conn.execute(
                &format!(
                    "INSERT OR REPLACE INTO {} (key, value) VALUES (?1, ?2)",
                    self.table
                ),
                params![key, value],
            )?;
            Ok(())
        })
    }

    fn len(&self) -> StorageResult<usize> {
        self.db.with_connection(|conn| {
            let count: i64 = conn.query_row(
                &format!("SELECT COUNT(*) FROM {}", self.table),
                [],
                |row| row.get(0),
            )?;
            Ok(usize::try_from(count).unwrap_or_default())
        })
    }
}
