//! Durable keyed storage for the indexer: receipts by signature, block slots
//! by block hash, and named constants (cursors, retained order).

pub mod db;
pub mod error;
pub mod keyspace;
pub mod sqlite;
pub mod store;

pub use db::Database;
pub use error::{StorageError, StorageResult};
pub use keyspace::{Keyspace, MemoryKeyspace};
pub use sqlite::SqliteKeyspace;
pub use store::IndexStore;
