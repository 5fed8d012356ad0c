//! Key-value contract consumed by the indexer.
//!
//! Each keyspace only needs presence checks, point reads and point writes.
//! Writes are per key; nothing here spans keys.

use crate::error::StorageResult;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::hash::Hash;

pub trait Keyspace<K, V>: Send + Sync {
    fn has(&self, key: &K) -> StorageResult<bool>;

    fn get(&self, key: &K) -> StorageResult<Option<V>>;

    fn set(&self, key: K, value: V) -> StorageResult<()>;

    fn len(&self) -> StorageResult<usize>;

    fn is_empty(&self) -> StorageResult<bool> {
        Ok(self.len()? == 0)
    }
}

/// Volatile keyspace for tests and dry runs.
#[derive(Debug)]
pub struct MemoryKeyspace<K, V> {
    entries: RwLock<HashMap<K, V>>,
}

impl<K, V> MemoryKeyspace<K, V> {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }
}

impl<K, V> Default for MemoryKeyspace<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> Keyspace<K, V> for MemoryKeyspace<K, V>
where
    K: Eq + Hash + Send + Sync,
    V: Clone + Send + Sync,
{
    fn has(&self, key: &K) -> StorageResult<bool> {
        Ok(self.entries.read().contains_key(key))
    }

    fn get(&self, key: &K) -> StorageResult<Option<V>> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn set(&self, key: K, value: V) -> StorageResult<()> {
        self.entries.write().insert(key, value);
        Ok(())
    }

    fn len(&self) -> StorageResult<usize> {
        Ok(self.entries.read().len())
    }
}
