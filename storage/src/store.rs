use crate::db::Database;
use crate::error::StorageResult;
use crate::keyspace::{Keyspace, MemoryKeyspace};
use crate::sqlite::SqliteKeyspace;
use containers::{BlockHash, Receipt, Signature, Slot};
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;

pub const LAST_SLOT_KEY: &str = "lastSlot";
pub const LAST_BLOCK_KEY: &str = "lastBlock";
pub const PENDING_ORDER_KEY: &str = "pendingOrder";
pub const LATEST_PROCESSED_SLOT_KEY: &str = "latestProcessedSlot";

pub const DATABASE_FILE: &str = "index.db";

pub const RECEIPTS_TABLE: &str = "receipts";
pub const BLOCK_HASHES_TABLE: &str = "block_hashes";
pub const CONSTANTS_TABLE: &str = "constants";

pub type ReceiptSpace = Arc<dyn Keyspace<Signature, Receipt>>;
pub type BlockHashSpace = Arc<dyn Keyspace<BlockHash, Slot>>;
pub type ConstantSpace = Arc<dyn Keyspace<String, Value>>;

/// The three keyspaces the indexer writes, with typed accessors.
///
/// Cheap to clone; clones share the same backing keyspaces.
#[derive(Clone)]
pub struct IndexStore {
    receipts: ReceiptSpace,
    block_hashes: BlockHashSpace,
    constants: ConstantSpace,
}

impl IndexStore {
    pub fn new(receipts: ReceiptSpace, block_hashes: BlockHashSpace, constants: ConstantSpace) -> Self {
        Self {
            receipts,
            block_hashes,
            constants,
        }
    }

    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(MemoryKeyspace::new()),
            Arc::new(MemoryKeyspace::new()),
            Arc::new(MemoryKeyspace::new()),
        )
    }

    /// Open (or create) the SQLite database `index.db` under `dir`.
    pub fn open(dir: impl AsRef<Path>) -> StorageResult<Self> {
        Self::open_database(Database::open(dir.as_ref().join(DATABASE_FILE))?)
    }

    /// Bind the three keyspaces to tables of an already open database.
    pub fn open_database(db: Database) -> StorageResult<Self> {
        Ok(Self::new(
            Arc::new(SqliteKeyspace::open(db.clone(), RECEIPTS_TABLE)?),
            Arc::new(SqliteKeyspace::open(db.clone(), BLOCK_HASHES_TABLE)?),
            Arc::new(SqliteKeyspace::open(db, CONSTANTS_TABLE)?),
        ))
    }

    // Receipts

    pub fn has_receipt(&self, signature: &Signature) -> StorageResult<bool> {
        self.receipts.has(signature)
    }

    pub fn receipt(&self, signature: &Signature) -> StorageResult<Option<Receipt>> {
        self.receipts.get(signature)
    }

    /// Store a receipt unless one is already present.
    ///
    /// Returns `true` if the receipt was written.
    pub fn put_receipt(&self, signature: Signature, receipt: Receipt) -> StorageResult<bool> {
        if self.receipts.has(&signature)? {
            return Ok(false);
        }
        self.receipts.set(signature, receipt)?;
        Ok(true)
    }

    pub fn receipt_count(&self) -> StorageResult<usize> {
        self.receipts.len()
    }

    // Block hashes

    pub fn put_block_hash(&self, hash: BlockHash, slot: Slot) -> StorageResult<()> {
        self.block_hashes.set(hash, slot)
    }

    pub fn slot_of_block(&self, hash: &BlockHash) -> StorageResult<Option<Slot>> {
        self.block_hashes.get(hash)
    }

    pub fn block_hash_count(&self) -> StorageResult<usize> {
        self.block_hashes.len()
    }

    // Constants

    /// Read a slot-valued constant, defaulting to 0 when absent.
    pub fn cursor(&self, key: &str) -> StorageResult<Slot> {
        let value = self.constants.get(&key.to_string())?;
        Ok(match value {
            Some(value) => serde_json::from_value(value)?,
            None => Slot::ZERO,
        })
    }

    pub fn set_cursor(&self, key: &str, slot: Slot) -> StorageResult<()> {
        self.constants.set(key.to_string(), serde_json::to_value(slot)?)
    }

    /// Create a cursor at 0 if it has never been written.
    pub fn ensure_cursor(&self, key: &str) -> StorageResult<()> {
        if !self.constants.has(&key.to_string())? {
            self.set_cursor(key, Slot::ZERO)?;
        }
        Ok(())
    }

    pub fn last_slot(&self) -> StorageResult<Slot> {
        self.cursor(LAST_SLOT_KEY)
    }

    pub fn set_last_slot(&self, slot: Slot) -> StorageResult<()> {
        self.set_cursor(LAST_SLOT_KEY, slot)
    }

    pub fn last_block(&self) -> StorageResult<Slot> {
        self.cursor(LAST_BLOCK_KEY)
    }

    pub fn set_last_block(&self, slot: Slot) -> StorageResult<()> {
        self.set_cursor(LAST_BLOCK_KEY, slot)
    }

    pub fn latest_processed_slot(&self) -> StorageResult<Slot> {
        self.cursor(LATEST_PROCESSED_SLOT_KEY)
    }

    pub fn set_latest_processed_slot(&self, slot: Slot) -> StorageResult<()> {
        self.set_cursor(LATEST_PROCESSED_SLOT_KEY, slot)
    }

    /// Retained, not yet drained signature order from earlier cycles.
    pub fn pending_order(&self) -> StorageResult<Vec<Signature>> {
        let value = self.constants.get(&PENDING_ORDER_KEY.to_string())?;
        Ok(match value {
            Some(value) => serde_json::from_value(value)?,
            None => Vec::new(),
        })
    }

    pub fn set_pending_order(&self, order: &[Signature]) -> StorageResult<()> {
        self.constants
            .set(PENDING_ORDER_KEY.to_string(), serde_json::to_value(order)?)
    }
}
