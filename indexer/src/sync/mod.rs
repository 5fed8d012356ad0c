pub mod block_window;
/// Sync engine for the ledger indexer.
///
/// Keeps a local index of one address's transaction history and of block
/// hashes in step with a remote ledger. It includes:
///
/// - **Signature Scanner**: Crawls the address history back to the transaction cursor
/// - **Receipt Fetcher**: Resolves unknown signatures to receipts on the worker pool
/// - **Reconciler**: Merges each cycle's order with the order still held for the consumer
/// - **Block Window**: Indexes block hashes one bounded window of slots per cycle
/// - **Sync Service**: Runs the cycle, persists cursors and manages health
///
/// ## Cycle
///
/// 1. Scan newest-first until the history reaches the transaction cursor
/// 2. Fetch receipts for signatures not yet stored
/// 3. Reconcile with the retained order and persist both cursors' inputs
/// 4. Advance the block-hash cursor one window
/// 5. Hand the retained order to the consumer, drop what it drained
///
/// ## Health
///
/// - **Starting**: No cycle has finished yet
/// - **Healthy**: The last cycle completed
/// - **Degraded**: The last cycle was abandoned and will be re-run
pub mod config;
pub mod consumer;
pub mod fetcher;
pub mod pool;
pub mod reconcile;
pub mod scanner;
pub mod service;
pub mod states;

pub use block_window::{BlockAdvance, BlockWindowSyncer};
pub use config::*;
pub use consumer::{DrainAll, TransactionConsumer};
pub use fetcher::ReceiptFetcher;
pub use pool::WorkerPool;
pub use reconcile::reconcile;
pub use scanner::{ScanOutcome, SignatureScanner};
pub use service::{CycleReport, SyncService, SyncStats};
pub use states::SyncHealth;

#[cfg(test)]
mod tests;
