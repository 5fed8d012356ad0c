//! Sync engine configuration constants.
//!
//! Operational parameters for synchronization: parallelism, window size,
//! retry tuning and log throttling.

use crate::error::{IndexerError, IndexerResult};
use crate::rpc::RetryPolicy;
use chain::ChainConfig;
use containers::{Address, StartSlot};
use std::time::Duration;

/// Concurrent remote calls in the fetch and block phases.
pub const DEFAULT_PARALLEL_REQUESTS: usize = 2;

/// Block window per cycle, as a multiple of the parallelism.
pub const BLOCK_WINDOW_MULTIPLE: u64 = 16;

/// Log fetch progress every this many receipts.
pub const PROGRESS_LOG_STEP: usize = 100;

/// Queued jobs allowed per worker before submitters wait.
pub const QUEUE_DEPTH_PER_WORKER: usize = 4;

pub const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 1_000;
pub const DEFAULT_RETRY_MAX_DELAY_MS: u64 = 30_000;
pub const DEFAULT_RETRY_MAX_ATTEMPTS: u32 = 10;

#[derive(Clone, Debug)]
pub struct SyncConfig {
    /// Address whose transaction history is indexed.
    pub address: Address,
    pub parallel_requests: usize,
    pub window_multiple: u64,
    pub start_slot: StartSlot,
    pub retry: RetryPolicy,
    /// Pause between cycles. Zero starts the next cycle immediately.
    pub cycle_interval: Duration,
    pub chain: ChainConfig,
}

impl SyncConfig {
    pub fn new(address: Address) -> Self {
        Self {
            address,
            parallel_requests: DEFAULT_PARALLEL_REQUESTS,
            window_multiple: BLOCK_WINDOW_MULTIPLE,
            start_slot: StartSlot::default(),
            retry: RetryPolicy::default(),
            cycle_interval: Duration::ZERO,
            chain: ChainConfig::default(),
        }
    }

    /// Maximum number of slots one block-sync cycle covers.
    pub fn window_size(&self) -> u64 {
        (self.parallel_requests as u64).saturating_mul(self.window_multiple)
    }

    pub fn validate(&self) -> IndexerResult<()> {
        if self.parallel_requests == 0 {
            return Err(IndexerError::Config(
                "parallel requests must be at least 1".into(),
            ));
        }
        if self.window_multiple == 0 {
            return Err(IndexerError::Config(
                "block window multiple must be at least 1".into(),
            ));
        }
        if self.retry.max_attempts == Some(0) {
            return Err(IndexerError::Config(
                "retry attempts must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
