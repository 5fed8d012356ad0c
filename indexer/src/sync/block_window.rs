use super::pool::WorkerPool;
use crate::error::IndexerResult;
use crate::rpc::{LedgerClient, RpcTransport};
use chain::ChainConfig;
use containers::{BlockHash, Slot};
use metrics::SharedMetrics;
use std::collections::HashMap;
use std::sync::Arc;
use storage::IndexStore;
use tracing::debug;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockAdvance {
    /// Cursor value to persist; never below the input cursor.
    pub new_last_block: Slot,
    pub hashes: HashMap<BlockHash, Slot>,
    /// Half-open slot range requested from the remote, if any.
    pub requested: Option<(Slot, Slot)>,
}

/// Advances the block-hash index one bounded window per call.
pub struct BlockWindowSyncer<T: RpcTransport> {
    client: Arc<LedgerClient<T>>,
    store: IndexStore,
    pool: Arc<WorkerPool>,
    chain: ChainConfig,
    window_size: u64,
    metrics: SharedMetrics,
}

impl<T: RpcTransport> BlockWindowSyncer<T> {
    pub fn new(
        client: Arc<LedgerClient<T>>,
        store: IndexStore,
        pool: Arc<WorkerPool>,
        chain: ChainConfig,
        window_size: u64,
        metrics: SharedMetrics,
    ) -> Self {
        Self {
            client,
            store,
            pool,
            chain,
            window_size,
            metrics,
        }
    }

    pub fn window_size(&self) -> u64 {
        self.window_size
    }

    /// Index block hashes for slots in `[last_block, min(head, last_block + window))`.
    ///
    /// Hashes are written as they resolve. The returned cursor moves to the
    /// end of the window even when the range held no produced blocks.
    pub async fn advance(&self, last_block: Slot) -> IndexerResult<BlockAdvance> {
        let head = self.client.get_slot(self.chain.head_commitment).await?;
        let max_slot = head.min(last_block.saturating_add(self.window_size));

        // Remote head at or behind the cursor: nothing to do this cycle.
        let Some(end) = max_slot.prev().filter(|end| *end >= last_block) else {
            debug!(last_block = last_block.0, head = head.0, "Block index up to date");
            return Ok(BlockAdvance {
                new_last_block: last_block,
                ..BlockAdvance::default()
            });
        };

        let mut slots = self
            .client
            .get_blocks(last_block, end, self.chain.fetch_commitment)
            .await?;
        slots.retain(|slot| *slot >= last_block && *slot < max_slot);
        slots.dedup();

        debug!(
            from = last_block.0,
            to = max_slot.0,
            blocks = slots.len(),
            "Resolving block hashes"
        );

        let commitment = self.chain.fetch_commitment;
        let results = self
            .pool
            .run_all(slots, |slot| {
                let client = Arc::clone(&self.client);
                let store = self.store.clone();
                async move {
                    let hash = client.get_block_hash(slot, commitment).await?;
                    store.put_block_hash(hash, slot)?;
                    IndexerResult::Ok((hash, slot))
                }
            })
            .await?;

        let mut hashes = HashMap::with_capacity(results.len());
        for result in results {
            let (hash, slot) = result?;
            hashes.insert(hash, slot);
        }
        self.metrics.inc_block_hashes_indexed(hashes.len() as u64);

        Ok(BlockAdvance {
            new_last_block: max_slot,
            hashes,
            requested: Some((last_block, max_slot)),
        })
    }
}
