use super::block_window::BlockWindowSyncer;
use super::config::SyncConfig;
use super::consumer::TransactionConsumer;
use super::fetcher::ReceiptFetcher;
use super::pool::WorkerPool;
use super::reconcile::reconcile;
use super::scanner::SignatureScanner;
use super::states::SyncHealth;
use crate::error::{IndexerError, IndexerResult};
use crate::rpc::{LedgerClient, RpcTransport};
use containers::{Signature, Slot, StartSlot};
use metrics::SharedMetrics;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use storage::store::{LAST_BLOCK_KEY, LAST_SLOT_KEY};
use storage::IndexStore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Sync service driving the indexing cycle.
///
/// One cycle runs, in order:
/// 1. Scan the address history back to the transaction cursor
/// 2. Fetch receipts for signatures the store does not have
/// 3. Reconcile the scanned order with the order retained from earlier cycles
/// 4. Persist the transaction cursor and retained order
/// 5. Advance the block-hash index one window and persist its cursor
/// 6. Hand the retained order and its receipts to the consumer
///
/// `run` repeats cycles until cancelled. A cycle that fails on a transient
/// error is abandoned and the next one starts over from the persisted
/// cursors; sub-steps are idempotent so nothing is corrupted or lost.
/// Non-transient errors stop the loop.
pub struct SyncService<T: RpcTransport, C: TransactionConsumer> {
    config: SyncConfig,
    client: Arc<LedgerClient<T>>,
    store: IndexStore,
    scanner: SignatureScanner<T>,
    fetcher: ReceiptFetcher<T>,
    block_window: BlockWindowSyncer<T>,
    consumer: C,
    metrics: SharedMetrics,
    cancel: CancellationToken,

    started: bool,
    last_slot: Slot,
    last_block: Slot,
    /// Signatures handed to the consumer and not yet drained, newest first.
    pending_order: Vec<Signature>,
    health: SyncHealth,
    cycles_ok: u64,
    cycles_failed: u64,
}

/// What one successful cycle did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub scanned: usize,
    pub fetched: usize,
    pub last_slot: Slot,
    pub last_block: Slot,
    pub block_hashes: usize,
    pub handed_off: usize,
    pub drained: usize,
}

impl<T: RpcTransport, C: TransactionConsumer> SyncService<T, C> {
    /// Build a service with its own worker pool. Must be called inside a
    /// tokio runtime.
    pub fn new(
        config: SyncConfig,
        transport: T,
        store: IndexStore,
        consumer: C,
        metrics: SharedMetrics,
        cancel: CancellationToken,
    ) -> IndexerResult<Self> {
        let pool = Arc::new(WorkerPool::new(config.parallel_requests));
        Self::with_pool(config, transport, store, consumer, pool, metrics, cancel)
    }

    /// Build a service on an existing worker pool.
    pub fn with_pool(
        config: SyncConfig,
        transport: T,
        store: IndexStore,
        consumer: C,
        pool: Arc<WorkerPool>,
        metrics: SharedMetrics,
        cancel: CancellationToken,
    ) -> IndexerResult<Self> {
        config.validate()?;

        let client = Arc::new(LedgerClient::new(
            transport,
            config.retry.clone(),
            cancel.clone(),
            Arc::clone(&metrics),
        ));
        let scanner = SignatureScanner::new(
            Arc::clone(&client),
            store.clone(),
            config.chain.clone(),
            Arc::clone(&metrics),
        );
        let fetcher = ReceiptFetcher::new(
            Arc::clone(&client),
            store.clone(),
            Arc::clone(&pool),
            config.chain.fetch_commitment,
            Arc::clone(&metrics),
        );
        let block_window = BlockWindowSyncer::new(
            Arc::clone(&client),
            store.clone(),
            pool,
            config.chain.clone(),
            config.window_size(),
            Arc::clone(&metrics),
        );

        Ok(Self {
            config,
            client,
            store,
            scanner,
            fetcher,
            block_window,
            consumer,
            metrics,
            cancel,
            started: false,
            last_slot: Slot::ZERO,
            last_block: Slot::ZERO,
            pending_order: Vec::new(),
            health: SyncHealth::default(),
            cycles_ok: 0,
            cycles_failed: 0,
        })
    }

    /// Load cursors and the retained order, applying the start-slot policy.
    ///
    /// Runs once; `run_cycle` calls it if needed.
    pub async fn start(&mut self) -> IndexerResult<()> {
        self.store.ensure_cursor(LAST_SLOT_KEY)?;
        self.store.ensure_cursor(LAST_BLOCK_KEY)?;

        let persisted = self.store.last_slot()?;
        let last_slot = match self.config.start_slot {
            StartSlot::Continue => persisted,
            StartSlot::Latest => {
                self.client
                    .get_slot(self.config.chain.start_commitment)
                    .await?
            }
            StartSlot::Exact(slot) => slot,
        };
        if last_slot != persisted {
            info!(
                policy = %self.config.start_slot,
                persisted = persisted.0,
                start = last_slot.0,
                "Overriding persisted transaction cursor"
            );
            self.store.set_last_slot(last_slot)?;
        }

        self.last_slot = last_slot;
        self.last_block = self.store.last_block()?;
        self.pending_order = self.store.pending_order()?;
        self.started = true;
        self.publish_progress();

        info!(
            address = %self.config.address,
            last_slot = self.last_slot.0,
            last_block = self.last_block.0,
            pending = self.pending_order.len(),
            "Sync service started"
        );
        Ok(())
    }

    /// Run one full cycle. See the type docs for the phase order.
    pub async fn run_cycle(&mut self) -> IndexerResult<CycleReport> {
        if !self.started {
            self.start().await?;
        }
        self.checkpoint()?;

        let cycle_last_slot = self.last_slot;
        debug!(last_slot = cycle_last_slot.0, "Start indexing");
        let scan = self
            .scanner
            .scan(&self.config.address, cycle_last_slot)
            .await?;
        self.checkpoint()?;

        let fetched = self.fetcher.fetch_all(&scan.unknown).await?;
        self.checkpoint()?;

        let scanned = scan.ordered.len();
        let combined = reconcile(scan.ordered, self.pending_order.clone());
        let new_last_slot = checked_advance(LAST_SLOT_KEY, cycle_last_slot, scan.max_slot_seen)?;
        self.store.set_pending_order(&combined)?;
        self.store.set_last_slot(new_last_slot)?;
        self.pending_order = combined;
        self.last_slot = new_last_slot;
        self.checkpoint()?;

        let last_block = self.store.last_block()?;
        let advance = self.block_window.advance(last_block).await?;
        let new_last_block = checked_advance(LAST_BLOCK_KEY, last_block, advance.new_last_block)?;
        self.store.set_last_block(new_last_block)?;
        self.last_block = new_last_block;
        self.checkpoint()?;

        let (handed_off, drained) = self.hand_off().await?;
        self.publish_progress();

        Ok(CycleReport {
            scanned,
            fetched: fetched.len(),
            last_slot: self.last_slot,
            last_block: self.last_block,
            block_hashes: advance.hashes.len(),
            handed_off,
            drained,
        })
    }

    /// Run cycles until cancelled or a non-transient error occurs.
    pub async fn run(&mut self) -> IndexerResult<()> {
        loop {
            if self.cancel.is_cancelled() {
                info!("Sync loop cancelled");
                return Ok(());
            }

            let started = Instant::now();
            let outcome = self.run_cycle().await;
            self.metrics
                .observe_cycle_duration(started.elapsed().as_secs_f64());

            match outcome {
                Ok(report) => {
                    self.cycles_ok += 1;
                    self.metrics.inc_cycles("ok");
                    self.set_health(SyncHealth::Healthy);
                    info!(
                        scanned = report.scanned,
                        fetched = report.fetched,
                        last_slot = report.last_slot.0,
                        last_block = report.last_block.0,
                        block_hashes = report.block_hashes,
                        handed_off = report.handed_off,
                        drained = report.drained,
                        "Sync cycle complete"
                    );
                }
                Err(err) if err.is_cancelled() => {
                    info!("Sync loop cancelled mid-cycle");
                    return Ok(());
                }
                Err(err) if err.is_transient() => {
                    self.cycles_failed += 1;
                    self.metrics.inc_cycles("failed");
                    self.set_health(SyncHealth::Degraded);
                    warn!(error = %err, "Sync cycle abandoned, retrying from persisted cursors");
                }
                Err(err) => {
                    self.metrics.inc_cycles("fatal");
                    error!(error = %err, "Sync loop stopped on unrecoverable error");
                    return Err(err);
                }
            }

            if !self.config.cycle_interval.is_zero() {
                tokio::select! {
                    _ = self.cancel.cancelled() => {
                        info!("Sync loop cancelled");
                        return Ok(());
                    }
                    _ = tokio::time::sleep(self.config.cycle_interval) => {}
                }
            }
        }
    }

    async fn hand_off(&mut self) -> IndexerResult<(usize, usize)> {
        let mut receipts = HashMap::with_capacity(self.pending_order.len());
        for signature in &self.pending_order {
            if let Some(receipt) = self.store.receipt(signature)? {
                receipts.insert(signature.clone(), receipt);
            }
        }

        let handed_off = self.pending_order.len();
        let drained = self
            .consumer
            .on_new_transactions(&self.pending_order, &receipts)
            .await
            .map_err(IndexerError::Consumer)?
            .min(handed_off);

        if drained > 0 {
            self.pending_order.truncate(handed_off - drained);
            self.store.set_pending_order(&self.pending_order)?;
        }
        Ok((handed_off, drained))
    }

    fn checkpoint(&self) -> IndexerResult<()> {
        if self.cancel.is_cancelled() {
            return Err(IndexerError::Cancelled);
        }
        Ok(())
    }

    fn set_health(&mut self, target: SyncHealth) {
        if target == self.health {
            return;
        }
        if !self.health.can_transition_to(target) {
            warn!(from = ?self.health, to = ?target, "Invalid health transition attempted");
            return;
        }
        match target {
            SyncHealth::Degraded => warn!("Sync degraded"),
            _ => info!(from = ?self.health, "Sync healthy"),
        }
        self.health = target;
        self.metrics.set_healthy(target.is_healthy());
    }

    fn publish_progress(&self) {
        self.metrics.set_last_slot(self.last_slot.0);
        self.metrics.set_last_block(self.last_block.0);
        self.metrics.set_pending_order_len(self.pending_order.len());
    }

    pub fn health(&self) -> SyncHealth {
        self.health
    }

    pub fn last_slot(&self) -> Slot {
        self.last_slot
    }

    pub fn last_block(&self) -> Slot {
        self.last_block
    }

    pub fn pending_order(&self) -> &[Signature] {
        &self.pending_order
    }

    pub fn store(&self) -> &IndexStore {
        &self.store
    }

    pub fn consumer(&self) -> &C {
        &self.consumer
    }

    pub fn consumer_mut(&mut self) -> &mut C {
        &mut self.consumer
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn stats(&self) -> SyncStats {
        SyncStats {
            health: self.health,
            last_slot: self.last_slot,
            last_block: self.last_block,
            pending_order: self.pending_order.len(),
            cycles_ok: self.cycles_ok,
            cycles_failed: self.cycles_failed,
        }
    }
}

fn checked_advance(name: &'static str, from: Slot, to: Slot) -> IndexerResult<Slot> {
    if to < from {
        return Err(IndexerError::CursorRegression { name, from, to });
    }
    Ok(to)
}

/// Statistics about the sync service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncStats {
    pub health: SyncHealth,
    pub last_slot: Slot,
    pub last_block: Slot,
    pub pending_order: usize,
    pub cycles_ok: u64,
    pub cycles_failed: u64,
}
