use super::config::PROGRESS_LOG_STEP;
use super::pool::WorkerPool;
use crate::error::IndexerResult;
use crate::rpc::{LedgerClient, RpcTransport};
use containers::{Commitment, Receipt, Signature};
use metrics::SharedMetrics;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use storage::IndexStore;
use tracing::debug;

/// Resolves signatures to receipts on the shared worker pool.
///
/// Each receipt is written to the store as soon as it arrives, so an
/// abandoned cycle keeps everything fetched before the failure.
pub struct ReceiptFetcher<T: RpcTransport> {
    client: Arc<LedgerClient<T>>,
    store: IndexStore,
    pool: Arc<WorkerPool>,
    commitment: Commitment,
    metrics: SharedMetrics,
}

impl<T: RpcTransport> ReceiptFetcher<T> {
    pub fn new(
        client: Arc<LedgerClient<T>>,
        store: IndexStore,
        pool: Arc<WorkerPool>,
        commitment: Commitment,
        metrics: SharedMetrics,
    ) -> Self {
        Self {
            client,
            store,
            pool,
            commitment,
            metrics,
        }
    }

    /// Fetch and store receipts for `signatures`.
    ///
    /// Signatures that already have a stored receipt are skipped without a
    /// remote call. Returns the receipts fetched by this call.
    pub async fn fetch_all(
        &self,
        signatures: &[Signature],
    ) -> IndexerResult<HashMap<Signature, Receipt>> {
        let mut queued = HashSet::new();
        let mut todo = Vec::with_capacity(signatures.len());
        for signature in signatures {
            if !self.store.has_receipt(signature)? && queued.insert(signature) {
                todo.push(signature.clone());
            }
        }
        if todo.is_empty() {
            return Ok(HashMap::new());
        }

        let total = todo.len();
        debug!(total, workers = self.pool.workers(), "Fetching receipts");

        // Owned by this invocation; every worker in the phase shares it.
        let progress = Arc::new(AtomicUsize::new(0));

        let results = self
            .pool
            .run_all(todo, |signature| {
                let client = Arc::clone(&self.client);
                let store = self.store.clone();
                let metrics = Arc::clone(&self.metrics);
                let progress = Arc::clone(&progress);
                let commitment = self.commitment;
                async move {
                    let receipt = client.get_transaction(&signature, commitment).await?;
                    store.put_receipt(signature.clone(), receipt.clone())?;
                    metrics.inc_receipts_fetched();

                    let done = progress.fetch_add(1, Ordering::Relaxed) + 1;
                    if done % PROGRESS_LOG_STEP == 0 {
                        debug!(done, total, "Receipt fetch progress");
                    }
                    IndexerResult::Ok((signature, receipt))
                }
            })
            .await?;

        let mut fetched = HashMap::with_capacity(results.len());
        let mut first_error = None;
        for result in results {
            match result {
                Ok((signature, receipt)) => {
                    fetched.insert(signature, receipt);
                }
                Err(err) => {
                    if first_error.is_none() {
                        first_error = Some(err);
                    }
                }
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(fetched),
        }
    }
}
