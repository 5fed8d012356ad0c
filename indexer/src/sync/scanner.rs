//! Backward crawl over an address's signature history.
//!
//! Pages newest-first from the remote head down to previously indexed
//! territory, a history-start sentinel, or the end of history. Produces the
//! recency-ordered signature list, the subset without a stored receipt, and
//! the candidate transaction cursor.

use crate::error::IndexerResult;
use crate::rpc::{LedgerClient, RpcTransport};
use chain::ChainConfig;
use containers::{Address, Signature, Slot};
use metrics::SharedMetrics;
use std::collections::HashSet;
use std::sync::Arc;
use storage::IndexStore;
use tracing::debug;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanOutcome {
    /// Newest first, no duplicates.
    pub ordered: Vec<Signature>,
    /// Signatures with no stored receipt, in discovery order.
    pub unknown: Vec<Signature>,
    /// Candidate `lastSlot` for the next cycle.
    pub max_slot_seen: Slot,
    /// Remote head slot the scan started from.
    pub remote_slot: Slot,
    pub pages: usize,
    /// Whether the scan stopped on a history-start sentinel.
    pub reached_history_start: bool,
}

pub struct SignatureScanner<T: RpcTransport> {
    client: Arc<LedgerClient<T>>,
    store: IndexStore,
    chain: ChainConfig,
    metrics: SharedMetrics,
}

impl<T: RpcTransport> SignatureScanner<T> {
    pub fn new(
        client: Arc<LedgerClient<T>>,
        store: IndexStore,
        chain: ChainConfig,
        metrics: SharedMetrics,
    ) -> Self {
        Self {
            client,
            store,
            chain,
            metrics,
        }
    }

    pub async fn scan(&self, address: &Address, last_slot: Slot) -> IndexerResult<ScanOutcome> {
        let remote_slot = self.client.get_slot(self.chain.scan_commitment).await?;

        let mut outcome = ScanOutcome {
            max_slot_seen: last_slot,
            remote_slot,
            ..ScanOutcome::default()
        };
        let mut seen = HashSet::new();
        let mut before: Option<Signature> = None;
        let mut min_slot = remote_slot;

        'pages: loop {
            let page = self
                .client
                .get_signatures_for_address(address, before.as_ref(), self.chain.scan_commitment)
                .await?;
            outcome.pages += 1;
            debug!(page = outcome.pages, len = page.len(), "Fetched signature page");

            if page.is_empty() {
                break;
            }

            let page_cursor = before.clone();
            let page_oldest = page.last().map(|info| info.signature.clone());
            let mut fresh = 0usize;

            for info in page {
                if self.chain.is_history_start(&info.signature) {
                    debug!(signature = %info.signature, "Reached history start");
                    outcome.reached_history_start = true;
                    break 'pages;
                }

                if seen.insert(info.signature.clone()) {
                    fresh += 1;
                    outcome.ordered.push(info.signature.clone());
                    if !self.store.has_receipt(&info.signature)? {
                        outcome.unknown.push(info.signature.clone());
                    }
                }

                // `<=` keeps the cursor on the oldest entry of a same-slot run,
                // so the next page always starts strictly further back.
                if info.slot <= min_slot {
                    min_slot = info.slot;
                    before = Some(info.signature.clone());
                }
                outcome.max_slot_seen = outcome.max_slot_seen.max(info.slot);

                if info.slot < last_slot {
                    break 'pages;
                }
            }

            if fresh == 0 {
                debug!(page = outcome.pages, "Signature page repeated, stopping scan");
                break;
            }
            if before == page_cursor {
                before = page_oldest;
            }
        }

        // Nothing new down to the cursor: everything up to the head is indexed.
        if outcome.unknown.is_empty() {
            outcome.max_slot_seen = outcome.max_slot_seen.max(remote_slot);
        }

        self.metrics
            .inc_signatures_scanned("ordered", outcome.ordered.len() as u64);
        self.metrics
            .inc_signatures_scanned("unknown", outcome.unknown.len() as u64);
        self.metrics.set_remote_slot(remote_slot.0);

        debug!(
            pages = outcome.pages,
            ordered = outcome.ordered.len(),
            unknown = outcome.unknown.len(),
            max_slot = outcome.max_slot_seen.0,
            "Signature scan finished"
        );
        Ok(outcome)
    }
}
