pub mod server;

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};
use std::sync::Arc;

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    // Cursors
    last_slot: IntGauge,
    last_block: IntGauge,
    remote_slot: IntGauge,
    pending_order_len: IntGauge,
    // Cycles
    cycles: IntCounterVec,
    cycle_duration: HistogramVec,
    healthy: IntGauge,
    // Work
    signatures_scanned: IntCounterVec,
    receipts_fetched: IntCounterVec,
    block_hashes_indexed: IntCounterVec,
    // Remote
    rpc_retries: IntCounterVec,
    rpc_exhausted: IntCounterVec,
}

impl Metrics {
    pub fn new() -> Self {
        // Metric names and label sets are static, so construction cannot fail.
        Self::try_new().expect("static metric definitions are valid")
    }

    fn try_new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let last_slot = IntGauge::with_opts(Opts::new(
            "indexer_last_slot",
            "Highest slot whose transactions are fully indexed",
        ))?;
        registry.register(Box::new(last_slot.clone()))?;

        let last_block = IntGauge::with_opts(Opts::new(
            "indexer_last_block",
            "Slot up to which block hashes are indexed",
        ))?;
        registry.register(Box::new(last_block.clone()))?;

        let remote_slot = IntGauge::with_opts(Opts::new(
            "indexer_remote_slot",
            "Current slot reported by the remote ledger",
        ))?;
        registry.register(Box::new(remote_slot.clone()))?;

        let pending_order_len = IntGauge::with_opts(Opts::new(
            "indexer_pending_order_length",
            "Signatures retained for the consumer and not yet drained",
        ))?;
        registry.register(Box::new(pending_order_len.clone()))?;

        let cycles = IntCounterVec::new(
            Opts::new("indexer_cycles_total", "Total number of sync cycles"),
            &["result"],
        )?;
        registry.register(Box::new(cycles.clone()))?;

        let cycle_duration = HistogramVec::new(
            HistogramOpts::new("indexer_cycle_duration_seconds", "Time taken by one sync cycle")
                .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0]),
            &[],
        )?;
        registry.register(Box::new(cycle_duration.clone()))?;

        let healthy = IntGauge::with_opts(Opts::new(
            "indexer_healthy",
            "1 when the last cycle succeeded, 0 when degraded",
        ))?;
        registry.register(Box::new(healthy.clone()))?;

        let signatures_scanned = IntCounterVec::new(
            Opts::new("indexer_signatures_scanned_total", "Signatures seen while scanning"),
            &["kind"],
        )?;
        registry.register(Box::new(signatures_scanned.clone()))?;

        let receipts_fetched = IntCounterVec::new(
            Opts::new("indexer_receipts_fetched_total", "Receipts fetched and stored"),
            &[],
        )?;
        registry.register(Box::new(receipts_fetched.clone()))?;

        let block_hashes_indexed = IntCounterVec::new(
            Opts::new("indexer_block_hashes_indexed_total", "Block hashes written to the index"),
            &[],
        )?;
        registry.register(Box::new(block_hashes_indexed.clone()))?;

        let rpc_retries = IntCounterVec::new(
            Opts::new("indexer_rpc_retries_total", "Failed remote calls that were retried"),
            &["method"],
        )?;
        registry.register(Box::new(rpc_retries.clone()))?;

        let rpc_exhausted = IntCounterVec::new(
            Opts::new(
                "indexer_rpc_retries_exhausted_total",
                "Remote calls that gave up after the retry limit",
            ),
            &["method"],
        )?;
        registry.register(Box::new(rpc_exhausted.clone()))?;

        Ok(Self {
            registry,
            last_slot,
            last_block,
            remote_slot,
            pending_order_len,
            cycles,
            cycle_duration,
            healthy,
            signatures_scanned,
            receipts_fetched,
            block_hashes_indexed,
            rpc_retries,
            rpc_exhausted,
        })
    }

    pub fn gather(&self) -> String {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::<u8>::new();
        let encoder = TextEncoder::new();
        if let Err(err) = encoder.encode(&metric_families, &mut buffer) {
            tracing::warn!(error = %err, "failed to encode metrics");
            return String::new();
        }
        String::from_utf8_lossy(&buffer).into_owned()
    }

    // Cursors
    pub fn set_last_slot(&self, v: u64) {
        self.last_slot.set(clamp(v));
    }

    pub fn set_last_block(&self, v: u64) {
        self.last_block.set(clamp(v));
    }

    pub fn set_remote_slot(&self, v: u64) {
        self.remote_slot.set(clamp(v));
    }

    pub fn set_pending_order_len(&self, v: usize) {
        self.pending_order_len.set(v as i64);
    }

    // Cycles
    pub fn inc_cycles(&self, result: &str) {
        self.cycles.with_label_values(&[result]).inc();
    }

    pub fn observe_cycle_duration(&self, duration: f64) {
        self.cycle_duration.with_label_values::<&str>(&[]).observe(duration);
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.set(i64::from(healthy));
    }

    pub fn is_healthy(&self) -> bool {
        self.healthy.get() == 1
    }

    // Work
    pub fn inc_signatures_scanned(&self, kind: &str, count: u64) {
        self.signatures_scanned.with_label_values(&[kind]).inc_by(count);
    }

    pub fn inc_receipts_fetched(&self) {
        self.receipts_fetched.with_label_values::<&str>(&[]).inc();
    }

    pub fn inc_block_hashes_indexed(&self, count: u64) {
        self.block_hashes_indexed
            .with_label_values::<&str>(&[])
            .inc_by(count);
    }

    // Remote
    pub fn inc_rpc_retries(&self, method: &str) {
        self.rpc_retries.with_label_values(&[method]).inc();
    }

    pub fn inc_rpc_exhausted(&self, method: &str) {
        self.rpc_exhausted.with_label_values(&[method]).inc();
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

fn clamp(v: u64) -> i64 {
    i64::try_from(v).unwrap_or(i64::MAX)
}

pub type SharedMetrics = Arc<Metrics>;
