use super::mock_ledger::{address, chain, fast_retry, metrics, sentinel, sig, MockLedger};
use crate::error::IndexerError;
use crate::rpc::RetryPolicy;
use crate::sync::{SyncConfig, SyncHealth, SyncService, TransactionConsumer};
use async_trait::async_trait;
use containers::{Receipt, Signature, Slot, StartSlot};
use pretty_assertions::assert_eq;
use std::collections::HashMap;
use std::time::Duration;
use storage::IndexStore;
use tokio_util::sync::CancellationToken;

/// Consumer that records every handoff.
#[derive(Default)]
struct RecordingConsumer {
    deliveries: Vec<Vec<Signature>>,
    receipts_seen: Vec<usize>,
    /// Signatures drained per call; `None` drains everything.
    drain: Option<usize>,
    failures: usize,
    cancel_on_delivery: Option<CancellationToken>,
}

impl RecordingConsumer {
    fn draining(drain: usize) -> Self {
        Self {
            drain: Some(drain),
            ..Self::default()
        }
    }
}

#[async_trait]
impl TransactionConsumer for RecordingConsumer {
    async fn on_new_transactions(
        &mut self,
        order: &[Signature],
        receipts: &HashMap<Signature, Receipt>,
    ) -> anyhow::Result<usize> {
        self.deliveries.push(order.to_vec());
        self.receipts_seen.push(receipts.len());
        if self.failures > 0 {
            self.failures -= 1;
            anyhow::bail!("downstream unavailable");
        }
        if let Some(token) = &self.cancel_on_delivery {
            token.cancel();
        }
        Ok(self.drain.unwrap_or(order.len()))
    }
}

fn config() -> SyncConfig {
    SyncConfig {
        retry: fast_retry(),
        chain: chain(),
        ..SyncConfig::new(address())
    }
}

/// `[s5@50, s4@40, s3@30, SENTINEL@5]`, recent head at 60.
fn ledger() -> MockLedger {
    let ledger = MockLedger::new(10);
    ledger
        .push(sentinel(), 5)
        .push(sig(3), 30)
        .push(sig(4), 40)
        .push(sig(5), 50);
    ledger.set_slots(50, 60, 40);
    ledger.produce_blocks((0..200).step_by(3));
    ledger
}

fn service(
    ledger: &MockLedger,
    store: &IndexStore,
    consumer: RecordingConsumer,
    cancel: CancellationToken,
) -> SyncService<MockLedger, RecordingConsumer> {
    SyncService::new(config(), ledger.clone(), store.clone(), consumer, metrics(), cancel).unwrap()
}

#[tokio::test]
async fn test_cycles_hand_off_new_transactions() {
    let ledger = ledger();
    let store = IndexStore::in_memory();
    let mut service = service(&ledger, &store, RecordingConsumer::default(), CancellationToken::new());

    let first = service.run_cycle().await.unwrap();
    assert_eq!(first.scanned, 3);
    assert_eq!(first.fetched, 3);
    assert_eq!(first.last_slot, Slot(50));
    assert_eq!(first.last_block, Slot(32));
    assert_eq!(first.drained, 3);
    assert_eq!(service.consumer().deliveries, vec![vec![sig(5), sig(4), sig(3)]]);
    assert_eq!(service.consumer().receipts_seen, vec![3]);
    assert!(service.pending_order().is_empty());

    ledger.push(sig(6), 60);
    ledger.set_slots(60, 70, 50);

    let second = service.run_cycle().await.unwrap();
    assert_eq!(second.fetched, 1);
    assert_eq!(second.last_slot, Slot(60));
    assert_eq!(second.last_block, Slot(64));
    // The boundary entries come round again; delivery is at-least-once.
    assert_eq!(service.consumer().deliveries[1], vec![sig(6), sig(5), sig(4)]);
    assert_eq!(ledger.calls("getTransaction"), 4);

    assert_eq!(store.last_slot().unwrap(), Slot(60));
    assert_eq!(store.last_block().unwrap(), Slot(64));
    assert_eq!(store.receipt_count().unwrap(), 4);
}

#[tokio::test]
async fn test_idle_cycle_advances_transaction_cursor() {
    let ledger = ledger();
    let store = IndexStore::in_memory();
    let mut service = service(&ledger, &store, RecordingConsumer::default(), CancellationToken::new());

    service.run_cycle().await.unwrap();
    assert_eq!(store.last_slot().unwrap(), Slot(50));

    // Head moves on without any new transaction for the address.
    ledger.set_slots(1000, 1000, 990);
    let report = service.run_cycle().await.unwrap();

    assert_eq!(report.fetched, 0);
    assert_eq!(report.last_slot, Slot(1000));
    assert_eq!(store.last_slot().unwrap(), Slot(1000));
}

#[tokio::test]
async fn test_undrained_order_is_spliced_with_new_scan() {
    let ledger = ledger();
    let store = IndexStore::in_memory();
    let mut service = service(&ledger, &store, RecordingConsumer::draining(0), CancellationToken::new());

    service.run_cycle().await.unwrap();
    assert_eq!(service.pending_order(), &[sig(5), sig(4), sig(3)]);

    ledger.push(sig(6), 60);
    ledger.set_slots(60, 70, 50);
    service.run_cycle().await.unwrap();

    let expected = vec![sig(6), sig(5), sig(4), sig(3)];
    assert_eq!(service.pending_order(), expected.as_slice());
    assert_eq!(service.consumer().deliveries[1], expected);
    assert_eq!(store.pending_order().unwrap(), expected);
}

#[tokio::test]
async fn test_partial_drain_drops_oldest() {
    let ledger = ledger();
    let store = IndexStore::in_memory();
    let mut service = service(&ledger, &store, RecordingConsumer::draining(2), CancellationToken::new());

    let report = service.run_cycle().await.unwrap();

    assert_eq!(report.handed_off, 3);
    assert_eq!(report.drained, 2);
    assert_eq!(service.pending_order(), &[sig(5)]);
    assert_eq!(store.pending_order().unwrap(), vec![sig(5)]);
}

#[tokio::test]
async fn test_overdrain_is_clamped() {
    let ledger = ledger();
    let store = IndexStore::in_memory();
    let mut service = service(&ledger, &store, RecordingConsumer::draining(50), CancellationToken::new());

    let report = service.run_cycle().await.unwrap();

    assert_eq!(report.drained, 3);
    assert!(service.pending_order().is_empty());
}

#[tokio::test]
async fn test_restart_resumes_from_persisted_state() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = ledger();

    {
        let store = IndexStore::open(dir.path()).unwrap();
        let mut service = service(&ledger, &store, RecordingConsumer::draining(0), CancellationToken::new());
        service.run_cycle().await.unwrap();
    }

    let store = IndexStore::open(dir.path()).unwrap();
    let mut service = service(&ledger, &store, RecordingConsumer::draining(0), CancellationToken::new());
    service.start().await.unwrap();

    assert_eq!(service.last_slot(), Slot(50));
    assert_eq!(service.last_block(), Slot(32));
    assert_eq!(service.pending_order(), &[sig(5), sig(4), sig(3)]);

    let report = service.run_cycle().await.unwrap();
    assert_eq!(report.fetched, 0);
    assert_eq!(ledger.calls("getTransaction"), 3);
    assert_eq!(service.consumer().deliveries, vec![vec![sig(5), sig(4), sig(3)]]);
    assert_eq!(service.consumer().receipts_seen, vec![3]);
}

#[tokio::test]
async fn test_exhausted_retries_abandon_cycle_without_moving_cursors() {
    let ledger = ledger();
    ledger.fail_next("getSlot", 3);
    let store = IndexStore::in_memory();
    let mut service = service(&ledger, &store, RecordingConsumer::default(), CancellationToken::new());

    let err = service.run_cycle().await.unwrap_err();
    assert!(matches!(err, IndexerError::RetriesExhausted { .. }));
    assert!(err.is_transient());
    assert_eq!(store.last_slot().unwrap(), Slot(0));
    assert_eq!(store.last_block().unwrap(), Slot(0));
    assert!(service.consumer().deliveries.is_empty());

    let report = service.run_cycle().await.unwrap();
    assert_eq!(report.last_slot, Slot(50));
}

#[tokio::test]
async fn test_consumer_failure_redelivers_next_cycle() {
    let ledger = ledger();
    let store = IndexStore::in_memory();
    let consumer = RecordingConsumer {
        failures: 1,
        ..RecordingConsumer::default()
    };
    let mut service = service(&ledger, &store, consumer, CancellationToken::new());

    let err = service.run_cycle().await.unwrap_err();
    assert!(matches!(err, IndexerError::Consumer(_)));
    assert!(err.is_transient());
    // Scan results were persisted before the handoff.
    assert_eq!(store.last_slot().unwrap(), Slot(50));
    assert_eq!(store.pending_order().unwrap(), vec![sig(5), sig(4), sig(3)]);

    service.run_cycle().await.unwrap();
    assert_eq!(service.consumer().deliveries.len(), 2);
    assert_eq!(service.consumer().deliveries[1], vec![sig(5), sig(4), sig(3)]);
    assert!(service.pending_order().is_empty());
}

#[tokio::test]
async fn test_run_recovers_and_stops_on_cancel() {
    let ledger = ledger();
    ledger.fail_next("getSlot", 3);
    let store = IndexStore::in_memory();
    let cancel = CancellationToken::new();
    let consumer = RecordingConsumer {
        cancel_on_delivery: Some(cancel.clone()),
        ..RecordingConsumer::default()
    };
    let mut service = service(&ledger, &store, consumer, cancel);
    assert_eq!(service.health(), SyncHealth::Starting);

    service.run().await.unwrap();

    let stats = service.stats();
    assert_eq!(stats.cycles_failed, 1);
    assert_eq!(stats.cycles_ok, 1);
    assert_eq!(stats.health, SyncHealth::Healthy);
    assert_eq!(stats.last_slot, Slot(50));
    assert_eq!(stats.pending_order, 0);
}

#[tokio::test]
async fn test_cancel_interrupts_backoff() {
    let ledger = ledger();
    ledger.fail_next("getSlot", usize::MAX);
    let store = IndexStore::in_memory();
    let cancel = CancellationToken::new();
    let config = SyncConfig {
        retry: RetryPolicy::unbounded(Duration::from_secs(3600)),
        ..config()
    };
    let mut service = SyncService::new(
        config,
        ledger.clone(),
        store.clone(),
        RecordingConsumer::default(),
        metrics(),
        cancel.clone(),
    )
    .unwrap();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.cancel();
    });

    let result = tokio::time::timeout(Duration::from_secs(5), service.run()).await;
    assert!(matches!(result, Ok(Ok(()))));
    assert_eq!(store.last_slot().unwrap(), Slot(0));
}

#[tokio::test]
async fn test_cancelled_cycle_reports_cancelled() {
    let ledger = ledger();
    let store = IndexStore::in_memory();
    let cancel = CancellationToken::new();
    let mut service = service(&ledger, &store, RecordingConsumer::default(), cancel.clone());
    cancel.cancel();

    let err = service.run_cycle().await.unwrap_err();
    assert!(err.is_cancelled());
    assert_eq!(ledger.calls("getSignaturesForAddress"), 0);
}

#[tokio::test]
async fn test_start_slot_policies() {
    let ledger = ledger();
    ledger.set_slots(50, 60, 777);

    let store = IndexStore::in_memory();
    let mut latest = SyncService::new(
        SyncConfig {
            start_slot: StartSlot::Latest,
            ..config()
        },
        ledger.clone(),
        store.clone(),
        RecordingConsumer::default(),
        metrics(),
        CancellationToken::new(),
    )
    .unwrap();
    latest.start().await.unwrap();
    assert_eq!(latest.last_slot(), Slot(777));
    assert_eq!(store.last_slot().unwrap(), Slot(777));

    let store = IndexStore::in_memory();
    let mut exact = SyncService::new(
        SyncConfig {
            start_slot: StartSlot::Exact(Slot(123)),
            ..config()
        },
        ledger.clone(),
        store.clone(),
        RecordingConsumer::default(),
        metrics(),
        CancellationToken::new(),
    )
    .unwrap();
    exact.start().await.unwrap();
    assert_eq!(store.last_slot().unwrap(), Slot(123));

    let store = IndexStore::in_memory();
    store.set_last_slot(Slot(55)).unwrap();
    let mut resume = service(&ledger, &store, RecordingConsumer::default(), CancellationToken::new());
    resume.start().await.unwrap();
    assert_eq!(resume.last_slot(), Slot(55));
}

#[tokio::test]
async fn test_invalid_config_is_rejected() {
    let config = SyncConfig {
        parallel_requests: 0,
        ..config()
    };
    let result = SyncService::new(
        config,
        MockLedger::new(10),
        IndexStore::in_memory(),
        RecordingConsumer::default(),
        metrics(),
        CancellationToken::new(),
    );
    assert!(matches!(result, Err(IndexerError::Config(_))));
}
