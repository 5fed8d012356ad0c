use crate::error::RpcError;
use crate::rpc::{LedgerClient, RetryPolicy, RpcTransport};
use async_trait::async_trait;
use chain::ChainConfig;
use containers::{Address, BlockHash, Signature, SignatureInfo, Slot};
use metrics::{Metrics, SharedMetrics};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Simulated remote ledger.
///
/// Clones share state, so a test can keep a handle after moving one into
/// the engine and change the ledger between cycles.
#[derive(Clone, Default)]
pub struct MockLedger {
    state: Arc<Mutex<LedgerState>>,
}

#[derive(Default)]
struct LedgerState {
    /// Newest first.
    history: Vec<SignatureInfo>,
    page_size: usize,
    confirmed_slot: u64,
    recent_slot: u64,
    finalized_slot: u64,
    blocks: BTreeMap<u64, BlockHash>,
    /// Remaining injected failures per method.
    failures: HashMap<String, usize>,
    /// Remaining `null` answers per signature.
    unavailable: HashMap<Signature, usize>,
    calls: HashMap<String, usize>,
    block_ranges: Vec<(u64, u64)>,
    fetched: Vec<Signature>,
}

impl MockLedger {
    pub fn new(page_size: usize) -> Self {
        let ledger = Self::default();
        ledger.state.lock().page_size = page_size;
        ledger
    }

    /// Add a transaction newer than everything already in the history.
    pub fn push(&self, signature: Signature, slot: u64) -> &Self {
        let mut state = self.state.lock();
        state
            .history
            .insert(0, SignatureInfo::new(signature, Slot(slot)));
        state.confirmed_slot = state.confirmed_slot.max(slot);
        state.recent_slot = state.recent_slot.max(slot);
        self
    }

    pub fn set_slots(&self, confirmed: u64, recent: u64, finalized: u64) {
        let mut state = self.state.lock();
        state.confirmed_slot = confirmed;
        state.recent_slot = recent;
        state.finalized_slot = finalized;
    }

    pub fn produce_blocks(&self, slots: impl IntoIterator<Item = u64>) {
        let mut state = self.state.lock();
        for slot in slots {
            state.blocks.insert(slot, block_hash(slot));
        }
    }

    pub fn fail_next(&self, method: &str, times: usize) {
        self.state.lock().failures.insert(method.to_string(), times);
    }

    pub fn unavailable_for(&self, signature: &Signature, times: usize) {
        self.state
            .lock()
            .unavailable
            .insert(signature.clone(), times);
    }

    pub fn calls(&self, method: &str) -> usize {
        self.state.lock().calls.get(method).copied().unwrap_or(0)
    }

    pub fn block_ranges(&self) -> Vec<(u64, u64)> {
        self.state.lock().block_ranges.clone()
    }

    pub fn fetched(&self) -> Vec<Signature> {
        self.state.lock().fetched.clone()
    }
}

#[async_trait]
impl RpcTransport for MockLedger {
    async fn call(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        let mut state = self.state.lock();
        *state.calls.entry(method.to_string()).or_default() += 1;

        if let Some(remaining) = state.failures.get_mut(method) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(RpcError::transport(method, "connection reset by peer"));
            }
        }

        match method {
            "getSlot" => {
                let slot = match params[0]["commitment"].as_str() {
                    Some("recent") => state.recent_slot,
                    Some("finalized") => state.finalized_slot,
                    _ => state.confirmed_slot,
                };
                Ok(json!(slot))
            }
            "getSignaturesForAddress" => {
                let start = match params[1]["before"].as_str() {
                    Some(before) => match state
                        .history
                        .iter()
                        .position(|info| info.signature.as_str() == before)
                    {
                        Some(index) => index + 1,
                        None => state.history.len(),
                    },
                    None => 0,
                };
                let page: Vec<Value> = state
                    .history
                    .iter()
                    .skip(start)
                    .take(state.page_size.max(1))
                    .map(|info| {
                        json!({
                            "signature": info.signature.as_str(),
                            "slot": info.slot.0,
                            "err": null,
                        })
                    })
                    .collect();
                Ok(Value::Array(page))
            }
            "getTransaction" => {
                let Some(raw) = params[0].as_str() else {
                    return Err(RpcError::malformed(method, "missing signature"));
                };
                let Some(info) = state
                    .history
                    .iter()
                    .find(|info| info.signature.as_str() == raw)
                    .cloned()
                else {
                    return Ok(Value::Null);
                };
                if let Some(remaining) = state.unavailable.get_mut(&info.signature) {
                    if *remaining > 0 {
                        *remaining -= 1;
                        return Ok(Value::Null);
                    }
                }
                state.fetched.push(info.signature.clone());
                Ok(json!({
                    "slot": info.slot.0,
                    "meta": { "err": null },
                    "transaction": { "signatures": [raw] },
                }))
            }
            "getBlocks" => {
                let start = params[0].as_u64().unwrap_or_default();
                let end = params[1].as_u64().unwrap_or_default();
                state.block_ranges.push((start, end));
                let slots: Vec<u64> = state.blocks.range(start..=end).map(|(s, _)| *s).collect();
                Ok(json!(slots))
            }
            "getBlock" => {
                let slot = params[0].as_u64().unwrap_or_default();
                Ok(match state.blocks.get(&slot) {
                    Some(hash) => json!({ "blockhash": hash.to_base58() }),
                    None => Value::Null,
                })
            }
            other => Err(RpcError::Remote {
                method: other.to_string(),
                code: -32601,
                message: "Method not found".into(),
            }),
        }
    }
}

pub fn sig(n: u8) -> Signature {
    Signature::from_bytes([n; 64])
}

pub fn block_hash(slot: u64) -> BlockHash {
    let mut bytes = [0u8; 32];
    bytes[..8].copy_from_slice(&slot.to_be_bytes());
    bytes[31] = 1;
    BlockHash(bytes)
}

pub fn address() -> Address {
    Address::from_bytes([7; 32])
}

pub fn sentinel() -> Signature {
    sig(255)
}

pub fn chain() -> ChainConfig {
    ChainConfig::default().with_history_start([sentinel()])
}

pub fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        base_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(2),
        max_attempts: Some(3),
    }
}

pub fn metrics() -> SharedMetrics {
    Arc::new(Metrics::new())
}

pub fn client(ledger: &MockLedger) -> Arc<LedgerClient<MockLedger>> {
    Arc::new(LedgerClient::new(
        ledger.clone(),
        fast_retry(),
        CancellationToken::new(),
        metrics(),
    ))
}
