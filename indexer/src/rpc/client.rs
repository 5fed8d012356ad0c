use super::retry::{RetryPolicy, RetryingClient};
use super::transport::RpcTransport;
use crate::error::{IndexerResult, RpcError};
use containers::{Address, BlockHash, Commitment, Receipt, Signature, SignatureInfo, Slot};
use metrics::SharedMetrics;
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};
use tokio_util::sync::CancellationToken;

pub const GET_SLOT: &str = "getSlot";
pub const GET_SIGNATURES_FOR_ADDRESS: &str = "getSignaturesForAddress";
pub const GET_TRANSACTION: &str = "getTransaction";
pub const GET_BLOCKS: &str = "getBlocks";
pub const GET_BLOCK: &str = "getBlock";

fn decode<R: DeserializeOwned>(method: &'static str) -> impl Fn(Value) -> Result<R, RpcError> {
    move |value| serde_json::from_value(value).map_err(|e| RpcError::malformed(method, e))
}

/// Typed view of the ledger RPC methods the indexer consumes.
///
/// Every call goes through the retrying client, so a returned error is
/// either exhausted retries or cancellation.
pub struct LedgerClient<T: RpcTransport> {
    inner: RetryingClient<T>,
}

impl<T: RpcTransport> LedgerClient<T> {
    pub fn new(
        transport: T,
        policy: RetryPolicy,
        cancel: CancellationToken,
        metrics: SharedMetrics,
    ) -> Self {
        Self {
            inner: RetryingClient::new(transport, policy, cancel, metrics),
        }
    }

    pub fn retrying(&self) -> &RetryingClient<T> {
        &self.inner
    }

    pub async fn get_slot(&self, commitment: Commitment) -> IndexerResult<Slot> {
        self.inner
            .call_with(
                GET_SLOT,
                json!([{ "commitment": commitment.as_str() }]),
                decode(GET_SLOT),
            )
            .await
    }

    /// One page of signatures, newest first, strictly older than `before`.
    pub async fn get_signatures_for_address(
        &self,
        address: &Address,
        before: Option<&Signature>,
        commitment: Commitment,
    ) -> IndexerResult<Vec<SignatureInfo>> {
        let mut opts = Map::new();
        if let Some(before) = before {
            opts.insert("before".into(), json!(before.as_str()));
        }
        opts.insert("commitment".into(), json!(commitment.as_str()));

        self.inner
            .call_with(
                GET_SIGNATURES_FOR_ADDRESS,
                json!([address.as_str(), opts]),
                decode(GET_SIGNATURES_FOR_ADDRESS),
            )
            .await
    }

    /// Full transaction body. A `null` result is retried: the transaction is
    /// not visible at this commitment yet.
    pub async fn get_transaction(
        &self,
        signature: &Signature,
        commitment: Commitment,
    ) -> IndexerResult<Receipt> {
        self.inner
            .call_with(
                GET_TRANSACTION,
                json!([
                    signature.as_str(),
                    {
                        "commitment": commitment.as_str(),
                        "encoding": "json",
                        "maxSupportedTransactionVersion": 0
                    }
                ]),
                |value| {
                    if value.is_null() {
                        Err(RpcError::not_available(GET_TRANSACTION))
                    } else {
                        Ok(Receipt::new(value))
                    }
                },
            )
            .await
    }

    /// Produced slots in `[start, end]`, both inclusive.
    pub async fn get_blocks(
        &self,
        start: Slot,
        end: Slot,
        commitment: Commitment,
    ) -> IndexerResult<Vec<Slot>> {
        self.inner
            .call_with(
                GET_BLOCKS,
                json!([start.0, end.0, { "commitment": commitment.as_str() }]),
                decode(GET_BLOCKS),
            )
            .await
    }

    /// Hash of the block at `slot`, fetched without transactions or rewards.
    pub async fn get_block_hash(
        &self,
        slot: Slot,
        commitment: Commitment,
    ) -> IndexerResult<BlockHash> {
        self.inner
            .call_with(
                GET_BLOCK,
                json!([
                    slot.0,
                    {
                        "commitment": commitment.as_str(),
                        "transactionDetails": "none",
                        "rewards": false
                    }
                ]),
                |value| {
                    let raw = value
                        .get("blockhash")
                        .and_then(Value::as_str)
                        .ok_or_else(|| {
                            if value.is_null() {
                                RpcError::not_available(GET_BLOCK)
                            } else {
                                RpcError::malformed(GET_BLOCK, "missing blockhash")
                            }
                        })?;
                    BlockHash::from_base58(raw).map_err(|e| RpcError::malformed(GET_BLOCK, e))
                },
            )
            .await
    }
}
