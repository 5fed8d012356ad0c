pub mod error;
pub mod rpc;
pub mod sync;

pub use error::{IndexerError, IndexerResult, RpcError};
pub use rpc::{HttpTransport, LedgerClient, RetryPolicy, RpcTransport};
pub use sync::{SyncConfig, SyncHealth, SyncService, TransactionConsumer};
