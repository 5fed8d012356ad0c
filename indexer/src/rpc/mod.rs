//! Remote ledger access: raw transport, retry policy, typed methods.

pub mod client;
pub mod retry;
pub mod transport;

pub use client::LedgerClient;
pub use retry::{RetryPolicy, RetryingClient};
pub use transport::{HttpTransport, RpcTransport};
