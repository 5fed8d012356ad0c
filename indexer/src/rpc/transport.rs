use crate::error::RpcError;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// One JSON-RPC round trip to the remote ledger.
///
/// Implementations report every failure as an `RpcError`; retrying is the
/// caller's job. Abstracted so the engine can be driven by a simulated
/// ledger in tests.
#[async_trait]
pub trait RpcTransport: Send + Sync + 'static {
    async fn call(&self, method: &str, params: Value) -> Result<Value, RpcError>;
}

/// JSON-RPC 2.0 over HTTP.
pub struct HttpTransport {
    client: reqwest::Client,
    url: String,
    next_id: AtomicU64,
}

impl HttpTransport {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, RpcError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RpcError::transport("client", format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            url: url.into(),
            next_id: AtomicU64::new(1),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl RpcTransport for HttpTransport {
    async fn call(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let payload = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": id,
        });

        let response = self
            .client
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| RpcError::transport(method, e))?;

        let status = response.status();
        let value: Value = response
            .json()
            .await
            .map_err(|e| RpcError::malformed(method, format!("invalid JSON body: {e}")))?;

        if !status.is_success() {
            return Err(RpcError::transport(method, format!("HTTP {status}: {value}")));
        }

        extract_result(method, value)
    }
}

/// Split a JSON-RPC envelope into its result or error.
pub fn extract_result(method: &str, mut envelope: Value) -> Result<Value, RpcError> {
    if let Some(err) = envelope.get("error") {
        return Err(RpcError::Remote {
            method: method.to_string(),
            code: err.get("code").and_then(Value::as_i64).unwrap_or_default(),
            message: err
                .get("message")
                .and_then(Value::as_str)
                .map(ToOwned::to_owned)
                .unwrap_or_else(|| err.to_string()),
        });
    }

    envelope
        .get_mut("result")
        .map(Value::take)
        .ok_or_else(|| RpcError::malformed(method, "missing result field"))
}
