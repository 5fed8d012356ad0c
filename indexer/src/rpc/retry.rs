//! Retrying wrapper around a transport.
//!
//! Every failed attempt backs off exponentially with jitter. With a bounded
//! policy the call gives up after `max_attempts` and reports
//! `RetriesExhausted`; the sync loop then abandons the cycle and re-runs it
//! from persisted cursors, so no work is dropped. Sleeps between attempts are
//! the only cancellation points.

use super::transport::RpcTransport;
use crate::error::{IndexerError, IndexerResult, RpcError};
use crate::sync::config::{
    DEFAULT_RETRY_BASE_DELAY_MS, DEFAULT_RETRY_MAX_ATTEMPTS, DEFAULT_RETRY_MAX_DELAY_MS,
};
use metrics::SharedMetrics;
use rand::Rng;
use serde_json::Value;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// `None` retries forever.
    pub max_attempts: Option<u32>,
}

impl RetryPolicy {
    /// Fixed interval, never gives up.
    pub fn unbounded(interval: Duration) -> Self {
        Self {
            base_delay: interval,
            max_delay: interval,
            max_attempts: None,
        }
    }

    /// Backoff ceiling for the given attempt (1-based), before jitter.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.base_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay)
    }

    /// Delay drawn uniformly from `[ceiling / 2, ceiling]`.
    pub fn jittered_delay(&self, attempt: u32) -> Duration {
        let ceiling = self.delay_for(attempt);
        let ceiling_ms = ceiling.as_millis() as u64;
        if ceiling_ms < 2 {
            return ceiling;
        }
        let ms = rand::thread_rng().gen_range(ceiling_ms / 2..=ceiling_ms);
        Duration::from_millis(ms)
    }

    pub fn is_exhausted(&self, attempts: u32) -> bool {
        self.max_attempts.is_some_and(|max| attempts >= max)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(DEFAULT_RETRY_BASE_DELAY_MS),
            max_delay: Duration::from_millis(DEFAULT_RETRY_MAX_DELAY_MS),
            max_attempts: Some(DEFAULT_RETRY_MAX_ATTEMPTS),
        }
    }
}

pub struct RetryingClient<T: RpcTransport> {
    transport: T,
    policy: RetryPolicy,
    cancel: CancellationToken,
    metrics: SharedMetrics,
}

impl<T: RpcTransport> RetryingClient<T> {
    pub fn new(
        transport: T,
        policy: RetryPolicy,
        cancel: CancellationToken,
        metrics: SharedMetrics,
    ) -> Self {
        Self {
            transport,
            policy,
            cancel,
            metrics,
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub async fn call(&self, method: &str, params: Value) -> IndexerResult<Value> {
        self.call_with(method, params, Ok).await
    }

    /// Call `method` and decode the result, retrying both transport failures
    /// and results `decode` rejects.
    pub async fn call_with<R, F>(&self, method: &str, params: Value, decode: F) -> IndexerResult<R>
    where
        F: Fn(Value) -> Result<R, RpcError>,
    {
        let mut attempts = 0u32;
        loop {
            if self.cancel.is_cancelled() {
                return Err(IndexerError::Cancelled);
            }
            attempts += 1;

            let err = match self.transport.call(method, params.clone()).await.and_then(&decode) {
                Ok(result) => return Ok(result),
                Err(err) => err,
            };

            if self.policy.is_exhausted(attempts) {
                warn!(method, attempts, error = %err, "Remote call retries exhausted");
                self.metrics.inc_rpc_exhausted(method);
                return Err(IndexerError::RetriesExhausted {
                    method: method.to_string(),
                    attempts,
                    source: err,
                });
            }

            let delay = self.policy.jittered_delay(attempts);
            debug!(
                method,
                attempt = attempts,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "Remote call failed, retrying"
            );
            self.metrics.inc_rpc_retries(method);

            tokio::select! {
                _ = self.cancel.cancelled() => return Err(IndexerError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}
