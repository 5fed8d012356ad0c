use std::collections::HashMap;
use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use chain::ChainConfig;
use clap::Parser;
use containers::{Address, Receipt, Signature, StartSlot};
use indexer::rpc::{HttpTransport, RetryPolicy};
use indexer::sync::{SyncConfig, SyncService, TransactionConsumer, DEFAULT_PARALLEL_REQUESTS};
use metrics::server::{run_metrics_server, MetricsServerConfig};
use metrics::Metrics;
use storage::IndexStore;
use tokio::task;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
struct Args {
    /// Ledger JSON-RPC endpoint.
    #[arg(long, env = "SOLANA_URL", default_value = "http://localhost:8899")]
    solana_url: String,

    /// Address whose transaction history is indexed.
    #[arg(long, env = "EVM_LOADER_ID")]
    evm_loader_id: Address,

    #[arg(long, env = "PARALLEL_REQUESTS", default_value_t = DEFAULT_PARALLEL_REQUESTS)]
    parallel_requests: usize,

    /// CONTINUE, LATEST or a slot number.
    #[arg(long, env = "START_SLOT", default_value = "CONTINUE")]
    start_slot: StartSlot,

    #[arg(long, env = "LOG_LEVEL", default_value = "INFO")]
    log_level: String,

    #[arg(long, env = "INDEXER_DATA_DIR", default_value = "./indexer-data")]
    data_dir: PathBuf,

    /// Extra signatures that mark the start of relevant history.
    #[arg(long, env = "HISTORY_START", value_delimiter = ',')]
    history_start: Vec<Signature>,

    #[arg(long, env = "REQUEST_TIMEOUT_SECS", default_value_t = 30)]
    request_timeout_secs: u64,

    #[arg(long, env = "RETRY_BASE_DELAY_MS", default_value_t = indexer::sync::DEFAULT_RETRY_BASE_DELAY_MS)]
    retry_base_delay_ms: u64,

    #[arg(long, env = "RETRY_MAX_DELAY_MS", default_value_t = indexer::sync::DEFAULT_RETRY_MAX_DELAY_MS)]
    retry_max_delay_ms: u64,

    /// 0 retries forever.
    #[arg(long, env = "RETRY_MAX_ATTEMPTS", default_value_t = indexer::sync::DEFAULT_RETRY_MAX_ATTEMPTS)]
    retry_max_attempts: u32,

    /// Pause between sync cycles. 0 starts the next cycle immediately.
    #[arg(long, env = "CYCLE_INTERVAL_MS", default_value_t = 0)]
    cycle_interval_ms: u64,

    #[arg(long, env = "METRICS_ADDRESS", default_value = "127.0.0.1")]
    metrics_address: IpAddr,

    #[arg(long, env = "METRICS_PORT", default_value_t = 9090)]
    metrics_port: u16,

    #[arg(long)]
    no_metrics: bool,
}

/// Map a `LOG_LEVEL` value onto a tracing filter directive.
fn log_directive(level: &str) -> Option<&'static str> {
    match level.trim().to_ascii_uppercase().as_str() {
        "TRACE" => Some("trace"),
        "DEBUG" => Some("debug"),
        "INFO" => Some("info"),
        "WARN" | "WARNING" => Some("warn"),
        "ERROR" | "FATAL" | "CRITICAL" => Some("error"),
        _ => None,
    }
}

/// Logs each handoff and records the newest slot seen.
struct LoggingConsumer {
    store: IndexStore,
}

#[async_trait]
impl TransactionConsumer for LoggingConsumer {
    async fn on_new_transactions(
        &mut self,
        order: &[Signature],
        receipts: &HashMap<Signature, Receipt>,
    ) -> anyhow::Result<usize> {
        let known: Vec<&Receipt> = order.iter().filter_map(|sig| receipts.get(sig)).collect();
        let failed = known.iter().filter(|receipt| receipt.is_failed()).count();

        if let Some(newest) = known.iter().filter_map(|receipt| receipt.slot()).max() {
            if newest > self.store.latest_processed_slot()? {
                self.store.set_latest_processed_slot(newest)?;
            }
        }

        if !order.is_empty() {
            info!(
                transactions = order.len(),
                succeeded = known.len() - failed,
                failed,
                missing = order.len() - known.len(),
                "Processed new transactions"
            );
        }
        Ok(order.len())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let directive = log_directive(&args.log_level);
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(directive.unwrap_or("info")));
    tracing_subscriber::fmt().with_env_filter(filter).init();
    if directive.is_none() {
        warn!(level = %args.log_level, "Unknown LOG_LEVEL, using INFO");
    }

    let chain = ChainConfig::default().with_history_start(args.history_start.clone());
    let config = SyncConfig {
        parallel_requests: args.parallel_requests,
        start_slot: args.start_slot,
        retry: RetryPolicy {
            base_delay: Duration::from_millis(args.retry_base_delay_ms),
            max_delay: Duration::from_millis(args.retry_max_delay_ms),
            max_attempts: (args.retry_max_attempts > 0).then_some(args.retry_max_attempts),
        },
        cycle_interval: Duration::from_millis(args.cycle_interval_ms),
        chain,
        ..SyncConfig::new(args.evm_loader_id.clone())
    };

    let store = IndexStore::open(&args.data_dir)
        .with_context(|| format!("failed to open store at {}", args.data_dir.display()))?;
    let transport = HttpTransport::new(
        args.solana_url.clone(),
        Duration::from_secs(args.request_timeout_secs),
    )?;
    let metrics = Arc::new(Metrics::new());
    let cancel = CancellationToken::new();

    let consumer = LoggingConsumer {
        store: store.clone(),
    };
    let mut service = SyncService::new(
        config,
        transport,
        store,
        consumer,
        Arc::clone(&metrics),
        cancel.clone(),
    )?;

    if !args.no_metrics {
        let metrics_config = MetricsServerConfig {
            metrics_address: args.metrics_address,
            metrics_port: args.metrics_port,
        };
        task::spawn(async move {
            if let Err(err) = run_metrics_server(metrics_config, metrics).await {
                error!(error = %err, "Metrics server exited");
            }
        });
    }

    let shutdown = cancel.clone();
    task::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown requested");
            shutdown.cancel();
        }
    });

    info!(
        url = %args.solana_url,
        address = %args.evm_loader_id,
        parallel = args.parallel_requests,
        start_slot = %args.start_slot,
        data_dir = %args.data_dir.display(),
        "Starting ledger indexer"
    );

    service.run().await?;

    info!(stats = ?service.stats(), "Indexer stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_directive() {
        assert_eq!(log_directive("debug"), Some("debug"));
        assert_eq!(log_directive("WARNING"), Some("warn"));
        assert_eq!(log_directive("CRITICAL"), Some("error"));
        assert_eq!(log_directive(" Fatal "), Some("error"));
        assert_eq!(log_directive("verbose"), None);
    }

    #[test]
    fn test_args_parse() {
        let args = Args::try_parse_from([
            "ledger_indexer",
            "--evm-loader-id",
            "11111111111111111111111111111111",
            "--start-slot",
            "LATEST",
            "--retry-max-attempts",
            "0",
        ])
        .unwrap();
        assert_eq!(args.start_slot, StartSlot::Latest);
        assert_eq!(args.parallel_requests, DEFAULT_PARALLEL_REQUESTS);
        assert_eq!(args.retry_max_attempts, 0);
        assert_eq!(args.cycle_interval_ms, 0);
    }
}
