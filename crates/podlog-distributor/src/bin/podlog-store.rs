//! Ingest+store daemon entry point: wires the
//! distributor, the store's HTTP API, and the push client into one
//! process per node.

use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use podlog_blockreader::BufferPool;
use podlog_distributor::{Distributor, DistributorConfig, EmptyPodProvider};
use podlog_logline::LogFormat;
use podlog_ops::{init_tracing, Must};
use podlog_push::{PushClient, PushConfig};
use podlog_store::http::{default_range_cooldown, AppState};
use podlog_store::ratelimit::RangeRateLimiter;
use podlog_store::{Store, StoreConfig};
use serde::{Deserialize, Serialize};

#[derive(Parser, Debug)]
#[command(name = "podlog-store", about = "Per-node log ingest and store daemon")]
struct Cli {
    /// Path to a JSON config file matching `StoreDaemonConfig`.
    #[arg(long, env = "PODLOG_STORE_CONFIG")]
    config: std::path::PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct StoreDaemonConfig {
    cluster: String,
    bind_addr: SocketAddr,
    #[serde(default)]
    log_format: LogFormat,
    range_rate_limit: i64,
    store: StoreConfig,
    distributor: DistributorConfig,
    tailer: podlog_tailer::TailerConfig,
    push: PushConfig,
}

impl Default for StoreDaemonConfig {
    fn default() -> Self {
        StoreDaemonConfig {
            cluster: "local".to_string(),
            bind_addr: "0.0.0.0:3100".parse().unwrap(),
            log_format: LogFormat::Text,
            range_rate_limit: 100,
            store: StoreConfig::default(),
            distributor: DistributorConfig::default(),
            tailer: podlog_tailer::TailerConfig::default(),
            push: PushConfig::default(),
        }
    }
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();

    let config: StoreDaemonConfig = podlog_ops::config::load_json(&cli.config).or_bail("failed to load store daemon config");

    let store = Arc::new(Store::open(Arc::new(config.store), &config.cluster).or_bail("failed to open store"));

    let distributor = Arc::new(Distributor::new(
        store.clone(),
        Arc::new(config.distributor),
        Arc::new(config.tailer),
        Arc::new(EmptyPodProvider),
        config.log_format,
        None,
    ));
    tokio::spawn(distributor.run());

    let local_addr = config.bind_addr.to_string();
    let push_client = PushClient::new(store.clone(), Arc::new(config.push), local_addr);
    tokio::spawn(push_client.run());

    let state = AppState {
        store: store.clone(),
        format: config.log_format,
        pool: Arc::new(BufferPool::new()),
        range_limiter: RangeRateLimiter::new(config.range_rate_limit, default_range_cooldown()),
    };
    let app = podlog_store::http::router(state);

    tracing::info!(addr = %config.bind_addr, "podlog-store listening");
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await.or_bail("failed to bind store HTTP listener");
    axum::serve(listener, app).await.or_bail("store HTTP server exited");
}
