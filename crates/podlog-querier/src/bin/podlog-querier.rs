//! Query shard entry point: wires the chunk index, the push receiver,
//! and the HTTP API into one process.

use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use podlog_logline::LogFormat;
use podlog_ops::{init_tracing, Must};
use podlog_querier::http::AppState;
use podlog_querier::{ChunkIndex, QuerierConfig, QuerierService};
use serde::{Deserialize, Serialize};

#[derive(Parser, Debug)]
#[command(name = "podlog-querier", about = "Sharded in-memory chunk index and query fan-out")]
struct Cli {
    #[arg(long, env = "PODLOG_QUERIER_CONFIG")]
    config: std::path::PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct QuerierDaemonConfig {
    bind_addr: SocketAddr,
    #[serde(default)]
    log_format: LogFormat,
    querier: QuerierConfig,
}

impl Default for QuerierDaemonConfig {
    fn default() -> Self {
        QuerierDaemonConfig {
            bind_addr: "0.0.0.0:3200".parse().unwrap(),
            log_format: LogFormat::Text,
            querier: QuerierConfig::default(),
        }
    }
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();

    let config: QuerierDaemonConfig = podlog_ops::config::load_json(&cli.config).or_bail("failed to load querier config");
    let querier = Arc::new(config.querier);

    let index = Arc::new(ChunkIndex::new());
    let push = podlog_querier::spawn_receiver(index.clone(), querier.push_buffer_capacity);

    let peers = podlog_query::resolve_ordinals(&querier.lookup_service_prefix, querier.modulus as usize, querier.peer_port)
        .await
        .into_iter()
        .map(|addr| podlog_query::Endpoint { cluster: String::new(), addr })
        .collect::<Vec<_>>();

    let service = Arc::new(QuerierService::new(index.clone(), querier.scheme.clone(), config.log_format, querier.page_burst));

    tokio::spawn(podlog_querier::status::run(index.clone(), querier.clone()));

    let state = AppState {
        index,
        config: querier,
        service,
        push,
        peers: Arc::new(peers),
    };
    let app = podlog_querier::http::router(state);

    tracing::info!(addr = %config.bind_addr, "podlog-querier listening");
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await.or_bail("failed to bind querier HTTP listener");
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await.or_bail("querier HTTP server exited");
}
