//! Global querier entry point.

use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use podlog_global_querier::http::AppState;
use podlog_global_querier::{GlobalQuerierConfig, GlobalQuerierService};
use podlog_logline::LogFormat;
use podlog_ops::{init_tracing, Must};
use podlog_query::Endpoint;
use serde::{Deserialize, Serialize};

#[derive(Parser, Debug)]
#[command(name = "podlog-global-querier", about = "Fans list/series/range queries out across clusters")]
struct Cli {
    #[arg(long, env = "PODLOG_GLOBAL_QUERIER_CONFIG")]
    config: std::path::PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct GlobalQuerierDaemonConfig {
    bind_addr: SocketAddr,
    #[serde(default)]
    log_format: LogFormat,
    global_querier: GlobalQuerierConfig,
}

impl Default for GlobalQuerierDaemonConfig {
    fn default() -> Self {
        GlobalQuerierDaemonConfig {
            bind_addr: "0.0.0.0:3300".parse().unwrap(),
            log_format: LogFormat::Text,
            global_querier: GlobalQuerierConfig::default(),
        }
    }
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();

    let config: GlobalQuerierDaemonConfig = podlog_ops::config::load_json(&cli.config).or_bail("failed to load global querier config");

    let pairs: Vec<(String, String)> = config.global_querier.clusters.iter().map(|c| (c.cluster.clone(), c.addr.clone())).collect();
    let endpoints: Vec<Endpoint> = podlog_query::resolve_clusters(&pairs).await;
    tracing::info!(resolved = endpoints.len(), configured = pairs.len(), "resolved cluster endpoints");

    let client = podlog_query::build_client(config.global_querier.fetch_timeouts());
    let service = Arc::new(GlobalQuerierService::new(endpoints, client, config.global_querier.scheme.clone(), config.log_format, config.global_querier.page_burst));

    let state = AppState { service };
    let app = podlog_global_querier::http::router(state);

    tracing::info!(addr = %config.bind_addr, "podlog-global-querier listening");
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await.or_bail("failed to bind global querier HTTP listener");
    axum::serve(listener, app).await.or_bail("global querier HTTP server exited");
}
