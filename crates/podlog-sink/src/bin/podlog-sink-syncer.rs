//! Sink syncer entry point: the operator-adjacent process managers
//! query for per-namespace preorders.

use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use podlog_ops::{init_tracing, Must};
use podlog_sink::{Syncer, SyncerConfig};
use serde::{Deserialize, Serialize};

#[derive(Parser, Debug)]
#[command(name = "podlog-sink-syncer", about = "Periodically syncs sink rules from the operator and serves preorders")]
struct Cli {
    #[arg(long, env = "PODLOG_SINK_SYNCER_CONFIG")]
    config: std::path::PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct SyncerDaemonConfig {
    bind_addr: SocketAddr,
    syncer: SyncerConfig,
}

impl Default for SyncerDaemonConfig {
    fn default() -> Self {
        SyncerDaemonConfig {
            bind_addr: "0.0.0.0:3400".parse().unwrap(),
            syncer: SyncerConfig::default(),
        }
    }
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();

    let config: SyncerDaemonConfig = podlog_ops::config::load_json(&cli.config).or_bail("failed to load sink syncer config");

    let syncer = Arc::new(Syncer::new(config.syncer));
    tokio::spawn(syncer.clone().run());

    let app = podlog_sink::syncer::router(syncer);

    tracing::info!(addr = %config.bind_addr, "podlog-sink-syncer listening");
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await.or_bail("failed to bind sink syncer HTTP listener");
    axum::serve(listener, app).await.or_bail("sink syncer HTTP server exited");
}
