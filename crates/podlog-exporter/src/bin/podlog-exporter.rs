//! Sink exporter entry point: runs the periodic export loop against one
//! local store.

use clap::Parser;
use podlog_exporter::config::ExporterDaemonConfig;
use podlog_exporter::{ChunkSource, Exporter, ReceiptStore};
use podlog_ops::{init_tracing, Must};
use podlog_sink::Manager;

#[derive(Parser, Debug)]
#[command(name = "podlog-exporter", about = "Runs the sink exporter's periodic, receipt-tracked export loop")]
struct Cli {
    #[arg(long, env = "PODLOG_EXPORTER_CONFIG")]
    config: std::path::PathBuf,
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();

    let config: ExporterDaemonConfig = podlog_ops::config::load_json(&cli.config).or_bail("failed to load exporter config");

    let receipts = ReceiptStore::open(&config.exporter.receipt_db_path).or_bail("failed to open the receipt store");
    let client = reqwest::Client::new();
    let chunk_source = ChunkSource::new(client, config.exporter.scheme.clone(), config.exporter.store_addr.clone());
    let manager = Manager::new(config.manager);
    let aws_config = aws_config::defaults(aws_config::BehaviorVersion::latest()).load().await;
    let s3_client = aws_sdk_s3::Client::new(&aws_config);

    let exporter = Exporter::new(config.exporter, manager, chunk_source, receipts, s3_client, config.log_format);

    tracing::info!("podlog-exporter starting");
    exporter.run().await;
}
