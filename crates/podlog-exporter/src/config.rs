use std::time::Duration;

use podlog_sink::ManagerConfig;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Exporter loop knobs.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ExporterConfig {
    pub store_addr: String,
    pub scheme: String,
    #[serde(with = "humantime_serde", default = "default_inspect_interval")]
    pub inspect_interval: Duration,
    /// How far back of `current` the exporter re-ingests chunks and clips
    /// every order's export window; defaults to the store's own retention
    /// window, since looking back further can never find anything.
    #[serde(with = "humantime_serde", default = "default_max_lookback")]
    pub max_lookback: Duration,
    #[serde(default = "default_page_burst")]
    pub page_burst: i64,
    pub receipt_db_path: std::path::PathBuf,
    /// Receipts untouched for this many multiples of their order's interval
    /// are pruned as stale (`2 × interval`).
    #[serde(default = "default_receipt_prune_factor")]
    pub receipt_prune_factor: u32,
}

fn default_inspect_interval() -> Duration {
    Duration::from_secs(60)
}

fn default_max_lookback() -> Duration {
    Duration::from_secs(7 * 24 * 3600)
}

fn default_page_burst() -> i64 {
    1_000_000
}

fn default_receipt_prune_factor() -> u32 {
    2
}

/// The exporter's full on-disk config (the store/syncer addresses it talks
/// to, plus the loop's own knobs); kept out of `schemars::JsonSchema` like
/// the other binary wrapper configs, since `ManagerConfig` composes cleanly
/// but adding a schema here buys nothing the inner configs don't already
/// provide on their own.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ExporterDaemonConfig {
    #[serde(default)]
    pub log_format: podlog_logline::LogFormat,
    pub exporter: ExporterConfig,
    pub manager: ManagerConfig,
}
