use std::time::Duration;

use bytesize::ByteSize;
use serde::{Deserialize, Serialize};

/// Store-wide knobs and their defaults, loaded once into an `Arc<StoreConfig>`
/// and threaded into [`crate::store::Store::open`] rather than read from
/// module-level state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct StoreConfig {
    pub store_root_path: String,
    pub retention_size: ByteSize,
    #[serde(with = "humantime_serde")]
    pub retention_time: Duration,
    pub block_size: ByteSize,
    /// Disk usage ratio above which `Mark()` preempts ordinary retention
    /// and evicts the oldest share of every chunk's blocks instead.
    pub soft_limit_for_disk: f64,
    /// Portion of each chunk's blocks kept during a disk-pressure eviction;
    /// the remaining `1 - ratio` oldest blocks are marked for deletion.
    pub soft_limit_ratio_for_blocks: f64,
    #[serde(with = "humantime_serde")]
    pub leaky_bucket_interval: Duration,
    pub request_max_burst: i64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            store_root_path: "/var/log/podlog".to_string(),
            retention_size: ByteSize::gib(2),
            retention_time: Duration::from_secs(7 * 24 * 3600),
            block_size: ByteSize::mib(1),
            soft_limit_for_disk: 0.5,
            soft_limit_ratio_for_blocks: 0.9,
            leaky_bucket_interval: Duration::from_secs(1),
            request_max_burst: 100_000,
        }
    }
}
