use std::time::Duration;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Query shard knobs.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct QuerierConfig {
    /// This shard's ordinal, used by the push-accept middleware's
    /// `hash(X-Real-IP) mod modulus == id` check.
    pub id: u32,
    /// Total number of query shards; also the hostname-resolution count
    /// for peer fan-out.
    pub modulus: u32,
    /// Ordinal hostname prefix peer shards are discovered under.
    pub lookup_service_prefix: String,
    pub peer_port: u16,
    pub scheme: String,
    #[serde(with = "humantime_serde")]
    pub status_check_interval: Duration,
    #[serde(with = "humantime_serde")]
    pub chunk_retention_time: Duration,
    #[serde(with = "humantime_serde")]
    pub store_retention_time: Duration,
    /// Capacity of the bounded push buffer.
    pub push_buffer_capacity: usize,
    pub page_burst: i64,
}

impl Default for QuerierConfig {
    fn default() -> Self {
        QuerierConfig {
            id: 0,
            modulus: 1,
            lookup_service_prefix: "querier".to_string(),
            peer_port: 80,
            scheme: "http".to_string(),
            status_check_interval: Duration::from_secs(10),
            chunk_retention_time: Duration::from_secs(7 * 24 * 3600),
            store_retention_time: Duration::from_secs(30),
            push_buffer_capacity: 10_000,
            page_burst: 1000,
        }
    }
}
