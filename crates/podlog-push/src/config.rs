use std::time::Duration;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Push-client knobs.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PushConfig {
    #[serde(with = "humantime_serde")]
    pub push_interval: Duration,
    pub max_chunks_to_push: usize,
    /// Ordinal hostname prefix the query service's shards are discovered
    /// under, e.g. `querier` resolves `querier-0`, `querier-1`, ...
    pub lookup_service_prefix: String,
    /// Number of query shards to resolve (the `modulus` of the query
    /// tier's sharding scheme).
    pub modulus: usize,
    pub query_port: u16,
    pub scheme: String,
}

impl Default for PushConfig {
    fn default() -> Self {
        PushConfig {
            push_interval: Duration::from_secs(10),
            max_chunks_to_push: 1000,
            lookup_service_prefix: "querier".to_string(),
            modulus: 1,
            query_port: 80,
            scheme: "http".to_string(),
        }
    }
}
