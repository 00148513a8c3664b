use podlog_query::FetchTimeouts;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// One `{cluster}|{addr}` entry from the global querier's static cluster
/// table, resolved once at startup.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClusterEndpoint {
    pub cluster: String,
    pub addr: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct GlobalQuerierConfig {
    pub clusters: Vec<ClusterEndpoint>,
    pub scheme: String,
    #[serde(with = "humantime_serde")]
    pub fetch_timeout: std::time::Duration,
    #[serde(with = "humantime_serde")]
    pub fetch_response_header_timeout: std::time::Duration,
    pub page_burst: i64,
}

impl GlobalQuerierConfig {
    pub fn fetch_timeouts(&self) -> FetchTimeouts {
        FetchTimeouts {
            fetch_timeout: self.fetch_timeout,
            fetch_response_header_timeout: self.fetch_response_header_timeout,
        }
    }
}

impl Default for GlobalQuerierConfig {
    fn default() -> Self {
        let defaults = FetchTimeouts::default();
        GlobalQuerierConfig {
            clusters: Vec::new(),
            scheme: "http".to_string(),
            fetch_timeout: defaults.fetch_timeout,
            fetch_response_header_timeout: defaults.fetch_response_header_timeout,
            page_burst: 1000,
        }
    }
}
