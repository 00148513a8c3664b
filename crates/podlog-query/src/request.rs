use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use podlog_model::Source;

/// A query against the chunk index: target selectors (each category is
/// disjunctive within itself, and AND-ed across categories; `labels` is
/// OR-ed against a chunk's `key=value` pairs), a time range, and paging /
/// filtering knobs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    #[serde(default)]
    pub clusters: Vec<String>,
    #[serde(default)]
    pub namespaces: Vec<String>,
    /// `key=value` pairs, OR-ed.
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub set_names: Vec<String>,
    #[serde(default)]
    pub pods: Vec<String>,
    #[serde(default)]
    pub containers: Vec<String>,
    #[serde(default)]
    pub sources: Vec<Source>,
    #[serde(default)]
    pub start: DateTime<Utc>,
    #[serde(default)]
    pub end: DateTime<Utc>,
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default)]
    pub burst: i64,
    #[serde(default)]
    pub include_regex: String,
    #[serde(default)]
    pub exclude_regex: String,
    /// When true, a query shard answers from its own index only and does
    /// not fan out to peer shards.
    #[serde(default)]
    pub local: bool,
    /// Byte budget for assembled raw/entry contents; 0 means unlimited.
    #[serde(default)]
    pub contents_limit: i64,
    #[serde(default)]
    pub version: String,
}

fn default_page() -> i64 {
    1
}

impl Request {
    pub fn effective_burst(&self, default_max_burst: i64) -> i64 {
        if self.burst > 0 {
            self.burst.min(default_max_burst)
        } else {
            default_max_burst
        }
    }

    pub fn is_v2(&self) -> bool {
        self.version == "v2"
    }
}
