use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::chunk::Chunk;

/// A parsed representation of one line, returned by the v2 range/entries
/// API.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    #[serde(rename = "time")]
    pub timestamp: DateTime<Utc>,
    pub source_type: String,
    pub source_path: String,
    pub stream: String,
    pub tag: String,
    pub cluster: String,
    pub namespace: String,
    pub labels: BTreeMap<String, String>,
    pub pod: String,
    pub container: String,
    pub message: String,
}

impl Entry {
    pub fn from_chunk(chunk: &Chunk) -> Self {
        Entry {
            source_type: chunk.source.source_type.clone(),
            source_path: chunk.source.path.clone(),
            cluster: chunk.cluster.clone(),
            namespace: chunk.namespace.clone(),
            pod: chunk.pod.clone(),
            container: chunk.container.clone(),
            labels: chunk.labels.0.clone(),
            ..Default::default()
        }
    }
}

impl std::fmt::Display for Entry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}
