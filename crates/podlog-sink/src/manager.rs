//! Store/exporter side: given the chunks a store or exporter currently
//! holds and an export window, fetches preorders
//! for the namespaces present and materializes one `Order` per chunk that
//! matches a preorder's selector.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use podlog_model::Chunk;
use podlog_query::ChunkMatcher;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::types::{Order, Preorder};

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ManagerConfig {
    pub syncer_addr: String,
    pub scheme: String,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        ManagerConfig {
            syncer_addr: "sink-syncer:80".to_string(),
            scheme: "http".to_string(),
        }
    }
}

pub struct Manager {
    config: ManagerConfig,
    client: reqwest::Client,
    /// Process-wide cache keyed by chunk key, replaced
    /// wholesale by every [`Manager::update`] call.
    orders: Arc<DashMap<String, Vec<Order>>>,
}

/// Groups chunks by namespace, just enough of a `ChunkIndexer` for the
/// manager's per-namespace preorder lookup.
fn index_by_namespace<'a>(chunks: impl Iterator<Item = &'a Chunk>) -> HashMap<String, Vec<&'a Chunk>> {
    let mut by_ns: HashMap<String, Vec<&Chunk>> = HashMap::new();
    for chunk in chunks {
        by_ns.entry(chunk.namespace.clone()).or_default().push(chunk);
    }
    by_ns
}

/// Drops chunks whose pod is no longer present in `live_pod_uids`, so rule
/// matching doesn't produce orders against zombie chunks already pending
/// cleanup. `None` means the caller has no pod map to filter against (e.g.
/// tests) and every chunk is kept.
fn filter_existing_pods<'a>(chunks: &'a [Chunk], live_pod_uids: Option<&HashSet<String>>) -> Vec<&'a Chunk> {
    match live_pod_uids {
        Some(live) => chunks.iter().filter(|c| live.contains(&c.pod_uid)).collect(),
        None => chunks.iter().collect(),
    }
}

impl Manager {
    pub fn new(config: ManagerConfig) -> Self {
        Manager {
            config,
            client: reqwest::Client::new(),
            orders: Arc::new(DashMap::new()),
        }
    }

    pub fn orders(&self) -> Arc<DashMap<String, Vec<Order>>> {
        self.orders.clone()
    }

    async fn fetch_preorders(&self, namespaces: &[String]) -> HashMap<String, Vec<Preorder>> {
        let url = format!("{}://{}/preorders", self.config.scheme, self.config.syncer_addr);
        match self.client.post(&url).json(namespaces).send().await {
            Ok(resp) if resp.status().is_success() => resp.json().await.unwrap_or_default(),
            Ok(resp) => {
                tracing::warn!(status = %resp.status(), "syncer preorder fetch returned an error status");
                HashMap::new()
            }
            Err(e) => {
                tracing::warn!(error = %e, "syncer preorder fetch failed");
                HashMap::new()
            }
        }
    }

    /// Narrows every matched
    /// preorder's selector to `[start, end]`, matches it against every
    /// chunk in its namespace whose pod is still live per `live_pod_uids`,
    /// and emits one Order per match. Replaces the whole order cache on
    /// return.
    pub async fn update(&self, chunks: &[Chunk], live_pod_uids: Option<&HashSet<String>>, start: DateTime<Utc>, end: DateTime<Utc>) -> usize {
        let live_chunks = filter_existing_pods(chunks, live_pod_uids);
        let by_namespace = index_by_namespace(live_chunks.into_iter());
        let namespaces: Vec<String> = by_namespace.keys().cloned().collect();
        let preorders = self.fetch_preorders(&namespaces).await;

        let fresh: DashMap<String, Vec<Order>> = DashMap::new();
        let mut total = 0;

        for (namespace, ns_chunks) in &by_namespace {
            let Some(ns_preorders) = preorders.get(namespace) else {
                continue;
            };

            for preorder in ns_preorders {
                let mut request = preorder.request.clone();
                request.start = start;
                request.end = end;
                let matcher = ChunkMatcher::new(&request);

                for chunk in ns_chunks {
                    if !matcher.matches(chunk) {
                        continue;
                    }
                    let order = Order {
                        preorder: Preorder {
                            sink_namespace: preorder.sink_namespace.clone(),
                            sink_name: preorder.sink_name.clone(),
                            rule_name: preorder.rule_name.clone(),
                            request: request.clone(),
                            destination: preorder.destination.clone(),
                            interval: preorder.interval,
                        },
                        chunk_key: chunk_key(chunk),
                        namespace: chunk.namespace.clone(),
                        pod: chunk.pod.clone(),
                        pod_uid: chunk.pod_uid.clone(),
                        container: chunk.container.clone(),
                        source: chunk.source.clone(),
                    };
                    fresh.entry(chunk_key(chunk)).or_default().push(order);
                    total += 1;
                }
            }
        }

        self.orders.clear();
        for entry in fresh {
            self.orders.insert(entry.0, entry.1);
        }
        total
    }
}

fn chunk_key(chunk: &Chunk) -> String {
    format!("{}_{}_{}_{}_{}_{}", chunk.namespace, chunk.set_name, chunk.pod, chunk.pod_uid, chunk.container, chunk.source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use podlog_model::{Labels, Source};
    use std::collections::BTreeMap;

    fn sample_chunk(namespace: &str) -> Chunk {
        Chunk {
            id: "id".into(),
            cluster: "local".into(),
            namespace: namespace.into(),
            labels: Labels(BTreeMap::new()),
            set_name: "web".into(),
            pod: "web-0".into(),
            pod_uid: "uid".into(),
            container: "app".into(),
            source: Source::std_stream(),
            blocks: Vec::new(),
            temp_block: Default::default(),
            started_at: Utc::now(),
            updated_at: Utc::now(),
            deletion_mark: false,
            deletion_mark_in_block: false,
            line: 0,
            size: 0,
            check_point: None,
            store_addr: String::new(),
            relative_pod_dir: String::new(),
            relative_block_dir: String::new(),
        }
    }

    #[test]
    fn index_by_namespace_groups_chunks() {
        let chunks = vec![sample_chunk("ns-a"), sample_chunk("ns-b"), sample_chunk("ns-a")];
        let index = index_by_namespace(chunks.iter());
        assert_eq!(index.get("ns-a").unwrap().len(), 2);
        assert_eq!(index.get("ns-b").unwrap().len(), 1);
    }

    #[test]
    fn chunk_key_is_stable_for_the_same_identity() {
        let a = sample_chunk("ns");
        let b = sample_chunk("ns");
        assert_eq!(chunk_key(&a), chunk_key(&b));
    }

    #[test]
    fn filter_existing_pods_keeps_everything_with_no_pod_map() {
        let chunks = vec![sample_chunk("ns-a"), sample_chunk("ns-b")];
        assert_eq!(filter_existing_pods(&chunks, None).len(), 2);
    }

    #[test]
    fn filter_existing_pods_drops_chunks_for_pods_no_longer_live() {
        let mut gone = sample_chunk("ns-a");
        gone.pod_uid = "stale-uid".into();
        let mut live = sample_chunk("ns-a");
        live.pod_uid = "live-uid".into();
        let chunks = vec![gone, live.clone()];

        let live_pod_uids: HashSet<String> = ["live-uid".to_string()].into_iter().collect();
        let kept = filter_existing_pods(&chunks, Some(&live_pod_uids));

        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].pod_uid, live.pod_uid);
    }
}
