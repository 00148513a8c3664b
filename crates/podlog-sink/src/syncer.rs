//! Server side, operator-adjacent: periodically GETs the operator's
//! `/sync` endpoint for the full sink list, rebuilds the per-namespace
//! preorder index, and serves it to managers over HTTP so store- and
//! exporter-side processes don't need direct access to the operator.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use dashmap::DashMap;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::types::{Preorder, Sink};

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SyncerConfig {
    pub operator_sync_url: String,
    #[serde(with = "humantime_serde")]
    pub sync_interval: Duration,
}

impl Default for SyncerConfig {
    fn default() -> Self {
        SyncerConfig {
            operator_sync_url: "http://operator/sync".to_string(),
            sync_interval: Duration::from_secs(30),
        }
    }
}

pub struct Syncer {
    config: SyncerConfig,
    client: reqwest::Client,
    preorders: DashMap<String, Vec<Preorder>>,
}

fn preorders_for(sink: &Sink) -> Vec<Preorder> {
    sink.rules
        .iter()
        .map(|rule| Preorder {
            sink_namespace: sink.namespace.clone(),
            sink_name: sink.name.clone(),
            rule_name: rule.name.clone(),
            request: rule.request.clone(),
            destination: rule.destination.clone(),
            interval: rule.interval,
        })
        .collect()
}

impl Syncer {
    pub fn new(config: SyncerConfig) -> Self {
        Syncer {
            config,
            client: reqwest::Client::new(),
            preorders: DashMap::new(),
        }
    }

    /// Runs the sync loop until cancelled.
    pub async fn run(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(self.config.sync_interval);
        loop {
            ticker.tick().await;
            self.sync_once().await;
        }
    }

    async fn sync_once(&self) {
        let sinks = match self.client.get(&self.config.operator_sync_url).send().await {
            Ok(resp) if resp.status().is_success() => match resp.json::<Vec<Sink>>().await {
                Ok(sinks) => sinks,
                Err(e) => {
                    tracing::warn!(error = %e, "failed to decode operator sync response");
                    return;
                }
            },
            Ok(resp) => {
                tracing::warn!(status = %resp.status(), "operator sync returned an error status");
                return;
            }
            Err(e) => {
                tracing::warn!(error = %e, "operator sync request failed");
                return;
            }
        };

        // Atomically replace: build the fresh map first, then swap
        // namespace-by-namespace so a concurrent reader never sees a torn
        // update, and drop namespaces no longer present.
        let mut fresh: HashMap<String, Vec<Preorder>> = HashMap::new();
        for sink in &sinks {
            fresh.entry(sink.namespace.clone()).or_default().extend(preorders_for(sink));
        }

        let stale: Vec<String> = self.preorders.iter().map(|e| e.key().clone()).filter(|ns| !fresh.contains_key(ns)).collect();
        for ns in stale {
            self.preorders.remove(&ns);
        }
        for (ns, preorders) in fresh {
            self.preorders.insert(ns, preorders);
        }
    }

    pub fn preorders_for_namespaces(&self, namespaces: &[String]) -> HashMap<String, Vec<Preorder>> {
        namespaces
            .iter()
            .filter_map(|ns| self.preorders.get(ns).map(|v| (ns.clone(), v.value().clone())))
            .collect()
    }
}

pub fn router(syncer: Arc<Syncer>) -> Router {
    Router::new().route("/preorders", post(preorders_handler)).with_state(syncer)
}

async fn preorders_handler(State(syncer): State<Arc<Syncer>>, Json(namespaces): Json<Vec<String>>) -> Json<HashMap<String, Vec<Preorder>>> {
    Json(syncer.preorders_for_namespaces(&namespaces))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preorders_for_expands_one_entry_per_rule() {
        let sink = Sink {
            namespace: "ns".into(),
            name: "logs".into(),
            rules: vec![
                crate::types::Rule {
                    name: "rule-a".into(),
                    request: podlog_query::Request::default(),
                    destination: crate::types::Destination::Http(crate::types::HttpDestination {
                        destination: "http://sink".into(),
                    }),
                    interval: std::time::Duration::from_secs(60),
                },
                crate::types::Rule {
                    name: "rule-b".into(),
                    request: podlog_query::Request::default(),
                    destination: crate::types::Destination::Http(crate::types::HttpDestination {
                        destination: "http://sink2".into(),
                    }),
                    interval: std::time::Duration::from_secs(60),
                },
            ],
        };
        let preorders = preorders_for(&sink);
        assert_eq!(preorders.len(), 2);
        assert_eq!(preorders[0].rule_name, "rule-a");
        assert_eq!(preorders[1].rule_name, "rule-b");
    }

    #[test]
    fn preorders_for_namespaces_only_returns_requested_ones() {
        let syncer = Syncer::new(SyncerConfig::default());
        syncer.preorders.insert("ns-a".to_string(), Vec::new());
        syncer.preorders.insert("ns-b".to_string(), Vec::new());

        let found = syncer.preorders_for_namespaces(&["ns-a".to_string(), "ns-c".to_string()]);
        assert_eq!(found.len(), 1);
        assert!(found.contains_key("ns-a"));
    }
}
