//! Periodically ships a snapshot of the local store's chunks to every query
//! shard: resolves the query service's shard addresses, batches
//! up to `max_chunks_to_push` chunks into one JSON body per shard, and
//! POSTs with `X-Real-IP: {local_addr}` so the receiving shard can stamp
//! `store_addr` on every chunk. A failed push is counted and dropped; the
//! next tick retries with a fresh snapshot rather than queuing the old one.

use std::sync::Arc;

use podlog_model::Chunk;
use podlog_store::Store;

use crate::config::PushConfig;

pub struct PushClient {
    store: Arc<Store>,
    config: Arc<PushConfig>,
    local_addr: String,
    client: reqwest::Client,
}

impl PushClient {
    pub fn new(store: Arc<Store>, config: Arc<PushConfig>, local_addr: impl Into<String>) -> Self {
        PushClient {
            store,
            config,
            local_addr: local_addr.into(),
            client: reqwest::Client::new(),
        }
    }

    /// Runs the push loop until cancelled. Intended to be spawned as its
    /// own task alongside the distributor.
    pub async fn run(self) {
        let mut ticker = tokio::time::interval(self.config.push_interval);
        loop {
            ticker.tick().await;
            self.push_once().await;
        }
    }

    async fn push_once(&self) {
        let endpoints = podlog_query::resolve_ordinals(&self.config.lookup_service_prefix, self.config.modulus, self.config.query_port).await;
        if endpoints.is_empty() {
            tracing::debug!("no query shards resolved, skipping push");
            return;
        }

        let snapshot = self.store.snapshot_chunks().await;
        for batch in snapshot.chunks(self.config.max_chunks_to_push.max(1)) {
            for addr in &endpoints {
                self.push_batch(addr, batch).await;
            }
        }
    }

    async fn push_batch(&self, addr: &str, batch: &[Chunk]) {
        let url = format!("{}://{addr}/push", self.config.scheme);
        let result = self
            .client
            .post(&url)
            .header("X-Real-IP", self.local_addr.clone())
            .json(batch)
            .send()
            .await;

        match result {
            Ok(resp) if resp.status().is_success() => {
                podlog_metrics::add_push_success(batch.len());
            }
            Ok(resp) => {
                tracing::debug!(url, status = %resp.status(), "push returned an error status");
                podlog_metrics::add_push_error();
            }
            Err(e) => {
                tracing::debug!(url, error = %e, "push request failed");
                podlog_metrics::add_push_error();
            }
        }
    }
}
