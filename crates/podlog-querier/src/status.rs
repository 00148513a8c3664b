//! Periodic status loop: evicts chunks from stores that have
//! gone silent past `store_retention_time`, and chunks stale past
//! `chunk_retention_time`, independent of whether their owning store is
//! still pushing.

use std::sync::Arc;

use chrono::Utc;

use crate::config::QuerierConfig;
use crate::index::ChunkIndex;

pub async fn run(index: Arc<ChunkIndex>, config: Arc<QuerierConfig>) {
    let mut ticker = tokio::time::interval(config.status_check_interval);
    loop {
        ticker.tick().await;
        tick(&index, &config);
    }
}

fn tick(index: &ChunkIndex, config: &QuerierConfig) {
    let now = Utc::now();

    let store_cutoff = now - chrono::Duration::from_std(config.store_retention_time).unwrap_or_default();
    for store_addr in index.stores_silent_since(store_cutoff) {
        tracing::debug!(store_addr, "store silent past retention, evicting its chunks");
        index.remove_store(&store_addr);
    }

    let chunk_cutoff = now - chrono::Duration::from_std(config.chunk_retention_time).unwrap_or_default();
    let removed = index.remove_stale(chunk_cutoff);
    if removed > 0 {
        tracing::debug!(removed, "pruned stale chunks past chunk retention");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use podlog_model::{Chunk, Labels, Source};
    use std::collections::BTreeMap;
    use std::time::Duration;

    fn chunk(id: &str, store_addr: &str, updated_at: chrono::DateTime<Utc>) -> Chunk {
        Chunk {
            id: id.to_string(),
            cluster: "local".into(),
            namespace: "ns".into(),
            labels: Labels(BTreeMap::new()),
            set_name: "web".into(),
            pod: "web-0".into(),
            pod_uid: "uid".into(),
            container: "app".into(),
            source: Source::std_stream(),
            blocks: Vec::new(),
            temp_block: Default::default(),
            started_at: updated_at - chrono::Duration::seconds(10),
            updated_at,
            deletion_mark: false,
            deletion_mark_in_block: false,
            line: 0,
            size: 0,
            check_point: None,
            store_addr: store_addr.into(),
            relative_pod_dir: String::new(),
            relative_block_dir: String::new(),
        }
    }

    #[test]
    fn tick_evicts_silent_stores_and_stale_chunks() {
        let index = ChunkIndex::new();
        index.insert(chunk("a", "store-a", Utc::now()), Utc::now() - chrono::Duration::seconds(60));
        index.insert(chunk("b", "store-b", Utc::now() - chrono::Duration::days(10)), Utc::now());

        let config = QuerierConfig {
            store_retention_time: Duration::from_secs(30),
            chunk_retention_time: Duration::from_secs(7 * 24 * 3600),
            ..Default::default()
        };

        tick(&index, &config);
        assert!(index.is_empty());
    }
}
