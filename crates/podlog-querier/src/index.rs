//! The query shard's chunk database: an in-memory map keyed by
//! chunk `id`, with secondary indexes on `namespace` and `store_addr` so the
//! status loop's per-store eviction doesn't need a full scan.

use chrono::{DateTime, Utc};
use dashmap::{DashMap, DashSet};
use podlog_model::Chunk;

#[derive(Default)]
pub struct ChunkIndex {
    chunks: DashMap<String, Chunk>,
    by_namespace: DashMap<String, DashSet<String>>,
    by_store: DashMap<String, DashSet<String>>,
    /// Last time each `store_addr` was seen in a push, refreshed by
    /// [`ChunkIndex::insert`].
    store_map: DashMap<String, DateTime<Utc>>,
}

impl ChunkIndex {
    pub fn new() -> Self {
        ChunkIndex::default()
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Inserts (or overwrites) one pushed chunk, already stamped with
    /// `store_addr`, and refreshes `store_map[store_addr]`.
    pub fn insert(&self, chunk: Chunk, now: DateTime<Utc>) {
        let id = chunk.id.clone();
        let namespace = chunk.namespace.clone();
        let store_addr = chunk.store_addr.clone();

        self.by_namespace.entry(namespace).or_default().insert(id.clone());
        if !store_addr.is_empty() {
            self.by_store.entry(store_addr.clone()).or_default().insert(id.clone());
            self.store_map.insert(store_addr, now);
        }
        self.chunks.insert(id, chunk);
    }

    /// Total chunks currently attributed to `store_addr`, for the push
    /// receiver's stored-chunks gauge.
    pub fn count_for_store(&self, store_addr: &str) -> i64 {
        self.by_store.get(store_addr).map(|set| set.len() as i64).unwrap_or(0)
    }

    pub fn all(&self) -> Vec<Chunk> {
        self.chunks.iter().map(|e| e.value().clone()).collect()
    }

    /// Every chunk overlapping `[start, end]`, per the
    /// `updated_at > start && started_at < end` overlap test.
    pub fn within_range(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<Chunk> {
        self.chunks.iter().filter(|e| e.value().updated_at > start && e.value().started_at < end).map(|e| e.value().clone()).collect()
    }

    /// Deletes every chunk owned by `store_addr`; used by the status loop
    /// once that store has been silent past `store_retention_time`.
    pub fn remove_store(&self, store_addr: &str) {
        if let Some((_, ids)) = self.by_store.remove(store_addr) {
            for id in ids.iter() {
                self.remove_chunk(&id);
            }
        }
        self.store_map.remove(store_addr);
    }

    /// Deletes every chunk whose `updated_at` is older than `cutoff`.
    pub fn remove_stale(&self, cutoff: DateTime<Utc>) -> usize {
        let stale: Vec<String> = self.chunks.iter().filter(|e| e.value().updated_at < cutoff).map(|e| e.key().clone()).collect();
        for id in &stale {
            self.remove_chunk(id);
        }
        stale.len()
    }

    fn remove_chunk(&self, id: &str) {
        if let Some((_, chunk)) = self.chunks.remove(id) {
            if let Some(set) = self.by_namespace.get(&chunk.namespace) {
                set.remove(id);
            }
            if !chunk.store_addr.is_empty() {
                if let Some(set) = self.by_store.get(&chunk.store_addr) {
                    set.remove(id);
                }
            }
        }
    }

    /// `(store_addr, last_push)` pairs whose last push predates `cutoff`,
    /// for the status loop's eviction pass.
    pub fn stores_silent_since(&self, cutoff: DateTime<Utc>) -> Vec<String> {
        self.store_map.iter().filter(|e| *e.value() < cutoff).map(|e| e.key().clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use podlog_model::{Labels, Source};
    use std::collections::BTreeMap;

    fn chunk(id: &str, namespace: &str, store_addr: &str) -> Chunk {
        Chunk {
            id: id.to_string(),
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
            started_at: Utc::now() - chrono::Duration::seconds(10),
            updated_at: Utc::now(),
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
    fn insert_is_idempotent_by_id() {
        let index = ChunkIndex::new();
        index.insert(chunk("a", "ns", "10.0.0.1:80"), Utc::now());
        index.insert(chunk("a", "ns", "10.0.0.1:80"), Utc::now());
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn remove_store_drops_only_that_stores_chunks() {
        let index = ChunkIndex::new();
        index.insert(chunk("a", "ns", "store-a"), Utc::now());
        index.insert(chunk("b", "ns", "store-b"), Utc::now());
        index.remove_store("store-a");
        assert_eq!(index.len(), 1);
        assert_eq!(index.all()[0].id, "b");
    }

    #[test]
    fn remove_stale_drops_chunks_past_the_cutoff() {
        let index = ChunkIndex::new();
        let mut c = chunk("a", "ns", "store-a");
        c.updated_at = Utc::now() - chrono::Duration::days(10);
        index.insert(c, Utc::now());

        let removed = index.remove_stale(Utc::now() - chrono::Duration::days(7));
        assert_eq!(removed, 1);
        assert!(index.is_empty());
    }

    #[test]
    fn stores_silent_since_reports_overdue_stores() {
        let index = ChunkIndex::new();
        index.insert(chunk("a", "ns", "store-a"), Utc::now() - chrono::Duration::seconds(60));
        let silent = index.stores_silent_since(Utc::now() - chrono::Duration::seconds(30));
        assert_eq!(silent, vec!["store-a".to_string()]);
    }
}
