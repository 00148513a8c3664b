//! The authoritative in-memory chunk index for one ingest node: a
//! concurrent map of chunks guarded individually (one `tokio::sync::RwLock`
//! per chunk, rather than a single RW mutex over the whole block-data
//! map) so a range scan against one chunk never blocks a write to
//! another. Insertion/removal of chunk entries is lock-free via
//! `DashMap`. See DESIGN.md for this redesign of the coarser
//! single-mutex model for the per-chunk block data itself.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use podlog_limiter::Limiter;
use podlog_model::{CheckPoint, Chunk, LogFile};
use tokio::sync::RwLock;

use crate::config::StoreConfig;
use crate::error::StoreError;
use crate::init;
use crate::key::ChunkKey;

pub struct Store {
    pub config: Arc<StoreConfig>,
    root: PathBuf,
    cluster: String,
    chunks: DashMap<String, RwLock<Chunk>>,
    limiter: Limiter,
}

impl Store {
    /// Opens the store at `config.store_root_path`, reconstructing its
    /// chunk map from whatever is already on disk.
    pub fn open(config: Arc<StoreConfig>, cluster: impl Into<String>) -> Result<Self, StoreError> {
        let root = PathBuf::from(&config.store_root_path);
        let cluster = cluster.into();
        let chunks = init::init_chunks(&root, &cluster)?;
        Ok(Store {
            config,
            root,
            cluster,
            chunks,
            limiter: Limiter::new(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn cluster(&self) -> &str {
        &self.cluster
    }

    pub fn limiter(&self) -> &Limiter {
        &self.limiter
    }

    pub fn chunks(&self) -> &DashMap<String, RwLock<Chunk>> {
        &self.chunks
    }

    pub fn has_chunk(&self, key: &ChunkKey) -> bool {
        self.chunks.contains_key(&key.to_string())
    }

    pub async fn load_chunk(&self, key: &ChunkKey) -> Option<Chunk> {
        let entry = self.chunks.get(&key.to_string())?;
        Some(entry.value().read().await.clone())
    }

    pub fn store_chunk(&self, chunk: Chunk) {
        let key = ChunkKey::from_chunk(&chunk).to_string();
        self.chunks.insert(key, RwLock::new(chunk));
    }

    pub async fn update_chunk<F>(&self, key: &ChunkKey, f: F) -> bool
    where
        F: FnOnce(&mut Chunk),
    {
        match self.chunks.get(&key.to_string()) {
            Some(entry) => {
                let mut guard = entry.value().write().await;
                f(&mut guard);
                true
            }
            None => false,
        }
    }

    /// Returns the chunk for `file`, creating and registering a fresh one
    /// (with `check_point`, if this is the first time this stream is seen)
    /// when it doesn't already exist.
    pub fn get_or_create_chunk(&self, file: &LogFile, check_point: Option<CheckPoint>) -> Result<ChunkKey, StoreError> {
        let chunk = Chunk::new(file, check_point, &self.cluster)?;
        let key = ChunkKey::from_chunk(&chunk);
        let map_key = key.to_string();
        if !self.chunks.contains_key(&map_key) {
            self.chunks.insert(map_key, RwLock::new(chunk));
        }
        Ok(key)
    }

    /// Snapshot of every chunk, consumed by the push client to batch and
    /// ship to the query tier.
    pub async fn snapshot_chunks(&self) -> Vec<Chunk> {
        let mut out = Vec::with_capacity(self.chunks.len());
        for entry in self.chunks.iter() {
            out.push(entry.value().read().await.clone());
        }
        out
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use podlog_model::{Labels, Source};

    fn sample_file() -> LogFile {
        LogFile {
            namespace: "ns".into(),
            labels: Labels::default(),
            pod: "web-7f8c9d6b5-abcde".into(),
            pod_uid: "uid-1".into(),
            container: "app".into(),
            file_name: "0.log".into(),
            path: "/var/log/pods/ns_web_uid-1/app/0.log".into(),
            source: Source::std_stream(),
            number: 0,
            mod_time: chrono::Utc::now(),
            inspected_size: 0,
        }
    }

    fn open_store(dir: &tempfile::TempDir) -> Store {
        let config = Arc::new(StoreConfig {
            store_root_path: dir.path().display().to_string(),
            ..Default::default()
        });
        Store::open(config, "local").unwrap()
    }

    #[test]
    fn get_or_create_chunk_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir);
        let file = sample_file();

        let key1 = store.get_or_create_chunk(&file, None).unwrap();
        let key2 = store.get_or_create_chunk(&file, None).unwrap();
        assert_eq!(key1, key2);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn update_chunk_mutates_the_stored_value() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir);
        let file = sample_file();
        let key = store.get_or_create_chunk(&file, None).unwrap();

        let updated = store.update_chunk(&key, |chunk| chunk.line = 42).await;
        assert!(updated);

        let chunk = store.load_chunk(&key).await.unwrap();
        assert_eq!(chunk.line, 42);
    }
}
