//! One receive task consumes the push buffer: the HTTP handler only
//! enqueues onto a bounded channel; a single receiver task does the
//! actual unmarshal-stamp-insert work, so overload backpressures the
//! sender (the HTTP handler) rather than dropping pushes.

use std::sync::Arc;

use podlog_model::Chunk;
use tokio::sync::mpsc;

use crate::index::ChunkIndex;

#[derive(Clone)]
pub struct PushSender {
    tx: mpsc::Sender<(Vec<Chunk>, String)>,
}

impl PushSender {
    /// Enqueues a pushed batch. Blocks the caller once the channel is at
    /// capacity, so an overfull buffer backpressures the HTTP handler
    /// rather than dropping pushes.
    pub async fn send(&self, batch: Vec<Chunk>, source_addr: String) -> Result<(), mpsc::error::SendError<(Vec<Chunk>, String)>> {
        self.tx.send((batch, source_addr)).await
    }
}

/// Builds the bounded channel and its receiver task. Returns the sender
/// half for the HTTP handler to enqueue onto.
pub fn spawn_receiver(index: Arc<ChunkIndex>, capacity: usize) -> PushSender {
    let (tx, mut rx) = mpsc::channel::<(Vec<Chunk>, String)>(capacity);

    tokio::spawn(async move {
        while let Some((batch, source_addr)) = rx.recv().await {
            let now = chrono::Utc::now();
            for mut chunk in batch {
                chunk.store_addr = source_addr.clone();
                index.insert(chunk, now);
            }
            podlog_metrics::set_stored_chunks(&source_addr, index.count_for_store(&source_addr));
        }
    });

    PushSender { tx }
}

#[cfg(test)]
mod tests {
    use super::*;
    use podlog_model::{Labels, Source};
    use std::collections::BTreeMap;

    fn chunk(id: &str) -> Chunk {
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
            started_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
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

    #[tokio::test]
    async fn pushed_batch_is_stamped_with_the_source_address() {
        let index = Arc::new(ChunkIndex::new());
        let sender = spawn_receiver(index.clone(), 10);
        sender.send(vec![chunk("a")], "10.0.0.5:80".to_string()).await.unwrap();

        // Give the receiver task a chance to run.
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        assert_eq!(index.len(), 1);
        assert_eq!(index.all()[0].store_addr, "10.0.0.5:80");
    }
}
