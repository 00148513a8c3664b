//! The two periodic housekeeping passes every store runs: `mark` decides
//! which blocks/chunks are due for deletion — under disk pressure,
//! evicting a share of each chunk's oldest blocks regardless of age;
//! otherwise by ordinary size/time limits — and `clean` carries out
//! whatever `mark` flagged.

use std::path::Path;

use dashmap::DashMap;
use podlog_model::Chunk;
use tokio::sync::RwLock;

use crate::config::StoreConfig;
use crate::disk;
use crate::error::StoreError;

/// Runs the eviction check against every chunk: disk-pressure eviction if
/// the filesystem under `root` is over `soft_limit_for_disk`, else ordinary
/// size/time retention per chunk.
pub async fn mark(root: &Path, config: &StoreConfig, chunks: &DashMap<String, RwLock<Chunk>>) {
    let under_pressure = disk::disk_usage_ratio(root)
        .map(|ratio| ratio > config.soft_limit_for_disk)
        .unwrap_or(false);

    for entry in chunks.iter() {
        let mut chunk = entry.value().write().await;
        if under_pressure {
            mark_oldest_share(&mut chunk, config.soft_limit_ratio_for_blocks);
        } else {
            limit_chunk_size(&mut chunk, config.retention_size.0 as i64);
            limit_chunk_time(&mut chunk, chrono::Duration::from_std(config.retention_time).unwrap_or(chrono::Duration::zero()));
        }
    }
}

/// Marks the oldest `ceil(N * (1 - ratio))` blocks of a chunk for deletion,
/// independent of age — the response to disk pressure, where staying under
/// the hard cap matters more than honoring `retention_time`.
fn mark_oldest_share(chunk: &mut Chunk, keep_ratio: f64) {
    let total = chunk.block_length();
    if total == 0 {
        return;
    }
    let evict_ratio = (1.0 - keep_ratio).clamp(0.0, 1.0);
    let evict_count = (total as f64 * evict_ratio).ceil() as usize;
    for i in 0..evict_count.min(total) {
        chunk.mark_block_at(i);
    }
}

/// Walks blocks from newest to oldest accumulating kept size; once the
/// total exceeds `limit`, every older block is marked for deletion.
fn limit_chunk_size(chunk: &mut Chunk, limit: i64) {
    if limit <= 0 {
        return;
    }
    let mut kept = chunk.temp_block.size;
    let mut cut_at: Option<usize> = None;

    for (i, block) in chunk.blocks.iter().enumerate().rev() {
        kept += block.size;
        if kept > limit {
            cut_at = Some(i);
            break;
        }
    }

    if let Some(cut_at) = cut_at {
        for i in 0..=cut_at {
            chunk.mark_block_at(i);
        }
    }
}

/// Marks any block whose `ended_at` has aged past `retention`, and flags
/// the whole chunk for deletion once it hasn't been written to in that
/// long either.
fn limit_chunk_time(chunk: &mut Chunk, retention: chrono::Duration) {
    let cutoff = chrono::Utc::now() - retention;

    for i in 0..chunk.block_length() {
        if chunk.blocks[i].ended_at < cutoff {
            chunk.mark_block_at(i);
        }
    }

    if chunk.updated_at < cutoff {
        chunk.deletion_mark = true;
    }
}

/// Deletes everything `mark` flagged: whole chunks carrying
/// `deletion_mark`, individually marked blocks within chunks that survive,
/// then any pod directory left with nothing under it.
pub async fn clean(root: &Path, chunks: &DashMap<String, RwLock<Chunk>>) -> Result<(), StoreError> {
    let mut doomed_keys = Vec::new();

    for entry in chunks.iter() {
        let key = entry.key().clone();
        let mut chunk = entry.value().write().await;

        if chunk.deletion_mark {
            doomed_keys.push(key);
            continue;
        }

        if chunk.deletion_mark_in_block {
            let marked: Vec<usize> = chunk
                .blocks
                .iter()
                .enumerate()
                .filter(|(_, b)| b.deletion_mark)
                .map(|(i, _)| i)
                .collect();
            for i in marked.into_iter().rev() {
                chunk.delete_block_at(i, root).map_err(|e| StoreError::io(root, e))?;
            }
            chunk.deletion_mark_in_block = false;
        }
    }

    for key in doomed_keys {
        if let Some((_, chunk_lock)) = chunks.remove(&key) {
            chunk_lock.read().await.delete_container_files(root);
        }
    }

    remove_empty_pod_dirs(root)?;
    Ok(())
}

fn remove_empty_pod_dirs(root: &Path) -> Result<(), StoreError> {
    let entries = match std::fs::read_dir(root) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(StoreError::io(root, e)),
    };

    for entry in entries {
        let entry = entry.map_err(|e| StoreError::io(root, e))?;
        if !entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
            continue;
        }
        let path = entry.path();
        if disk::count_sub_directories(&path).unwrap_or(1) == 0 {
            let _ = std::fs::remove_dir(&path);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use podlog_model::{Block, Labels, LogFile, Source};

    fn chunk_with_blocks(sizes: &[i64]) -> Chunk {
        let file = LogFile {
            namespace: "ns".into(),
            labels: Labels::default(),
            pod: "web-0".into(),
            pod_uid: "uid-1".into(),
            container: "app".into(),
            file_name: "0.log".into(),
            path: "unused".into(),
            source: Source::std_stream(),
            number: 0,
            mod_time: chrono::Utc::now(),
            inspected_size: 0,
        };
        let mut chunk = Chunk::new(&file, None, "local").unwrap();
        let now = chrono::Utc::now();
        let blocks = sizes
            .iter()
            .enumerate()
            .map(|(i, &size)| {
                Block::new(
                    now - chrono::Duration::seconds((sizes.len() - i) as i64 * 10),
                    now - chrono::Duration::seconds((sizes.len() - i) as i64 * 10 - 5),
                    10,
                    size,
                    i as i64,
                )
            })
            .collect();
        chunk.append_blocks(blocks);
        chunk
    }

    #[test]
    fn limit_chunk_size_marks_the_oldest_blocks_over_the_cap() {
        let mut chunk = chunk_with_blocks(&[100, 100, 100, 100]);
        limit_chunk_size(&mut chunk, 250);
        assert!(chunk.blocks[0].deletion_mark);
        assert!(!chunk.blocks[3].deletion_mark);
    }

    #[test]
    fn limit_chunk_size_marks_nothing_when_under_the_cap() {
        let mut chunk = chunk_with_blocks(&[100, 100]);
        limit_chunk_size(&mut chunk, 10_000);
        assert!(chunk.blocks.iter().all(|b| !b.deletion_mark));
    }

    #[test]
    fn mark_oldest_share_rounds_up_and_evicts_from_the_front() {
        let mut chunk = chunk_with_blocks(&[1, 1, 1, 1, 1]);
        mark_oldest_share(&mut chunk, 0.9); // keep 90%, evict ceil(5*0.1)=1
        assert!(chunk.blocks[0].deletion_mark);
        assert!(!chunk.blocks[1].deletion_mark);
    }

    #[test]
    fn limit_chunk_time_marks_the_whole_chunk_once_stale_enough() {
        let mut chunk = chunk_with_blocks(&[10]);
        chunk.updated_at = chrono::Utc::now() - chrono::Duration::days(30);
        limit_chunk_time(&mut chunk, chrono::Duration::days(7));
        assert!(chunk.deletion_mark);
    }

    #[tokio::test]
    async fn clean_removes_blocks_marked_for_deletion() {
        let dir = tempfile::tempdir().unwrap();
        let mut chunk = chunk_with_blocks(&[10, 10]);
        chunk.mark_block_at(0);
        let map = DashMap::new();
        map.insert("key".to_string(), RwLock::new(chunk));

        clean(dir.path(), &map).await.unwrap();

        let remaining = map.get("key").unwrap();
        let remaining = remaining.value().read().await;
        assert_eq!(remaining.block_length(), 1);
    }

    #[tokio::test]
    async fn clean_removes_chunks_with_deletion_mark() {
        let dir = tempfile::tempdir().unwrap();
        let mut chunk = chunk_with_blocks(&[10]);
        chunk.deletion_mark = true;
        let map = DashMap::new();
        map.insert("key".to_string(), RwLock::new(chunk));

        clean(dir.path(), &map).await.unwrap();
        assert!(map.is_empty());
    }
}
