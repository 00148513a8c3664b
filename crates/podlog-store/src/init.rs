//! Reconstructs the in-memory chunk map from the on-disk store root at
//! startup: walks `{ns}_{pod}_{pod_uid}/{container|emptydir-file::path}/`
//! directories, parsing each one's labels, checkpoint, and sealed/temp
//! blocks back into a [`Chunk`].

use std::path::Path;

use dashmap::DashMap;
use podlog_model::block::{parse_block_file_name, TEMP_BLOCK_FILE_NAME};
use podlog_model::check_point::CheckPoint;
use podlog_model::labels::{Labels, LABELS_FILE_NAME};
use podlog_model::source::LOG_TYPE_DELIMITER;
use podlog_model::{Block, Chunk, LogFile, Source, TempBlock};
use tokio::sync::RwLock;

use crate::error::StoreError;
use crate::key::ChunkKey;

pub fn init_chunks(root: &Path, cluster: &str) -> Result<DashMap<String, RwLock<Chunk>>, StoreError> {
    let chunks = DashMap::new();

    let pod_dirs = match std::fs::read_dir(root) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(chunks),
        Err(e) => return Err(StoreError::io(root, e)),
    };

    for pod_entry in pod_dirs {
        let pod_entry = pod_entry.map_err(|e| StoreError::io(root, e))?;
        if !pod_entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
            continue;
        }

        let pod_dir_name = pod_entry.file_name().to_string_lossy().into_owned();
        let Some((namespace, pod, pod_uid)) = parse_pod_dir_name(&pod_dir_name) else {
            tracing::warn!(dir = %pod_dir_name, "skipping pod directory with unexpected name");
            continue;
        };

        let labels = Labels::from_file(pod_entry.path().join(LABELS_FILE_NAME)).unwrap_or_default();

        let block_dirs = std::fs::read_dir(pod_entry.path()).map_err(|e| StoreError::io(pod_entry.path(), e))?;
        for block_entry in block_dirs {
            let block_entry = block_entry.map_err(|e| StoreError::io(pod_entry.path(), e))?;
            if !block_entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
                continue;
            }

            let dir_name = block_entry.file_name().to_string_lossy().into_owned();
            let (container, source) = parse_block_dir_name(&dir_name);

            if let Some(chunk) = init_one_chunk(&block_entry.path(), &namespace, &labels, &pod, &pod_uid, &container, source, cluster)? {
                let key = ChunkKey::from_chunk(&chunk).to_string();
                chunks.insert(key, RwLock::new(chunk));
            }
        }
    }

    Ok(chunks)
}

/// Splits `{namespace}_{pod}_{pod_uid}` from the right so that pod names
/// carrying their own underscores (not legal in Kubernetes, but tolerated
/// here) still yield the correct `pod_uid` tail.
fn parse_pod_dir_name(name: &str) -> Option<(String, String, String)> {
    let mut parts = name.splitn(2, '_');
    let namespace = parts.next()?.to_string();
    let rest = parts.next()?;
    let (pod, pod_uid) = rest.rsplit_once('_')?;
    Some((namespace, pod.to_string(), pod_uid.to_string()))
}

fn parse_block_dir_name(name: &str) -> (String, Source) {
    if let Some((prefix, sanitized_path)) = name.split_once(LOG_TYPE_DELIMITER) {
        if prefix == Source::EMPTYDIR_FILE {
            return (String::new(), Source::emptydir_file(sanitized_path));
        }
    }
    (name.to_string(), Source::std_stream())
}

#[allow(clippy::too_many_arguments)]
fn init_one_chunk(
    block_dir: &Path,
    namespace: &str,
    labels: &Labels,
    pod: &str,
    pod_uid: &str,
    container: &str,
    source: Source,
    cluster: &str,
) -> Result<Option<Chunk>, StoreError> {
    let mut block_names = Vec::new();
    let mut has_temp = false;

    for entry in std::fs::read_dir(block_dir).map_err(|e| StoreError::io(block_dir, e))? {
        let entry = entry.map_err(|e| StoreError::io(block_dir, e))?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if name == TEMP_BLOCK_FILE_NAME {
            has_temp = true;
        } else if name.ends_with(".log") {
            block_names.push(name);
        }
    }

    if block_names.is_empty() && !has_temp {
        return Ok(None);
    }

    let file = LogFile {
        namespace: namespace.to_string(),
        labels: labels.clone(),
        pod: pod.to_string(),
        pod_uid: pod_uid.to_string(),
        container: container.to_string(),
        file_name: String::new(),
        path: String::new(),
        source,
        number: 0,
        mod_time: chrono::Utc::now(),
        inspected_size: 0,
    };

    let check_point = CheckPoint::from_file(block_dir).map_err(|e| StoreError::io(block_dir, e))?;
    let mut chunk = Chunk::new(&file, Some(check_point), cluster)?;

    let mut blocks = Vec::new();
    for name in block_names {
        match parse_block_file_name(&name) {
            Ok((start, end, lines, file_num)) => {
                let size = std::fs::metadata(block_dir.join(&name)).map(|m| m.len() as i64).unwrap_or(0);
                blocks.push(Block::new(start, end, lines, size, file_num));
            }
            Err(e) => {
                tracing::warn!(path = %block_dir.join(&name).display(), error = %e, "skipping malformed block file");
            }
        }
    }
    blocks.sort_by_key(|b| b.file_num);
    chunk.append_blocks(blocks);

    if has_temp {
        let temp_path = block_dir.join(TEMP_BLOCK_FILE_NAME);
        let size = std::fs::metadata(&temp_path).map(|m| m.len() as i64).unwrap_or(0);
        if size > 0 {
            let file_num = chunk.last_block().map(|b| b.file_num + 1).unwrap_or(0);
            chunk.set_temp_block(TempBlock {
                started_at: chunk.updated_at,
                ended_at: chunk.updated_at,
                line: 0,
                size,
                file_num,
                is_backup: false,
            });
        }
    }

    Ok(Some(chunk))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_pod_dir_name_with_hyphenated_pod() {
        let (ns, pod, uid) = parse_pod_dir_name("default_web-7f8c9d6b5-abcde_uid-123").unwrap();
        assert_eq!(ns, "default");
        assert_eq!(pod, "web-7f8c9d6b5-abcde");
        assert_eq!(uid, "uid-123");
    }

    #[test]
    fn parses_std_stream_block_dir() {
        let (container, source) = parse_block_dir_name("app");
        assert_eq!(container, "app");
        assert_eq!(source, Source::std_stream());
    }

    #[test]
    fn parses_emptydir_block_dir() {
        let (container, source) = parse_block_dir_name("emptydir-file::logs_app.log");
        assert_eq!(container, "");
        assert_eq!(source, Source::emptydir_file("logs_app.log"));
    }

    #[test]
    fn init_chunks_on_missing_root_yields_empty_map() {
        let chunks = init_chunks(Path::new("/nonexistent/podlog/root"), "local").unwrap();
        assert!(chunks.is_empty());
    }

    #[test]
    fn reconstructs_a_chunk_from_sealed_blocks_and_temp_log() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        let block_dir = root.join("ns_web-0_uid-1").join("app");
        std::fs::create_dir_all(&block_dir).unwrap();

        let name = podlog_model::block::block_file_name(
            chrono::Utc::now() - chrono::Duration::seconds(10),
            chrono::Utc::now() - chrono::Duration::seconds(5),
            10,
            0,
        );
        std::fs::write(block_dir.join(&name), vec![b'x'; 100]).unwrap();
        std::fs::write(block_dir.join(TEMP_BLOCK_FILE_NAME), b"leftover\n").unwrap();

        let chunks = init_chunks(root, "local").unwrap();
        assert_eq!(chunks.len(), 1);
    }
}
