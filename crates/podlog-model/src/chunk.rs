use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::block::{Block, ReadableBlock, TempBlock};
use crate::check_point::CheckPoint;
use crate::labels::Labels;
use crate::logfile::LogFile;
use crate::set_name::{find_set_name, SetNameError};
use crate::source::Source;

/// The central aggregate: all blocks for one
/// `(namespace, set_name, pod, pod_uid, container, source)` tuple on one
/// node. Exclusively owned by the store of that node; the query shard holds
/// shared, read-only copies shipped by push (so `check_point` and the block
/// vectors are only ever mutated store-side).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    pub cluster: String,
    pub namespace: String,
    pub labels: Labels,
    pub set_name: String,
    pub pod: String,
    pub pod_uid: String,
    pub container: String,
    pub source: Source,
    #[serde(skip)]
    pub blocks: Vec<Block>,
    #[serde(skip)]
    pub temp_block: TempBlock,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip)]
    pub deletion_mark: bool,
    #[serde(skip)]
    pub deletion_mark_in_block: bool,
    pub line: i64,
    pub size: i64,
    #[serde(skip)]
    pub check_point: Option<CheckPoint>,
    #[serde(default)]
    pub store_addr: String,
    #[serde(skip)]
    pub relative_pod_dir: String,
    #[serde(skip)]
    pub relative_block_dir: String,
}

impl Chunk {
    pub fn new(file: &LogFile, check_point: Option<CheckPoint>, cluster: &str) -> Result<Self, SetNameError> {
        let set_name = find_set_name(&file.pod)?;
        Ok(Chunk {
            id: file.relative_block_dir(),
            cluster: cluster.to_string(),
            namespace: file.namespace.clone(),
            labels: file.labels.clone(),
            set_name,
            pod: file.pod.clone(),
            pod_uid: file.pod_uid.clone(),
            container: file.container.clone(),
            source: file.source.clone(),
            blocks: Vec::new(),
            temp_block: TempBlock::default(),
            started_at: DateTime::<Utc>::default(),
            updated_at: DateTime::<Utc>::default(),
            deletion_mark: false,
            deletion_mark_in_block: false,
            line: 0,
            size: 0,
            check_point,
            store_addr: String::new(),
            relative_pod_dir: file.relative_pod_dir(),
            relative_block_dir: file.relative_block_dir(),
        })
    }

    /// Every sealed block ending at or after `ts`, plus the temp block
    /// (always included, since it may still grow past `ts`).
    pub fn blocks_after_time(&self, ts: DateTime<Utc>) -> Vec<&dyn ReadableBlock> {
        let mut out: Vec<&dyn ReadableBlock> = self
            .blocks
            .iter()
            .filter(|b| b.end_time() >= ts)
            .map(|b| b as &dyn ReadableBlock)
            .collect();
        out.push(&self.temp_block);
        out
    }

    pub fn set_check_point(&mut self, check_point: CheckPoint) {
        self.check_point = Some(check_point);
    }

    pub fn update_temp_block(&mut self, size: i64, lines: i64, ts: DateTime<Utc>) {
        self.temp_block.size += size;
        self.temp_block.line += lines;
        self.temp_block.ended_at = ts;
        self.updated_at = ts;
        self.line += lines;
        self.size += size;
    }

    pub fn append_blocks(&mut self, blocks: Vec<Block>) {
        if blocks.is_empty() {
            return;
        }
        if self.started_at == DateTime::<Utc>::default() {
            self.started_at = blocks[0].started_at;
        }
        let ended_at = blocks.last().unwrap().ended_at;
        if ended_at > self.updated_at {
            self.updated_at = ended_at;
        }
        let (line, size) = measure_blocks(&blocks);
        self.line += line;
        self.size += size;
        self.blocks.extend(blocks);
    }

    pub fn set_temp_block(&mut self, block: TempBlock) {
        if self.started_at == DateTime::<Utc>::default() {
            self.started_at = block.started_at;
        }
        if block.ended_at > self.updated_at {
            self.updated_at = block.ended_at;
        }
        self.line += block.line;
        self.size += block.size;
        self.temp_block = block;
    }

    pub fn mark_block_at(&mut self, i: usize) {
        self.deletion_mark_in_block = true;
        self.blocks[i].deletion_mark = true;
    }

    pub fn block_length(&self) -> usize {
        self.blocks.len()
    }

    pub fn last_block(&self) -> Option<&Block> {
        self.blocks.last()
    }

    pub fn has_blocks(&self) -> bool {
        self.temp_block.size > 0 || !self.blocks.is_empty()
    }

    /// Deletes the on-disk file for block `i` and removes it from the
    /// in-memory vector. When the removed block was the oldest, the chunk's
    /// `started_at` advances to the next block's start.
    pub fn delete_block_at(&mut self, i: usize, root_path: &std::path::Path) -> std::io::Result<()> {
        let path = root_path.join(&self.relative_block_dir).join(self.blocks[i].file_name());
        match std::fs::remove_file(path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }

        if i == 0 && self.blocks.len() > 1 {
            self.started_at = self.blocks[1].started_at;
        }
        self.line -= self.blocks[i].line;
        self.size -= self.blocks[i].size;
        self.blocks.remove(i);
        Ok(())
    }

    pub fn delete_container_files(&self, block_path: &std::path::Path) {
        let _ = std::fs::remove_dir_all(block_path.join(&self.relative_block_dir));
    }

    pub fn is_outdated(&self, retention_time: chrono::Duration) -> bool {
        Utc::now() - self.updated_at > retention_time
    }

    /// Uniquely identifies this chunk's identity (independent of the node it
    /// lives on): `(namespace, set_name, pod, pod_uid, container, source)`.
    pub fn key(&self) -> String {
        format!(
            "{}_{}_{}_{}_{}_{}",
            self.namespace, self.set_name, self.pod, self.pod_uid, self.container, self.source
        )
    }
}

fn measure_blocks(blocks: &[Block]) -> (i64, i64) {
    blocks.iter().fold((0, 0), |(line, size), b| (line + b.line, size + b.size))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

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
            mod_time: Utc::now(),
            inspected_size: 0,
        }
    }

    #[test]
    fn new_chunk_derives_set_name_and_key() {
        let file = sample_file();
        let chunk = Chunk::new(&file, None, "local").unwrap();
        assert_eq!(chunk.set_name, "web");
        assert_eq!(chunk.key(), "ns_web_web-7f8c9d6b5-abcde_uid-1_app_std-stream");
    }

    #[test]
    fn append_blocks_updates_started_and_updated_at() {
        let file = sample_file();
        let mut chunk = Chunk::new(&file, None, "local").unwrap();
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 1).unwrap();
        chunk.append_blocks(vec![Block::new(start, end, 10, 1024, 0)]);
        assert_eq!(chunk.started_at, start);
        assert_eq!(chunk.updated_at, end);
        assert_eq!(chunk.line, 10);
        assert_eq!(chunk.size, 1024);
    }
}
