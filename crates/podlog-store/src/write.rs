//! Ingestion entry points the distributor drives: static
//! catch-up reads of already-rotated files, and tail-fed writes from a
//! live [`podlog_tailer::Tailer`] channel. Both funnel lines through a
//! per-stream [`WriteBuffer`] and flush into the chunk's temp block,
//! sealing it into a named block once it reaches `block_size`.

use std::path::Path;

use chrono::{DateTime, Utc};
use podlog_limiter::{LeakyBucket, Limiter};
use podlog_logline::{parse_log_message_by_source, parse_timestamp, LogFormat};
use podlog_model::block::{block_file_name, TEMP_BLOCK_FILE_NAME};
use podlog_model::{Block, Chunk, LogFile, TempBlock};
use podlog_tailer::LogLine;
use podlog_writebuffer::WriteBuffer;
use tokio::sync::RwLock;

use crate::config::StoreConfig;
use crate::error::StoreError;
use crate::layout;

/// Invoked once per line successfully written, before it's folded into the
/// write buffer, so sink/metric-rule matching can run without the store
/// knowing anything about sinks. No-op by default.
pub type MatchHandler<'a> = dyn Fn(&str, DateTime<Utc>) + Send + Sync + 'a;

fn noop_handler(_line: &str, _ts: DateTime<Utc>) {}

/// Reads already-rotated files front to back, accumulating each file's
/// lines in a write buffer and sealing named block files directly (no
/// temp file) once the buffer reaches `block_size` or the file's own EOF
/// is reached — catch-up never leaves a temp block behind, and every
/// sealed block is attributed to the file number it was read from. The
/// block-name uniqueness guard makes re-running this over files already
/// ingested a safe no-op.
pub fn write_filed_logs(
    root: &Path,
    config: &StoreConfig,
    chunk: &mut Chunk,
    format: LogFormat,
    files: &[LogFile],
    handler: Option<&MatchHandler>,
) -> Result<(), StoreError> {
    let handler = handler.unwrap_or(&noop_handler);
    let block_dir = layout::block_dir(root, chunk);
    std::fs::create_dir_all(&block_dir).map_err(|e| StoreError::io(&block_dir, e))?;

    let mut buffer = WriteBuffer::new();
    let mut last_file_num = chunk.temp_block.file_num;

    for file in files {
        last_file_num = file.number;
        buffer.reset_file_offset();
        let contents = std::fs::read_to_string(&file.path).map_err(|e| StoreError::io(&file.path, e))?;

        for (offset, line) in line_offsets(&contents) {
            let ts = match parse_timestamp(format, line) {
                Ok(ts) => ts,
                Err(_) => continue,
            };
            let message = parse_log_message_by_source(&file.source.source_type, format, line).unwrap_or_else(|_| line.to_string());
            handler(&message, ts);
            buffer.write(ts, &format!("{message}\n"), offset);

            if buffer.size() as u64 >= config.block_size.0 {
                let block = seal_named_block(&block_dir, &mut buffer, last_file_num)?;
                chunk.append_blocks(vec![block]);
            }
        }

        // Each rotation's leftover (below `block_size`) is sealed as its own
        // named block under this file's own number at its EOF, rather than
        // carried into the next file's buffer: catch-up never produces a
        // temp block, only sealed blocks attributed to the file they came
        // from.
        if buffer.size() > 0 {
            let block = seal_named_block(&block_dir, &mut buffer, last_file_num)?;
            chunk.append_blocks(vec![block]);
        }
    }

    if let Some(cp) = chunk.check_point.as_mut() {
        cp.reset(last_file_num);
        cp.set_offset(buffer.last_offset());
    }
    persist_checkpoint(root, chunk)?;

    Ok(())
}

/// Tail-driven ingestion: owns this stream's leaky bucket and flushes on
/// every `leaky_bucket_interval` tick (or when the tailer's channel
/// closes). Runs until `log_rx` is exhausted, the stop state closes it, or
/// the leaky bucket rejects a line — in which case a synthetic marker line
/// is flushed and an error returned, terminating the caller's writer loop
/// for this file until the next inspect cycle re-creates it.
pub async fn write_tailed_logs(
    root: &Path,
    config: &StoreConfig,
    chunk_lock: &RwLock<Chunk>,
    file_num: i64,
    mut log_rx: tokio::sync::mpsc::Receiver<LogLine>,
    limiter: &Limiter,
    handler: Option<&MatchHandler>,
) -> Result<(), StoreError> {
    let handler = handler.unwrap_or(&noop_handler);
    let mut buffer = WriteBuffer::new();
    let mut bucket = LeakyBucket::new(limiter);
    let mut ticker = tokio::time::interval(config.leaky_bucket_interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    ticker.tick().await; // interval's first tick fires immediately

    loop {
        tokio::select! {
            line = log_rx.recv() => {
                match line {
                    Some(line) => {
                        if line.error.is_some() {
                            tracing::debug!("tailer closed its channel with a terminal error");
                            break;
                        }
                        let Some(ts) = line.timestamp else { continue };

                        if let Err(rejected) = bucket.pour(line.line.len() as i64) {
                            let marker = format!(
                                "{} stdout F (lobster: Logs exceeding {} were limited)",
                                ts.to_rfc3339_opts(chrono::SecondsFormat::Nanos, true),
                                rejected.0
                            );
                            buffer.write(ts, &format!("{marker}\n"), line.offset);
                            let mut chunk = chunk_lock.write().await;
                            flush_tail_buffer(root, config, &mut chunk, &mut buffer, file_num)?;
                            tracing::warn!(chunk = %chunk.key(), reason = %rejected.0, "leaky bucket rejected tailed write");
                            return Err(StoreError::Rejected(rejected.0));
                        }

                        handler(&line.line, ts);
                        buffer.write(ts, &format!("{}\n", line.line), line.offset);
                    }
                    None => break,
                }
            }
            _ = ticker.tick() => {
                bucket.init();
                if buffer.size() > 0 {
                    let mut chunk = chunk_lock.write().await;
                    flush_tail_buffer(root, config, &mut chunk, &mut buffer, file_num)?;
                }
            }
        }
    }

    if buffer.size() > 0 {
        let mut chunk = chunk_lock.write().await;
        flush_tail_buffer(root, config, &mut chunk, &mut buffer, file_num)?;
    }

    Ok(())
}

/// Seals the current temp block under `old_file_num` (if non-empty) via an
/// atomic rename — a deliberate REDESIGN of the reference implementation's
/// copy-then-truncate, safe here because `temp.log` and the sealed block
/// share a directory — and resets the chunk's temp block under
/// `new_file_num`.
pub fn move_tempblock(root: &Path, chunk: &mut Chunk, old_file_num: i64, new_file_num: i64) -> Result<(), StoreError> {
    let block_dir = layout::block_dir(root, chunk);
    let temp_path = block_dir.join(TEMP_BLOCK_FILE_NAME);

    if chunk.temp_block.size > 0 {
        let name = block_file_name(chunk.temp_block.started_at, chunk.temp_block.ended_at, chunk.temp_block.line, old_file_num);
        let sealed_path = block_dir.join(&name);

        if sealed_path.exists() {
            let _ = std::fs::remove_file(&temp_path);
        } else {
            std::fs::rename(&temp_path, &sealed_path).map_err(|e| StoreError::io(&temp_path, e))?;
        }

        // `chunk.line`/`chunk.size` already carry this temp block's
        // contribution via the incremental `update_temp_block` calls that
        // grew it; undo that before `append_blocks` re-adds it as a sealed
        // block, or the total double-counts.
        chunk.line -= chunk.temp_block.line;
        chunk.size -= chunk.temp_block.size;
        let block = Block::from_temp_block(&chunk.temp_block, old_file_num);
        chunk.append_blocks(vec![block]);
    }

    chunk.temp_block = TempBlock {
        file_num: new_file_num,
        ..Default::default()
    };
    Ok(())
}

fn line_offsets(contents: &str) -> impl Iterator<Item = (u64, &str)> {
    let mut offset = 0u64;
    contents.lines().map(move |line| {
        offset += line.len() as u64 + 1;
        (offset, line)
    })
}

fn seal_named_block(block_dir: &Path, buffer: &mut WriteBuffer, file_num: i64) -> Result<Block, StoreError> {
    let start = buffer.start().unwrap_or_default();
    let end = buffer.end().unwrap_or_default();
    let lines = buffer.lines() as i64;
    let name = block_file_name(start, end, lines, file_num);
    let path = block_dir.join(&name);

    if !path.exists() {
        std::fs::write(&path, buffer.bytes()).map_err(|e| StoreError::io(&path, e))?;
    }

    let size = buffer.size() as i64;
    buffer.reset();
    Ok(Block::new(start, end, lines, size, file_num))
}

fn persist_checkpoint(root: &Path, chunk: &Chunk) -> Result<(), StoreError> {
    if let Some(cp) = chunk.check_point {
        let path = layout::checkpoint_path(root, chunk);
        std::fs::write(&path, cp.to_bytes()).map_err(|e| StoreError::io(&path, e))?;
    }
    Ok(())
}

fn flush_tail_buffer(root: &Path, config: &StoreConfig, chunk: &mut Chunk, buffer: &mut WriteBuffer, file_num: i64) -> Result<(), StoreError> {
    use std::io::Write;

    let block_dir = layout::block_dir(root, chunk);
    std::fs::create_dir_all(&block_dir).map_err(|e| StoreError::io(&block_dir, e))?;
    let temp_path = block_dir.join(TEMP_BLOCK_FILE_NAME);

    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&temp_path)
        .map_err(|e| StoreError::io(&temp_path, e))?;
    file.write_all(buffer.bytes()).map_err(|e| StoreError::io(&temp_path, e))?;

    if chunk.temp_block.started_at == DateTime::<Utc>::default() {
        chunk.temp_block.started_at = buffer.start().unwrap_or(chunk.updated_at);
    }
    chunk.update_temp_block(buffer.size() as i64, buffer.lines() as i64, buffer.end().unwrap_or(chunk.updated_at));

    if let Some(cp) = chunk.check_point.as_mut() {
        cp.reset(file_num);
        cp.set_offset(buffer.last_offset());
    }
    persist_checkpoint(root, chunk)?;

    buffer.reset();

    if chunk.temp_block.size >= config.block_size.0 as i64 {
        // No rotation has occurred here — only the distributor introduces a
        // new file number, on an actual rotation — so the sealed block and
        // the fresh temp block both stay under the same `file_num`.
        move_tempblock(root, chunk, file_num, file_num)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use podlog_model::{Labels, Source};

    fn sample_chunk() -> Chunk {
        let file = LogFile {
            namespace: "ns".into(),
            labels: Labels::default(),
            pod: "web-7f8c9d6b5-abcde".into(),
            pod_uid: "uid-1".into(),
            container: "app".into(),
            file_name: "0.log".into(),
            path: "unused".into(),
            source: Source::std_stream(),
            number: 0,
            mod_time: Utc::now(),
            inspected_size: 0,
        };
        Chunk::new(&file, Some(podlog_model::CheckPoint::new(-1, 0)), "local").unwrap()
    }

    #[test]
    fn write_filed_logs_seals_a_block_once_size_is_exceeded() {
        let dir = tempfile::tempdir().unwrap();
        let mut chunk = sample_chunk();
        let config = StoreConfig {
            block_size: bytesize::ByteSize::b(64),
            ..Default::default()
        };

        let log_path = dir.path().join("0.log");
        let mut contents = String::new();
        let base = chrono::Utc::now() - chrono::Duration::seconds(5);
        for i in 0..20 {
            contents.push_str(&format!(
                "{} stdout F line-{i}-padding-to-make-this-long-enough\n",
                (base + chrono::Duration::milliseconds(i)).to_rfc3339_opts(chrono::SecondsFormat::Nanos, true)
            ));
        }
        std::fs::write(&log_path, &contents).unwrap();

        let file = LogFile {
            namespace: "ns".into(),
            labels: Labels::default(),
            pod: "web-7f8c9d6b5-abcde".into(),
            pod_uid: "uid-1".into(),
            container: "app".into(),
            file_name: "0.log".into(),
            path: log_path.to_string_lossy().into_owned(),
            source: Source::std_stream(),
            number: 0,
            mod_time: Utc::now(),
            inspected_size: 0,
        };

        write_filed_logs(dir.path(), &config, &mut chunk, LogFormat::Text, &[file], None).unwrap();
        assert!(chunk.block_length() >= 1);
    }

    /// §8 scenario 3: catching up two already-rotated files must seal each
    /// file's remainder under its own file number — not carry it into the
    /// next file's buffer — and must leave no trailing temp block.
    #[test]
    fn write_filed_logs_seals_each_rotation_under_its_own_file_number() {
        let dir = tempfile::tempdir().unwrap();
        let mut chunk = sample_chunk();
        let config = StoreConfig::default(); // block_size large enough that neither file rolls over mid-file

        let base = chrono::Utc::now() - chrono::Duration::seconds(10);
        let path0 = dir.path().join("0.log");
        std::fs::write(&path0, format!("{} stdout F first\n", base.to_rfc3339_opts(chrono::SecondsFormat::Nanos, true))).unwrap();
        let path1 = dir.path().join("1.log");
        std::fs::write(
            &path1,
            format!("{} stdout F second\n", (base + chrono::Duration::seconds(1)).to_rfc3339_opts(chrono::SecondsFormat::Nanos, true)),
        )
        .unwrap();

        let file0 = LogFile {
            namespace: "ns".into(),
            labels: Labels::default(),
            pod: "web-7f8c9d6b5-abcde".into(),
            pod_uid: "uid-1".into(),
            container: "app".into(),
            file_name: "0.log".into(),
            path: path0.to_string_lossy().into_owned(),
            source: Source::std_stream(),
            number: 0,
            mod_time: Utc::now(),
            inspected_size: 0,
        };
        let file1 = LogFile {
            file_name: "1.log".into(),
            path: path1.to_string_lossy().into_owned(),
            number: 1,
            ..file0.clone()
        };

        write_filed_logs(dir.path(), &config, &mut chunk, LogFormat::Text, &[file0, file1], None).unwrap();

        assert_eq!(chunk.blocks.len(), 2);
        assert_eq!(chunk.blocks[0].file_num, 0);
        assert_eq!(chunk.blocks[1].file_num, 1);
        assert_eq!(chunk.check_point.unwrap().file_num, 1);

        let block_dir = layout::block_dir(dir.path(), &chunk);
        assert!(!block_dir.join(TEMP_BLOCK_FILE_NAME).exists());
    }

    #[test]
    fn move_tempblock_renames_temp_log_into_a_sealed_block() {
        let dir = tempfile::tempdir().unwrap();
        let mut chunk = sample_chunk();
        let block_dir = layout::block_dir(dir.path(), &chunk);
        std::fs::create_dir_all(&block_dir).unwrap();
        std::fs::write(block_dir.join(TEMP_BLOCK_FILE_NAME), b"hello\nworld\n").unwrap();

        chunk.temp_block = TempBlock {
            started_at: Utc::now() - chrono::Duration::seconds(2),
            ended_at: Utc::now() - chrono::Duration::seconds(1),
            line: 2,
            size: 12,
            file_num: 0,
            is_backup: false,
        };

        move_tempblock(dir.path(), &mut chunk, 0, 1).unwrap();
        assert_eq!(chunk.block_length(), 1);
        assert_eq!(chunk.temp_block.file_num, 1);
        assert!(!block_dir.join(TEMP_BLOCK_FILE_NAME).exists() || std::fs::metadata(block_dir.join(TEMP_BLOCK_FILE_NAME)).unwrap().len() == 0);
    }
}
