//! Scans a chunk's blocks across a time range, aggregating one-second
//! buckets and (unless `only_series`) collecting the matching raw lines.

use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use chrono::{DateTime, Utc};
use podlog_filter::{do_filter, FilterResult, Filterer};
use podlog_logline::LogFormat;
use podlog_model::{Bucket, BucketBuilder, Chunk, ReadableBlock};

use crate::pool::BufferPool;

#[derive(thiserror::Error, Debug)]
pub enum ReadError {
    #[error("invalid range: start or end is missing")]
    InvalidRange,
    #[error("io error reading block: {0}")]
    Io(#[from] std::io::Error),
}

/// Scans every block overlapping `[start, end]`, returning the matching raw
/// lines (concatenated, newline-terminated, empty when `only_series`) and
/// the one-second buckets accumulated along the way.
pub fn read_range(
    chunk: &Chunk,
    store_root: &Path,
    format: LogFormat,
    only_series: bool,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    filterers: &[&dyn Filterer],
    pool: &BufferPool,
) -> Result<(Vec<u8>, Vec<Bucket>), ReadError> {
    if start == DateTime::<Utc>::default() || end == DateTime::<Utc>::default() {
        return Err(ReadError::InvalidRange);
    }

    let mut buffer = Vec::new();
    let blocks = chunk.blocks_after_time(start);
    let mut bucket_builder = BucketBuilder::new(start, chunk);
    let mut prev_ts: Option<DateTime<Utc>> = None;

    for block in blocks {
        if !(block.start_time() < end && block.end_time() > start) {
            continue;
        }

        let block_path = store_root.join(&chunk.relative_block_dir).join(block.file_name());

        let skip = read_block(
            &chunk.source.source_type,
            block,
            &block_path,
            format,
            only_series,
            &mut buffer,
            &mut bucket_builder,
            prev_ts,
            start,
            end,
            filterers,
            pool,
        )?;

        if prev_ts.map(|p| p < block.end_time()).unwrap_or(true) {
            prev_ts = Some(block.end_time());
        }

        if skip {
            continue;
        }
    }

    bucket_builder.save();

    Ok((buffer, bucket_builder.build()))
}

#[allow(clippy::too_many_arguments)]
fn read_block(
    source_type: &str,
    block: &dyn ReadableBlock,
    block_path: &Path,
    format: LogFormat,
    only_series: bool,
    buffer: &mut Vec<u8>,
    bucket_builder: &mut BucketBuilder,
    prev_ts: Option<DateTime<Utc>>,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    filterers: &[&dyn Filterer],
    pool: &BufferPool,
) -> Result<bool, ReadError> {
    let file = match std::fs::File::open(block_path) {
        Ok(f) => f,
        Err(_) => {
            tracing::trace!(path = %block_path.display(), "block may have been removed by gc");
            return Ok(true);
        }
    };

    bucket_builder.reset(block.file_number(), block.start_time());

    let size = file.metadata().map(|m| m.len()).unwrap_or(0);
    let mut pooled = pool.checkout(size);
    let capacity = pooled.capacity();
    pooled.resize(capacity, 0);
    let mut total = 0usize;
    let mut handle = file.take(capacity as u64);
    loop {
        let n = handle.read(&mut pooled[total..])?;
        if n == 0 {
            break;
        }
        total += n;
    }
    pooled.truncate(total);

    let mut reader = BufReader::new(&pooled[..]);
    let mut line_buf = Vec::new();

    loop {
        line_buf.clear();
        let read = reader.read_until(b'\n', &mut line_buf)?;
        if read == 0 {
            break;
        }
        if line_buf.len() < podlog_logline::MIN_TIMESTAMP_LEN {
            break;
        }

        let raw = String::from_utf8_lossy(&line_buf);
        let ts = match podlog_logline::parse_timestamp(format, &raw) {
            Ok(ts) => ts,
            Err(_) => continue,
        };

        if let Some(prev) = prev_ts {
            if ts <= prev {
                continue;
            }
        }

        if ts < start {
            continue;
        }
        if ts > end {
            break;
        }

        let msg = match podlog_logline::parse_log_message_by_source(source_type, format, &raw) {
            Ok(msg) => msg,
            Err(_) => continue,
        };

        let result = do_filter(&msg, ts, filterers);
        if result == FilterResult::Filtered {
            continue;
        }

        if !bucket_builder.is_within_range(ts) {
            bucket_builder.next(ts);
        }
        bucket_builder.pour(msg.len() as u64);

        if result == FilterResult::Done {
            break;
        }

        if result == FilterResult::SkipRead {
            continue;
        }

        if only_series {
            continue;
        }

        buffer.extend_from_slice(&line_buf);
    }

    Ok(false)
}
