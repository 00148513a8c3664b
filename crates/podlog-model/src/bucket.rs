use chrono::{DateTime, Duration, DurationRound, Utc};
use serde::{Deserialize, Serialize};

use crate::chunk::Chunk;
use crate::source::Source;

pub const BUCKET_PRECISION: Duration = Duration::seconds(1);

/// Identity shared by every bucket produced for the same chunk/file-number
/// pair, factored out so a `Series` can be named without repeating it per
/// sample.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketMetadata {
    pub cluster: String,
    pub namespace: String,
    pub pod: String,
    pub container: String,
    pub source: Source,
    pub file_num: i64,
    pub chunk_key: String,
}

/// A one-second (configurable precision) aggregation of scanned lines
/// produced by a range scan: `start = trunc(ts, precision)`, `end = start +
/// precision`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bucket {
    #[serde(flatten)]
    pub metadata: BucketMetadata,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub lines: i64,
    pub size: u64,
}

/// Accumulates scanned lines into one-second buckets during a block range
/// scan, breaking on a file-number change (rotation boundary) even when
/// timestamps are otherwise contiguous.
pub struct BucketBuilder {
    current_pos: BucketMetadata,
    buckets: Vec<Bucket>,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    lines: i64,
    size: u64,
}

impl BucketBuilder {
    pub fn new(t: DateTime<Utc>, chunk: &Chunk) -> Self {
        let start = t.duration_trunc(BUCKET_PRECISION).unwrap_or(t);
        BucketBuilder {
            current_pos: BucketMetadata {
                cluster: chunk.cluster.clone(),
                namespace: chunk.namespace.clone(),
                pod: chunk.pod.clone(),
                container: chunk.container.clone(),
                source: chunk.source.clone(),
                chunk_key: chunk.key(),
                file_num: -1,
            },
            buckets: Vec::new(),
            start,
            end: start + BUCKET_PRECISION,
            lines: 0,
            size: 0,
        }
    }

    pub fn reset(&mut self, file_num: i64, block_time: DateTime<Utc>) {
        if self.current_pos.file_num < 0 {
            self.current_pos.file_num = file_num;
            return;
        }
        if self.current_pos.file_num != file_num {
            self.next(block_time);
        }
        self.current_pos.file_num = file_num;
    }

    pub fn is_within_range(&self, ts: DateTime<Utc>) -> bool {
        ts > self.start && ts < self.end
    }

    pub fn next(&mut self, next_ts: DateTime<Utc>) {
        self.save();
        self.start = next_ts.duration_trunc(BUCKET_PRECISION).unwrap_or(next_ts);
        self.end = self.start + BUCKET_PRECISION;
        self.lines = 0;
        self.size = 0;
    }

    pub fn save(&mut self) {
        if self.lines == 0 {
            return;
        }
        self.buckets.push(Bucket {
            metadata: self.current_pos.clone(),
            start: self.start,
            end: self.end,
            lines: self.lines,
            size: self.size,
        });
    }

    pub fn pour(&mut self, size: u64) {
        self.lines += 1;
        self.size += size;
    }

    /// Callers must invoke `save()` once more after the last line scanned
    /// (per the block reader's "save the final bucket" step) before calling
    /// this, since `next()`/`reset()` only save on a bucket *transition*.
    pub fn build(self) -> Vec<Bucket> {
        self.buckets
    }
}
