use std::collections::HashMap;

use chrono::{DateTime, Duration, DurationRound, Utc};
use serde::{Deserialize, Serialize};

use crate::bucket::{Bucket, BucketMetadata};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sample {
    pub timestamp: DateTime<Utc>,
    pub lines: i64,
    pub size: u64,
}

/// Ordered samples for one `(chunk, file_num)` grouping. Name format:
/// `{cluster}_{namespace}_{pod}_{container}_{source}-{file_num}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Series {
    pub chunk_key: String,
    pub name: String,
    pub lines: i64,
    pub size: u64,
    pub samples: Vec<Sample>,
}

impl Series {
    fn new(metadata: &BucketMetadata) -> Self {
        Series {
            chunk_key: metadata.chunk_key.clone(),
            name: format!(
                "{}_{}_{}_{}_{}-{}",
                metadata.cluster, metadata.namespace, metadata.pod, metadata.container, metadata.source, metadata.file_num
            ),
            lines: 0,
            size: 0,
            samples: Vec::new(),
        }
    }

    pub fn append(&mut self, sample: Sample) {
        self.lines += sample.lines;
        self.size += sample.size;
        self.samples.push(sample);
    }

    pub fn size_within_range(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> u64 {
        let mut size = 0;
        for sample in &self.samples {
            if sample.timestamp < start || sample.timestamp > end {
                continue;
            }
            size = sample.size;
        }
        size
    }

    /// Merges same-timestamp samples and sorts ascending; samples that
    /// collapse to zero lines (a merge artifact) are dropped.
    pub fn reorder_samples(&mut self) {
        self.samples = merge_and_sort(self.samples.drain(..));
    }
}

fn merge_and_sort(samples: impl Iterator<Item = Sample>) -> Vec<Sample> {
    let mut by_ts: HashMap<DateTime<Utc>, Sample> = HashMap::new();
    for s in samples {
        by_ts
            .entry(s.timestamp)
            .and_modify(|existing| {
                existing.lines += s.lines;
                existing.size += s.size;
            })
            .or_insert(s);
    }
    let mut merged: Vec<Sample> = by_ts.into_values().filter(|s| s.lines > 0).collect();
    merged.sort_by_key(|s| s.timestamp);
    merged
}

/// An array of `Series`, as returned from a series fetch.
pub type SeriesData = Vec<Series>;

pub fn total_lines(data: &SeriesData) -> i64 {
    data.iter().map(|s| s.lines).sum()
}

pub fn merged_samples(data: &SeriesData) -> Vec<Sample> {
    merge_and_sort(data.iter().flat_map(|s| s.samples.iter().copied()))
}

/// Re-buckets every series' samples onto a coarser precision, merging
/// samples that land in the same precision-truncated slot.
pub fn update_samples_by_precision(data: &mut SeriesData, precision: Duration) {
    for series in data.iter_mut() {
        let mut new_samples: Vec<Sample> = vec![Sample::default()];
        let mut index = 0usize;

        for sample in std::mem::take(&mut series.samples) {
            if sample.timestamp < new_samples[index].timestamp + precision {
                new_samples[index].lines += sample.lines;
                new_samples[index].size += sample.size;
                continue;
            }

            if new_samples[index].timestamp != DateTime::<Utc>::default() {
                new_samples.push(Sample::default());
                index += 1;
            }

            new_samples[index].timestamp = sample.timestamp.duration_trunc(precision).unwrap_or(sample.timestamp);
            new_samples[index].lines = sample.lines;
            new_samples[index].size = sample.size;
        }

        series.samples = new_samples;
    }
}

/// Groups raw buckets into named series per `(chunk, file_num)`, then
/// reorders each series' samples by timestamp.
pub fn buckets_to_series(buckets: &[Bucket]) -> SeriesData {
    let mut by_name: HashMap<String, Series> = HashMap::new();

    for bucket in buckets {
        let series = by_name
            .entry(Series::new(&bucket.metadata).name.clone())
            .or_insert_with(|| Series::new(&bucket.metadata));
        series.append(Sample {
            timestamp: bucket.start,
            lines: bucket.lines,
            size: bucket.size,
        });
    }

    let mut out: SeriesData = by_name.into_values().collect();
    for series in out.iter_mut() {
        series.reorder_samples();
    }
    out
}
