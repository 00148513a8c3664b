//! Merges per-chunk fetch results into one response: series concatenation
//! for the series endpoint, and timestamp-ordered merge (with a
//! `contents_limit` byte budget) for the raw (v1) and parsed-entry (v2)
//! range endpoints.

use podlog_logline::{parse_timestamp, LogFormat};
use podlog_model::{Entry, SeriesData};

pub fn merge_series(parts: Vec<SeriesData>) -> SeriesData {
    parts.into_iter().flatten().collect()
}

pub struct RawMerge {
    pub contents: Vec<u8>,
    pub is_partial: bool,
}

/// Splits every part into lines, sorts the union by parsed timestamp, and
/// concatenates until `contents_limit` (0 = unlimited) would be exceeded.
pub fn merge_raw(parts: Vec<Vec<u8>>, format: LogFormat, contents_limit: i64) -> RawMerge {
    let mut lines: Vec<(chrono::DateTime<chrono::Utc>, Vec<u8>)> = Vec::new();
    for part in parts {
        for line in part.split_inclusive(|&b| b == b'\n') {
            if line.is_empty() {
                continue;
            }
            let text = String::from_utf8_lossy(line);
            if let Ok(ts) = parse_timestamp(format, &text) {
                lines.push((ts, line.to_vec()));
            }
        }
    }
    lines.sort_by_key(|(ts, _)| *ts);

    let mut contents = Vec::new();
    let mut total: i64 = 0;
    let mut is_partial = false;
    for (_, line) in lines {
        if contents_limit > 0 && total + line.len() as i64 > contents_limit {
            is_partial = true;
            break;
        }
        total += line.len() as i64;
        contents.extend_from_slice(&line);
    }

    RawMerge { contents, is_partial }
}

pub struct EntryMerge {
    pub entries: Vec<Entry>,
    pub is_partial: bool,
}

pub fn merge_entries(parts: Vec<Vec<Entry>>, contents_limit: i64) -> EntryMerge {
    let mut all: Vec<Entry> = parts.into_iter().flatten().collect();
    all.sort_by_key(|e| e.timestamp);

    if contents_limit <= 0 {
        return EntryMerge {
            entries: all,
            is_partial: false,
        };
    }

    let mut entries = Vec::new();
    let mut total: i64 = 0;
    let mut is_partial = false;
    for entry in all {
        let size = entry.message.len() as i64;
        if total + size > contents_limit {
            is_partial = true;
            break;
        }
        total += size;
        entries.push(entry);
    }

    EntryMerge { entries, is_partial }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_raw_sorts_and_respects_limit() {
        let a = b"2023-12-05T06:52:02.000Z b\n".to_vec();
        let b = b"2023-12-05T06:52:01.000Z a\n".to_vec();
        let merged = merge_raw(vec![a, b], LogFormat::Text, 0);
        let text = String::from_utf8(merged.contents).unwrap();
        assert!(text.starts_with("2023-12-05T06:52:01"));
        assert!(!merged.is_partial);
    }

    #[test]
    fn merge_raw_marks_partial_when_limit_exceeded() {
        let a = b"2023-12-05T06:52:01.000Z aaaaaaaaaa\n".to_vec();
        let b = b"2023-12-05T06:52:02.000Z bbbbbbbbbb\n".to_vec();
        let merged = merge_raw(vec![a, b], LogFormat::Text, 10);
        assert!(merged.is_partial);
    }
}
