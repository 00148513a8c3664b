//! Turns a range scan's raw line bytes into the v2 API's parsed [`Entry`]
//! representation. Kept separate from the block reader (which only ever
//! emits raw bytes plus buckets) so that both a store answering its own
//! `/api/v2/logs/range` and a query shard re-parsing a store's raw v1
//! response can share one implementation.

use chrono::Utc;
use podlog_logline::{parse_log_message, parse_stream, parse_tag, parse_timestamp, LogFormat};
use podlog_model::{Chunk, Entry, Source};

pub fn parse_entries_from_raw(raw: &[u8], chunk: &Chunk, format: LogFormat) -> Vec<Entry> {
    let mut out = Vec::new();
    for line in raw.split_inclusive(|&b| b == b'\n') {
        if line.is_empty() {
            continue;
        }
        let text = String::from_utf8_lossy(line);
        let ts = match parse_timestamp(format, &text) {
            Ok(ts) => ts,
            Err(_) => continue,
        };

        let mut entry = Entry::from_chunk(chunk);
        entry.timestamp = ts;

        if chunk.source.source_type == Source::STD_STREAM {
            entry.stream = parse_stream(&text).unwrap_or_default().to_string();
            entry.tag = parse_tag(&text).unwrap_or_default().to_string();
            entry.message = parse_log_message(format, &text).unwrap_or_default().trim_end_matches('\n').to_string();
        } else {
            entry.message = text.trim_end_matches('\n').to_string();
        }

        out.push(entry);
    }
    out
}

/// Pins `(start, end)` for a freshly-uploaded export page from the first
/// and last line's timestamps. An empty or single-line page still yields a
/// valid pair: when no newline is found, the whole buffer is parsed as one
/// line.
pub fn pin_page_bounds(raw: &[u8], format: LogFormat, fallback: chrono::DateTime<Utc>) -> (chrono::DateTime<Utc>, chrono::DateTime<Utc>) {
    if raw.is_empty() {
        return (fallback, fallback);
    }

    let lines: Vec<&[u8]> = raw.split_inclusive(|&b| b == b'\n').filter(|l| !l.is_empty()).collect();
    if lines.is_empty() {
        return (fallback, fallback);
    }

    let first = parse_timestamp(format, &String::from_utf8_lossy(lines[0])).unwrap_or(fallback);
    let last = parse_timestamp(format, &String::from_utf8_lossy(lines[lines.len() - 1])).unwrap_or(first);
    (first, last)
}

#[cfg(test)]
mod tests {
    use super::*;
    use podlog_model::Labels;
    use std::collections::BTreeMap;

    fn sample_chunk(source: Source) -> Chunk {
        Chunk {
            id: "id".into(),
            cluster: "local".into(),
            namespace: "ns".into(),
            labels: Labels(BTreeMap::new()),
            set_name: "web".into(),
            pod: "web-0".into(),
            pod_uid: "uid".into(),
            container: "app".into(),
            source,
            blocks: Vec::new(),
            temp_block: Default::default(),
            started_at: Default::default(),
            updated_at: Default::default(),
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

    #[test]
    fn parses_std_stream_entries() {
        let chunk = sample_chunk(Source::std_stream());
        let raw = b"2023-12-05T06:52:01.364Z stdout F hello\n2023-12-05T06:52:02.364Z stderr P world\n";
        let entries = parse_entries_from_raw(raw, &chunk, LogFormat::Text);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].stream, "stdout");
        assert_eq!(entries[0].tag, "F");
        assert_eq!(entries[0].message, "hello");
        assert_eq!(entries[1].stream, "stderr");
        assert_eq!(entries[1].tag, "P");
    }

    #[test]
    fn parses_emptydir_entries_with_raw_message() {
        let chunk = sample_chunk(Source::emptydir_file("/var/log/app.log"));
        let raw = b"2023-12-05T06:52:01.364Z hello there\n";
        let entries = parse_entries_from_raw(raw, &chunk, LogFormat::Text);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].message, "2023-12-05T06:52:01.364Z hello there");
    }

    #[test]
    fn pin_page_bounds_falls_back_on_single_line_without_newline() {
        let fallback = Utc::now();
        let raw = b"2023-12-05T06:52:01.364Z stdout F hello";
        let (start, end) = pin_page_bounds(raw, LogFormat::Text, fallback);
        assert_eq!(start, end);
        assert_ne!(start, fallback);
    }

    #[test]
    fn pin_page_bounds_uses_fallback_on_empty_buffer() {
        let fallback = Utc::now();
        let (start, end) = pin_page_bounds(b"", LogFormat::Text, fallback);
        assert_eq!(start, fallback);
        assert_eq!(end, fallback);
    }
}
