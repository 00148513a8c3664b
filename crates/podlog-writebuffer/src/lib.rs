//! Per-chunk in-memory staging area that lines pass through between being
//! tailed off a container's log file and being flushed into a block.
//!
//! Lines mostly arrive in timestamp order, but container runtimes can emit a
//! short burst out of order across a buffered-write boundary. `write`
//! reorders any line whose timestamp falls within [`MAX_AGE`] of the
//! buffer's current tail by walking backward through recent history and
//! splicing it into place, rather than appending and re-sorting the whole
//! buffer on every write.

use chrono::{DateTime, Duration, Utc};

/// Lines arriving within this window of the current tail timestamp are
/// reordered into place instead of accepted out of order.
pub fn max_age() -> Duration {
    Duration::seconds(1)
}

#[derive(Debug, Clone, Copy)]
struct History {
    ts: DateTime<Utc>,
    length: usize,
}

#[derive(Debug, Default)]
pub struct WriteBuffer {
    histories: Vec<History>,
    data: Vec<u8>,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
    lines: u64,
    /// Bytes consumed from the current source file, including lines not yet
    /// flushed; reset to zero whenever the tailer rolls onto a new file.
    file_offset: u64,
    /// Byte offset within the source file of the last line written, used to
    /// advance a chunk's checkpoint once the buffer is flushed.
    last_offset: u64,
}

impl WriteBuffer {
    pub fn new() -> Self {
        WriteBuffer::default()
    }

    /// Appends `input` (a single already-newline-stripped log line), timed
    /// at `ts`, reordering it into recent history if it arrived out of
    /// order within [`max_age`].
    pub fn write(&mut self, ts: DateTime<Utc>, input: &str, source_offset: u64) {
        let (history_idx, data_idx, should_reorder) = self.inspect(ts);
        let new_history = History { ts, length: input.len() };

        if should_reorder {
            self.data.splice(data_idx..data_idx, input.bytes());
            self.histories.insert(history_idx, new_history);
        } else {
            self.data.extend_from_slice(input.as_bytes());
            self.histories.push(new_history);
        }

        self.lines += 1;
        self.file_offset += input.len() as u64;
        self.last_offset = source_offset;

        self.start = Some(self.histories[0].ts);
        self.end = Some(self.histories[self.histories.len() - 1].ts);
    }

    /// Finds where `ts` belongs relative to buffered history: `(history
    /// insertion index, data insertion byte offset, needs reordering)`.
    fn inspect(&self, ts: DateTime<Utc>) -> (usize, usize, bool) {
        let min_ts = ts - max_age();

        if self.histories.is_empty() || self.histories.last().unwrap().ts < ts {
            return (0, 0, false);
        }

        let mut data_idx = self.data.len();
        let mut history_idx: isize = self.histories.len() as isize - 1;

        while history_idx >= 0 {
            let h = &self.histories[history_idx as usize];
            if ts > h.ts || h.ts < min_ts {
                break;
            }
            data_idx -= h.length;
            history_idx -= 1;
        }

        ((history_idx + 1) as usize, data_idx, true)
    }

    /// True if the buffer has somehow ended up with its last write earlier
    /// than its first — a state that should never arise and indicates a bug
    /// upstream rather than ordinary reordering.
    pub fn is_invalid(&self) -> bool {
        match (self.start, self.end) {
            (Some(s), Some(e)) => s > e,
            _ => false,
        }
    }

    pub fn reset_file_offset(&mut self) {
        self.file_offset = 0;
    }

    pub fn reset(&mut self) {
        self.histories.clear();
        self.data.clear();
        self.start = None;
        self.end = None;
        self.lines = 0;
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn lines(&self) -> u64 {
        self.lines
    }

    pub fn file_offset(&self) -> u64 {
        self.file_offset
    }

    pub fn last_offset(&self) -> u64 {
        self.last_offset
    }

    pub fn start(&self) -> Option<DateTime<Utc>> {
        self.start
    }

    pub fn end(&self) -> Option<DateTime<Utc>> {
        self.end
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(secs: i64, millis: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap() + Duration::milliseconds(millis)
    }

    #[test]
    fn appends_in_order_lines_without_reordering() {
        let mut buf = WriteBuffer::new();
        buf.write(ts(10, 0), "a", 1);
        buf.write(ts(11, 0), "b", 2);
        assert_eq!(buf.bytes(), b"ab");
        assert_eq!(buf.lines(), 2);
        assert_eq!(buf.start(), Some(ts(10, 0)));
        assert_eq!(buf.end(), Some(ts(11, 0)));
        assert!(!buf.is_invalid());
    }

    #[test]
    fn reorders_a_line_that_arrives_slightly_late() {
        let mut buf = WriteBuffer::new();
        buf.write(ts(10, 0), "a", 1);
        buf.write(ts(10, 500), "c", 2);
        // arrives after "c" but is timestamped before it, within max_age
        buf.write(ts(10, 200), "b", 3);
        assert_eq!(buf.bytes(), b"abc");
        assert_eq!(buf.end(), Some(ts(10, 500)));
    }

    #[test]
    fn reorder_walks_back_past_multiple_entries() {
        let mut buf = WriteBuffer::new();
        buf.write(ts(10, 0), "a", 1);
        buf.write(ts(13, 0), "b", 2);
        // earlier than both buffered entries: slots in at the front
        buf.write(ts(5, 0), "c", 3);
        assert_eq!(buf.bytes(), b"cab");
    }

    #[test]
    fn reset_clears_state_but_keeps_file_offset() {
        let mut buf = WriteBuffer::new();
        buf.write(ts(10, 0), "a", 1);
        buf.reset();
        assert_eq!(buf.size(), 0);
        assert_eq!(buf.start(), None);
        assert_eq!(buf.file_offset(), 1);
        buf.reset_file_offset();
        assert_eq!(buf.file_offset(), 0);
    }

    /// `is_invalid` is meant to be unreachable under ordinary reordering
    /// (see its doc comment); throw a few hundred jittered timestamps at
    /// the buffer and check that it holds regardless of the exact jitter.
    #[test]
    fn random_jitter_never_produces_an_invalid_buffer() {
        use rand::{rngs::SmallRng, Rng, SeedableRng};

        let mut rng = SmallRng::seed_from_u64(0xC0FFEE);
        let mut buf = WriteBuffer::new();
        let base = Utc.timestamp_opt(1_700_000_000, 0).unwrap();

        let n = 500;
        let mut total_bytes = 0usize;
        for i in 0..n {
            let jitter_ms: i64 = rng.gen_range(-2_000..=2_000);
            let line = format!("line-{i}");
            let line_ts = base + Duration::milliseconds(i as i64 * 100 + jitter_ms);
            total_bytes += line.len();

            buf.write(line_ts, &line, i as u64);

            assert!(!buf.is_invalid(), "buffer went invalid after {} writes", i + 1);
            assert!(buf.start() <= buf.end());
        }

        assert_eq!(buf.lines(), n as u64);
        assert_eq!(buf.size(), total_bytes);
        assert_eq!(buf.file_offset() as usize, total_bytes);
    }
}
