use chrono::{DateTime, Utc};

pub const TEMP_BLOCK_FILE_NAME: &str = "temp.log";
const BLOCK_NAME_DELIMITER: &str = "_";

/// Common surface shared by a sealed `Block` and the in-progress `TempBlock`,
/// used by the block reader to treat both uniformly during a range scan.
pub trait ReadableBlock {
    fn start_time(&self) -> DateTime<Utc>;
    fn end_time(&self) -> DateTime<Utc>;
    fn file_name(&self) -> String;
    fn file_number(&self) -> i64;
}

/// The currently-growing tail buffer, persisted as `temp.log` in the block
/// directory. Flushed into a named `Block` once it reaches the configured
/// block size.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TempBlock {
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub line: i64,
    pub size: i64,
    pub file_num: i64,
    pub is_backup: bool,
}

impl TempBlock {
    pub fn reset(&mut self, file_num: i64) {
        self.started_at = DateTime::<Utc>::default();
        self.ended_at = DateTime::<Utc>::default();
        self.line = 0;
        self.size = 0;
        self.file_num = file_num;
    }
}

impl ReadableBlock for TempBlock {
    fn start_time(&self) -> DateTime<Utc> {
        self.started_at
    }
    fn end_time(&self) -> DateTime<Utc> {
        self.ended_at
    }
    fn file_name(&self) -> String {
        TEMP_BLOCK_FILE_NAME.to_string()
    }
    fn file_number(&self) -> i64 {
        self.file_num
    }
}

/// An immutable, time-bounded segment of lines on disk. Once sealed its
/// bytes never change; invariant: `started_at <= ended_at`, and consecutive
/// lines within the block are non-decreasing by timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub line: i64,
    pub size: i64,
    pub file_num: i64,
    pub deletion_mark: bool,
}

impl Block {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>, line: i64, size: i64, file_num: i64) -> Self {
        Block {
            started_at: start,
            ended_at: end,
            line,
            size,
            file_num,
            deletion_mark: false,
        }
    }

    pub fn from_temp_block(temp: &TempBlock, file_num: i64) -> Self {
        Block {
            started_at: temp.started_at,
            ended_at: temp.ended_at,
            line: temp.line,
            size: temp.size,
            file_num,
            deletion_mark: false,
        }
    }
}

impl ReadableBlock for Block {
    fn start_time(&self) -> DateTime<Utc> {
        self.started_at
    }
    fn end_time(&self) -> DateTime<Utc> {
        self.ended_at
    }
    fn file_name(&self) -> String {
        block_file_name(self.started_at, self.ended_at, self.line, self.file_num)
    }
    fn file_number(&self) -> i64 {
        self.file_num
    }
}

pub fn block_file_name(start: DateTime<Utc>, end: DateTime<Utc>, lines: i64, file_num: i64) -> String {
    format!(
        "{}{d}{}{d}{}{d}{}.log",
        start.to_rfc3339_opts(chrono::SecondsFormat::Nanos, true),
        end.to_rfc3339_opts(chrono::SecondsFormat::Nanos, true),
        lines,
        file_num,
        d = BLOCK_NAME_DELIMITER,
    )
}

#[derive(thiserror::Error, Debug)]
pub enum BlockNameError {
    #[error("malformed block file name: {0}")]
    Malformed(String),
    #[error("invalid timestamp in block file name {0}")]
    Timestamp(String),
    #[error("invalid integer field in block file name {0}")]
    Integer(String),
}

/// Parses the on-disk grammar `{start}_{end}_{lines}_{file_num}.log` back
/// into its four fields. Used when reconstructing chunks at store startup.
pub fn parse_block_file_name(name: &str) -> Result<(DateTime<Utc>, DateTime<Utc>, i64, i64), BlockNameError> {
    let stem = name
        .strip_suffix(".log")
        .ok_or_else(|| BlockNameError::Malformed(name.to_string()))?;
    let parts: Vec<&str> = stem.split(BLOCK_NAME_DELIMITER).collect();
    if parts.len() != 4 {
        return Err(BlockNameError::Malformed(name.to_string()));
    }

    let start = DateTime::parse_from_rfc3339(parts[0])
        .map_err(|_| BlockNameError::Timestamp(name.to_string()))?
        .with_timezone(&Utc);
    let end = DateTime::parse_from_rfc3339(parts[1])
        .map_err(|_| BlockNameError::Timestamp(name.to_string()))?
        .with_timezone(&Utc);
    let lines: i64 = parts[2].parse().map_err(|_| BlockNameError::Integer(name.to_string()))?;
    let file_num: i64 = parts[3].parse().map_err(|_| BlockNameError::Integer(name.to_string()))?;

    Ok((start, end, lines, file_num))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn file_name_round_trips() {
        let start = Utc.with_ymd_and_hms(2023, 12, 5, 6, 52, 1).unwrap();
        let end = Utc.with_ymd_and_hms(2023, 12, 5, 6, 52, 2).unwrap();
        let block = Block::new(start, end, 42, 1024, 7);
        let name = block.file_name();
        let (s, e, lines, file_num) = parse_block_file_name(&name).unwrap();
        assert_eq!(s, start);
        assert_eq!(e, end);
        assert_eq!(lines, 42);
        assert_eq!(file_num, 7);
    }

    #[test]
    fn rejects_malformed_names() {
        assert!(parse_block_file_name("not-a-block-name.log").is_err());
        assert!(parse_block_file_name("temp.log").is_err());
    }
}
