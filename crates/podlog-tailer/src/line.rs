use chrono::{DateTime, Utc};

#[derive(thiserror::Error, Debug, Clone)]
pub enum TailError {
    #[error("tail source became unavailable")]
    Unavailable,
    #[error("io error reading tailed file: {0}")]
    Io(String),
}

/// One line forwarded from a tailer to its consumer, or a terminal error
/// that ends the stream.
#[derive(Debug, Clone)]
pub struct LogLine {
    pub timestamp: Option<DateTime<Utc>>,
    pub line: String,
    pub offset: u64,
    pub error: Option<TailError>,
}

impl LogLine {
    pub fn ok(timestamp: DateTime<Utc>, line: String, offset: u64) -> Self {
        LogLine {
            timestamp: Some(timestamp),
            line,
            offset,
            error: None,
        }
    }

    pub fn err(error: TailError) -> Self {
        LogLine {
            timestamp: None,
            line: String::new(),
            offset: 0,
            error: Some(error),
        }
    }
}
