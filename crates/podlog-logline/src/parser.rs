use std::sync::OnceLock;

use chrono::{DateTime, FixedOffset, NaiveDate, TimeZone, Utc};
use regex::Regex;

use crate::config::LogFormat;

/// Synthetic marker injected ahead of a line whose timestamp could not be
/// parsed for an emptydir source with a known previous timestamp. Preserved
/// verbatim as observable stream content.
pub const UNRELIABLE_TIMESTAMP_MARKER: &str = "(lobster: Unreliable timestamp)";

const RFC3339_LEN: usize = 25;
const RFC3339_NANO_LEN: usize = 35;

/// `len("2006-01-02T15:04:05Z07:00") - 5`: the shortest input that could
/// plausibly be a timestamp prefix (no fractional seconds, no offset).
pub const MIN_TIMESTAMP_LEN: usize = RFC3339_LEN - 5;
/// `len("2006-01-02T15:04:05.999999999Z07:00")`: the longest possible
/// timestamp prefix.
pub const MAX_TIMESTAMP_LEN: usize = RFC3339_NANO_LEN;

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum ParseError {
    #[error("could not parse empty input")]
    Empty,
    #[error("could not parse improper input: {0}")]
    Improper(String),
    #[error("can't find log message: {0}")]
    NoMessage(String),
    #[error("can't find timestamp: {0}")]
    NoTimestamp(String),
    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),
}

fn time_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#""time":"(.+?)""#).unwrap())
}

fn log_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#""log":"(.+?)""#).unwrap())
}

pub fn make_unreliable_timestamp(ts: DateTime<Utc>, line: &str) -> String {
    format!(
        "{} {} {}",
        ts.to_rfc3339_opts(chrono::SecondsFormat::Nanos, true),
        UNRELIABLE_TIMESTAMP_MARKER,
        line
    )
}

pub fn parse_log_message_by_source(source_type: &str, format: LogFormat, str: &str) -> Result<String, ParseError> {
    if source_type == podlog_model::Source::STD_STREAM {
        parse_log_message(format, str)
    } else {
        Ok(str.to_string())
    }
}

pub fn parse_log_message(format: LogFormat, str: &str) -> Result<String, ParseError> {
    if str.is_empty() {
        return Err(ParseError::Empty);
    }
    match format {
        LogFormat::Text => message_in_text_line(str),
        LogFormat::Json => message_in_json_line(str),
    }
}

pub fn parse_timestamp(format: LogFormat, str: &str) -> Result<DateTime<Utc>, ParseError> {
    match format {
        LogFormat::Text => timestamp_in_text_line(str),
        LogFormat::Json => timestamp_in_json_line(str),
    }
}

/// `stream` is `stdout` or `stderr`; located by substring search since its
/// position after the timestamp varies with fractional-second width.
pub fn parse_stream(str: &str) -> Result<&str, ParseError> {
    if str.is_empty() {
        return Err(ParseError::Empty);
    }
    let idx = str.find("stdout").or_else(|| str.find("stderr"));
    match idx {
        Some(idx) if idx > 0 => Ok(&str[idx..idx + 6]),
        _ => Err(ParseError::NoMessage(str.to_string())),
    }
}

/// `tag` is `F` (full line) or `P` (partial line).
pub fn parse_tag(str: &str) -> Result<&str, ParseError> {
    if str.is_empty() {
        return Err(ParseError::Empty);
    }
    let idx = str.find('F').or_else(|| str.find('P'));
    match idx {
        Some(idx) if idx > 0 => Ok(&str[idx..idx + 1]),
        _ => Err(ParseError::NoMessage(str.to_string())),
    }
}

fn message_in_text_line(str: &str) -> Result<String, ParseError> {
    let idx = str.find('F').or_else(|| str.find('P'));
    let idx = match idx {
        Some(idx) if idx > 0 => idx,
        _ => return Err(ParseError::NoMessage(str.to_string())),
    };
    let log_idx = idx + 2;
    if str.len() <= log_idx {
        return Ok(String::new());
    }
    Ok(str[log_idx..].to_string())
}

fn message_in_json_line(str: &str) -> Result<String, ParseError> {
    log_regex()
        .captures(str)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| ParseError::NoTimestamp(str.to_string()))
}

/// Hand-rolled fixed-width parse of `{RFC3339[Nano]}` at the start of a
/// text-format line: validates the positional separators, reads
/// year/month/day/hour/minute/second as fixed-width decimals, then absorbs
/// optional fractional seconds (zero-padded to nanosecond precision on the
/// right) and either `Z`, whitespace, or a `±hh[:]mm` offset.
///
/// Computes the absolute UTC instant directly — unlike the reference
/// parser, no local-timezone re-expression step is applied, since it would
/// only change the *display* offset, not the instant.
fn timestamp_in_text_line(str: &str) -> Result<DateTime<Utc>, ParseError> {
    let bytes = str.as_bytes();
    if bytes.len() < MIN_TIMESTAMP_LEN
        || bytes[4] != b'-'
        || bytes[7] != b'-'
        || bytes[10] != b'T'
        || bytes[13] != b':'
        || bytes[16] != b':'
    {
        return Err(ParseError::Improper(str.to_string()));
    }

    let digit = |b: u8| -> i64 { (b - b'0') as i64 };

    let year = digit(bytes[0]) * 1000 + digit(bytes[1]) * 100 + digit(bytes[2]) * 10 + digit(bytes[3]);
    let month = digit(bytes[5]) * 10 + digit(bytes[6]);
    let day = digit(bytes[8]) * 10 + digit(bytes[9]);
    let hour = digit(bytes[11]) * 10 + digit(bytes[12]);
    let minute = digit(bytes[14]) * 10 + digit(bytes[15]);
    let second = digit(bytes[17]) * 10 + digit(bytes[18]);

    let max_len = bytes.len().min(MAX_TIMESTAMP_LEN);

    let mut frac_digits = String::new();
    let mut offset: Option<&str> = None;
    let mut index = 19usize;
    while index < max_len {
        let b = bytes[index];
        if b == b'.' {
            index += 1;
            continue;
        }
        if b == b'\t' || b == b' ' || b == b'Z' {
            break;
        }
        if b == b'+' || b == b'-' {
            let end = (index + 6).min(bytes.len());
            offset = Some(&str[index..end]);
            break;
        }
        frac_digits.push(b as char);
        index += 1;
    }

    let nanos: u32 = if frac_digits.is_empty() {
        0
    } else {
        let digits = &frac_digits[..frac_digits.len().min(9)];
        let value: u32 = digits.parse().unwrap_or(0);
        value * 10u32.pow((9 - digits.len()) as u32)
    };

    let naive_date =
        NaiveDate::from_ymd_opt(year as i32, month as u32, day as u32).ok_or_else(|| ParseError::InvalidTimestamp(str.to_string()))?;
    let naive_time = naive_date
        .and_hms_nano_opt(hour as u32, minute as u32, second as u32, nanos)
        .ok_or_else(|| ParseError::InvalidTimestamp(str.to_string()))?;

    let fixed_offset = match offset {
        Some(raw) => parse_offset(raw).ok_or_else(|| ParseError::InvalidTimestamp(str.to_string()))?,
        None => FixedOffset::east_opt(0).unwrap(),
    };

    let with_offset = fixed_offset
        .from_local_datetime(&naive_time)
        .single()
        .ok_or_else(|| ParseError::InvalidTimestamp(str.to_string()))?;

    Ok(with_offset.with_timezone(&Utc))
}

/// Parses a `±hh[:]mm` offset (either `-09:00` or `+0900` shaped) into a
/// `FixedOffset`.
fn parse_offset(raw: &str) -> Option<FixedOffset> {
    let bytes = raw.as_bytes();
    if bytes.len() < 5 {
        return None;
    }
    let sign: i32 = if bytes[0] == b'+' { 1 } else { -1 };
    let has_colon = bytes.get(3) == Some(&b':');
    let minute_start = if has_colon { 4 } else { 3 };
    if bytes.len() < minute_start + 2 {
        return None;
    }
    let tz_hour: i32 = std::str::from_utf8(&bytes[1..3]).ok()?.parse().ok()?;
    let tz_minute: i32 = std::str::from_utf8(&bytes[minute_start..minute_start + 2]).ok()?.parse().ok()?;
    FixedOffset::east_opt(sign * (tz_hour * 3600 + tz_minute * 60))
}

fn timestamp_in_json_line(str: &str) -> Result<DateTime<Utc>, ParseError> {
    let captured = time_regex()
        .captures(str)
        .and_then(|c| c.get(1))
        .ok_or_else(|| ParseError::NoTimestamp(str.to_string()))?;
    DateTime::parse_from_rfc3339(captured.as_str())
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| ParseError::InvalidTimestamp(str.to_string()))
}

/// Probes whether a file's first line is time-prefixed, used to filter
/// emptydir files that don't carry recognizable timestamps.
pub fn has_proper_log_line(format: LogFormat, path: &std::path::Path) -> bool {
    use std::io::BufRead;

    let file = match std::fs::File::open(path) {
        Ok(f) => f,
        Err(_) => return false,
    };
    let mut reader = std::io::BufReader::with_capacity(16 * 1024, file);
    let mut first_line = String::new();
    if reader.read_line(&mut first_line).unwrap_or(0) == 0 {
        return false;
    }
    if first_line.len() < MIN_TIMESTAMP_LEN {
        return false;
    }
    parse_timestamp(format, &first_line).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn parses_nanosecond_offset_text_timestamp() {
        let ts = timestamp_in_text_line("2022-11-01T09:14:12.652952473-09:00 stdout F hi").unwrap();
        let expected = Utc.with_ymd_and_hms(2022, 11, 1, 18, 14, 12).unwrap() + chrono::Duration::nanoseconds(652_952_473);
        assert_eq!(ts, expected);
    }

    #[test]
    fn parses_z_suffixed_timestamp() {
        let ts = timestamp_in_text_line("2023-12-05T06:52:01.364Z stdout F hi").unwrap();
        let expected = Utc.with_ymd_and_hms(2023, 12, 5, 6, 52, 1).unwrap() + chrono::Duration::milliseconds(364);
        assert_eq!(ts, expected);
    }

    #[test]
    fn parses_no_colon_offset_timestamp() {
        let ts = timestamp_in_text_line("2023-12-12T17:51:43.769+0900 stdout F hi").unwrap();
        let expected = Utc.with_ymd_and_hms(2023, 12, 12, 8, 51, 43).unwrap() + chrono::Duration::milliseconds(769);
        assert_eq!(ts, expected);
    }

    #[test]
    fn rejects_short_input() {
        assert!(timestamp_in_text_line("short").is_err());
    }

    #[test]
    fn text_message_extracts_after_tag() {
        let msg = message_in_text_line("2023-12-05T06:52:01.364Z stdout F hello world").unwrap();
        assert_eq!(msg, "hello world");
    }

    #[test]
    fn json_message_and_timestamp_extraction() {
        let line = r#"{"time":"2023-12-05T06:52:01.364Z","log":"hello\n","stream":"stdout"}"#;
        let ts = timestamp_in_json_line(line).unwrap();
        assert_eq!(ts.to_rfc3339(), "2023-12-05T06:52:01.364+00:00");
        let msg = message_in_json_line(line).unwrap();
        assert_eq!(msg, "hello\\n");
    }
}
