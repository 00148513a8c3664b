pub mod config;
pub mod parser;

pub use config::LogFormat;
pub use parser::{
    has_proper_log_line, make_unreliable_timestamp, parse_log_message, parse_log_message_by_source, parse_stream, parse_tag,
    parse_timestamp, ParseError, MAX_TIMESTAMP_LEN, MIN_TIMESTAMP_LEN, UNRELIABLE_TIMESTAMP_MARKER,
};
