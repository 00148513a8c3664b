//! Renders a date with a Go reference-time layout (`"2006-01"` and similar),
//! the format the S3 destination's `path_template` and default path use.
//! Only the handful of tokens actual layouts exercise are translated to
//! `chrono`'s `strftime` equivalents; anything else passes through
//! unchanged.

use chrono::{DateTime, Utc};

const TOKENS: &[(&str, &str)] = &[
    ("2006", "%Y"),
    ("06", "%y"),
    ("01", "%m"),
    ("02", "%d"),
    ("15", "%H"),
    ("04", "%M"),
    ("05", "%S"),
];

pub fn format_go_layout(layout: &str, date: DateTime<Utc>) -> String {
    let mut strftime = String::with_capacity(layout.len() * 2);
    let mut rest = layout;
    'outer: while !rest.is_empty() {
        for (token, replacement) in TOKENS {
            if let Some(tail) = rest.strip_prefix(token) {
                strftime.push_str(replacement);
                rest = tail;
                continue 'outer;
            }
        }
        let mut chars = rest.chars();
        let c = chars.next().unwrap();
        if c == '%' {
            strftime.push('%');
        }
        strftime.push(c);
        rest = chars.as_str();
    }
    date.format(&strftime).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn formats_the_default_year_month_layout() {
        let date = Utc.with_ymd_and_hms(2024, 3, 7, 0, 0, 0).unwrap();
        assert_eq!(format_go_layout("2006-01", date), "2024-03");
    }

    #[test]
    fn formats_a_full_date_layout() {
        let date = Utc.with_ymd_and_hms(2024, 3, 7, 13, 5, 9).unwrap();
        assert_eq!(format_go_layout("2006-01-02T15:04:05", date), "2024-03-07T13:05:09");
    }
}
