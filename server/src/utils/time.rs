//! Time utility functions
//!
//! Sample timestamps are stored without a time zone. Inputs carrying an offset
//! are converted to UTC before the zone is dropped.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeDelta, Utc};

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Parse an ISO 8601 / RFC 3339 timestamp, a naive timestamp or a bare date
pub fn parse_timestamp(ts: &str) -> Option<NaiveDateTime> {
    let ts = ts.trim();
    if ts.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(ts) {
        return Some(dt.with_timezone(&Utc).naive_utc());
    }

    for format in NAIVE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(ts, format) {
            return Some(dt);
        }
    }

    NaiveDate::parse_from_str(ts, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Length of `[start, end)` in seconds with microsecond precision
pub fn span_seconds(start: NaiveDateTime, end: NaiveDateTime) -> f64 {
    micros(end - start) as f64 / 1_000_000.0
}

/// Whole microseconds in a delta; saturates instead of overflowing
pub fn micros(delta: TimeDelta) -> i64 {
    delta.num_microseconds().unwrap_or(if delta < TimeDelta::zero() {
        i64::MIN
    } else {
        i64::MAX
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_parse_naive_iso() {
        let dt = parse_timestamp("2013-12-01T18:15:00").unwrap();
        assert_eq!(dt.year(), 2013);
        assert_eq!(dt.hour(), 18);
        assert_eq!(dt.minute(), 15);
    }

    #[test]
    fn test_parse_space_separated() {
        let dt = parse_timestamp("2015-03-16 12:51:50").unwrap();
        assert_eq!(dt.day(), 16);
        assert_eq!(dt.second(), 50);
    }

    #[test]
    fn test_parse_with_offset_converts_to_utc() {
        let dt = parse_timestamp("2024-01-15T10:30:00+05:00").unwrap();
        assert_eq!(dt.hour(), 5);
        assert_eq!(dt.minute(), 30);
    }

    #[test]
    fn test_parse_fractional_seconds() {
        let dt = parse_timestamp("2024-01-15T10:30:00.250").unwrap();
        assert_eq!(dt.nanosecond(), 250_000_000);
    }

    #[test]
    fn test_parse_bare_date() {
        let dt = parse_timestamp("2015-01-01").unwrap();
        assert_eq!(dt.hour(), 0);
    }

    #[test]
    fn test_parse_invalid() {
        assert!(parse_timestamp("not-a-timestamp").is_none());
        assert!(parse_timestamp("").is_none());
    }

    #[test]
    fn test_span_seconds() {
        let start = parse_timestamp("2015-01-01T00:05:00").unwrap();
        let end = parse_timestamp("2015-01-01T00:09:00").unwrap();
        assert_eq!(span_seconds(start, end), 240.0);
        assert_eq!(span_seconds(end, start), -240.0);
    }
}
