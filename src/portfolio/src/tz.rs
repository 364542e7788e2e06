//! Timestamp and calendar-date helpers.
//!
//! All database writes are RFC-3339 UTC strings with millisecond precision, so that
//! lexicographic order on the TEXT column matches chronological order. Calendar fields
//! (purchase date, completion date, warranty expiry) are plain `YYYY-MM-DD`.

use anyhow::Context;
use chrono::{DateTime, NaiveDate, SecondsFormat, TimeZone, Utc};

/// Format a UTC instant the way every timestamp column stores it.
///
/// Example: `2024-03-10T14:30:00.000Z`
pub fn to_rfc3339_millis(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Current instant in storage format.
pub fn now_rfc3339() -> String {
    to_rfc3339_millis(Utc::now())
}

/// RFC-3339 with offset -> UTC.
///
/// Example:
/// - "2024-03-10T09:30:00-05:00" -> "2024-03-10T14:30:00Z"
pub fn parse_ts_to_utc(s: &str) -> anyhow::Result<DateTime<Utc>> {
    let dt = DateTime::parse_from_rfc3339(s).with_context(|| format!("bad rfc3339: {s}"))?;
    Ok(dt.with_timezone(&Utc))
}

/// Parse a `YYYY-MM-DD` calendar date.
pub fn parse_date(s: &str) -> anyhow::Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").with_context(|| format!("bad date: {s}"))
}

/// Unix seconds (as sent by payment processors) to storage format.
pub fn from_unix_secs(secs: i64) -> anyhow::Result<String> {
    let dt = Utc
        .timestamp_opt(secs, 0)
        .single()
        .with_context(|| format!("bad unix timestamp: {secs}"))?;
    Ok(to_rfc3339_millis(dt))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offset_timestamps_normalize_to_utc_millis() {
        let dt = parse_ts_to_utc("2024-03-10T09:30:00-05:00").unwrap();
        assert_eq!(to_rfc3339_millis(dt), "2024-03-10T14:30:00.000Z");
    }

    #[test]
    fn storage_format_sorts_chronologically() {
        let a = to_rfc3339_millis(parse_ts_to_utc("2024-01-02T00:00:00Z").unwrap());
        let b = to_rfc3339_millis(parse_ts_to_utc("2024-01-10T00:00:00Z").unwrap());
        assert!(a < b);
    }

    #[test]
    fn dates_must_be_iso() {
        assert!(parse_date("2023-07-01").is_ok());
        assert!(parse_date("07/01/2023").is_err());
    }

    #[test]
    fn unix_seconds_convert() {
        assert_eq!(from_unix_secs(0).unwrap(), "1970-01-01T00:00:00.000Z");
    }
}
