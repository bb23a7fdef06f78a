//! Timestamp helpers.
//!
//! Storage keeps UTC epoch milliseconds; `chrono` is used only at the edges.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};

/// Date input that cannot be interpreted as a timezone-aware instant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid date `{0}`; expected YYYY-MM-DD or RFC 3339")]
pub struct InvalidDate(pub String);

/// Converts stored epoch milliseconds back to a UTC instant.
pub fn from_epoch_ms(value: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_millis(value)
}

/// Midnight (00:00:00 UTC) of the day containing `now`.
pub fn start_of_utc_day(now: DateTime<Utc>) -> DateTime<Utc> {
    let midnight = now
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .unwrap_or_else(|| now.naive_utc());
    Utc.from_utc_datetime(&midnight)
}

/// Parses user supplied due dates.
///
/// Accepted shapes:
/// - `2026-03-01` (midnight UTC)
/// - `2026-03-01T09:30:00+02:00` (RFC 3339, normalized to UTC)
/// - `2026-03-01 09:30` / `2026-03-01T09:30:00` (treated as UTC)
pub fn parse_due_date(text: &str) -> Result<DateTime<Utc>, InvalidDate> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(InvalidDate(text.to_string()));
    }

    if let Ok(value) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(value.with_timezone(&Utc));
    }

    if let Ok(day) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        if let Some(midnight) = day.and_hms_opt(0, 0, 0) {
            return Ok(Utc.from_utc_datetime(&midnight));
        }
    }

    for format in ["%Y-%m-%d %H:%M", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(value) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(Utc.from_utc_datetime(&value));
        }
    }

    Err(InvalidDate(trimmed.to_string()))
}

/// Renders stored epoch milliseconds as `YYYY-MM-DD`.
pub fn format_day(value: i64) -> String {
    from_epoch_ms(value)
        .map(|instant| instant.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "invalid date".to_string())
}
