//! Timestamp parsing and formatting shared by every table.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};

/// Parse a timestamp cell.
///
/// Accepted forms, tried in order:
/// - `YYYY-MM-DD HH:MM:SS[.fff]` and the same with a `T` separator
/// - `YYYY-MM-DD HH:MM` / `YYYY-MM-DDTHH:MM`
/// - RFC 3339 with an offset (converted to naive UTC)
/// - `YYYY-MM-DD` (midnight)
pub fn parse_timestamp(s: &str) -> Result<NaiveDateTime, String> {
    const FMTS: [&str; 4] = [
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M",
    ];
    let s = s.trim();
    for fmt in FMTS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(ts);
        }
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Ok(ts.naive_utc());
    }
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Ok(d.and_time(NaiveTime::MIN));
    }
    Err(format!(
        "invalid timestamp '{s}'; expected YYYY-MM-DD HH:MM:SS, RFC 3339 or YYYY-MM-DD"
    ))
}

/// Format a timestamp the way the output tables carry it.
///
/// Sub-second digits are only printed when non-zero.
pub fn format_timestamp(ts: &NaiveDateTime) -> String {
    ts.format("%Y-%m-%d %H:%M:%S%.f").to_string()
}
