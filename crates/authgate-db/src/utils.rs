//! Shared utility functions

use chrono::{DateTime, Utc};

/// Parse a datetime string (RFC3339 format) or return current time
///
/// Rows are always written with `to_rfc3339`, so the fallback only triggers
/// on hand-edited data.
pub fn parse_datetime_or_now(s: &str) -> DateTime<Utc> {
    chrono::DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

/// Parse a nullable datetime column
pub fn parse_optional_datetime(s: Option<String>) -> Option<DateTime<Utc>> {
    s.and_then(|s| {
        chrono::DateTime::parse_from_rfc3339(&s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    })
}
