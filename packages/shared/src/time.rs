use chrono::{DateTime, Utc};

/// Get current Unix timestamp (milliseconds)
pub fn get_unix_timestamp_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Convert Unix timestamp (milliseconds) to an RFC 3339 string in UTC.
///
/// Returns `None` when the timestamp is out of chrono's representable range.
pub fn timestamp_to_rfc3339(timestamp_millis: i64) -> Option<String> {
    DateTime::<Utc>::from_timestamp_millis(timestamp_millis).map(|dt| dt.to_rfc3339())
}
