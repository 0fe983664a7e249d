use chrono::{DateTime, Utc};

/// Parse an ISO-8601 timestamp, accepting either a `Z` suffix or an
/// explicit offset. Returns `None` on malformed input.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Format a timestamp the way the stream stores it: UTC, second
/// precision, `Z` suffix.
pub fn format_timestamp(dt: DateTime<Utc>) -> String {
    dt.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

/// Human-readable age of a timestamp relative to `now` ("5m ago",
/// "3h ago", "2d ago"). Malformed timestamps render as "recently".
pub fn format_time_ago(timestamp: &str, now: DateTime<Utc>) -> String {
    let Some(event_time) = parse_timestamp(timestamp) else {
        return "recently".to_string();
    };
    let seconds = (now - event_time).num_seconds().max(0);
    if seconds < 3600 {
        format!("{}m ago", seconds / 60)
    } else if seconds < 86400 {
        format!("{}h ago", seconds / 3600)
    } else {
        format!("{}d ago", seconds / 86400)
    }
}
