use chrono::{DateTime, Utc};

/// Current UTC wall clock.
pub fn now_utc() -> DateTime<Utc> {
    Utc::now()
}

/// Current UTC time, honoring a component-specific environment
/// override (`HOT_DIGEST_NOW`, `STREAM_AUDIT_NOW`, ...). Tests pin the
/// clock through the override without touching the system clock; a
/// malformed value falls back to the wall clock.
pub fn now_with_override(var: &str) -> DateTime<Utc> {
    match std::env::var(var) {
        Ok(raw) if !raw.is_empty() => DateTime::parse_from_rfc3339(&raw)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
        _ => Utc::now(),
    }
}
