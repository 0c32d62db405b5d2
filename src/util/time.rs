//! UTC timestamp helpers

use chrono::{DateTime, SecondsFormat, Utc};

/// ISO-8601 with millisecond precision and a `Z` suffix
pub fn format_utc(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Milliseconds from `start` to `end`, clamped at zero
pub fn duration_ms_between(start: &DateTime<Utc>, end: &DateTime<Utc>) -> u64 {
    u64::try_from((*end - *start).num_milliseconds()).unwrap_or(0)
}

/// Epoch nanoseconds, or 0 when absent or not representable
pub fn to_unix_nanos(ts: Option<&DateTime<Utc>>) -> u64 {
    ts.and_then(|t| t.timestamp_nanos_opt())
        .and_then(|n| u64::try_from(n).ok())
        .unwrap_or(0)
}
