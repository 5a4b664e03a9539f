//! Time formatting helpers for the backend event payload contract.

use chrono::{DateTime, Utc};

/// Current wall-clock time in milliseconds since the epoch.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Format a millisecond epoch timestamp as `DD/Mon/YYYY:HH:MM:SS +0000` (UTC,
/// English three-letter month), matching the cloud service's `requestTime`
/// format in its access-log-style request context.
pub fn format_request_time(millis: i64) -> String {
    let dt: DateTime<Utc> =
        DateTime::from_timestamp_millis(millis).unwrap_or_else(Utc::now);
    dt.format("%d/%b/%Y:%H:%M:%S +0000").to_string()
}

/// Format a millisecond epoch timestamp as ISO-8601 UTC with millisecond
/// precision, for the management `GET /@connections/{id}` response.
pub fn format_iso8601_millis(millis: i64) -> String {
    let dt: DateTime<Utc> =
        DateTime::from_timestamp_millis(millis).unwrap_or_else(Utc::now);
    dt.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}
