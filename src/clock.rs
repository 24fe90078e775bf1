// Wall-clock capability. All stored timestamps are epoch milliseconds;
// the backup envelope carries an RFC 3339 UTC string.

use chrono::{SecondsFormat, Utc};

/// Current wall-clock time in milliseconds since the Unix epoch.
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Current UTC time as an RFC 3339 string, e.g. `2026-08-07T12:00:00Z`.
pub fn now_utc_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}
