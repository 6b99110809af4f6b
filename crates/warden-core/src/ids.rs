//! ID and clock utilities: monotonic ids, UUIDv4 ids, and ISO-8601 timestamps.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Generate a new monotonic identifier (starts at 1). Process-local, not persisted.
pub fn next_monotonic_id() -> u64 {
    NEXT_ID.fetch_add(1, Ordering::Relaxed)
}

/// Milliseconds since UNIX epoch.
#[must_use]
pub fn now_ms() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).expect("system clock before epoch").as_millis() as u64
}

/// Current wall-clock time as an ISO-8601 / RFC-3339 UTC timestamp with millisecond precision.
#[must_use]
pub fn now_iso8601() -> String {
    iso8601_from_ms(now_ms())
}

/// Render a millisecond UNIX timestamp as an ISO-8601 / RFC-3339 UTC string.
///
/// Implemented without a date-time dependency: converts epoch millis to a
/// civil calendar date using the proleptic Gregorian algorithm.
#[must_use]
pub fn iso8601_from_ms(ts_ms: u64) -> String {
    let secs = ts_ms / 1000;
    let millis = ts_ms % 1000;
    let days = secs / 86_400;
    let secs_of_day = secs % 86_400;
    let (y, m, d) = civil_from_days(days as i64);
    let hh = secs_of_day / 3600;
    let mm = (secs_of_day % 3600) / 60;
    let ss = secs_of_day % 60;
    format!("{y:04}-{m:02}-{d:02}T{hh:02}:{mm:02}:{ss:02}.{millis:03}Z")
}

/// UTC hour-of-day (0-23) and weekday (0 = Sunday .. 6 = Saturday) for a
/// millisecond UNIX timestamp. Used by time-of-day gated rules (e.g. the
/// approval router's `time_restrictions`).
#[must_use]
pub fn hour_and_weekday(ts_ms: u64) -> (u8, u8) {
    let secs = ts_ms / 1000;
    let days = secs / 86_400;
    let secs_of_day = secs % 86_400;
    let hour = (secs_of_day / 3600) as u8;
    // 1970-01-01 (day 0) was a Thursday (weekday index 4 in a Sunday=0 scheme).
    let weekday = ((days + 4) % 7) as u8;
    (hour, weekday)
}

/// Howard Hinnant's `civil_from_days`: days-since-epoch to (year, month, day).
fn civil_from_days(z: i64) -> (i64, u32, u32) {
    let z = z + 719_468;
    let era = if z >= 0 { z } else { z - 146_096 } / 146_097;
    let doe = (z - era * 146_097) as u64;
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let y = yoe as i64 + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let m = if mp < 10 { mp + 3 } else { mp - 9 } as u32;
    (if m <= 2 { y + 1 } else { y }, m, d)
}

/// Opaque trace/event identifier (UUID v4 string).
#[must_use]
pub fn new_uuid() -> String {
    Uuid::new_v4().to_string()
}
