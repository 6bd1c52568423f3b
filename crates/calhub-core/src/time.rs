//! Timestamp parsing and normalization.
//!
//! Every duplicate comparison in the store goes through these helpers, so
//! the rules here are load-bearing. In particular: a naive timestamp (no
//! trailing `Z`, no `±HH:MM` offset) is treated as UTC, not local time.
//! Changing that assumption changes dedup outcomes against existing stores.

use chrono::{DateTime, Duration, FixedOffset, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use chrono_tz::Tz;

/// Parse an ISO-8601 timestamp string.
///
/// Accepts `YYYY-MM-DDTHH:MM:SS` optionally followed by a fractional part
/// and `Z` or a `±HH:MM` offset. A timestamp without any offset is taken
/// as UTC. Malformed or empty input yields `None`, never an error.
pub fn parse_iso_datetime(text: &str) -> Option<DateTime<FixedOffset>> {
    if text.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt);
    }

    // No offset at all: take the wall-clock reading as UTC.
    let naive = NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f").ok()?;
    Some(naive.and_utc().fixed_offset())
}

/// Convert a timestamp to UTC. Idempotent.
pub fn normalize_to_utc(dt: DateTime<FixedOffset>) -> DateTime<Utc> {
    dt.with_timezone(&Utc)
}

/// True iff the two timestamps are strictly less than `tolerance_secs`
/// apart once both are normalized to UTC.
pub fn within_tolerance(
    a: DateTime<FixedOffset>,
    b: DateTime<FixedOffset>,
    tolerance_secs: i64,
) -> bool {
    let diff = (normalize_to_utc(a) - normalize_to_utc(b)).num_seconds().abs();
    diff < tolerance_secs
}

/// Format a timestamp as ISO-8601.
///
/// With `preserve_offset` the original offset is kept; otherwise the
/// timestamp is converted to UTC first (rendered with `+00:00`).
pub fn format_iso_datetime(dt: DateTime<FixedOffset>, preserve_offset: bool) -> String {
    if preserve_offset {
        dt.to_rfc3339_opts(SecondsFormat::AutoSi, false)
    } else {
        normalize_to_utc(dt).to_rfc3339_opts(SecondsFormat::AutoSi, false)
    }
}

/// UTC range `[now - days_back, now + days_ahead]` for querying events.
pub fn date_range(days_back: i64, days_ahead: i64) -> (DateTime<Utc>, DateTime<Utc>) {
    let now = Utc::now();
    (now - Duration::days(days_back), now + Duration::days(days_ahead))
}

/// Interpret a timestamp string in a named zone.
///
/// A string with an explicit offset is converted into the zone (DST
/// correct); a naive string is taken as wall-clock time already in that
/// zone. Used to repair feeds that emit local times with wrong or missing
/// offsets.
pub fn normalize_str_to_zone(text: &str, tz: Tz) -> Option<DateTime<Tz>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&tz));
    }
    let naive = NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f").ok()?;
    match tz.from_local_datetime(&naive) {
        chrono::LocalResult::Single(dt) => Some(dt),
        // DST fold: pick the earlier reading.
        chrono::LocalResult::Ambiguous(earlier, _later) => Some(earlier),
        chrono::LocalResult::None => None,
    }
}

/// [`normalize_str_to_zone`] fixed to America/Los_Angeles.
pub fn normalize_to_pacific(text: &str) -> Option<DateTime<Tz>> {
    normalize_str_to_zone(text, chrono_tz::America::Los_Angeles)
}
