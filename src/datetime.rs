//! Date/time utilities for fshare.
//!
//! Timestamps are stored as unix seconds in the catalog and exchanged as
//! RFC 3339 strings over HTTP.

use chrono::{DateTime, SecondsFormat, TimeDelta, Utc};

/// Lifetime applied when an upload asks for auto-deletion with an unusable value.
pub const FALLBACK_AUTO_DELETE: TimeDelta = TimeDelta::hours(24);

/// Convert a stored unix timestamp to `DateTime<Utc>`.
///
/// Out-of-range values collapse to the unix epoch.
pub fn from_unix(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap_or_default()
}

/// Convert a `DateTime<Utc>` to unix seconds for storage.
pub fn to_unix(dt: DateTime<Utc>) -> i64 {
    dt.timestamp()
}

/// Format a timestamp as RFC 3339 with second precision.
pub fn to_rfc3339(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Parse an `auto_del_in` upload field into a lifetime.
///
/// - empty: no expiry (`None`)
/// - `"<n>d"`: n days
/// - otherwise a duration such as `"90s"`, `"15m"` or `"1h30m"`
///
/// Unparseable or negative input falls back to [`FALLBACK_AUTO_DELETE`].
pub fn parse_auto_delete(input: &str) -> Option<TimeDelta> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }

    if let Some(days) = input.strip_suffix('d') {
        return Some(match days.parse::<i64>() {
            Ok(n) if n >= 0 => TimeDelta::try_days(n).unwrap_or(FALLBACK_AUTO_DELETE),
            _ => FALLBACK_AUTO_DELETE,
        });
    }

    Some(parse_duration(input).unwrap_or(FALLBACK_AUTO_DELETE))
}

/// Parse a sequence of `<n><unit>` components (`h`, `m`, `s`, `ms`).
fn parse_duration(input: &str) -> Option<TimeDelta> {
    if input == "0" {
        return Some(TimeDelta::zero());
    }

    let mut total = TimeDelta::zero();
    let mut rest = input;

    while !rest.is_empty() {
        let digits = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
        if digits == 0 {
            return None;
        }
        let value: i64 = rest[..digits].parse().ok()?;
        rest = &rest[digits..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit())
            .unwrap_or(rest.len());
        let part = match &rest[..unit_len] {
            "h" => TimeDelta::try_hours(value)?,
            "m" => TimeDelta::try_minutes(value)?,
            "s" => TimeDelta::try_seconds(value)?,
            "ms" => TimeDelta::try_milliseconds(value)?,
            _ => return None,
        };
        total = total.checked_add(&part)?;
        rest = &rest[unit_len..];
    }

    Some(total)
}
