//! Timestamp normalization: stamp in UTC, render in local time.
//!
//! Outgoing envelopes carry their own UTC timestamp instead of relying on
//! broker-assigned record timestamps, whose zone handling differs between
//! deployments.

use std::fmt;

use chrono::{DateTime, FixedOffset, Local, NaiveDateTime, SecondsFormat, TimeZone, Utc};

/// Display format for rendered timestamps (`2024-01-01 14:00:00.000000`).
pub const DISPLAY_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// A timestamp string that could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid timestamp {input:?}: {reason}")]
pub struct ClockError {
    /// The rejected input.
    pub input: String,
    /// Parser diagnostic.
    pub reason: String,
}

/// Returns the current instant as RFC 3339 UTC with microsecond precision.
///
/// Example: `2024-01-01T12:00:00.000000+00:00`.
#[must_use]
pub fn now_utc() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false)
}

/// Parses an ISO-8601 timestamp into UTC.
///
/// Accepts RFC 3339 (with `T` or a space separator) and offset-less
/// timestamps, which are taken to be UTC.
///
/// # Errors
///
/// Returns [`ClockError`] if no accepted form matches.
pub fn parse_utc(input: &str) -> Result<DateTime<Utc>, ClockError> {
    let trimmed = input.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::<FixedOffset>::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S%.f%:z") {
        return Ok(dt.with_timezone(&Utc));
    }

    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(trimmed, fmt).ok())
        .map(|naive| naive.and_utc())
        .ok_or_else(|| ClockError {
            input: input.to_string(),
            reason: "not an ISO-8601 timestamp".to_string(),
        })
}

/// Renders a UTC timestamp in the host's local time zone.
///
/// # Errors
///
/// Returns [`ClockError`] if `utc` cannot be parsed.
pub fn to_local_display(utc: &str) -> Result<String, ClockError> {
    to_display_in(utc, &Local)
}

/// Renders a UTC timestamp in the given time zone using [`DISPLAY_FORMAT`].
///
/// # Errors
///
/// Returns [`ClockError`] if `utc` cannot be parsed.
pub fn to_display_in<Tz>(utc: &str, tz: &Tz) -> Result<String, ClockError>
where
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    let instant = parse_utc(utc)?;
    Ok(instant.with_timezone(tz).format(DISPLAY_FORMAT).to_string())
}
