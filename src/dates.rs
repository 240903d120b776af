//! Canonical date-key handling.
//!
//! Every persisted date is keyed by its `YYYY-MM-DD` form. Earlier releases
//! of the original app wrote keys with a trailing time-of-day component;
//! [`normalize_date_key`] collapses any such representation back to the
//! calendar day so two spellings of the same day hit one record.

use chrono::{DateTime, Datelike, Local, NaiveDate, NaiveDateTime};

use crate::error::{GuardrailsError, Result};

pub const DATE_FMT: &str = "%Y-%m-%d";

/// Normalize an arbitrary stored date string to `YYYY-MM-DD`.
///
/// Accepts plain dates, RFC 3339 timestamps, and the `YYYY-MM-DDTHH:MM:SS`
/// shape left behind by legacy writes.
pub fn normalize_date_key(raw: &str) -> Result<String> {
    Ok(parse_date_key(raw)?.format(DATE_FMT).to_string())
}

/// Parse any supported date spelling into a day-precision date.
pub fn parse_date_key(raw: &str) -> Result<NaiveDate> {
    let trimmed = raw.trim();
    // Fast path: the first ten characters are already a plain date. This also
    // covers "2024-01-05T12:30:00" and RFC 3339 forms, whose prefix is the day.
    if let Some(prefix) = trimmed.get(..10) {
        if let Ok(d) = NaiveDate::parse_from_str(prefix, DATE_FMT) {
            return Ok(d);
        }
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.date_naive());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S") {
        return Ok(dt.date());
    }
    Err(GuardrailsError::InvalidDate(raw.to_string()))
}

/// Today's date in local time, as a canonical key.
pub fn iso_today() -> String {
    Local::now().date_naive().format(DATE_FMT).to_string()
}

/// Day-precision timestamp used as the interpolation axis.
pub fn day_number(date: NaiveDate) -> i64 {
    date.num_days_from_ce() as i64
}
