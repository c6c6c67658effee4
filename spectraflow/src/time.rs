use chrono::NaiveDateTime;

use crate::error::{EngineError, Result};

/// Timestamps are naive wall-clock times with millisecond precision,
/// as they appear in the input files.
pub type Stamp = NaiveDateTime;

/// The timestamp format of the input files: `YYYY-MM-DD hh:mm:ss.SSS`.
pub const STAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// The date-only format used for slice start labels.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Parses a timestamp string, reporting the offending row on failure.
pub fn parse_stamp(text: &str, row: usize) -> Result<Stamp> {
    NaiveDateTime::parse_from_str(text.trim(), STAMP_FORMAT).map_err(|err| EngineError::Parse {
        row,
        message: format!("bad timestamp {text:?}: {err}"),
    })
}

pub fn format_stamp(stamp: &Stamp) -> String {
    stamp.format(STAMP_FORMAT).to_string()
}

pub fn format_date(stamp: &Stamp) -> String {
    stamp.format(DATE_FORMAT).to_string()
}

/// Elapsed seconds from `a` to `b`, fractional, negative if `b` precedes `a`.
pub fn seconds_between(a: &Stamp, b: &Stamp) -> f64 {
    let delta = *b - *a;
    match delta.num_nanoseconds() {
        Some(nanos) => nanos as f64 * 1e-9,
        None => delta.num_milliseconds() as f64 * 1e-3,
    }
}
