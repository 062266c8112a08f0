// Stored timestamp handling

use chrono::{Duration, NaiveDateTime};

use crate::constants::{
    MAX_UTC_OFFSET_HOURS, PARAM_HOURS_OFFSET_TO_UTC, TIMESTAMP_FORMAT, TIMESTAMP_PARSE_FORMAT, WINDOW_END_DEFAULT, WINDOW_FORMAT,
    WINDOW_START_DEFAULT,
};
use crate::error::{MetadataError, Result};

/// Parse a timestamp as written by the acquisition software
/// ("2021-02-18 19:46:18.000000"). A malformed value is fatal.
pub fn parse_stored(value: &str) -> Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value.trim(), TIMESTAMP_PARSE_FORMAT).map_err(|e| {
        MetadataError::Parse(format!("Bad stored timestamp {:?}: {}", value, e))
    })
}

/// Format a timestamp with microsecond precision.
pub fn format_stored(time: &NaiveDateTime) -> String {
    time.format(TIMESTAMP_FORMAT).to_string()
}

/// Convert the `hours_offset_to_utc` parameter into a duration.
/// Anything that does not parse as a float, or lies outside a day either way,
/// counts as zero.
pub fn utc_offset(hours: Option<&str>) -> Duration {
    let parsed = hours.and_then(|h| h.trim().parse::<f64>().ok());
    let hours = match parsed {
        Some(h) if h.is_finite() && h.abs() <= MAX_UTC_OFFSET_HOURS => h,
        Some(h) => {
            log::warn!("Ignoring out of range {} = {}", PARAM_HOURS_OFFSET_TO_UTC, h);
            0.0
        }
        None => 0.0,
    };
    Duration::microseconds((hours * 3_600_000_000.0).round() as i64)
}

/// Shift a recorded time by the UTC offset.
pub fn apply_offset(time: NaiveDateTime, offset: Duration) -> Result<NaiveDateTime> {
    time.checked_add_signed(offset).ok_or_else(|| {
        MetadataError::Parse(format!("UTC offset {} overflows {}", offset, time))
    })
}

/// Inclusive time window for `query`. Open ends fall back to far past/future bounds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: Option<NaiveDateTime>,
    pub end: Option<NaiveDateTime>,
}

impl TimeWindow {
    pub fn new(start: Option<NaiveDateTime>, end: Option<NaiveDateTime>) -> Self {
        Self { start, end }
    }

    /// Window bounds as SQL datetime() arguments, second precision.
    pub fn bounds(&self) -> (String, String) {
        let fmt = |t: &Option<NaiveDateTime>, default: &str| match t {
            Some(t) => t.format(WINDOW_FORMAT).to_string(),
            None => default.to_string(),
        };
        (fmt(&self.start, WINDOW_START_DEFAULT), fmt(&self.end, WINDOW_END_DEFAULT))
    }
}
