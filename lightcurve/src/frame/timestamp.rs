//! Observation time from frame headers.
//!
//! Acquisition software has written the start time under three conventions
//! over the years. They are tried in order:
//!
//! 1. `UTC-DATE` + `UTC-BEG` (date and time in separate keys)
//! 2. `GPSTIME`
//! 3. `UTC`, truncated to millisecond precision

use chrono::{Duration, NaiveDateTime};

use super::{FrameError, FrameHeader};

const WITH_FRACTION: &str = "%Y-%m-%d %H:%M:%S%.f";
const WHOLE_SECONDS: &str = "%Y-%m-%d %H:%M:%S";

/// `YYYY-MM-DD HH:MM:SS.mmm`
const UTC_KEY_LEN: usize = 23;

/// Parse `YYYY-MM-DD HH:MM:SS` with optional fractional seconds.
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    NaiveDateTime::parse_from_str(value, WITH_FRACTION)
        .or_else(|_| NaiveDateTime::parse_from_str(value, WHOLE_SECONDS))
        .ok()
}

/// Format the way the session log header stores its reference time.
pub fn format_timestamp(time: &NaiveDateTime) -> String {
    time.format(WHOLE_SECONDS).to_string()
}

/// Seconds from `reference` to `time`, with sub-second precision.
pub fn seconds_since(reference: &NaiveDateTime, time: &NaiveDateTime) -> f64 {
    let delta = *time - *reference;
    match delta.num_microseconds() {
        Some(us) => us as f64 * 1e-6,
        None => delta.num_milliseconds() as f64 * 1e-3,
    }
}

fn parse_key(key: &'static str, value: &str) -> Result<NaiveDateTime, FrameError> {
    parse_timestamp(value).ok_or_else(|| FrameError::InvalidTimestamp {
        key,
        value: value.to_string(),
    })
}

fn split_date_time(
    date: Option<&String>,
    time: &str,
    time_key: &'static str,
) -> Result<NaiveDateTime, FrameError> {
    let Some(date) = date else {
        return Err(FrameError::InvalidTimestamp {
            key: "UTC-DATE",
            value: String::new(),
        });
    };
    parse_key(time_key, &format!("{} {}", date.trim(), time.trim()))
}

fn truncate_chars(value: &str, max: usize) -> &str {
    match value.char_indices().nth(max) {
        Some((idx, _)) => &value[..idx],
        None => value,
    }
}

impl FrameHeader {
    /// Exposure start, resolved from the first timestamp convention present.
    pub fn start_time(&self) -> Result<NaiveDateTime, FrameError> {
        if let Some(beg) = &self.utc_beg {
            return split_date_time(self.utc_date.as_ref(), beg, "UTC-BEG");
        }
        if let Some(gps) = &self.gpstime {
            return parse_key("GPSTIME", gps);
        }
        if let Some(utc) = &self.utc {
            return parse_key("UTC", truncate_chars(utc.trim(), UTC_KEY_LEN));
        }
        Err(FrameError::NoTimestamp)
    }

    /// Exposure end, when the header records it (`UTC-DATE` + `UTC-END`).
    pub fn end_time(&self) -> Result<Option<NaiveDateTime>, FrameError> {
        match &self.utc_end {
            Some(end) => split_date_time(self.utc_date.as_ref(), end, "UTC-END").map(Some),
            None => Ok(None),
        }
    }

    /// Middle of the exposure: midpoint of start and end when both are
    /// recorded, otherwise start plus half the exposure time.
    pub fn mid_time(&self, exposure_seconds: f64) -> Result<NaiveDateTime, FrameError> {
        let start = self.start_time()?;
        let half = match self.end_time()? {
            Some(end) => (end - start) / 2,
            None => Duration::microseconds((exposure_seconds * 0.5e6).round() as i64),
        };
        Ok(start + half)
    }
}
