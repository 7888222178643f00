//! Session log line protocol.
//!
//! ```text
//! # Pattern: run_*.fits
//! # Region: (512.3, 401.8, 8, 16)
//! # Startdate: 2011-03-04 21:00:00
//! # DarkTemplate: master_dark.fits
//! 0   1523.118042  402.551025 0 0 run_0001.fits
//! 30  1519.602295  401.990234 0 0 run_0002.fits
//! ```
//!
//! Header lines are written once when the session is created. Every other
//! `#` line is a comment. Each record holds the time since `Startdate` in
//! seconds, a `star sky` pair per region (`0 0` when the region failed) and
//! the frame name.

use chrono::{NaiveDateTime, Timelike};

use super::SessionError;
use crate::frame::timestamp::{format_timestamp, parse_timestamp};
use crate::photometry::{Aperture, RegionFlux};

const PATTERN: &str = "# Pattern:";
const REGION: &str = "# Region:";
const STARTDATE: &str = "# Startdate:";
const DARK_TEMPLATE: &str = "# DarkTemplate:";

/// Everything the log header records: what to reduce and how.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSetup {
    pub pattern: String,
    pub regions: Vec<Aperture>,
    /// Reference time for relative timestamps, whole seconds.
    pub start: NaiveDateTime,
    /// Frame name of the master dark, resolved through the frame source.
    pub dark_template: Option<String>,
}

impl SessionSetup {
    pub fn new(pattern: impl Into<String>, start: NaiveDateTime) -> Self {
        Self {
            pattern: pattern.into(),
            regions: Vec::new(),
            start: start.with_nanosecond(0).unwrap_or(start),
            dark_template: None,
        }
    }

    pub fn with_region(mut self, aperture: Aperture) -> Self {
        self.regions.push(aperture);
        self
    }

    pub fn with_dark_template(mut self, name: impl Into<String>) -> Self {
        self.dark_template = Some(name.into());
        self
    }

    /// Header block, one line per entry, newline-terminated.
    pub fn render(&self) -> String {
        let mut out = format!("{PATTERN} {}\n", self.pattern);
        for r in &self.regions {
            out.push_str(&format!("{REGION} ({}, {}, {}, {})\n", r.x, r.y, r.r1, r.r2));
        }
        out.push_str(&format!("{STARTDATE} {}\n", format_timestamp(&self.start)));
        if let Some(dark) = &self.dark_template {
            out.push_str(&format!("{DARK_TEMPLATE} {dark}\n"));
        }
        out
    }
}

/// One processed frame. `None` marks a region whose measurement failed.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameRecord {
    pub relative_time: f64,
    pub regions: Vec<Option<RegionFlux>>,
    pub filename: String,
}

impl FrameRecord {
    /// Record line, newline-terminated.
    pub fn render(&self) -> String {
        let mut line = format!("{} ", self.relative_time);
        for region in &self.regions {
            match region {
                Some(flux) => line.push_str(&format!("{:10.6} {:10.6} ", flux.star, flux.sky)),
                None => line.push_str("0 0 "),
            }
        }
        line.push_str(&self.filename);
        line.push('\n');
        line
    }

    fn parse(line: &str, line_no: usize, region_count: usize) -> Result<Self, SessionError> {
        let fields: Vec<&str> = line.split_whitespace().collect();
        let expected = 2 * region_count + 2;
        if fields.len() != expected {
            return Err(SessionError::corrupt(
                line_no,
                format!("expected {expected} fields, found {}", fields.len()),
            ));
        }

        let number = |field: &str| {
            field
                .parse::<f64>()
                .map_err(|_| SessionError::corrupt(line_no, format!("'{field}' is not a number")))
        };

        let relative_time = number(fields[0])?;
        let regions = fields[1..fields.len() - 1]
            .chunks_exact(2)
            .map(|pair| {
                if pair[0] == "0" && pair[1] == "0" {
                    return Ok(None);
                }
                Ok(Some(RegionFlux {
                    star: number(pair[0])?,
                    sky: number(pair[1])?,
                }))
            })
            .collect::<Result<Vec<_>, SessionError>>()?;

        Ok(Self {
            relative_time,
            regions,
            filename: fields[fields.len() - 1].to_string(),
        })
    }
}

/// Replayed log contents.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionLog {
    pub setup: SessionSetup,
    pub records: Vec<FrameRecord>,
}

/// Parse a complete (newline-terminated) log.
pub fn parse_log(text: &str) -> Result<SessionLog, SessionError> {
    let mut pattern = None;
    let mut regions = Vec::new();
    let mut start = None;
    let mut dark_template = None;
    let mut records = Vec::new();

    for (idx, raw) in text.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(value) = line.strip_prefix(PATTERN) {
            pattern = Some(value.trim().to_string());
        } else if let Some(value) = line.strip_prefix(REGION) {
            if !records.is_empty() {
                return Err(SessionError::corrupt(line_no, "region declared after records"));
            }
            regions.push(parse_region(value, line_no)?);
        } else if let Some(value) = line.strip_prefix(STARTDATE) {
            let time = parse_timestamp(value).ok_or_else(|| {
                SessionError::corrupt(line_no, format!("bad start date '{}'", value.trim()))
            })?;
            start = Some(time);
        } else if let Some(value) = line.strip_prefix(DARK_TEMPLATE) {
            dark_template = Some(value.trim().to_string());
        } else if line.starts_with('#') {
            continue;
        } else {
            records.push(FrameRecord::parse(line, line_no, regions.len())?);
        }
    }

    let pattern = pattern.ok_or_else(|| SessionError::corrupt(0, "missing '# Pattern:' header"))?;
    let start = start.ok_or_else(|| SessionError::corrupt(0, "missing '# Startdate:' header"))?;

    Ok(SessionLog {
        setup: SessionSetup {
            pattern,
            regions,
            start,
            dark_template,
        },
        records,
    })
}

fn parse_region(value: &str, line_no: usize) -> Result<Aperture, SessionError> {
    let bad = || SessionError::corrupt(line_no, format!("bad region '{}'", value.trim()));

    let inner = value
        .trim()
        .strip_prefix('(')
        .and_then(|v| v.strip_suffix(')'))
        .ok_or_else(bad)?;
    let numbers = inner
        .split(',')
        .map(|n| n.trim().parse::<f64>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| bad())?;
    let [x, y, r1, r2] = numbers[..] else {
        return Err(bad());
    };
    Aperture::new(x, y, r1, r2).map_err(|e| SessionError::corrupt(line_no, e.to_string()))
}
