//! Testing utilities for lightcurve.

#![allow(dead_code)]

pub mod synthetic;

use std::cell::RefCell;
use std::collections::BTreeMap;

use crate::frame::{Frame, FrameError, FrameHeader, FrameSource};
use crate::Image;

/// Initialize tracing subscriber for tests.
/// Safe to call multiple times - will only initialize once.
/// Respects RUST_LOG env var, defaults to "info".
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

/// In-memory [`FrameSource`] that records which frames were loaded.
#[derive(Debug, Default)]
pub struct MemorySource {
    frames: BTreeMap<String, Frame>,
    loads: RefCell<Vec<String>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: &str, frame: Frame) {
        self.frames.insert(name.to_string(), frame);
    }

    pub fn with(mut self, name: &str, frame: Frame) -> Self {
        self.insert(name, frame);
        self
    }

    /// Names passed to `load`, in call order.
    pub fn loads(&self) -> Vec<String> {
        self.loads.borrow().clone()
    }
}

impl FrameSource for MemorySource {
    fn list(&self, pattern: &str) -> Result<Vec<String>, FrameError> {
        let matcher = glob::Pattern::new(pattern).map_err(|e| FrameError::Pattern {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })?;
        let options = glob::MatchOptions {
            case_sensitive: true,
            require_literal_separator: true,
            require_literal_leading_dot: false,
        };
        // BTreeMap keys are already sorted.
        Ok(self
            .frames
            .keys()
            .filter(|name| matcher.matches_with(name.as_str(), options))
            .cloned()
            .collect())
    }

    fn load(&self, name: &str) -> Result<Frame, FrameError> {
        self.loads.borrow_mut().push(name.to_string());
        self.frames
            .get(name)
            .cloned()
            .ok_or_else(|| FrameError::NotFound {
                name: name.to_string(),
            })
    }
}

/// Header with `EXPTIME` and a `GPSTIME` start `offset_seconds` after
/// 2011-03-04 21:00:00.
pub fn gps_header(exptime: f64, offset_seconds: u32) -> FrameHeader {
    let minutes = offset_seconds / 60;
    let seconds = offset_seconds % 60;
    FrameHeader {
        exptime: Some(exptime),
        gpstime: Some(format!("2011-03-04 21:{minutes:02}:{seconds:02}")),
        ..Default::default()
    }
}

pub fn frame(image: Image, header: FrameHeader) -> Frame {
    Frame { image, header }
}
