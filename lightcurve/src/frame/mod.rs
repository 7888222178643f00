//! Frames and where they come from.

mod error;
mod fits;
pub mod timestamp;

pub use error::FrameError;
pub use fits::{FitsDirectory, load_fits, save_fits};

use crate::Image;

/// Header keys the reduction reads. Absent keys are `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameHeader {
    /// `EXPTIME`, seconds.
    pub exptime: Option<f64>,
    /// `UTC-DATE`
    pub utc_date: Option<String>,
    /// `UTC-BEG`
    pub utc_beg: Option<String>,
    /// `UTC-END`
    pub utc_end: Option<String>,
    /// `GPSTIME`
    pub gpstime: Option<String>,
    /// `UTC`
    pub utc: Option<String>,
}

/// One loaded exposure.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub image: Image,
    pub header: FrameHeader,
}

/// Named, listable store of frames.
pub trait FrameSource {
    /// Names matching the shell-style `pattern`, sorted ascending.
    fn list(&self, pattern: &str) -> Result<Vec<String>, FrameError>;

    fn load(&self, name: &str) -> Result<Frame, FrameError>;
}
