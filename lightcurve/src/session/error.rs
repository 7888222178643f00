use std::path::PathBuf;

use thiserror::Error;

use crate::frame::FrameError;

/// Failures that stop a reduction run.
///
/// Per-region measurement failures are not here: they are logged and written
/// as a zero pair.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("I/O error on session log '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Session log '{0}' already exists")]
    LogExists(PathBuf),

    #[error("Corrupt session log at line {line}: {reason}")]
    CorruptLog { line: usize, reason: String },

    #[error("Frame '{name}': {source}")]
    Frame { name: String, source: FrameError },

    #[error("Frame '{name}' has no timestamp header (UTC-BEG, GPSTIME or UTC)")]
    NoTimestamp { name: String },

    #[error("Frame '{name}' has no EXPTIME header")]
    MissingExposure { name: String },

    #[error("Frame '{name}' is {frame:?} but the dark frame is {dark:?}")]
    DarkMismatch {
        name: String,
        frame: (usize, usize),
        dark: (usize, usize),
    },

    #[error("Frame name '{0}' contains whitespace")]
    InvalidFrameName(String),
}

impl SessionError {
    pub(crate) fn corrupt(line: usize, reason: impl Into<String>) -> Self {
        Self::CorruptLog {
            line,
            reason: reason.into(),
        }
    }

    /// Attach the frame name, promoting a missing timestamp to its own variant.
    pub(crate) fn from_frame(name: &str, source: FrameError) -> Self {
        match source {
            FrameError::NoTimestamp => Self::NoTimestamp {
                name: name.to_string(),
            },
            source => Self::Frame {
                name: name.to_string(),
                source,
            },
        }
    }
}
