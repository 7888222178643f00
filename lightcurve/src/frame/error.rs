use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while listing, loading or dating a frame.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid frame pattern '{pattern}': {reason}")]
    Pattern { pattern: String, reason: String },

    #[error("Failed to load FITS file '{path}': {source}")]
    Fits {
        path: PathBuf,
        source: fitsio::errors::Error,
    },

    #[error("'{path}' is not a 2-D image (shape {shape:?})")]
    NotAnImage { path: PathBuf, shape: Vec<usize> },

    #[error("Frame '{name}' not found")]
    NotFound { name: String },

    #[error("No timestamp header (UTC-BEG, GPSTIME or UTC)")]
    NoTimestamp,

    #[error("Cannot parse {key} timestamp '{value}'")]
    InvalidTimestamp { key: &'static str, value: String },
}
