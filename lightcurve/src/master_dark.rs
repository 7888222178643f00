//! Master dark creation.
//!
//! Dark exposures are mean-combined per pixel after dropping the lowest and
//! highest samples. The result is written next to the science frames and
//! reused on later runs instead of being rebuilt.

use std::path::Path;

use thiserror::Error;

use crate::Image;
use crate::frame::{Frame, FrameError, FrameHeader, FrameSource, load_fits, save_fits};

#[derive(Debug, Error)]
pub enum DarkError {
    #[error("No dark frames to combine")]
    NoFrames,

    #[error("Dark frame {index} is {found:?}, expected {expected:?}")]
    SizeMismatch {
        index: usize,
        expected: (usize, usize),
        found: (usize, usize),
    },

    #[error("Rejecting {low} low and {high} high samples leaves nothing of {frames} frames")]
    RejectsAll {
        frames: usize,
        low: usize,
        high: usize,
    },

    #[error("Failed to read dark frame '{name}': {source}")]
    Frame { name: String, source: FrameError },

    #[error("Failed to write master dark: {0}")]
    Write(#[source] FrameError),
}

/// Samples dropped from each end of the sorted per-pixel stack.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Rejection {
    pub low: usize,
    pub high: usize,
}

impl Rejection {
    pub fn min_max() -> Self {
        Self { low: 1, high: 1 }
    }
}

/// Per-pixel mean of `images` after dropping `rejection.low` lowest and
/// `rejection.high` highest values.
pub fn mean_combine(images: &[Image], rejection: Rejection) -> Result<Image, DarkError> {
    let Some(first) = images.first() else {
        return Err(DarkError::NoFrames);
    };

    for (index, image) in images.iter().enumerate() {
        if !image.same_size(first) {
            return Err(DarkError::SizeMismatch {
                index,
                expected: first.size(),
                found: image.size(),
            });
        }
    }

    let n = images.len();
    let kept = n.saturating_sub(rejection.low + rejection.high);
    if kept == 0 {
        return Err(DarkError::RejectsAll {
            frames: n,
            low: rejection.low,
            high: rejection.high,
        });
    }

    let (width, height) = first.size();
    let mut stack = vec![0.0f64; n];
    let pixels = (0..width * height)
        .map(|idx| {
            for (slot, image) in stack.iter_mut().zip(images) {
                *slot = image.pixels()[idx];
            }
            stack.sort_unstable_by(f64::total_cmp);
            let window = &stack[rejection.low..rejection.low + kept];
            window.iter().sum::<f64>() / kept as f64
        })
        .collect();

    Ok(Image::new(width, height, pixels))
}

/// Master dark backed by a FITS file.
pub struct MasterDark;

impl MasterDark {
    /// Load `output` if it already exists; otherwise combine `inputs` from
    /// `source`, save the result to `output` and return it.
    pub fn ensure(
        output: &Path,
        inputs: &[String],
        source: &impl FrameSource,
        rejection: Rejection,
    ) -> Result<Image, DarkError> {
        if output.exists() {
            tracing::info!(path = %output.display(), "Using existing master dark");
            let frame = load_fits(output).map_err(|source| DarkError::Frame {
                name: output.display().to_string(),
                source,
            })?;
            return Ok(frame.image);
        }

        let mut images = Vec::with_capacity(inputs.len());
        let mut exptime = None;
        for name in inputs {
            tracing::info!("Adding dark frame {name}");
            let frame = source.load(name).map_err(|source| DarkError::Frame {
                name: name.clone(),
                source,
            })?;
            exptime = exptime.or(frame.header.exptime);
            images.push(frame.image);
        }

        let master = mean_combine(&images, rejection)?;
        let frame = Frame {
            image: master,
            header: FrameHeader {
                exptime,
                ..Default::default()
            },
        };
        save_fits(output, &frame).map_err(DarkError::Write)?;
        tracing::info!(
            path = %output.display(),
            frames = images.len(),
            "Saved master dark"
        );

        Ok(frame.image)
    }
}
