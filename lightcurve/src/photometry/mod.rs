//! Single-frame aperture photometry.
//!
//! For one aperture on one image: estimate the sky in the annulus, recenter on
//! the star, integrate the enclosed flux with exact pixel coverage, and
//! normalize both star and sky by exposure time.

pub mod background;
pub mod centroid;
mod error;
pub mod flux;
mod processor;


pub use background::{BackgroundEstimate, estimate};
pub use centroid::{CentroidConfig, refine};
pub use error::PhotometryError;
pub use flux::{coverage, integrate};
pub use processor::{FrameProcessor, RegionFlux, process};

/// Circular aperture with a sky annulus.
///
/// `r1` bounds both the centroid window and the photometric circle; `r2` is
/// the outer edge of the background annulus.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aperture {
    pub x: f64,
    pub y: f64,
    pub r1: f64,
    pub r2: f64,
}

impl Aperture {
    pub fn new(x: f64, y: f64, r1: f64, r2: f64) -> Result<Self, PhotometryError> {
        let valid = x.is_finite() && y.is_finite() && r1.is_finite() && r2.is_finite();
        if !valid || r1 <= 0.0 || r2 <= r1 {
            return Err(PhotometryError::InvalidAperture { x, y, r1, r2 });
        }
        Ok(Self { x, y, r1, r2 })
    }

    /// Same radii, new center.
    #[inline]
    pub fn moved_to(&self, x: f64, y: f64) -> Self {
        Self { x, y, ..*self }
    }
}
