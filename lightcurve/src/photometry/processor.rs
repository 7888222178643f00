use std::f64::consts::PI;

use super::centroid::CentroidConfig;
use super::{Aperture, PhotometryError, flux};
use crate::Image;

/// Exposure-normalized result for one region on one frame.
///
/// `star` is net of sky; `sky` is the sky flux that was subtracted, both in
/// counts per second.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegionFlux {
    pub star: f64,
    pub sky: f64,
}

impl RegionFlux {
    /// Placeholder written for a region whose measurement failed.
    pub const FAILED: Self = Self { star: 0.0, sky: 0.0 };
}

/// Runs background, centroid and flux for one region.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameProcessor {
    pub centroid: CentroidConfig,
}

impl FrameProcessor {
    pub fn new(centroid: CentroidConfig) -> Self {
        Self { centroid }
    }

    /// Measure `aperture` on `image`. The aperture itself is not moved.
    pub fn process(
        &self,
        aperture: &Aperture,
        exposure_seconds: f64,
        image: &Image,
    ) -> Result<RegionFlux, PhotometryError> {
        if !exposure_seconds.is_finite() || exposure_seconds <= 0.0 {
            return Err(PhotometryError::InvalidExposure(exposure_seconds));
        }

        let centroid = self.centroid.locate(aperture, image)?;
        let raw = flux::integrate(centroid.x, centroid.y, aperture.r1, image)?;
        let sky = centroid.background.level * PI * aperture.r1 * aperture.r1;

        let sky_rate = sky / exposure_seconds;
        Ok(RegionFlux {
            star: raw / exposure_seconds - sky_rate,
            sky: sky_rate,
        })
    }
}

/// [`FrameProcessor::process`] with the default centroid settings.
pub fn process(
    aperture: &Aperture,
    exposure_seconds: f64,
    image: &Image,
) -> Result<RegionFlux, PhotometryError> {
    FrameProcessor::default().process(aperture, exposure_seconds, image)
}
