//! Intensity-weighted recentering inside the photometric circle.

use super::background::{self, BackgroundEstimate};
use super::{Aperture, PhotometryError};
use crate::Image;
use crate::math::PixelBox;

/// Pixels must exceed `level + threshold_sigma · noise` to count.
pub const DEFAULT_THRESHOLD_SIGMA: f64 = 3.0;

/// Centroid refinement settings.
///
/// The default is a single pass. With `max_iterations > 1` the background is
/// re-estimated at every new position and refinement repeats until the shift
/// drops below `convergence_px`. The returned background is then measured at
/// the final position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CentroidConfig {
    pub threshold_sigma: f64,
    pub max_iterations: usize,
    pub convergence_px: f64,
}

impl Default for CentroidConfig {
    fn default() -> Self {
        Self {
            threshold_sigma: DEFAULT_THRESHOLD_SIGMA,
            max_iterations: 1,
            convergence_px: 5.0,
        }
    }
}

/// Refined position together with the background it was measured against.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Centroid {
    pub x: f64,
    pub y: f64,
    pub background: BackgroundEstimate,
}

impl CentroidConfig {
    /// Estimate background and refine the center of `aperture`.
    ///
    /// A single pass never reports divergence. Multiple passes fail with
    /// [`PhotometryError::CentroidDiverged`] when the last shift is still
    /// `>= convergence_px` after `max_iterations`.
    pub fn locate(&self, aperture: &Aperture, image: &Image) -> Result<Centroid, PhotometryError> {
        let passes = self.max_iterations.max(1);
        let mut current = *aperture;
        let mut shift = 0.0;

        for pass in 1..=passes {
            let bg = background::estimate(&current, image)?;
            let (x, y) = refine_with_threshold(
                current.x,
                current.y,
                current.r1,
                &bg,
                image,
                self.threshold_sigma,
            )?;
            shift = (x - current.x).hypot(y - current.y);
            current = current.moved_to(x, y);

            tracing::debug!(pass, x, y, shift, "Centroid pass");

            if passes == 1 {
                return Ok(Centroid { x, y, background: bg });
            }
            if shift < self.convergence_px {
                let background = background::estimate(&current, image)?;
                return Ok(Centroid { x, y, background });
            }
        }

        Err(PhotometryError::CentroidDiverged {
            iterations: passes,
            shift,
        })
    }
}

/// One refinement pass with the default 3σ threshold.
pub fn refine(
    x: f64,
    y: f64,
    r1: f64,
    background: &BackgroundEstimate,
    image: &Image,
) -> Result<(f64, f64), PhotometryError> {
    refine_with_threshold(x, y, r1, background, image, DEFAULT_THRESHOLD_SIGMA)
}

/// One refinement pass: marginal-sum centroid of the above-threshold,
/// background-subtracted pixels strictly inside the circle of radius `r1`.
pub fn refine_with_threshold(
    x: f64,
    y: f64,
    r1: f64,
    background: &BackgroundEstimate,
    image: &Image,
    threshold_sigma: f64,
) -> Result<(f64, f64), PhotometryError> {
    let window = PixelBox::around(x, y, r1);
    window.require_inside(image)?;

    let threshold = background.level + threshold_sigma * background.noise;
    let r_sq = r1 * r1;

    let mut col_sums = vec![0.0f64; window.width()];
    let mut row_sums = vec![0.0f64; window.height()];

    for (i, j) in window.pixels() {
        let dx = i as f64 - x;
        let dy = j as f64 - y;
        if dx * dx + dy * dy >= r_sq {
            continue;
        }
        let value = *image.get(i as usize, j as usize);
        if value > threshold {
            let contribution = value - background.level;
            col_sums[(i - window.x_min) as usize] += contribution;
            row_sums[(j - window.y_min) as usize] += contribution;
        }
    }

    let total: f64 = col_sums.iter().sum();
    if total <= 0.0 {
        return Err(PhotometryError::DegenerateAperture {
            x,
            y,
            r: r1,
            threshold,
        });
    }

    let cx = weighted_index(&col_sums) / total + window.x_min as f64;
    let cy = weighted_index(&row_sums) / total + window.y_min as f64;
    Ok((cx, cy))
}

fn weighted_index(marginal: &[f64]) -> f64 {
    marginal
        .iter()
        .enumerate()
        .map(|(idx, &m)| idx as f64 * m)
        .sum()
}
