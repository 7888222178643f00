use thiserror::Error;

/// Failures raised while measuring one aperture on one frame.
///
/// None of these abort a reduction run; the session records a zero pair for
/// the region and moves on.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PhotometryError {
    #[error("Invalid aperture ({x}, {y}, {r1}, {r2}): need finite center and 0 < r1 < r2")]
    InvalidAperture { x: f64, y: f64, r1: f64, r2: f64 },

    #[error(
        "Region x {x_min}..={x_max}, y {y_min}..={y_max} lies outside the {width}x{height} image"
    )]
    OutOfBounds {
        x_min: i64,
        x_max: i64,
        y_min: i64,
        y_max: i64,
        width: usize,
        height: usize,
    },

    #[error("Annulus {r1} < d < {r2} around ({x:.2}, {y:.2}) contains no pixels")]
    EmptyAnnulus { x: f64, y: f64, r1: f64, r2: f64 },

    #[error("No pixel above threshold {threshold:.3} within r={r} of ({x:.2}, {y:.2})")]
    DegenerateAperture {
        x: f64,
        y: f64,
        r: f64,
        threshold: f64,
    },

    #[error("Centroid did not settle within {iterations} iterations (last shift {shift:.2} px)")]
    CentroidDiverged { iterations: usize, shift: f64 },

    #[error("Invalid exposure time: {0} s")]
    InvalidExposure(f64),
}
