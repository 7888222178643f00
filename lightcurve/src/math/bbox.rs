//! Signed pixel bounding boxes.

use crate::Image;
use crate::photometry::PhotometryError;

/// Inclusive pixel box with signed coordinates, so boxes hanging off the
/// image edge can be represented and rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelBox {
    pub x_min: i64,
    pub x_max: i64,
    pub y_min: i64,
    pub y_max: i64,
}

impl PixelBox {
    /// Smallest box of whole pixel indices covering `[x-r, x+r] × [y-r, y+r]`.
    #[inline]
    pub fn around(x: f64, y: f64, r: f64) -> Self {
        Self {
            x_min: (x - r).floor() as i64,
            x_max: (x + r).ceil() as i64,
            y_min: (y - r).floor() as i64,
            y_max: (y + r).ceil() as i64,
        }
    }

    #[inline]
    pub fn width(&self) -> usize {
        (self.x_max - self.x_min + 1).max(0) as usize
    }

    #[inline]
    pub fn height(&self) -> usize {
        (self.y_max - self.y_min + 1).max(0) as usize
    }

    #[inline]
    pub fn fits_in(&self, image: &Image) -> bool {
        image.contains(self.x_min, self.y_min) && image.contains(self.x_max, self.y_max)
    }

    /// `Ok` when every pixel of the box lies inside `image`.
    pub fn require_inside(&self, image: &Image) -> Result<(), PhotometryError> {
        if self.fits_in(image) {
            Ok(())
        } else {
            Err(self.out_of_bounds(image))
        }
    }

    pub fn out_of_bounds(&self, image: &Image) -> PhotometryError {
        PhotometryError::OutOfBounds {
            x_min: self.x_min,
            x_max: self.x_max,
            y_min: self.y_min,
            y_max: self.y_max,
            width: image.width(),
            height: image.height(),
        }
    }

    /// Row-major iteration over `(x, y)` pixel indices.
    pub fn pixels(&self) -> impl Iterator<Item = (i64, i64)> + '_ {
        (self.y_min..=self.y_max).flat_map(move |y| (self.x_min..=self.x_max).map(move |x| (x, y)))
    }
}
