//! Synthetic images.

use crate::Image;

/// Add a circular Gaussian of peak `amplitude` centered on pixel coordinates
/// `(cx, cy)`. Pixels further than `cutoff` from the center are untouched.
pub fn add_gaussian(image: &mut Image, cx: f64, cy: f64, sigma: f64, amplitude: f64, cutoff: f64) {
    let cutoff_sq = cutoff * cutoff;
    let two_sigma_sq = 2.0 * sigma * sigma;
    for y in 0..image.height() {
        for x in 0..image.width() {
            let dx = x as f64 - cx;
            let dy = y as f64 - cy;
            let d2 = dx * dx + dy * dy;
            if d2 <= cutoff_sq {
                image[(x, y)] += amplitude * (-d2 / two_sigma_sq).exp();
            }
        }
    }
}

/// Flat sky with one star per `(x, y, amplitude)`.
pub fn star_field(width: usize, height: usize, sky: f64, stars: &[(f64, f64, f64)]) -> Image {
    let mut image = Image::new_filled(width, height, sky);
    for &(x, y, amplitude) in stars {
        add_gaussian(&mut image, x, y, 2.0, amplitude, 6.0);
    }
    image
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gaussian_is_symmetric_and_cut_off() {
        let mut image = Image::new_filled(21, 21, 0.0);
        add_gaussian(&mut image, 10.0, 10.0, 2.0, 100.0, 4.0);
        assert_eq!(image[(10, 10)], 100.0);
        assert_eq!(image[(7, 10)], image[(13, 10)]);
        assert_eq!(image[(10, 15)], 0.0);
    }
}
