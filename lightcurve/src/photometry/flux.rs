//! Exact circular-aperture flux with fractional pixel coverage.
//!
//! Pixel `(i, j)` is the unit square `[i, i+1] × [j, j+1]`. Coverage of a
//! pixel by the circle is decided by how many of its corners lie inside:
//!
//! | inside | area                                                   |
//! |--------|--------------------------------------------------------|
//! | 0      | 0 (an arc clipping one edge is ignored)                |
//! | 1      | triangle (corner + two crossings) + chord segment      |
//! | 2      | quadrilateral (two corners + two crossings) + segment  |
//! | 3      | 1 − (triangle at the outside corner − segment)         |
//! | 4      | 1                                                      |
//!
//! Two inside corners on a diagonal cannot happen in exact arithmetic; when
//! rounding produces it, both outside corners are cut off independently.

use glam::DVec2;

use super::PhotometryError;
use crate::Image;

/// Pixel corners in local coordinates, walked in this cyclic order.
const CORNERS: [DVec2; 4] = [
    DVec2::new(0.0, 0.0),
    DVec2::new(0.0, 1.0),
    DVec2::new(1.0, 1.0),
    DVec2::new(1.0, 0.0),
];

#[inline]
fn corner(k: usize) -> DVec2 {
    CORNERS[k % 4]
}

/// Total flux inside the circle of radius `r` around `(x, y)`, background
/// included.
///
/// Only pixels with non-zero coverage are read; one of those lying outside
/// the image is an error.
pub fn integrate(x: f64, y: f64, r: f64, image: &Image) -> Result<f64, PhotometryError> {
    let box_x = x.floor() as i64;
    let box_y = y.floor() as i64;
    let span = r.ceil() as i64;

    let mut total = 0.0;
    for j in (box_y - span - 1)..=(box_y + span) {
        for i in (box_x - span - 1)..=(box_x + span) {
            let f = coverage(x - i as f64, y - j as f64, r);
            if f <= 0.0 {
                continue;
            }
            let Some(&value) = image.try_get(i, j) else {
                return Err(PhotometryError::OutOfBounds {
                    x_min: i,
                    x_max: i,
                    y_min: j,
                    y_max: j,
                    width: image.width(),
                    height: image.height(),
                });
            };
            total += f * value;
        }
    }
    Ok(total)
}

/// Fraction in `[0, 1]` of the unit square `[0,1]²` covered by the circle of
/// radius `r` centered at `(cx, cy)` (square-local coordinates).
pub fn coverage(cx: f64, cy: f64, r: f64) -> f64 {
    let center = DVec2::new(cx, cy);
    let r_sq = r * r;
    let inside: [bool; 4] = std::array::from_fn(|k| CORNERS[k].distance_squared(center) <= r_sq);
    let count = inside.iter().filter(|&&b| b).count();

    let area = match count {
        0 => 0.0,
        4 => 1.0,
        1 => {
            let k = first_where(&inside, true);
            let a = crossing(center, r, corner(k), corner(k + 3));
            let b = crossing(center, r, corner(k), corner(k + 1));
            polygon_area(&[a, corner(k), b]) + segment_area(a, b, r)
        }
        2 => {
            let first = (0..4).find(|&k| inside[k] && inside[(k + 1) % 4]);
            match first {
                Some(k) => {
                    let a = crossing(center, r, corner(k), corner(k + 3));
                    let b = crossing(center, r, corner(k + 1), corner(k + 2));
                    polygon_area(&[a, corner(k), corner(k + 1), b]) + segment_area(a, b, r)
                }
                None => {
                    let k = first_where(&inside, false);
                    1.0 - cut_corner(center, r, k) - cut_corner(center, r, k + 2)
                }
            }
        }
        3 => {
            let k = first_where(&inside, false);
            1.0 - cut_corner(center, r, k)
        }
        _ => unreachable!("a square has four corners"),
    };

    area.clamp(0.0, 1.0)
}

/// Area of the square near outside corner `k` that the circle does not cover.
fn cut_corner(center: DVec2, r: f64, k: usize) -> f64 {
    let outside = corner(k);
    let a = crossing(center, r, corner(k + 3), outside);
    let b = crossing(center, r, corner(k + 1), outside);
    polygon_area(&[a, outside, b]) - segment_area(a, b, r)
}

fn first_where(inside: &[bool; 4], value: bool) -> usize {
    inside.iter().position(|&b| b == value).unwrap_or(0)
}

/// Point where the edge from `from` (inside) to `to` (outside) crosses the
/// circle.
///
/// Solves `a t² + b t + c = 0` for the edge parameter and takes the root in
/// `[0, 1]`.
fn crossing(center: DVec2, r: f64, from: DVec2, to: DVec2) -> DVec2 {
    let d = to - from;
    let m = from - center;

    let a = d.length_squared();
    let b = 2.0 * m.dot(d);
    let c = m.length_squared() - r * r;

    let disc = (b * b - 4.0 * a * c).max(0.0);
    let t = ((-b + disc.sqrt()) / (2.0 * a)).clamp(0.0, 1.0);
    from + d * t
}

/// Area between the chord `p`–`q` of a circle of radius `r` and its minor arc.
fn segment_area(p: DVec2, q: DVec2, r: f64) -> f64 {
    let half = 0.5 * p.distance(q);
    let ratio = (half / r).clamp(0.0, 1.0);
    r * r * ratio.asin() - half * (r * r - half * half).max(0.0).sqrt()
}

/// Shoelace area of a simple polygon.
fn polygon_area(vertices: &[DVec2]) -> f64 {
    let n = vertices.len();
    let twice: f64 = (0..n)
        .map(|i| {
            let p = vertices[i];
            let q = vertices[(i + 1) % n];
            p.x * q.y - q.x * p.y
        })
        .sum();
    (0.5 * twice).abs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn test_coverage_fully_inside_and_outside() {
        assert_eq!(coverage(0.5, 0.5, 5.0), 1.0);
        assert_eq!(coverage(10.5, 0.5, 2.0), 0.0);
    }

    #[test]
    fn test_coverage_quarter_circle_at_corner() {
        // Circle centered on the corner, radius 1: exactly a quarter disc.
        let f = coverage(0.0, 0.0, 1.0);
        assert!((f - PI / 4.0).abs() < 1e-12, "f = {f}");
    }

    #[test]
    fn test_coverage_half_plane_by_large_circle() {
        // Huge radius with the boundary along x = 0.5 approximates a half plane.
        let r = 1.0e4;
        let f = coverage(0.5 - r, 0.5, r);
        assert!((f - 0.5).abs() < 1e-4, "f = {f}");
    }

    #[test]
    fn test_coverage_three_corners() {
        let r = 1.2;
        let f = coverage(0.0, 0.0, r);
        // Corners (0,0), (0,1), (1,0) inside; (1,1) at distance √2 outside.
        let x_cross = (r * r - 1.0).sqrt();
        // Uncovered region: ∫_{x_cross}^{1} (1 − sqrt(r² − x²)) dx.
        let steps = 200_000;
        let h = (1.0 - x_cross) / steps as f64;
        let uncovered: f64 = (0..steps)
            .map(|s| {
                let x = x_cross + (s as f64 + 0.5) * h;
                (1.0 - (r * r - x * x).sqrt()) * h
            })
            .sum();
        assert!((f - (1.0 - uncovered)).abs() < 1e-8, "f = {f}");
    }

    #[test]
    fn test_coverage_two_adjacent_corners() {
        // Center below the square's bottom edge midpoint: corners (0,0) and
        // (1,0) inside, covered area is the disc cap above y = 0.
        let r = 1.5;
        let f = coverage(0.5, -1.0, r);
        let steps = 200_000;
        let h = 1.0 / steps as f64;
        let exact: f64 = (0..steps)
            .map(|s| {
                let x = (s as f64 + 0.5) * h;
                let top = -1.0 + (r * r - (x - 0.5) * (x - 0.5)).sqrt();
                top.clamp(0.0, 1.0) * h
            })
            .sum();
        assert!((f - exact).abs() < 1e-8, "f = {f}, exact = {exact}");
    }

    #[test]
    fn test_coverage_circle_inside_square_counts_nothing() {
        assert_eq!(coverage(0.5, 0.5, 0.3), 0.0);
        assert_eq!(coverage(0.5, 0.5, 0.75), 1.0);
    }

    #[test]
    fn test_cut_corner_pair_on_diagonal() {
        // Both tips cut by a circle through all four corners leave nothing out.
        let center = DVec2::new(0.5, 0.5);
        let r = 0.5f64.sqrt();
        let f = 1.0 - cut_corner(center, r, 1) - cut_corner(center, r, 3);
        assert!((f - 1.0).abs() < 1e-12, "f = {f}");
    }

    #[test]
    fn test_coverage_is_clamped() {
        for &(cx, cy, r) in &[(0.3, 0.9, 0.95), (1.3, -0.2, 1.4), (0.5, 0.5, 0.72)] {
            let f = coverage(cx, cy, r);
            assert!((0.0..=1.0).contains(&f), "f = {f}");
        }
    }

    #[test]
    fn test_integrate_constant_matches_disc_area() {
        let image = Image::new_filled(64, 64, 3.0);
        for &(x, y, r) in &[(32.0, 32.0, 10.0), (31.37, 30.81, 7.5), (20.5, 40.25, 12.3)] {
            let flux = integrate(x, y, r, &image).unwrap();
            let expected = 3.0 * PI * r * r;
            assert!(
                (flux - expected).abs() / expected < 2e-3,
                "({x}, {y}, {r}): {flux} vs {expected}"
            );
        }
    }

    #[test]
    fn test_integrate_half_plane_mask() {
        // Left half bright, right half dark, circle centered on the boundary.
        let image = Image::from_fn(60, 60, |x, _| if x < 30 { 1.0 } else { 0.0 });
        let r = 9.0;
        let flux = integrate(30.0, 30.0, r, &image).unwrap();
        let expected = PI * r * r / 2.0;
        assert!((flux - expected).abs() / expected < 2e-3, "{flux} vs {expected}");
    }

    #[test]
    fn test_integrate_quadrant_mask() {
        let image = Image::from_fn(60, 60, |x, y| if x >= 30 && y >= 30 { 1.0 } else { 0.0 });
        let r = 9.0;
        let flux = integrate(30.0, 30.0, r, &image).unwrap();
        let expected = PI * r * r / 4.0;
        assert!((flux - expected).abs() / expected < 2e-3, "{flux} vs {expected}");
    }

    #[test]
    fn test_integrate_reads_only_covered_pixels() {
        // The loop starts at column/row -1 here; those pixels only touch the
        // circle at a corner and must not trip the bounds check.
        let image = Image::new_filled(3, 3, 10.0);
        let flux = integrate(1.0, 1.0, 1.0, &image).unwrap();
        assert!((flux - 10.0 * PI).abs() < 1e-9, "flux = {flux}");
    }

    #[test]
    fn test_integrate_outside_image() {
        let image = Image::new_filled(10, 10, 1.0);
        let err = integrate(1.0, 5.0, 3.0, &image).unwrap_err();
        assert!(matches!(err, PhotometryError::OutOfBounds { .. }));
    }
}
