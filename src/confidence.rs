//! Confidence measures of an accepted pupil candidate (PuRe 3.3.6).
//!
//! Each measure is a scalar in `[0, 1]`; none of them is a probability and
//! they are reported side by side rather than combined.

use image::GrayImage;

use crate::ellipse::FittedEllipse;
use crate::image_impl::{mean_along_line, Point2d};

/// Directions sampled by [`outline_contrast`], 10 degrees apart.
pub const CONTRAST_DIRECTIONS: usize = 36;

/// `minor / major` of the fitted ellipse; 1 for a circle.
pub fn aspect_ratio(ellipse: &FittedEllipse) -> f64 {
    let major = ellipse.major();
    if major > 0.0 {
        (ellipse.minor() / major).clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Quarter credit for every quadrant around the ellipse center holding at
/// least one segment point.
pub fn angular_spread(points: &[(i32, i32)], center: Point2d) -> f64 {
    // Q2 | Q1
    // -------
    // Q3 | Q4
    let mut seen = [false; 4];

    for &(x, y) in points {
        let (x, y) = (x as f64, y as f64);
        let quadrant = match (x > center.x, y > center.y) {
            (true, true) => 0,
            (false, true) => 1,
            (false, false) => 2,
            (true, false) => 3,
        };
        seen[quadrant] = true;
        if seen.iter().all(|&s| s) {
            break;
        }
    }

    seen.iter().filter(|&&s| s).count() as f64 * 0.25
}

/// Fraction of directions in which the ray from the center to one minor
/// axis out is darker on average than the next minor axis length beyond it.
pub fn outline_contrast(gray: &GrayImage, ellipse: &FittedEllipse) -> f64 {
    let center = ellipse.center;
    let minor = ellipse.minor();
    let stride = 10.0f64.to_radians();

    // Integer steps: 0 and 2*pi must not both be visited.
    let votes = (0..CONTRAST_DIRECTIONS)
        .filter(|&i| {
            let (sin_a, cos_a) = (stride * i as f64).sin_cos();
            let offset = Point2d::new(minor * cos_a, minor * sin_a);
            let outline = Point2d::new(center.x + offset.x, center.y + offset.y);
            let beyond = Point2d::new(outline.x + offset.x, outline.y + offset.y);

            match (
                mean_along_line(gray, center, outline),
                mean_along_line(gray, outline, beyond),
            ) {
                (Some(inner), Some(outer)) => inner < outer,
                _ => false,
            }
        })
        .count();

    votes as f64 / CONTRAST_DIRECTIONS as f64
}
