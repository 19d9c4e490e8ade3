//! Direct least-squares ellipse fitting (Fitzgibbon et al., 1999).
//!
//! The fit runs in normalized coordinates (centroid at the origin, mean
//! distance sqrt(2)) and the geometric parameters are mapped back to frame
//! coordinates afterwards.

use nalgebra::{Matrix3, Matrix6, Vector3, Vector6};
use serde::Serialize;

use crate::image_impl::Point2d;

/// Minimum number of points a conic fit needs.
pub const MIN_FIT_POINTS: usize = 5;

/// Geometric ellipse in frame coordinates.
///
/// `first_ax` is the half-axis along `angle` (degrees, in `[0, 180)`),
/// `second_ax` the half-axis along `angle + 90`. Either may be the larger.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FittedEllipse {
    pub center: Point2d,
    pub first_ax: f64,
    pub second_ax: f64,
    pub angle: f64,
}

impl FittedEllipse {
    pub fn major(&self) -> f64 {
        self.first_ax.max(self.second_ax)
    }

    pub fn minor(&self) -> f64 {
        self.first_ax.min(self.second_ax)
    }

    /// `first_ax / second_ax`, i.e. width over height of the bounding box.
    /// `None` when the second axis is not strictly positive.
    pub fn axis_ratio(&self) -> Option<f64> {
        if self.second_ax > 0.0 && self.first_ax.is_finite() {
            Some(self.first_ax / self.second_ax)
        } else {
            None
        }
    }

    fn is_valid(&self) -> bool {
        self.center.x.is_finite()
            && self.center.y.is_finite()
            && self.angle.is_finite()
            && self.first_ax.is_finite()
            && self.second_ax.is_finite()
            && self.first_ax > 0.0
            && self.second_ax > 0.0
    }
}

/// Fits an ellipse to pixel coordinates. Returns `None` for fewer than
/// [`MIN_FIT_POINTS`] distinct points or when the best conic is not a real
/// ellipse.
pub fn fit_ellipse(points: &[(i32, i32)]) -> Option<FittedEllipse> {
    if points.len() < MIN_FIT_POINTS {
        return None;
    }

    // Repeated pixels (closed chains) add no constraint on the conic.
    let mut distinct = points.to_vec();
    distinct.sort_unstable();
    distinct.dedup();
    if distinct.len() < MIN_FIT_POINTS {
        return None;
    }

    let pts: Vec<Point2d> = points.iter().map(|&p| Point2d::from_pixel(p)).collect();
    let (mean, scale) = normalization_params(&pts)?;

    // Scatter matrix S = D^T D over rows [x^2, xy, y^2, x, y, 1].
    let mut s = Matrix6::<f64>::zeros();
    for p in &pts {
        let x = (p.x - mean.x) * scale;
        let y = (p.y - mean.y) * scale;
        let row = Vector6::new(x * x, x * y, y * y, x, y, 1.0);
        s += row * row.transpose();
    }

    let s11: Matrix3<f64> = s.fixed_view::<3, 3>(0, 0).into_owned();
    let s12: Matrix3<f64> = s.fixed_view::<3, 3>(0, 3).into_owned();
    let s22: Matrix3<f64> = s.fixed_view::<3, 3>(3, 3).into_owned();

    let s22_inv = s22.try_inverse()?;
    let t = -s22_inv * s12.transpose();
    let m = s11 + s12 * t;

    // C1^-1 for the constraint 4AC - B^2 = 1.
    let c1_inv = Matrix3::new(0.0, 0.0, 0.5, 0.0, -1.0, 0.0, 0.5, 0.0, 0.0);
    let system = c1_inv * m;

    let a1 = ellipse_eigenvector(&system)?;
    let a2 = t * a1;

    let conic = [a1[0], a1[1], a1[2], a2[0], a2[1], a2[2]];
    let local = conic_to_ellipse(&conic)?;

    let ellipse = FittedEllipse {
        center: Point2d::new(mean.x + local.center.x / scale, mean.y + local.center.y / scale),
        first_ax: local.first_ax / scale,
        second_ax: local.second_ax / scale,
        angle: local.angle,
    };

    if ellipse.is_valid() {
        Some(ellipse)
    } else {
        None
    }
}

/// Returns (centroid, scale) such that the scaled points have mean distance
/// sqrt(2) from the origin.
fn normalization_params(points: &[Point2d]) -> Option<(Point2d, f64)> {
    let n = points.len() as f64;
    let mean_x = points.iter().map(|p| p.x).sum::<f64>() / n;
    let mean_y = points.iter().map(|p| p.y).sum::<f64>() / n;

    let mean_dist = points
        .iter()
        .map(|p| (p.x - mean_x).hypot(p.y - mean_y))
        .sum::<f64>()
        / n;

    if !(mean_dist > 1e-12) {
        return None;
    }

    Some((Point2d::new(mean_x, mean_y), std::f64::consts::SQRT_2 / mean_dist))
}

/// Eigenvector of `C1^-1 M` whose conic satisfies `4AC - B^2 > 0`.
///
/// `C1^-1 M` is not symmetric; real eigenvalues come from the Schur form and
/// each eigenvector is read off the adjugate of `system - lambda I`.
fn ellipse_eigenvector(system: &Matrix3<f64>) -> Option<Vector3<f64>> {
    let eigenvalues = system.complex_eigenvalues();
    let scale = system.norm().max(1e-300);

    let mut best: Option<(f64, Vector3<f64>)> = None;
    for ev in eigenvalues.iter() {
        if ev.im.abs() > 1e-9 * scale {
            continue;
        }
        let shifted = system - Matrix3::identity() * ev.re;
        let Some(v) = null_vector_3x3(&shifted) else {
            continue;
        };
        let constraint = 4.0 * v[0] * v[2] - v[1] * v[1];
        if constraint <= 0.0 {
            continue;
        }
        if best.as_ref().map_or(true, |(e, _)| ev.re.abs() < *e) {
            best = Some((ev.re.abs(), v));
        }
    }

    best.map(|(_, v)| v)
}

/// Null vector of a rank-2 3x3 matrix: the largest cross product of two of
/// its rows.
fn null_vector_3x3(m: &Matrix3<f64>) -> Option<Vector3<f64>> {
    let r0: Vector3<f64> = m.row(0).transpose();
    let r1: Vector3<f64> = m.row(1).transpose();
    let r2: Vector3<f64> = m.row(2).transpose();

    let candidates = [r0.cross(&r1), r0.cross(&r2), r1.cross(&r2)];
    let best = candidates
        .iter()
        .max_by(|a, b| {
            a.norm_squared()
                .partial_cmp(&b.norm_squared())
                .unwrap_or(std::cmp::Ordering::Equal)
        })?;

    let norm = best.norm();
    if !(norm > 1e-300) {
        return None;
    }
    Some(best / norm)
}

/// Geometric parameters of `A x^2 + B xy + C y^2 + D x + E y + F = 0`.
fn conic_to_ellipse(conic: &[f64; 6]) -> Option<FittedEllipse> {
    let [a, b, c, d, e, f] = *conic;

    let denom = 4.0 * a * c - b * b;
    if !(denom > 0.0) {
        return None;
    }

    let cx = (b * e - 2.0 * c * d) / denom;
    let cy = (b * d - 2.0 * a * e) / denom;
    let f_center = a * cx * cx + b * cx * cy + c * cy * cy + d * cx + e * cy + f;

    let sum = a + c;
    let diff = ((a - c).powi(2) + b * b).sqrt();
    let lambda1 = (sum + diff) / 2.0;
    let lambda2 = (sum - diff) / 2.0;

    // lambda1 belongs to the direction 0.5 * atan2(B, A - C).
    let first_sq = -f_center / lambda1;
    let second_sq = -f_center / lambda2;
    if !(first_sq > 0.0 && second_sq > 0.0) {
        return None;
    }

    let mut angle = (0.5 * b.atan2(a - c)).to_degrees();
    if angle < 0.0 {
        angle += 180.0;
    }
    if angle >= 180.0 {
        angle -= 180.0;
    }

    Some(FittedEllipse {
        center: Point2d::new(cx, cy),
        first_ax: first_sq.sqrt(),
        second_ax: second_sq.sqrt(),
        angle,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn sample_ellipse(cx: f64, cy: f64, a: f64, b: f64, angle_deg: f64, n: usize) -> Vec<Point2d> {
        let (sin_t, cos_t) = angle_deg.to_radians().sin_cos();
        (0..n)
            .map(|i| {
                let t = 2.0 * std::f64::consts::PI * i as f64 / n as f64;
                let px = a * t.cos();
                let py = b * t.sin();
                Point2d::new(cx + cos_t * px - sin_t * py, cy + sin_t * px + cos_t * py)
            })
            .collect()
    }

    /// Fits on unrounded points through the same normalization path.
    fn fit_exact(points: &[Point2d]) -> Option<FittedEllipse> {
        // Scale up by 1000 so integer rounding is negligible, then map back.
        let scaled: Vec<(i32, i32)> = points
            .iter()
            .map(|p| ((p.x * 1000.0).round() as i32, (p.y * 1000.0).round() as i32))
            .collect();
        let e = fit_ellipse(&scaled)?;
        Some(FittedEllipse {
            center: Point2d::new(e.center.x / 1000.0, e.center.y / 1000.0),
            first_ax: e.first_ax / 1000.0,
            second_ax: e.second_ax / 1000.0,
            angle: e.angle,
        })
    }

    #[test]
    fn test_fit_recovers_rotated_ellipse() {
        let pts = sample_ellipse(100.0, 80.0, 30.0, 15.0, 17.0, 50);
        let e = fit_exact(&pts).expect("fit should succeed");

        assert_relative_eq!(e.center.x, 100.0, epsilon = 1e-2);
        assert_relative_eq!(e.center.y, 80.0, epsilon = 1e-2);
        assert_relative_eq!(e.major(), 30.0, epsilon = 1e-2);
        assert_relative_eq!(e.minor(), 15.0, epsilon = 1e-2);

        let major_angle = if e.first_ax >= e.second_ax { e.angle } else { e.angle + 90.0 };
        let major_angle = major_angle.rem_euclid(180.0);
        assert_relative_eq!(major_angle, 17.0, epsilon = 1e-2);
    }

    #[test]
    fn test_fit_pixel_circle() {
        let pts: Vec<(i32, i32)> = sample_ellipse(50.0, 50.0, 10.0, 10.0, 0.0, 6)
            .iter()
            .map(|p| p.round())
            .collect();
        let e = fit_ellipse(&pts).expect("fit should succeed");
        assert!((e.center.x - 50.0).abs() < 1.0);
        assert!((e.center.y - 50.0).abs() < 1.0);
        assert!(e.minor() / e.major() > 0.9);
        assert!(e.angle >= 0.0 && e.angle < 180.0);
    }

    #[test]
    fn test_fit_five_points() {
        let pts: Vec<(i32, i32)> = [(10, 0), (0, 6), (-10, 0), (0, -6), (7, 4)]
            .iter()
            .map(|&(x, y)| (x + 40, y + 30))
            .collect();
        let e = fit_ellipse(&pts).expect("five points determine a conic");
        assert!(e.first_ax > 0.0 && e.second_ax > 0.0);
    }

    #[test]
    fn test_fit_rejects_degenerate() {
        assert!(fit_ellipse(&[(0, 0), (1, 1), (2, 2), (3, 3)]).is_none());
        assert!(fit_ellipse(&[(0, 0), (1, 1), (2, 2), (3, 3), (4, 4)]).is_none());
        assert!(fit_ellipse(&[(5, 5); 8]).is_none());
        // Four corners, one of them repeated: the conic is underdetermined.
        assert!(fit_ellipse(&[(0, 0), (20, 0), (20, 20), (0, 20), (0, 0)]).is_none());
    }

    #[test]
    fn test_axis_ratio() {
        let e = FittedEllipse {
            center: Point2d::new(10.0, 10.0),
            first_ax: 4.0,
            second_ax: 8.0,
            angle: 30.0,
        };
        assert_relative_eq!(e.axis_ratio().unwrap(), 0.5);
        assert_eq!(e.major(), 8.0);
        assert_eq!(e.minor(), 4.0);

        let flat = FittedEllipse { second_ax: 0.0, ..e };
        assert!(flat.axis_ratio().is_none());
    }
}
