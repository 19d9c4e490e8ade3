use crate::image_impl::Point2d;

/// Largest pairwise distance between points of `points`, with early exit.
///
/// The running maximum never decreases, so the scan stops as soon as it
/// exceeds `limit`; the returned value is then only a lower bound of the
/// true diameter, but already `> limit`.
pub fn approx_diameter(points: &[(i32, i32)], limit: f64) -> f64 {
    let mut diameter = 0.0f64;
    for (i, p1) in points.iter().enumerate() {
        for p2 in &points[i + 1..] {
            let dx = (p1.0 - p2.0) as f64;
            let dy = (p1.1 - p2.1) as f64;
            diameter = diameter.max(dx.hypot(dy));
            if diameter > limit {
                return diameter;
            }
        }
    }
    diameter
}

/// Arithmetic mean of the points. `None` for an empty slice.
pub fn centroid(points: &[(i32, i32)]) -> Option<Point2d> {
    if points.is_empty() {
        return None;
    }
    let (sx, sy) = points
        .iter()
        .fold((0.0f64, 0.0f64), |(sx, sy), &(x, y)| (sx + x as f64, sy + y as f64));
    let n = points.len() as f64;
    Some(Point2d::new(sx / n, sy / n))
}

/// Moves `p` into the frame centred at `center` and rotated by
/// `angle_deg`, i.e. translates by `-center` and rotates by `-angle_deg`.
pub fn to_local_frame(p: Point2d, center: Point2d, angle_deg: f64) -> Point2d {
    let dx = p.x - center.x;
    let dy = p.y - center.y;
    let angle_rad = -angle_deg.to_radians();
    let (sin_a, cos_a) = angle_rad.sin_cos();
    Point2d::new(dx * cos_a - dy * sin_a, dx * sin_a + dy * cos_a)
}

/// Membership in the rhombus whose vertices are the side midpoints of the
/// axis-aligned rectangle `[-first_ax, first_ax] x [-second_ax, second_ax]`.
///
/// By symmetry only the first quadrant triangle is tested.
pub fn rhombus_contains(local: Point2d, first_ax: f64, second_ax: f64) -> bool {
    if !(first_ax > 0.0 && second_ax > 0.0) {
        return false;
    }
    let x = local.x.abs();
    let y = local.y.abs();
    if x > first_ax || y > second_ax {
        return false;
    }
    x / first_ax + y / second_ax <= 1.0
}
