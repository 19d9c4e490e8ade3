//! Image and planar geometry primitives used by the pupil pipeline

use std::path::Path;

use image::{DynamicImage, GrayImage};
use serde::Serialize;

use crate::engine::EngineError;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Point2d {
    pub x: f64,
    pub y: f64,
}

impl Default for Point2d {
    fn default() -> Self {
        Self { x: 0.0, y: 0.0 }
    }
}

impl Point2d {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn from_pixel(p: (i32, i32)) -> Self {
        Self::new(p.0 as f64, p.1 as f64)
    }

    /// Nearest pixel, rounding half away from zero.
    pub fn round(&self) -> (i32, i32) {
        (self.x.round() as i32, self.y.round() as i32)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Size2d {
    pub width: f64,
    pub height: f64,
}

impl Size2d {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// Rectangle rotated by `angle` degrees around `center`; `size.width` runs
/// along the angle direction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RotatedRect {
    pub center: Point2d,
    pub size: Size2d,
    pub angle: f64,
}

pub fn imread<P: AsRef<Path>>(path: P) -> Result<DynamicImage, EngineError> {
    Ok(image::open(path)?)
}

/// Bilinear resize to the working resolution.
pub fn resize(img: &DynamicImage, width: u32, height: u32) -> DynamicImage {
    if img.width() == width && img.height() == height {
        return img.clone();
    }
    img.resize_exact(width, height, image::imageops::FilterType::Triangle)
}

/// Minimum-area rectangle enclosing `points` (rotating calipers over the
/// convex hull). Returns `None` for an empty point set.
pub fn min_area_rect(points: &[Point2d]) -> Option<RotatedRect> {
    if points.is_empty() {
        return None;
    }

    let hull = compute_convex_hull(points);

    if hull.len() == 1 {
        return Some(RotatedRect {
            center: hull[0],
            size: Size2d::new(0.0, 0.0),
            angle: 0.0,
        });
    }

    if hull.len() == 2 {
        let dx = hull[1].x - hull[0].x;
        let dy = hull[1].y - hull[0].y;
        let center = Point2d::new((hull[0].x + hull[1].x) / 2.0, (hull[0].y + hull[1].y) / 2.0);
        return Some(RotatedRect {
            center,
            size: Size2d::new(dx.hypot(dy), 0.0),
            angle: dy.atan2(dx).to_degrees(),
        });
    }

    let mut min_area = f64::MAX;
    let mut best_rect = None;

    let n = hull.len();
    for i in 0..n {
        let p1 = hull[i];
        let p2 = hull[(i + 1) % n];

        let edge_x = p2.x - p1.x;
        let edge_y = p2.y - p1.y;
        let edge_len = edge_x.hypot(edge_y);
        if edge_len < 1e-12 {
            continue;
        }

        let ux = edge_x / edge_len;
        let uy = edge_y / edge_len;
        let vx = -uy;
        let vy = ux;

        let mut min_u = f64::MAX;
        let mut max_u = f64::MIN;
        let mut min_v = f64::MAX;
        let mut max_v = f64::MIN;

        for pt in &hull {
            let u = pt.x * ux + pt.y * uy;
            let v = pt.x * vx + pt.y * vy;
            min_u = min_u.min(u);
            max_u = max_u.max(u);
            min_v = min_v.min(v);
            max_v = max_v.max(v);
        }

        let width = max_u - min_u;
        let height = max_v - min_v;
        let area = width * height;

        if area < min_area {
            min_area = area;

            let center_u = (min_u + max_u) / 2.0;
            let center_v = (min_v + max_v) / 2.0;

            best_rect = Some(RotatedRect {
                center: Point2d::new(center_u * ux + center_v * vx, center_u * uy + center_v * vy),
                size: Size2d::new(width, height),
                angle: uy.atan2(ux).to_degrees(),
            });
        }
    }

    best_rect
}

/// Convex hull by Andrew's monotone chain, counter-clockwise, without
/// collinear points. Collinear input collapses to its two extremes.
pub fn compute_convex_hull(points: &[Point2d]) -> Vec<Point2d> {
    let mut sorted: Vec<Point2d> = points.to_vec();
    sorted.sort_by(|a, b| {
        a.x.partial_cmp(&b.x)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.y.partial_cmp(&b.y).unwrap_or(std::cmp::Ordering::Equal))
    });
    sorted.dedup();

    if sorted.len() <= 2 {
        return sorted;
    }

    let cross = |o: Point2d, a: Point2d, b: Point2d| (a.x - o.x) * (b.y - o.y) - (a.y - o.y) * (b.x - o.x);

    let mut hull: Vec<Point2d> = Vec::with_capacity(sorted.len() * 2);
    for &pt in &sorted {
        while hull.len() >= 2 && cross(hull[hull.len() - 2], hull[hull.len() - 1], pt) <= 0.0 {
            hull.pop();
        }
        hull.push(pt);
    }

    let lower_len = hull.len() + 1;
    for &pt in sorted.iter().rev().skip(1) {
        while hull.len() >= lower_len && cross(hull[hull.len() - 2], hull[hull.len() - 1], pt) <= 0.0 {
            hull.pop();
        }
        hull.push(pt);
    }

    hull.pop();
    hull
}

/// 4-connected digital line from `start` to `end`, both inclusive.
///
/// Every step moves along exactly one axis, so the line visits
/// `|dx| + |dy| + 1` pixels.
pub struct LineIterator4 {
    x: i32,
    y: i32,
    sx: i32,
    sy: i32,
    dx: i64,
    dy: i64,
    err: i64,
    remaining: usize,
}

impl LineIterator4 {
    pub fn new(start: (i32, i32), end: (i32, i32)) -> Self {
        let dx = (end.0 as i64 - start.0 as i64).abs();
        let dy = -(end.1 as i64 - start.1 as i64).abs();
        Self {
            x: start.0,
            y: start.1,
            sx: if start.0 < end.0 { 1 } else { -1 },
            sy: if start.1 < end.1 { 1 } else { -1 },
            dx,
            dy,
            err: dx + dy,
            remaining: (dx - dy) as usize + 1,
        }
    }
}

impl Iterator for LineIterator4 {
    type Item = (i32, i32);

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;

        let current = (self.x, self.y);
        let e2 = 2 * self.err;
        if e2 - self.dy > self.dx - e2 {
            self.err += self.dy;
            self.x += self.sx;
        } else {
            self.err += self.dx;
            self.y += self.sy;
        }
        Some(current)
    }
}

/// Clips the segment `start -> end` to the pixel grid `[0, width) x [0, height)`
/// (Liang-Barsky). `None` when no part of it lies inside.
pub fn clip_line(start: (i32, i32), end: (i32, i32), width: u32, height: u32) -> Option<((i32, i32), (i32, i32))> {
    if width == 0 || height == 0 {
        return None;
    }
    let (x_max, y_max) = ((width - 1) as f64, (height - 1) as f64);
    let (x0, y0) = (start.0 as f64, start.1 as f64);
    let dx = (end.0 - start.0) as f64;
    let dy = (end.1 - start.1) as f64;

    let mut t0 = 0.0f64;
    let mut t1 = 1.0f64;
    for (p, q) in [(-dx, x0), (dx, x_max - x0), (-dy, y0), (dy, y_max - y0)] {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
            continue;
        }
        let t = q / p;
        if p < 0.0 {
            t0 = t0.max(t);
        } else {
            t1 = t1.min(t);
        }
        if t0 > t1 {
            return None;
        }
    }

    let at = |t: f64| {
        let x = (x0 + t * dx).round().clamp(0.0, x_max) as i32;
        let y = (y0 + t * dy).round().clamp(0.0, y_max) as i32;
        (x, y)
    };
    Some((at(t0), at(t1)))
}

/// Mean intensity along the 4-connected line between `from` and `to`,
/// clipped to the image first. `None` when the line misses the image.
pub fn mean_along_line(gray: &GrayImage, from: Point2d, to: Point2d) -> Option<f64> {
    let (width, height) = gray.dimensions();
    let (start, end) = clip_line(from.round(), to.round(), width, height)?;

    let mut sum = 0.0f64;
    let mut count = 0usize;
    for (x, y) in LineIterator4::new(start, end) {
        if let Some(p) = gray.get_pixel_checked(x as u32, y as u32) {
            sum += p[0] as f64;
            count += 1;
        }
    }

    if count == 0 {
        None
    } else {
        Some(sum / count as f64)
    }
}
