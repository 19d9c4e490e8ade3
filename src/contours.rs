// Contour tracing over thin binary edge maps
// Turns every 8-connected edge component into one or more ordered point chains

use image::GrayImage;
use serde::Serialize;

/// One traced contour: pixel coordinates in traversal order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Segment {
    pub points: Vec<(i32, i32)>,
}

impl Segment {
    pub fn new(points: Vec<(i32, i32)>) -> Self {
        Self { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Turns a refined binary edge image into ordered point sequences.
pub trait ContourExtractor {
    fn extract(&self, edges: &GrayImage) -> Vec<Segment>;
}

/// Chain follower for one-pixel-wide edges.
///
/// Each 8-connected component is walked from an end point (or from its
/// first pixel in scan order when it is a closed loop); branches left over
/// after a walk become chains of their own.
#[derive(Debug, Clone, Copy)]
pub struct EdgeTracer {
    /// Drop interior points collinear with their neighbours.
    pub approximate: bool,
}

impl Default for EdgeTracer {
    fn default() -> Self {
        Self { approximate: true }
    }
}

// 4-neighbours first so walks prefer straight steps over diagonal ones.
const NEIGHBORS: [(i32, i32); 8] = [
    (1, 0),
    (0, 1),
    (-1, 0),
    (0, -1),
    (1, 1),
    (-1, 1),
    (-1, -1),
    (1, -1),
];

impl ContourExtractor for EdgeTracer {
    fn extract(&self, edges: &GrayImage) -> Vec<Segment> {
        let (width, height) = edges.dimensions();
        let (width, height) = (width as i32, height as i32);
        let mut visited = vec![vec![false; width as usize]; height as usize];
        let mut labeled = vec![vec![false; width as usize]; height as usize];
        let mut segments = Vec::new();

        for y in 0..height {
            for x in 0..width {
                if visited[y as usize][x as usize] || !is_edge(edges, x, y) {
                    continue;
                }

                let mut component = collect_component(edges, &mut labeled, x, y);

                while !component.is_empty() {
                    let start = pick_start(&component, &visited);
                    let chain = walk_chain(edges, &mut visited, start);
                    component.retain(|&(cx, cy)| !visited[cy as usize][cx as usize]);

                    let chain = if self.approximate {
                        approx_simple(&chain)
                    } else {
                        chain
                    };
                    segments.push(Segment::new(chain));
                }
            }
        }

        segments
    }
}

fn is_edge(img: &GrayImage, x: i32, y: i32) -> bool {
    let (width, height) = img.dimensions();
    x >= 0 && y >= 0 && (x as u32) < width && (y as u32) < height && img.get_pixel(x as u32, y as u32)[0] > 127
}

/// All pixels 8-connected to `(start_x, start_y)`, in discovery order.
fn collect_component(img: &GrayImage, seen: &mut [Vec<bool>], start_x: i32, start_y: i32) -> Vec<(i32, i32)> {
    let mut stack = vec![(start_x, start_y)];
    let mut component = Vec::new();
    seen[start_y as usize][start_x as usize] = true;

    while let Some((x, y)) = stack.pop() {
        component.push((x, y));
        for (dx, dy) in NEIGHBORS {
            let (nx, ny) = (x + dx, y + dy);
            if is_edge(img, nx, ny) && !seen[ny as usize][nx as usize] {
                seen[ny as usize][nx as usize] = true;
                stack.push((nx, ny));
            }
        }
    }

    component.sort_by_key(|&(x, y)| (y, x));
    component
}

/// First remaining pixel with at most one remaining neighbour, else the
/// first remaining pixel.
fn pick_start(component: &[(i32, i32)], visited: &[Vec<bool>]) -> (i32, i32) {
    let in_component = |x: i32, y: i32| component.binary_search_by_key(&(y, x), |&(cx, cy)| (cy, cx)).is_ok();

    component
        .iter()
        .copied()
        .find(|&(x, y)| {
            let degree = NEIGHBORS
                .iter()
                .filter(|&&(dx, dy)| {
                    let (nx, ny) = (x + dx, y + dy);
                    nx >= 0
                        && ny >= 0
                        && (ny as usize) < visited.len()
                        && (nx as usize) < visited[0].len()
                        && !visited[ny as usize][nx as usize]
                        && in_component(nx, ny)
                })
                .count();
            degree <= 1
        })
        .unwrap_or(component[0])
}

fn walk_chain(img: &GrayImage, visited: &mut [Vec<bool>], start: (i32, i32)) -> Vec<(i32, i32)> {
    let mut chain = vec![start];
    visited[start.1 as usize][start.0 as usize] = true;
    let mut current = start;

    loop {
        let next = NEIGHBORS.iter().map(|&(dx, dy)| (current.0 + dx, current.1 + dy)).find(|&(nx, ny)| {
            is_edge(img, nx, ny) && !visited[ny as usize][nx as usize]
        });

        match next {
            Some(p) => {
                visited[p.1 as usize][p.0 as usize] = true;
                chain.push(p);
                current = p;
            }
            None => break,
        }
    }

    chain
}

/// Removes interior points lying on a straight run (like CHAIN_APPROX_SIMPLE).
pub fn approx_simple(points: &[(i32, i32)]) -> Vec<(i32, i32)> {
    if points.len() <= 2 {
        return points.to_vec();
    }

    let mut result = Vec::with_capacity(points.len());
    result.push(points[0]);

    for i in 1..points.len() - 1 {
        let prev = points[i - 1];
        let curr = points[i];
        let next = points[i + 1];

        let dx1 = curr.0 - prev.0;
        let dy1 = curr.1 - prev.1;
        let dx2 = next.0 - curr.0;
        let dy2 = next.1 - curr.1;

        if dx1 * dy2 != dy1 * dx2 {
            result.push(curr);
        }
    }

    if let Some(&last) = points.last() {
        result.push(last);
    }

    result
}
