//! Chaikin corner-cutting that leaves detected corners untouched, plus a
//! gentle moving-average pass.

use kurbo::Point;

/// A point this close to a saved corner position is that corner.
const CORNER_MATCH_DIST: f64 = 0.5;

/// Subdivide a closed ring `iterations` times, preserving the points
/// flagged in `corners` exactly.
///
/// Regular edges emit the usual 1/4 and 3/4 points. An edge leaving a
/// corner emits the corner itself plus a single midpoint, so the corner
/// position survives every iteration. Returns the smoothed ring and the
/// corner indices remapped into it.
pub fn chaikin(points: &[Point], corners: &[usize], iterations: usize) -> (Vec<Point>, Vec<usize>) {
    let corner_positions: Vec<Point> = corners
        .iter()
        .filter(|&&i| i < points.len())
        .map(|&i| points[i])
        .collect();

    let mut ring = points.to_vec();
    for _ in 0..iterations {
        if ring.len() < 3 {
            break;
        }
        let n = ring.len();
        let mut next = Vec::with_capacity(2 * n);
        for i in 0..n {
            let a = ring[i];
            let b = ring[(i + 1) % n];
            if is_corner(a, &corner_positions) {
                next.push(a);
                next.push(a.midpoint(b));
            } else {
                next.push(a.lerp(b, 0.25));
                next.push(a.lerp(b, 0.75));
            }
        }
        ring = next;
    }

    if iterations > 0 {
        ring = moving_average(&ring, &corner_positions);
    }

    let remapped = remap_corners(&ring, &corner_positions);
    (ring, remapped)
}

/// One cyclic 3-point moving-average pass that skips corners.
fn moving_average(points: &[Point], corner_positions: &[Point]) -> Vec<Point> {
    let n = points.len();
    if n < 3 {
        return points.to_vec();
    }
    (0..n)
        .map(|i| {
            let cur = points[i];
            if is_corner(cur, corner_positions) {
                return cur;
            }
            let prev = points[(i + n - 1) % n];
            let next = points[(i + 1) % n];
            Point::new(
                (prev.x + cur.x + next.x) / 3.0,
                (prev.y + cur.y + next.y) / 3.0,
            )
        })
        .collect()
}

#[inline]
fn is_corner(p: Point, corner_positions: &[Point]) -> bool {
    corner_positions
        .iter()
        .any(|&c| (p - c).hypot() <= CORNER_MATCH_DIST)
}

/// Find the ring indices that now carry each preserved corner position.
fn remap_corners(ring: &[Point], corner_positions: &[Point]) -> Vec<usize> {
    let mut indices: Vec<usize> = corner_positions
        .iter()
        .filter_map(|&c| {
            ring.iter()
                .enumerate()
                .filter(|(_, &p)| (p - c).hypot() <= CORNER_MATCH_DIST)
                .min_by(|a, b| {
                    let da = (*a.1 - c).hypot();
                    let db = (*b.1 - c).hypot();
                    da.partial_cmp(&db).unwrap()
                })
                .map(|(i, _)| i)
        })
        .collect();
    indices.sort_unstable();
    indices.dedup();
    indices
}
