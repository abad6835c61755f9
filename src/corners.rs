//! Corner detection: multi-scale turning-angle analysis with cyclic
//! non-maximum suppression.

use kurbo::Point;

/// Neighbor offsets used to estimate the turning angle.
const SCALES: [usize; 2] = [4, 6];

/// Interior angles below this many degrees mark a corner candidate.
const ANGLE_THRESHOLD_DEG: f64 = 130.0;

/// Wider threshold when aggressive corner preservation is requested.
const AGGRESSIVE_THRESHOLD_DEG: f64 = 140.0;

/// Minimum cyclic spacing between surviving corners.
const MIN_DISTANCE: usize = 4;

/// Detect corner indices on a closed ring.
///
/// A corner candidate has an interior angle below the threshold at some
/// scale and is a local minimum of the angle function. Candidates are
/// then suppressed so survivors sit at least [`MIN_DISTANCE`] apart,
/// sharpest first. The returned indices are sorted.
pub fn detect(points: &[Point], aggressive: bool) -> Vec<usize> {
    let n = points.len();
    if n < 5 {
        return Vec::new();
    }

    let threshold_deg = if aggressive {
        AGGRESSIVE_THRESHOLD_DEG
    } else {
        ANGLE_THRESHOLD_DEG
    };
    let threshold = threshold_deg.to_radians();

    // Sharpest (smallest) interior angle across the usable scales.
    let angles: Vec<f64> = (0..n)
        .map(|i| {
            SCALES
                .iter()
                .filter(|&&r| 2 * r + 1 <= n)
                .map(|&r| interior_angle(points, i, r, n))
                .fold(f64::INFINITY, f64::min)
        })
        .collect();
    if angles.iter().all(|a| !a.is_finite()) {
        return Vec::new();
    }

    let window = MIN_DISTANCE.min(2);
    let mut candidates: Vec<usize> = (0..n)
        .filter(|&i| {
            angles[i] < threshold
                && (1..=window).all(|d| {
                    angles[i] <= angles[(i + d) % n] && angles[i] <= angles[(i + n - d) % n]
                })
        })
        .collect();

    // Non-max suppression: sharpest corners claim their neighborhood.
    candidates.sort_by(|&a, &b| angles[a].partial_cmp(&angles[b]).unwrap());
    let mut kept: Vec<usize> = Vec::new();
    for &c in &candidates {
        if kept.iter().all(|&k| cyclic_distance(c, k, n) >= MIN_DISTANCE) {
            kept.push(c);
        }
    }
    kept.sort_unstable();
    kept
}

/// Interior angle at point `i` using neighbors at offset `r`.
///
/// A straight run reads as pi; a hairpin reads near zero.
fn interior_angle(points: &[Point], i: usize, r: usize, n: usize) -> f64 {
    let prev = points[(i + n - r) % n];
    let cur = points[i];
    let next = points[(i + r) % n];
    let v_in = cur - prev;
    let v_out = next - cur;
    let turn = v_out.cross(v_in).atan2(v_out.dot(v_in)).abs();
    std::f64::consts::PI - turn
}

#[inline]
fn cyclic_distance(a: usize, b: usize, n: usize) -> usize {
    let d = a.abs_diff(b);
    d.min(n - d)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ring(pts: &[(f64, f64)]) -> Vec<Point> {
        pts.iter().map(|&(x, y)| Point::new(x, y)).collect()
    }

    /// A dense square outline: 4 sharp corners, straight runs between.
    fn square_ring(side: usize) -> Vec<Point> {
        let s = side as f64;
        let mut pts = Vec::new();
        for i in 0..side {
            pts.push(Point::new(i as f64, 0.0));
        }
        for i in 0..side {
            pts.push(Point::new(s, i as f64));
        }
        for i in 0..side {
            pts.push(Point::new(s - i as f64, s));
        }
        for i in 0..side {
            pts.push(Point::new(0.0, s - i as f64));
        }
        pts
    }

    #[test]
    fn square_corners_are_found() {
        let pts = square_ring(20);
        let corners = detect(&pts, false);
        assert_eq!(corners.len(), 4, "square has 4 corners, got {corners:?}");
        // each detected corner lies near an actual square corner
        for &c in &corners {
            let p = pts[c];
            let near = [(0.0, 0.0), (20.0, 0.0), (20.0, 20.0), (0.0, 20.0)]
                .iter()
                .any(|&(x, y)| (p - Point::new(x, y)).hypot() <= 2.0);
            assert!(near, "corner at {p:?} is far from every square corner");
        }
    }

    #[test]
    fn circle_has_no_corners() {
        let n = 64;
        let pts: Vec<Point> = (0..n)
            .map(|i| {
                let a = i as f64 / n as f64 * std::f64::consts::TAU;
                Point::new(50.0 + 30.0 * a.cos(), 50.0 + 30.0 * a.sin())
            })
            .collect();
        assert!(detect(&pts, false).is_empty());
    }

    #[test]
    fn suppression_enforces_spacing() {
        let pts = square_ring(20);
        let corners = detect(&pts, true);
        let n = pts.len();
        for (i, &a) in corners.iter().enumerate() {
            for &b in &corners[i + 1..] {
                assert!(cyclic_distance(a, b, n) >= MIN_DISTANCE);
            }
        }
    }

    #[test]
    fn tiny_rings_have_no_corners() {
        let pts = ring(&[(0.0, 0.0), (4.0, 0.0), (2.0, 3.0)]);
        assert!(detect(&pts, false).is_empty());
    }
}
