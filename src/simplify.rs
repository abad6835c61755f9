//! Polyline simplification: radial pre-filter, Ramer-Douglas-Peucker,
//! and rasterization-staircase removal.

use geo::{LineString, Simplify};
use kurbo::Point;

/// Staircase segments shorter than this collapse.
const STAIR_MAX_LEN: f64 = 2.5;

/// Abort staircase removal when it would eat this share of the ring.
const STAIR_ABORT_SHARE: f64 = 0.7;

/// Simplify a closed ring. `epsilon <= 0` is the identity.
pub fn simplify_ring(points: &[Point], epsilon: f64, staircase: bool) -> Vec<Point> {
    if epsilon <= 0.0 || points.len() <= 3 {
        return points.to_vec();
    }
    let filtered = radial_filter(points, epsilon * epsilon / 2.0);
    let reduced = rdp_closed(&filtered, epsilon);
    let reduced = if reduced.len() >= 3 { reduced } else { filtered };
    if staircase {
        remove_staircase(&reduced)
    } else {
        reduced
    }
}

/// Drop consecutive points closer than sqrt(tol_sq) to the last kept one.
fn radial_filter(points: &[Point], tol_sq: f64) -> Vec<Point> {
    let mut kept = vec![points[0]];
    for &p in &points[1..] {
        let last = *kept.last().unwrap();
        if (p - last).hypot2() >= tol_sq {
            kept.push(p);
        }
    }
    kept
}

/// RDP on a closed ring: split at the point farthest from the ring start,
/// simplify the two open halves, and stitch them back together.
fn rdp_closed(points: &[Point], epsilon: f64) -> Vec<Point> {
    let n = points.len();
    if n <= 3 {
        return points.to_vec();
    }

    let anchor = points[0];
    let far = points
        .iter()
        .enumerate()
        .max_by(|a, b| {
            let da = (*a.1 - anchor).hypot2();
            let db = (*b.1 - anchor).hypot2();
            da.partial_cmp(&db).unwrap()
        })
        .map(|(i, _)| i)
        .unwrap_or(n / 2)
        .max(1);

    let first: Vec<Point> = points[..=far].to_vec();
    let mut second: Vec<Point> = points[far..].to_vec();
    second.push(points[0]);

    let mut out = rdp_open(&first, epsilon);
    out.pop(); // shared with the head of the second half
    let mut tail = rdp_open(&second, epsilon);
    tail.pop(); // shared with the ring start
    out.extend(tail);
    out
}

/// RDP on an open chain.
fn rdp_open(points: &[Point], epsilon: f64) -> Vec<Point> {
    if points.len() <= 2 {
        return points.to_vec();
    }
    let tuples: Vec<(f64, f64)> = points.iter().map(|p| (p.x, p.y)).collect();
    LineString::from(tuples)
        .simplify(&epsilon)
        .into_inner()
        .into_iter()
        .map(|c| Point::new(c.x, c.y))
        .collect()
}

/// Collapse 1-pixel H/V staircases: drop the middle point of any
/// horizontal-then-vertical (or vice versa) corner whose segments are both
/// short. Keeps the ring untouched when the pattern covers most of it —
/// that shape *is* a staircase, not noise on one.
fn remove_staircase(points: &[Point]) -> Vec<Point> {
    let n = points.len();
    if n < 4 {
        return points.to_vec();
    }

    let marked: Vec<bool> = (0..n)
        .map(|i| {
            let prev = points[(i + n - 1) % n];
            let cur = points[i];
            let next = points[(i + 1) % n];
            let a = cur - prev;
            let b = next - cur;
            let a_h = a.y.abs() < 1e-6 && a.x.abs() > 1e-6;
            let a_v = a.x.abs() < 1e-6 && a.y.abs() > 1e-6;
            let b_h = b.y.abs() < 1e-6 && b.x.abs() > 1e-6;
            let b_v = b.x.abs() < 1e-6 && b.y.abs() > 1e-6;
            let turns = (a_h && b_v) || (a_v && b_h);
            turns && a.hypot() < STAIR_MAX_LEN && b.hypot() < STAIR_MAX_LEN
        })
        .collect();

    let removed = marked.iter().filter(|&&m| m).count();
    if removed == 0 || removed as f64 > STAIR_ABORT_SHARE * n as f64 || n - removed < 3 {
        return points.to_vec();
    }
    points
        .iter()
        .zip(&marked)
        .filter(|&(_, &m)| !m)
        .map(|(&p, _)| p)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ring(pts: &[(f64, f64)]) -> Vec<Point> {
        pts.iter().map(|&(x, y)| Point::new(x, y)).collect()
    }

    #[test]
    fn zero_epsilon_is_identity() {
        let pts = ring(&[(0.0, 0.0), (3.0, 0.1), (5.0, 2.0), (1.0, 4.0), (0.2, 2.0)]);
        assert_eq!(simplify_ring(&pts, 0.0, true), pts);
    }

    #[test]
    fn collinear_midpoints_are_removed() {
        let pts = ring(&[
            (0.0, 0.0),
            (5.0, 0.0),
            (10.0, 0.0),
            (10.0, 10.0),
            (5.0, 10.0),
            (0.0, 10.0),
        ]);
        let out = simplify_ring(&pts, 1.0, false);
        assert_eq!(out.len(), 4, "square should reduce to its corners: {out:?}");
    }

    #[test]
    fn radial_filter_drops_jitter_clusters() {
        let pts = ring(&[
            (0.0, 0.0),
            (0.1, 0.05),
            (0.05, 0.1),
            (10.0, 0.0),
            (10.0, 10.0),
            (0.0, 10.0),
        ]);
        let out = simplify_ring(&pts, 1.0, false);
        assert!(out.len() <= 4);
    }

    #[test]
    fn staircase_middle_points_collapse() {
        // A diagonal staircase between two long straight runs.
        let mut pts = vec![(0.0, 0.0), (10.0, 0.0)];
        for i in 0..4 {
            pts.push((10.0 + i as f64, 1.0 + i as f64));
            pts.push((11.0 + i as f64, 1.0 + i as f64));
        }
        pts.push((14.0, 10.0));
        pts.push((0.0, 10.0));
        let n_before = pts.len();
        let out = remove_staircase(&ring(&pts));
        assert!(out.len() < n_before);
    }

    #[test]
    fn pure_staircase_ring_is_left_alone() {
        // Every vertex is an H/V corner with short segments: the abort
        // rule keeps the original.
        let pts = ring(&[
            (0.0, 0.0),
            (1.0, 0.0),
            (1.0, 1.0),
            (2.0, 1.0),
            (2.0, 2.0),
            (0.0, 2.0),
        ]);
        let out = remove_staircase(&pts);
        assert_eq!(out.len(), pts.len());
    }
}
