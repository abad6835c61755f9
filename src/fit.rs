//! Curve fitting: simplified contours → cubic Bézier paths.
//!
//! Per contour:
//! 1. Simplify (radial + RDP + optional staircase removal)
//! 2. Detect corners, smooth the runs between them
//! 3. Fit cubics per corner-to-corner segment
//! 4. Retract overshooting handles (outer contours only)
//!
//! The primary fitter is kurbo's optimal refitting; a built-in
//! least-squares fitter and Catmull-Rom handles back it up, so fitting
//! never fails outright.

use kurbo::{
    fit_to_bezpath_opt, simplify::SimplifyBezPath, Affine, BezPath, CubicBez, ParamCurve, PathEl,
    Point, Vec2,
};

use crate::config::{Settings, TraceMode};
use crate::corners;
use crate::simplify::simplify_ring;
use crate::smooth::chaikin;
use crate::trace::Contour;

/// Contours below this many vertices are emitted as straight polygons.
const MIN_SPLINE_POINTS: usize = 12;

/// Source-unit area floor for spline fitting (combined with the layer's
/// noise floor).
const MIN_SPLINE_AREA: f64 = 30.0;

/// Contours below this working-unit area or vertex count are fitted at
/// 3x scale for numeric precision.
const SMALL_CONTOUR_AREA: f64 = 500.0;
const SMALL_CONTOUR_POINTS: usize = 40;
const PRECISION_SCALE: f64 = 3.0;

/// Handle retraction: length cap as a fraction of the chord.
const RETRACT_RATIO_SHORT: f64 = 0.6;
const RETRACT_RATIO_LONG: f64 = 0.4;
const RETRACT_SHORT_CHORD: f64 = 20.0;
const RETRACT_MIN_LEN: f64 = 2.0;

/// Built-in fitter: handle magnitude clamp as fractions of the chord.
const ALPHA_MIN_RATIO: f64 = 0.1;
const ALPHA_MAX_RATIO: f64 = 0.6;

/// Built-in fitter recursion cap.
const MAX_SPLIT_DEPTH: usize = 12;

/// Convert one traced contour into path geometry.
///
/// `noise_floor` is in source-pixel units; `scale` is the working upscale
/// factor, used to normalize areas back to source units.
pub fn contour_to_path(
    contour: &Contour,
    settings: &Settings,
    noise_floor: f64,
    scale: f64,
) -> BezPath {
    let points = &contour.points;
    let area_src = contour.area.abs() / (scale * scale);

    if settings.mode == TraceMode::Polygon {
        let simplified = simplify_ring(points, settings.path_tolerance, settings.staircase);
        return polygon_path(&simplified);
    }

    if area_src < MIN_SPLINE_AREA.max(3.0 * noise_floor) || points.len() < MIN_SPLINE_POINTS {
        let simplified = simplify_ring(points, settings.path_tolerance, settings.staircase);
        return polygon_path(&simplified);
    }

    // Small contours are fitted at 3x scale: the fit error and handle
    // solves behave badly on sub-pixel geometry.
    let needs_precision =
        contour.area.abs() < SMALL_CONTOUR_AREA || points.len() < SMALL_CONTOUR_POINTS;
    let factor = if needs_precision { PRECISION_SCALE } else { 1.0 };

    let work: Vec<Point> = if needs_precision {
        points
            .iter()
            .map(|p| Point::new(p.x * factor, p.y * factor))
            .collect()
    } else {
        points.clone()
    };

    let mut path = fit_ring(&work, settings);
    if needs_precision {
        path.apply_affine(Affine::scale(1.0 / factor));
    }
    if contour.is_outer() {
        retract_handles(&mut path);
    }
    path
}

/// Straight-line emission.
pub fn polygon_path(points: &[Point]) -> BezPath {
    let mut path = BezPath::new();
    if let Some(&first) = points.first() {
        path.move_to(first);
        for &p in &points[1..] {
            path.line_to(p);
        }
        path.close_path();
    }
    path
}

// ── Ring fitting ─────────────────────────────────────────

/// The full smooth chain on one closed ring: simplify, detect corners,
/// Chaikin, then fit each corner-to-corner run.
fn fit_ring(points: &[Point], settings: &Settings) -> BezPath {
    let simplified = simplify_ring(points, settings.path_tolerance, settings.staircase);
    if simplified.len() < 3 {
        return polygon_path(&simplified);
    }

    let corner_idx = corners::detect(&simplified, settings.aggressive_corners);
    let iterations = settings.smoothness.round().clamp(0.0, 3.0) as usize;
    let (ring, corner_idx) = chaikin(&simplified, &corner_idx, iterations);
    if ring.len() < 3 {
        return polygon_path(&ring);
    }

    let error = fit_error(settings.path_tolerance, perimeter(&ring));

    if corner_idx.is_empty() {
        return fit_closed(&ring, error);
    }

    let n = ring.len();
    let nc = corner_idx.len();
    let mut path = BezPath::new();
    path.move_to(ring[corner_idx[0]]);

    for ci in 0..nc {
        let start = corner_idx[ci];
        let end = corner_idx[(ci + 1) % nc];
        let segment = extract_cyclic(&ring, start, end, n);

        if segment.len() <= 2 {
            path.line_to(ring[end]);
        } else {
            let fitted = fit_open(&segment, error);
            for el in fitted.elements().iter().skip(1) {
                path.push(*el);
            }
        }
    }
    path.close_path();
    path
}

/// Fit error grows slowly with perimeter so large contours fit with
/// fewer segments.
fn fit_error(path_tolerance: f64, perimeter: f64) -> f64 {
    let base = path_tolerance.max(0.8);
    let bonus = ((perimeter - 100.0) / 500.0).min(0.5);
    (base + bonus).max(0.1)
}

fn perimeter(points: &[Point]) -> f64 {
    let n = points.len();
    (0..n)
        .map(|i| (points[(i + 1) % n] - points[i]).hypot())
        .sum()
}

/// Fit a closed corner-free ring.
fn fit_closed(ring: &[Point], error: f64) -> BezPath {
    let mut polyline = polygon_path(ring);
    if let Some(fitted) = kurbo_fit(&polyline, error) {
        return fitted;
    }
    // Built-in fallback treats the ring as one open chain back to its
    // start; ClosePath seals the final joint.
    polyline = BezPath::new();
    let mut chain = ring.to_vec();
    chain.push(ring[0]);
    let cubics = builtin_fit(&chain, error).unwrap_or_else(|| catmull_rom(&chain));
    emit_cubics(&mut polyline, &cubics, true);
    polyline
}

/// Fit an open corner-to-corner segment.
fn fit_open(segment: &[Point], error: f64) -> BezPath {
    let mut polyline = BezPath::new();
    polyline.move_to(segment[0]);
    for &p in &segment[1..] {
        polyline.line_to(p);
    }
    if let Some(fitted) = kurbo_fit(&polyline, error) {
        return fitted;
    }
    let cubics = builtin_fit(segment, error).unwrap_or_else(|| catmull_rom(segment));
    let mut path = BezPath::new();
    emit_cubics(&mut path, &cubics, false);
    path
}

fn emit_cubics(path: &mut BezPath, cubics: &[CubicBez], close: bool) {
    if let Some(first) = cubics.first() {
        path.move_to(first.p0);
        for c in cubics {
            path.curve_to(c.p1, c.p2, c.p3);
        }
        if close {
            path.close_path();
        }
    }
}

// ── Primary fitter (kurbo) ───────────────────────────────

/// Two-pass optimal refit: polyline → curves → minimal curves. Smooth
/// curves re-simplify far better than noisy polylines, so the second
/// pass sharply reduces segment count.
fn kurbo_fit(polyline: &BezPath, accuracy: f64) -> Option<BezPath> {
    let pass1 = fit_to_bezpath_opt(
        &SimplifyBezPath::new(polyline.elements().iter().copied()),
        accuracy,
    );
    let pass2 = fit_to_bezpath_opt(
        &SimplifyBezPath::new(pass1.elements().iter().copied()),
        accuracy,
    );
    if path_is_sane(&pass2) {
        Some(pass2)
    } else {
        None
    }
}

fn path_is_sane(path: &BezPath) -> bool {
    let finite = |p: &Point| p.x.is_finite() && p.y.is_finite();
    let mut any_segment = false;
    for el in path.elements() {
        let ok = match el {
            PathEl::MoveTo(p) => finite(p),
            PathEl::LineTo(p) => {
                any_segment = true;
                finite(p)
            }
            PathEl::QuadTo(p1, p2) => {
                any_segment = true;
                finite(p1) && finite(p2)
            }
            PathEl::CurveTo(p1, p2, p3) => {
                any_segment = true;
                finite(p1) && finite(p2) && finite(p3)
            }
            PathEl::ClosePath => true,
        };
        if !ok {
            return false;
        }
    }
    any_segment
}

// ── Built-in least-squares fitter ────────────────────────

/// Schneider-style least-squares cubic fitting.
///
/// Chord-length parametrization, end tangents from up to four offset
/// vectors, and the 2x2 normal equations for the two handle magnitudes.
/// Splits at the worst point and recurses while the error exceeds the
/// budget. Returns `None` only on degenerate tangents.
fn builtin_fit(points: &[Point], error: f64) -> Option<Vec<CubicBez>> {
    if points.len() < 2 {
        return None;
    }
    let t0 = end_tangent(points, true)?;
    let t1 = end_tangent(points, false)?;
    let mut cubics = Vec::new();
    fit_recursive(points, t0, t1, error, 0, &mut cubics);
    Some(cubics)
}

fn fit_recursive(
    points: &[Point],
    t0: Vec2,
    t1: Vec2,
    error: f64,
    depth: usize,
    out: &mut Vec<CubicBez>,
) {
    let n = points.len();
    if n == 2 {
        out.push(line_cubic(points[0], points[1]));
        return;
    }

    let u = chord_parametrize(points);
    let cubic = solve_cubic(points, &u, t0, t1);
    let (max_err, worst) = max_deviation(&cubic, points, &u);

    if max_err <= error || depth >= MAX_SPLIT_DEPTH || n < 4 {
        out.push(cubic);
        return;
    }

    // Split at the worst point; the shared tangent keeps the joint smooth.
    let split = worst.clamp(1, n - 2);
    let center = center_tangent(points, split);
    fit_recursive(&points[..=split], t0, center, error, depth + 1, out);
    fit_recursive(&points[split..], -center, t1, error, depth + 1, out);
}

/// Average direction of up to four offset vectors from one end.
fn end_tangent(points: &[Point], from_start: bool) -> Option<Vec2> {
    let n = points.len();
    let take = (n - 1).min(4);
    let mut sum = Vec2::ZERO;
    for k in 1..=take {
        let v = if from_start {
            points[k] - points[0]
        } else {
            points[n - 1 - k] - points[n - 1]
        };
        let len = v.hypot();
        if len > 1e-12 {
            sum += v / len;
        }
    }
    let len = sum.hypot();
    if len < 1e-9 {
        None
    } else {
        Some(sum / len)
    }
}

/// Tangent through an interior point, for recursion splits.
fn center_tangent(points: &[Point], i: usize) -> Vec2 {
    let v = points[i - 1] - points[i + 1];
    let len = v.hypot();
    if len < 1e-12 {
        Vec2::new(1.0, 0.0)
    } else {
        v / len
    }
}

fn chord_parametrize(points: &[Point]) -> Vec<f64> {
    let mut u = vec![0.0];
    for pair in points.windows(2) {
        let d = (pair[1] - pair[0]).hypot();
        u.push(u.last().unwrap() + d);
    }
    let total = *u.last().unwrap();
    if total > 1e-12 {
        for v in &mut u {
            *v /= total;
        }
    }
    u
}

/// Solve the 2x2 normal equations for the two handle magnitudes.
fn solve_cubic(points: &[Point], u: &[f64], t0: Vec2, t1: Vec2) -> CubicBez {
    let p0 = points[0];
    let p3 = points[points.len() - 1];
    let chord = (p3 - p0).hypot();

    let mut c00 = 0.0;
    let mut c01 = 0.0;
    let mut c11 = 0.0;
    let mut x0 = 0.0;
    let mut x1 = 0.0;

    for (i, &t) in u.iter().enumerate() {
        let b0 = (1.0 - t).powi(3);
        let b1 = 3.0 * t * (1.0 - t) * (1.0 - t);
        let b2 = 3.0 * t * t * (1.0 - t);
        let b3 = t.powi(3);

        let a0 = t0 * b1;
        let a1 = t1 * b2;
        let tmp = points[i].to_vec2() - (p0.to_vec2() * (b0 + b1) + p3.to_vec2() * (b2 + b3));

        c00 += a0.dot(a0);
        c01 += a0.dot(a1);
        c11 += a1.dot(a1);
        x0 += a0.dot(tmp);
        x1 += a1.dot(tmp);
    }

    let det = c00 * c11 - c01 * c01;
    let (mut alpha1, mut alpha2) = if det.abs() < 1e-6 {
        (chord / 3.0, chord / 3.0)
    } else {
        ((x0 * c11 - x1 * c01) / det, (c00 * x1 - c01 * x0) / det)
    };

    // Degenerate or overshooting magnitudes clamp to the safe window.
    let lo = ALPHA_MIN_RATIO * chord;
    let hi = ALPHA_MAX_RATIO * chord;
    if !alpha1.is_finite() || alpha1 <= 0.0 {
        alpha1 = chord / 3.0;
    }
    if !alpha2.is_finite() || alpha2 <= 0.0 {
        alpha2 = chord / 3.0;
    }
    alpha1 = alpha1.clamp(lo, hi);
    alpha2 = alpha2.clamp(lo, hi);

    CubicBez::new(p0, p0 + t0 * alpha1, p3 + t1 * alpha2, p3)
}

/// Max distance from the points to their parametric images on the cubic.
fn max_deviation(cubic: &CubicBez, points: &[Point], u: &[f64]) -> (f64, usize) {
    let mut max_d = 0.0;
    let mut worst = points.len() / 2;
    for (i, (&p, &t)) in points.iter().zip(u.iter()).enumerate() {
        let d = (cubic.eval(t) - p).hypot();
        if d > max_d {
            max_d = d;
            worst = i;
        }
    }
    (max_d, worst)
}

fn line_cubic(a: Point, b: Point) -> CubicBez {
    CubicBez::new(a, a.lerp(b, 1.0 / 3.0), a.lerp(b, 2.0 / 3.0), b)
}

/// Last-resort fitter: Catmull-Rom tangent handles through every point.
fn catmull_rom(points: &[Point]) -> Vec<CubicBez> {
    let n = points.len();
    if n < 2 {
        return Vec::new();
    }
    let mut cubics = Vec::with_capacity(n - 1);
    for i in 0..n - 1 {
        let p0 = points[i];
        let p3 = points[i + 1];
        let prev = if i == 0 { p0 } else { points[i - 1] };
        let next = if i + 2 < n { points[i + 2] } else { p3 };
        let m0 = (p3 - prev) / 6.0;
        let m1 = (next - p0) / 6.0;
        cubics.push(CubicBez::new(p0, p0 + m0, p3 - m1, p3));
    }
    cubics
}

// ── Handle retraction ────────────────────────────────────

/// Clamp each cubic's handle length to a fraction of its chord. Bitmap
/// fitting tends to overshoot at shallow turns; retraction keeps the
/// curve inside the shape.
pub fn retract_handles(path: &mut BezPath) {
    let els = path.elements().to_vec();
    let mut out = BezPath::new();
    let mut cursor = Point::ZERO;
    let mut start = Point::ZERO;

    for el in els {
        match el {
            PathEl::MoveTo(p) => {
                cursor = p;
                start = p;
                out.move_to(p);
            }
            PathEl::LineTo(p) => {
                cursor = p;
                out.line_to(p);
            }
            PathEl::CurveTo(c1, c2, p) => {
                let chord = (p - cursor).hypot();
                let ratio = if chord < RETRACT_SHORT_CHORD {
                    RETRACT_RATIO_SHORT
                } else {
                    RETRACT_RATIO_LONG
                };
                let max_len = (chord * ratio).max(RETRACT_MIN_LEN);
                let c1 = clamp_handle(cursor, c1, max_len);
                let c2 = clamp_handle(p, c2, max_len);
                out.curve_to(c1, c2, p);
                cursor = p;
            }
            PathEl::QuadTo(c, p) => {
                out.quad_to(c, p);
                cursor = p;
            }
            PathEl::ClosePath => {
                cursor = start;
                out.close_path();
            }
        }
    }
    *path = out;
}

fn clamp_handle(anchor: Point, handle: Point, max_len: f64) -> Point {
    let v = handle - anchor;
    let len = v.hypot();
    if len <= max_len || len < 1e-12 {
        handle
    } else {
        anchor + v * (max_len / len)
    }
}

/// Extract a cyclic sub-sequence from `start` to `end` (inclusive).
/// `start == end` returns the full cycle closed back on itself.
fn extract_cyclic(points: &[Point], start: usize, end: usize, total: usize) -> Vec<Point> {
    let mut result = Vec::new();
    let mut i = start;
    let mut first = true;
    loop {
        result.push(points[i]);
        if i == end && !first {
            break;
        }
        first = false;
        i = (i + 1) % total;
    }
    result
}
