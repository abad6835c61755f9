//! Contour extraction: closed, oriented polylines from a layer's bitmap
//! and alpha field.
//!
//! Marching squares is the normative tracer; border following is kept as
//! a fallback for bitmaps marching cannot handle.

pub mod border;
pub mod marching;

use kurbo::{Point, Rect};

use crate::config::ContourMethod;
use crate::layer::LayerField;

/// A closed contour. `points` holds the unique ring vertices; the closing
/// edge back to the first point is implicit everywhere and explicit in
/// the emitted path data.
#[derive(Debug, Clone)]
pub struct Contour {
    pub points: Vec<Point>,
    /// Shoelace area. Positive = outer boundary, negative = hole.
    pub area: f64,
}

impl Contour {
    pub fn new(points: Vec<Point>) -> Self {
        let area = signed_area(&points);
        Self { points, area }
    }

    pub fn is_outer(&self) -> bool {
        self.area >= 0.0
    }

    pub fn bounding_box(&self) -> Rect {
        let mut min_x = f64::INFINITY;
        let mut min_y = f64::INFINITY;
        let mut max_x = f64::NEG_INFINITY;
        let mut max_y = f64::NEG_INFINITY;
        for p in &self.points {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }
        Rect::new(min_x, min_y, max_x, max_y)
    }

    /// Ray-casting point-in-polygon test, used to attach holes to their
    /// enclosing outer contour.
    pub fn contains(&self, p: Point) -> bool {
        let n = self.points.len();
        let mut inside = false;
        let mut j = n - 1;
        for i in 0..n {
            let a = self.points[i];
            let b = self.points[j];
            if (a.y > p.y) != (b.y > p.y) {
                let x = a.x + (p.y - a.y) / (b.y - a.y) * (b.x - a.x);
                if p.x < x {
                    inside = !inside;
                }
            }
            j = i;
        }
        inside
    }
}

/// Signed area via the shoelace formula over the closed ring.
pub fn signed_area(points: &[Point]) -> f64 {
    let n = points.len();
    if n < 3 {
        return 0.0;
    }
    let mut acc = 0.0;
    for i in 0..n {
        let j = (i + 1) % n;
        acc += points[i].x * points[j].y - points[j].x * points[i].y;
    }
    acc / 2.0
}

/// Extract the layer's contours with the selected method, dropping
/// degenerate rings and ordering by |area| descending.
pub fn trace_layer(field: &LayerField, method: ContourMethod) -> Vec<Contour> {
    let mut contours = match method {
        ContourMethod::Marching => marching::trace(field),
        ContourMethod::Border => border::trace(&field.bitmap),
        ContourMethod::Hybrid => {
            let traced = marching::trace(field);
            if traced.is_empty() && field.pixel_count > 0 {
                border::trace(&field.bitmap)
            } else {
                traced
            }
        }
    };
    contours.retain(|c| c.points.len() >= 3);
    contours.sort_by(|a, b| b.area.abs().partial_cmp(&a.area.abs()).unwrap());
    contours
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ring(pts: &[(f64, f64)]) -> Contour {
        Contour::new(pts.iter().map(|&(x, y)| Point::new(x, y)).collect())
    }

    #[test]
    fn shoelace_signs_track_winding() {
        // clockwise on screen (y down) is positive
        let cw = ring(&[(0.0, 0.0), (4.0, 0.0), (4.0, 4.0), (0.0, 4.0)]);
        assert_eq!(cw.area, 16.0);
        assert!(cw.is_outer());

        let ccw = ring(&[(0.0, 0.0), (0.0, 4.0), (4.0, 4.0), (4.0, 0.0)]);
        assert_eq!(ccw.area, -16.0);
        assert!(!ccw.is_outer());
    }

    #[test]
    fn containment_on_a_square() {
        let c = ring(&[(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0)]);
        assert!(c.contains(Point::new(5.0, 5.0)));
        assert!(!c.contains(Point::new(15.0, 5.0)));
        assert!(!c.contains(Point::new(-1.0, 5.0)));
    }
}
