//! Fallback tracer: border following on the binary bitmap.
//!
//! No sub-pixel interpolation; vertices sit on pixel centers. Useful when
//! the alpha field is unusable or marching squares finds nothing.

use image::GrayImage;
use imageproc::contours::{find_contours, BorderType};
use kurbo::Point;

use super::{signed_area, Contour};

/// Trace pixel-boundary contours, normalizing winding so outer contours
/// carry positive area and holes negative.
pub fn trace(bitmap: &GrayImage) -> Vec<Contour> {
    find_contours::<i32>(bitmap)
        .into_iter()
        .filter(|c| c.points.len() >= 3)
        .map(|c| {
            let mut points: Vec<Point> = c
                .points
                .iter()
                .map(|p| Point::new(p.x as f64, p.y as f64))
                .collect();
            let area = signed_area(&points);
            let want_outer = c.border_type == BorderType::Outer;
            if (area >= 0.0) != want_outer {
                points.reverse();
            }
            Contour::new(points)
        })
        .collect()
}
