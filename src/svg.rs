//! Vector output types and the SVG serializer.
//!
//! Layers are stored dark to bright (palette order); the document emits
//! them bright to dark so darker shapes paint on top.

use kurbo::{BezPath, PathEl, Point};

use crate::color::Color;

/// SVG fill rule. Even-odd is used for binary/luminance layers, where
/// holes arrive as subpaths of their outer contour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillRule {
    EvenOdd,
    NonZero,
}

impl FillRule {
    pub fn as_str(self) -> &'static str {
        match self {
            FillRule::EvenOdd => "evenodd",
            FillRule::NonZero => "nonzero",
        }
    }
}

/// One rendered path: an outer contour plus any holes it encloses.
#[derive(Debug, Clone)]
pub struct PathData {
    /// SVG path data, 2-decimal coordinates.
    pub d: String,
    pub fill: Color,
    pub fill_rule: FillRule,
    /// Gap-filler stroke: same color as the fill, width 1, round joins.
    pub gap_stroke: bool,
    /// Absolute outer area in working units (holes subtracted).
    pub area: f64,
    /// Bounding box in working units: (min_x, min_y, max_x, max_y).
    pub bbox: (f64, f64, f64, f64),
}

/// One palette color and its paths, in contour emission order.
#[derive(Debug, Clone)]
pub struct Layer {
    pub color: Color,
    pub paths: Vec<PathData>,
    /// Foreground pixels behind this layer, in working units.
    pub pixel_count: usize,
}

/// The complete result of one vectorize invocation.
#[derive(Debug, Clone)]
pub struct VectorResult {
    /// Serialized SVG document.
    pub svg: String,
    /// Source dimensions.
    pub width: u32,
    pub height: u32,
    /// Working (possibly upscaled) dimensions; the SVG viewBox.
    pub view_box_width: u32,
    pub view_box_height: u32,
    /// Layers sorted dark to bright.
    pub layers: Vec<Layer>,
    /// All paths, flattened in layer order.
    pub paths: Vec<PathData>,
    /// The palette, sorted ascending by luminance.
    pub colors: Vec<Color>,
    /// Name of the tracer that produced the contours.
    pub engine: &'static str,
}

/// Format a coordinate with 2 decimal places.
#[inline]
fn fmt(v: f64) -> String {
    format!("{v:.2}")
}

/// Serialize a path to SVG `d` syntax.
pub fn bezpath_to_d(path: &BezPath) -> String {
    let mut d = String::new();
    for el in path.elements() {
        if !d.is_empty() {
            d.push(' ');
        }
        match *el {
            PathEl::MoveTo(p) => {
                d.push_str(&format!("M{},{}", fmt(p.x), fmt(p.y)));
            }
            PathEl::LineTo(p) => {
                d.push_str(&format!("L{},{}", fmt(p.x), fmt(p.y)));
            }
            PathEl::QuadTo(c, p) => {
                d.push_str(&format!(
                    "Q{},{} {},{}",
                    fmt(c.x),
                    fmt(c.y),
                    fmt(p.x),
                    fmt(p.y)
                ));
            }
            PathEl::CurveTo(c1, c2, p) => {
                d.push_str(&format!(
                    "C{},{} {},{} {},{}",
                    fmt(c1.x),
                    fmt(c1.y),
                    fmt(c2.x),
                    fmt(c2.y),
                    fmt(p.x),
                    fmt(p.y)
                ));
            }
            PathEl::ClosePath => d.push('Z'),
        }
    }
    d
}

/// Bounding box over a path's on-curve and control points.
pub fn path_bbox(path: &BezPath) -> (f64, f64, f64, f64) {
    let mut min = Point::new(f64::INFINITY, f64::INFINITY);
    let mut max = Point::new(f64::NEG_INFINITY, f64::NEG_INFINITY);
    let mut grow = |p: Point| {
        min.x = min.x.min(p.x);
        min.y = min.y.min(p.y);
        max.x = max.x.max(p.x);
        max.y = max.y.max(p.y);
    };
    for el in path.elements() {
        match *el {
            PathEl::MoveTo(p) | PathEl::LineTo(p) => grow(p),
            PathEl::QuadTo(c, p) => {
                grow(c);
                grow(p);
            }
            PathEl::CurveTo(c1, c2, p) => {
                grow(c1);
                grow(c2);
                grow(p);
            }
            PathEl::ClosePath => {}
        }
    }
    if min.x > max.x {
        (0.0, 0.0, 0.0, 0.0)
    } else {
        (min.x, min.y, max.x, max.y)
    }
}

/// Assemble the SVG document.
///
/// Source dimensions go on the root element, working dimensions on the
/// viewBox, so the output renders at source size but keeps working-space
/// coordinates. Layers paint bright to dark.
pub fn render_document(
    width: u32,
    height: u32,
    work_w: u32,
    work_h: u32,
    background: Color,
    layers: &[Layer],
) -> String {
    let mut svg = format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{width}\" height=\"{height}\" \
         viewBox=\"0 0 {work_w} {work_h}\">"
    );
    svg.push_str(&format!(
        "<rect width=\"{work_w}\" height=\"{work_h}\" fill=\"{}\"/>",
        background.hex()
    ));

    for layer in layers.iter().rev() {
        for path in &layer.paths {
            svg.push_str(&format!("<path d=\"{}\" fill=\"{}\"", path.d, path.fill.hex()));
            if path.fill_rule == FillRule::EvenOdd {
                svg.push_str(" fill-rule=\"evenodd\"");
            }
            if path.gap_stroke {
                svg.push_str(&format!(
                    " stroke=\"{}\" stroke-width=\"1\" stroke-linejoin=\"round\"",
                    path.fill.hex()
                ));
            }
            svg.push_str("/>");
        }
    }
    svg.push_str("</svg>");
    svg
}

#[cfg(test)]
mod tests {
    use super::*;
    use kurbo::Point;

    #[test]
    fn d_string_uses_two_decimals() {
        let mut path = BezPath::new();
        path.move_to(Point::new(1.0, 2.5));
        path.line_to(Point::new(3.14159, 0.0));
        path.close_path();
        assert_eq!(bezpath_to_d(&path), "M1.00,2.50 L3.14,0.00 Z");
    }

    #[test]
    fn bbox_covers_control_points() {
        let mut path = BezPath::new();
        path.move_to(Point::new(0.0, 0.0));
        path.curve_to(
            Point::new(-5.0, 2.0),
            Point::new(15.0, 8.0),
            Point::new(10.0, 0.0),
        );
        let (x0, y0, x1, y1) = path_bbox(&path);
        assert_eq!((x0, y0), (-5.0, 0.0));
        assert_eq!((x1, y1), (15.0, 8.0));
    }

    #[test]
    fn document_paints_bright_layers_first() {
        let dark = Layer {
            color: Color::BLACK,
            paths: vec![PathData {
                d: "M0,0 Z".into(),
                fill: Color::BLACK,
                fill_rule: FillRule::NonZero,
                gap_stroke: false,
                area: 1.0,
                bbox: (0.0, 0.0, 1.0, 1.0),
            }],
            pixel_count: 1,
        };
        let bright = Layer {
            color: Color::WHITE,
            paths: vec![PathData {
                d: "M5,5 Z".into(),
                fill: Color::WHITE,
                fill_rule: FillRule::NonZero,
                gap_stroke: false,
                area: 1.0,
                bbox: (5.0, 5.0, 6.0, 6.0),
            }],
            pixel_count: 1,
        };
        let svg = render_document(10, 10, 10, 10, Color::WHITE, &[dark, bright]);
        let white_pos = svg.find("#ffffff").unwrap();
        let black_pos = svg.find("fill=\"#000000\"").unwrap();
        assert!(white_pos < black_pos, "bright must be painted before dark");
    }

    #[test]
    fn gap_stroke_attributes_appear_when_requested() {
        let layer = Layer {
            color: Color::BLACK,
            paths: vec![PathData {
                d: "M0,0 Z".into(),
                fill: Color::BLACK,
                fill_rule: FillRule::NonZero,
                gap_stroke: true,
                area: 1.0,
                bbox: (0.0, 0.0, 1.0, 1.0),
            }],
            pixel_count: 1,
        };
        let svg = render_document(4, 4, 4, 4, Color::WHITE, &[layer]);
        assert!(svg.contains("stroke-width=\"1\""));
        assert!(svg.contains("stroke-linejoin=\"round\""));
    }
}
