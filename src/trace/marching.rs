//! Marching-squares tracer with sub-pixel interpolation on the alpha
//! field.
//!
//! The bitmap decides cell topology; the alpha field positions each edge
//! crossing. Cells run over x in [-1, W) and y in [-1, H) so contours
//! touching the image edge close along a virtual all-background border.

use kurbo::Point;

use crate::layer::LayerField;

use super::Contour;

/// Cell edges. Opposite edge is `edge ^ 2`.
const TOP: u8 = 0;
const RIGHT: u8 = 1;
const BOTTOM: u8 = 2;
const LEFT: u8 = 3;

/// Interpolation clamp: crossings stay inside the middle 80% of an edge.
const T_MIN: f64 = 0.1;
const T_MAX: f64 = 0.9;

/// Trace all contours of the layer.
///
/// Walk convention: foreground stays left of the travel direction, which
/// makes outer boundaries clockwise on screen (positive shoelace area
/// with y down) and holes counter-clockwise (negative).
pub fn trace(field: &LayerField) -> Vec<Contour> {
    let (w, h) = field.bitmap.dimensions();
    let grid = Grid {
        field,
        w: w as i32,
        h: h as i32,
    };

    // One visited slot per (cell, out-edge).
    let cells_w = grid.w as usize + 1;
    let cells_h = grid.h as usize + 1;
    let mut visited = vec![false; cells_w * cells_h * 4];
    let key = |cx: i32, cy: i32, edge: u8| -> usize {
        (((cy + 1) as usize * cells_w) + (cx + 1) as usize) * 4 + edge as usize
    };

    let mut contours = Vec::new();
    let step_budget = 4 * cells_w * cells_h;

    for cy in -1..grid.h {
        for cx in -1..grid.w {
            let cfg = grid.config(cx, cy);
            if cfg == 0 || cfg == 15 {
                continue;
            }
            for in_edge in [TOP, RIGHT, BOTTOM, LEFT] {
                let Some(out_edge) = transition(cfg, in_edge) else {
                    continue;
                };
                if visited[key(cx, cy, out_edge)] {
                    continue;
                }
                if let Some(points) =
                    walk(&grid, cx, cy, in_edge, &mut visited, key, step_budget)
                {
                    if points.len() >= 3 {
                        contours.push(Contour::new(points));
                    }
                }
            }
        }
    }
    contours
}

/// Follow one loop from its first cell until it closes.
fn walk(
    grid: &Grid,
    start_cx: i32,
    start_cy: i32,
    start_in: u8,
    visited: &mut [bool],
    key: impl Fn(i32, i32, u8) -> usize,
    step_budget: usize,
) -> Option<Vec<Point>> {
    let mut points = Vec::new();
    let mut cx = start_cx;
    let mut cy = start_cy;
    let mut in_edge = start_in;

    for _ in 0..step_budget {
        let cfg = grid.config(cx, cy);
        let out_edge = transition(cfg, in_edge)?;
        let k = key(cx, cy, out_edge);
        if visited[k] {
            // Back at the start (or a previously traced loop): done.
            return Some(points);
        }
        visited[k] = true;
        points.push(grid.edge_point(cx, cy, out_edge));

        match out_edge {
            TOP => cy -= 1,
            RIGHT => cx += 1,
            BOTTOM => cy += 1,
            LEFT => cx -= 1,
            _ => unreachable!(),
        }
        in_edge = out_edge ^ 2;
    }
    None
}

/// The 14-entry transition table: which edge a loop leaves through, given
/// the edge it entered through. Saddle configurations 5 and 10 carry two
/// disjoint segments and therefore two entries.
fn transition(config: u8, in_edge: u8) -> Option<u8> {
    Some(match (config, in_edge) {
        (1, LEFT) => BOTTOM,
        (2, BOTTOM) => RIGHT,
        (3, LEFT) => RIGHT,
        (4, RIGHT) => TOP,
        (5, LEFT) => BOTTOM,
        (5, RIGHT) => TOP,
        (6, BOTTOM) => TOP,
        (7, LEFT) => TOP,
        (8, TOP) => LEFT,
        (9, TOP) => BOTTOM,
        (10, TOP) => LEFT,
        (10, BOTTOM) => RIGHT,
        (11, TOP) => RIGHT,
        (12, RIGHT) => LEFT,
        (13, RIGHT) => BOTTOM,
        (14, BOTTOM) => LEFT,
        _ => return None,
    })
}

struct Grid<'a> {
    field: &'a LayerField,
    w: i32,
    h: i32,
}

impl Grid<'_> {
    /// Foreground sample; off-image reads as background.
    #[inline]
    fn inside(&self, x: i32, y: i32) -> bool {
        x >= 0
            && x < self.w
            && y >= 0
            && y < self.h
            && self.field.bitmap.get_pixel(x as u32, y as u32).0[0] != 0
    }

    /// Alpha sample; off-image reads as strongly-background.
    #[inline]
    fn gray(&self, x: i32, y: i32) -> f64 {
        if x >= 0 && x < self.w && y >= 0 && y < self.h {
            self.field.alpha.get_pixel(x as u32, y as u32).0[0] as f64
        } else {
            255.0
        }
    }

    /// Cell configuration: TL*8 + TR*4 + BR*2 + BL*1.
    fn config(&self, cx: i32, cy: i32) -> u8 {
        let mut cfg = 0u8;
        if self.inside(cx, cy) {
            cfg |= 8;
        }
        if self.inside(cx + 1, cy) {
            cfg |= 4;
        }
        if self.inside(cx + 1, cy + 1) {
            cfg |= 2;
        }
        if self.inside(cx, cy + 1) {
            cfg |= 1;
        }
        cfg
    }

    /// Interpolated crossing point on a cell edge.
    fn edge_point(&self, cx: i32, cy: i32, edge: u8) -> Point {
        let (g1, g2) = match edge {
            TOP => (self.gray(cx, cy), self.gray(cx + 1, cy)),
            RIGHT => (self.gray(cx + 1, cy), self.gray(cx + 1, cy + 1)),
            BOTTOM => (self.gray(cx, cy + 1), self.gray(cx + 1, cy + 1)),
            LEFT => (self.gray(cx, cy), self.gray(cx, cy + 1)),
            _ => unreachable!(),
        };
        let t = interpolate(g1, g2);
        let (fx, fy) = (cx as f64, cy as f64);
        match edge {
            TOP => Point::new(fx + t, fy),
            RIGHT => Point::new(fx + 1.0, fy + t),
            BOTTOM => Point::new(fx + t, fy + 1.0),
            LEFT => Point::new(fx, fy + t),
            _ => unreachable!(),
        }
    }
}

/// Linear interpolation of the 128 crossing between two alpha samples.
#[inline]
fn interpolate(g1: f64, g2: f64) -> f64 {
    if (g2 - g1).abs() < 1.0 {
        0.5
    } else {
        ((128.0 - g1) / (g2 - g1)).clamp(T_MIN, T_MAX)
    }
}
