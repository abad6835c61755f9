//! Pipeline coordination: preset resolution, upscaling, palette and
//! classification, the per-layer loop, and the global filters.
//!
//! Layer work is embarrassingly parallel — every layer reads the shared
//! map/palette/image and writes only its own buffers — so the per-index
//! loop runs on rayon. Emission order stays palette order regardless.

use std::sync::atomic::{AtomicBool, Ordering};

use log::debug;
use rayon::prelude::*;

use crate::analyze;
use crate::classify;
use crate::color::Color;
use crate::config::{Options, Preset, Settings};
use crate::error::VectorError;
use crate::fit;
use crate::layer::{self, LayerField};
use crate::palette;
use crate::raster::RasterImage;
use crate::svg::{self, FillRule, Layer, PathData, VectorResult};
use crate::trace::{self, Contour};

/// Fragmented-layer drop (logo/lineart): all three must hold.
const FRAGMENT_TOTAL_SHARE: f64 = 0.005;
const FRAGMENT_MAX_AREA: f64 = 300.0;
const FRAGMENT_MIN_COUNT: usize = 10;

/// Run the full pipeline.
pub fn run(
    image: &RasterImage,
    options: &Options,
    cancel: &AtomicBool,
) -> Result<VectorResult, VectorError> {
    let preset = match options.preset {
        Some(p) => p,
        None => {
            let rec = analyze::analyze(image);
            // Continuous-tone handling is expensive and rarely what a
            // caller wants implicitly; photo stays opt-in.
            let chosen = if rec.preset == Preset::Photo {
                Preset::Illustration
            } else {
                rec.preset
            };
            debug!(
                "analyzer: {} bins, {} clusters -> {}",
                rec.unique_bins,
                rec.clusters,
                chosen.tag()
            );
            chosen
        }
    };
    let settings = options.resolve(preset)?;
    check(cancel)?;

    let scale = image.upscale_factor();
    let work = image.upscale(scale, settings.preset == Preset::Pixel);
    let (work_w, work_h) = (work.width(), work.height());
    let scale_f = scale as f64;
    check(cancel)?;

    // Degenerate input: nothing opaque -> background-only document.
    if work.opaque_count() == 0 {
        return Ok(finish(image, work_w, work_h, Vec::new(), vec![], &settings, false));
    }

    // Degenerate input: one solid color -> one full-canvas path.
    if let Some(color) = solid_color(&work) {
        let layer = full_canvas_layer(color, work_w, work_h, &settings);
        return Ok(finish(
            image,
            work_w,
            work_h,
            vec![layer],
            vec![color],
            &settings,
            false,
        ));
    }

    let binary = settings.binary_mode
        || settings.num_colors <= 2
        || settings.preset == Preset::Lineart;

    let noise_floor = noise_floor(&settings, image.pixel_count() as f64);

    let (colors, fields) = if binary {
        let field = layer::build_binary_layer(&work, &settings);
        check(cancel)?;
        (vec![Color::BLACK], vec![field])
    } else {
        let colors = palette::build(&work, &settings);
        check(cancel)?;
        let mut map = classify::classify(&work, &colors);
        if settings.denoise && settings.preset != Preset::Pixel {
            classify::denoise(&mut map, work_w, work_h, colors.len());
        }
        check(cancel)?;

        let fields = (0..colors.len())
            .into_par_iter()
            .map(|i| {
                check(cancel)?;
                Ok(layer::build_color_layer(&work, &map, &colors, i, &settings))
            })
            .collect::<Result<Vec<_>, VectorError>>()?;
        (colors, fields)
    };
    check(cancel)?;

    let src_area = image.pixel_count() as f64;
    let work_area = (work_w as f64) * (work_h as f64);
    let mut layers: Vec<Layer> = colors
        .par_iter()
        .zip(fields.par_iter())
        .map(|(&color, field)| {
            check(cancel)?;
            Ok(assemble_layer(
                color,
                field,
                &settings,
                binary,
                noise_floor,
                scale_f,
                src_area,
                work_area,
            ))
        })
        .collect::<Result<Vec<Option<Layer>>, VectorError>>()?
        .into_iter()
        .flatten()
        .collect();
    check(cancel)?;

    apply_small_layer_filter(&mut layers, &settings, scale_f);
    debug!(
        "pipeline: {} palette colors, {} layers emitted",
        colors.len(),
        layers.len()
    );

    Ok(finish(image, work_w, work_h, layers, colors, &settings, binary))
}

fn check(cancel: &AtomicBool) -> Result<(), VectorError> {
    if cancel.load(Ordering::Relaxed) {
        Err(VectorError::Cancelled)
    } else {
        Ok(())
    }
}

/// Per-preset contour area floor, in source-pixel units.
fn noise_floor(settings: &Settings, src_area: f64) -> f64 {
    match settings.preset {
        Preset::Pixel => 1.0,
        Preset::Logo => (src_area * 0.001).clamp(25.0, 200.0),
        _ => (src_area * 0.0001).clamp(4.0, 50.0),
    }
}

/// The color of the whole image, if it only has one and no transparency.
fn solid_color(image: &RasterImage) -> Option<Color> {
    let n = image.pixel_count();
    if !image.is_opaque(0) {
        return None;
    }
    let first = image.color_at(0);
    for idx in 1..n {
        if !image.is_opaque(idx) || image.color_at(idx) != first {
            return None;
        }
    }
    Some(first)
}

fn full_canvas_layer(color: Color, w: u32, h: u32, settings: &Settings) -> Layer {
    let pts = [
        kurbo::Point::new(0.0, 0.0),
        kurbo::Point::new(w as f64, 0.0),
        kurbo::Point::new(w as f64, h as f64),
        kurbo::Point::new(0.0, h as f64),
    ];
    let path = fit::polygon_path(&pts);
    Layer {
        color,
        paths: vec![PathData {
            d: svg::bezpath_to_d(&path),
            fill: color,
            fill_rule: FillRule::NonZero,
            gap_stroke: settings.preset != Preset::Pixel,
            area: (w as f64) * (h as f64),
            bbox: svg::path_bbox(&path),
        }],
        pixel_count: (w as usize) * (h as usize),
    }
}

/// Build one layer: trace, filter noise, attach holes, fit, serialize.
#[allow(clippy::too_many_arguments)]
fn assemble_layer(
    color: Color,
    field: &LayerField,
    settings: &Settings,
    binary: bool,
    noise_floor: f64,
    scale: f64,
    src_area: f64,
    work_area: f64,
) -> Option<Layer> {
    if field.pixel_count == 0 || field.pixel_count < settings.min_path_length {
        return None;
    }

    let contours = trace::trace_layer(field, settings.contour_method);
    if contours.is_empty() {
        return None;
    }

    let norm = scale * scale;
    let mut outers: Vec<Contour> = Vec::new();
    let mut holes: Vec<Contour> = Vec::new();
    for c in contours {
        let area_src = c.area.abs() / norm;
        if c.is_outer() {
            // Canvas-scale shapes are background, never speckle; smaller
            // contours must clear the floor.
            let canvas_scale = c.bounding_box().area() >= 0.5 * work_area;
            if canvas_scale || area_src >= noise_floor {
                outers.push(c);
            }
        } else if area_src >= noise_floor / 2.0 {
            holes.push(c);
        }
    }
    if outers.is_empty() {
        return None;
    }

    // Fragmented layers are classification shrapnel on flat-color input.
    if matches!(settings.preset, Preset::Logo | Preset::Lineart) {
        let areas: Vec<f64> = outers.iter().map(|c| c.area.abs() / norm).collect();
        let total: f64 = areas.iter().sum();
        let max = areas.iter().cloned().fold(0.0, f64::max);
        if total < FRAGMENT_TOTAL_SHARE * src_area
            && max < FRAGMENT_MAX_AREA
            && outers.len() > FRAGMENT_MIN_COUNT
        {
            return None;
        }
    }

    // Attach each hole to the smallest outer that contains it.
    let mut grouped: Vec<Vec<Contour>> = vec![Vec::new(); outers.len()];
    for hole in holes {
        let probe = hole.points[0];
        let owner = outers
            .iter()
            .enumerate()
            .filter(|(_, o)| o.contains(probe))
            .min_by(|a, b| a.1.area.partial_cmp(&b.1.area).unwrap())
            .map(|(i, _)| i);
        if let Some(i) = owner {
            grouped[i].push(hole);
        }
    }

    let fill_rule = if binary {
        FillRule::EvenOdd
    } else {
        FillRule::NonZero
    };
    let gap_stroke = settings.preset != Preset::Pixel;

    let mut paths = Vec::with_capacity(outers.len());
    for (outer, outer_holes) in outers.iter().zip(&grouped) {
        let outer_path = fit::contour_to_path(outer, settings, noise_floor, scale);
        if outer_path.elements().is_empty() {
            continue;
        }
        let mut d = svg::bezpath_to_d(&outer_path);
        let mut bbox = svg::path_bbox(&outer_path);
        let mut area = outer.area.abs();
        for hole in outer_holes {
            let hole_path = fit::contour_to_path(hole, settings, noise_floor, scale);
            if hole_path.elements().is_empty() {
                continue;
            }
            d.push(' ');
            d.push_str(&svg::bezpath_to_d(&hole_path));
            area = (area - hole.area.abs()).max(0.0);
            let hb = svg::path_bbox(&hole_path);
            bbox = (
                bbox.0.min(hb.0),
                bbox.1.min(hb.1),
                bbox.2.max(hb.2),
                bbox.3.max(hb.3),
            );
        }
        paths.push(PathData {
            d,
            fill: color,
            fill_rule,
            gap_stroke,
            area,
            bbox,
        });
    }
    if paths.is_empty() {
        return None;
    }

    Some(Layer {
        color,
        paths,
        pixel_count: field.pixel_count,
    })
}

/// Drop layers whose footprint is marginal next to the largest path.
///
/// Bounding boxes come from the structured path geometry, normalized to
/// source units.
fn apply_small_layer_filter(layers: &mut Vec<Layer>, settings: &Settings, scale: f64) {
    if settings.preset == Preset::Pixel || layers.len() <= 1 {
        return;
    }
    let norm = scale * scale;
    let bbox_area = |p: &PathData| ((p.bbox.2 - p.bbox.0) * (p.bbox.3 - p.bbox.1)) / norm;

    let max_area = layers
        .iter()
        .flat_map(|l| l.paths.iter())
        .map(bbox_area)
        .fold(0.0, f64::max);
    if max_area <= 0.0 {
        return;
    }
    let threshold = (max_area / 500.0).clamp(4.0, 100.0);
    layers.retain(|l| l.paths.iter().map(bbox_area).sum::<f64>() >= threshold);
}

/// Assemble the final result. Layers arrive dark to bright.
fn finish(
    image: &RasterImage,
    work_w: u32,
    work_h: u32,
    layers: Vec<Layer>,
    colors: Vec<Color>,
    settings: &Settings,
    binary: bool,
) -> VectorResult {
    // Binary output is ink on paper; everything else sits on its own
    // brightest color.
    let background = if layers.is_empty() || binary {
        Color::WHITE
    } else {
        colors.last().copied().unwrap_or(Color::WHITE)
    };

    let svg_doc = svg::render_document(
        image.width(),
        image.height(),
        work_w,
        work_h,
        background,
        &layers,
    );
    let paths = layers.iter().flat_map(|l| l.paths.iter().cloned()).collect();
    VectorResult {
        svg: svg_doc,
        width: image.width(),
        height: image.height(),
        view_box_width: work_w,
        view_box_height: work_h,
        layers,
        paths,
        colors,
        engine: settings.contour_method.name(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Options;

    #[test]
    fn cancellation_is_observed() {
        let img = RasterImage::new(4, 4, vec![127u8; 64]).unwrap();
        let cancelled = AtomicBool::new(true);
        let err = run(&img, &Options::for_preset(Preset::Logo), &cancelled);
        assert!(matches!(err, Err(VectorError::Cancelled)));
    }

    #[test]
    fn noise_floor_matches_preset_family() {
        let logo = Settings::for_preset(Preset::Logo);
        assert_eq!(noise_floor(&logo, 16.0), 25.0);
        assert_eq!(noise_floor(&logo, 1_000_000.0), 200.0);
        let pixel = Settings::for_preset(Preset::Pixel);
        assert_eq!(noise_floor(&pixel, 123.0), 1.0);
        let photo = Settings::for_preset(Preset::Photo);
        assert_eq!(noise_floor(&photo, 10_000.0), 4.0);
    }

    #[test]
    fn solid_color_detects_uniform_images() {
        let img = RasterImage::new(3, 3, [10u8, 20, 30, 255].repeat(9)).unwrap();
        assert_eq!(solid_color(&img), Some(Color::new(10, 20, 30)));
        let mut data = [10u8, 20, 30, 255].repeat(9);
        data[0] = 11;
        let img2 = RasterImage::new(3, 3, data).unwrap();
        assert_eq!(solid_color(&img2), None);
    }

    #[test]
    fn small_layer_filter_keeps_the_dominant_layer() {
        let big = Layer {
            color: Color::BLACK,
            paths: vec![PathData {
                d: String::new(),
                fill: Color::BLACK,
                fill_rule: FillRule::NonZero,
                gap_stroke: false,
                area: 10_000.0,
                bbox: (0.0, 0.0, 100.0, 100.0),
            }],
            pixel_count: 10_000,
        };
        let tiny = Layer {
            color: Color::WHITE,
            paths: vec![PathData {
                d: String::new(),
                fill: Color::WHITE,
                fill_rule: FillRule::NonZero,
                gap_stroke: false,
                area: 1.0,
                bbox: (0.0, 0.0, 1.0, 1.0),
            }],
            pixel_count: 1,
        };
        let mut layers = vec![big, tiny];
        apply_small_layer_filter(&mut layers, &Settings::for_preset(Preset::Logo), 1.0);
        assert_eq!(layers.len(), 1);
        assert_eq!(layers[0].color, Color::BLACK);
    }
}
