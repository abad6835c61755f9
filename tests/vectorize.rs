//! End-to-end pipeline behavior on small synthetic images.

use colortrace::{
    vectorize, vectorize_with_preset, Color, FillRule, Options, Preset, RasterImage, VectorError,
};

fn image(width: u32, height: u32, px: impl Fn(u32, u32) -> [u8; 4]) -> RasterImage {
    let mut data = Vec::with_capacity((4 * width * height) as usize);
    for y in 0..height {
        for x in 0..width {
            data.extend_from_slice(&px(x, y));
        }
    }
    RasterImage::new(width, height, data).unwrap()
}

const BLACK: [u8; 4] = [0, 0, 0, 255];
const WHITE: [u8; 4] = [255, 255, 255, 255];
const RED: [u8; 4] = [255, 0, 0, 255];
const CLEAR: [u8; 4] = [0, 0, 0, 0];

#[test]
fn solid_black_image_yields_one_full_canvas_layer() {
    let img = image(2, 2, |_, _| BLACK);
    let result = vectorize(&img, &Options::default()).unwrap();

    assert_eq!(result.layers.len(), 1);
    assert_eq!(result.layers[0].color, Color::BLACK);
    assert_eq!(result.layers[0].paths.len(), 1);

    // small images upscale: the viewBox exceeds the source size
    assert_eq!(result.width, 2);
    assert!(result.view_box_width > result.width);

    // the single path spans the working canvas
    let path = &result.layers[0].paths[0];
    assert!(path.d.starts_with('M'));
    assert!(path.d.ends_with('Z'));
    let (x0, y0, x1, y1) = path.bbox;
    assert!(x0 <= 0.0 && y0 <= 0.0);
    assert!(x1 >= result.view_box_width as f64);
    assert!(y1 >= result.view_box_height as f64);
}

#[test]
fn fully_transparent_image_yields_background_only() {
    let img = image(16, 16, |_, _| CLEAR);
    let result = vectorize_with_preset(&img, "logo").unwrap();

    assert!(result.layers.is_empty());
    assert!(result.paths.is_empty());
    assert!(result.svg.contains("<rect"));
    assert!(result.svg.contains("#ffffff"));
    assert!(!result.svg.contains("<path"));
}

#[test]
fn checkerboard_is_preserved_under_pixel_preset() {
    let img = image(2, 2, |x, y| if (x + y) % 2 == 0 { BLACK } else { WHITE });
    let result = vectorize_with_preset(&img, "pixel").unwrap();

    assert_eq!(result.layers.len(), 2);
    // dark before bright
    assert!(result.layers[0].color.luminance() < result.layers[1].color.luminance());
    // two disjoint squares per color
    assert_eq!(result.layers[0].paths.len(), 2);
    assert_eq!(result.layers[1].paths.len(), 2);
    // pixel output never carries the gap-filler stroke
    assert!(result.paths.iter().all(|p| !p.gap_stroke));
}

#[test]
fn checkerboard_collapses_to_one_layer_under_logo_preset() {
    let img = image(2, 2, |x, y| if (x + y) % 2 == 0 { BLACK } else { WHITE });
    let result = vectorize_with_preset(&img, "logo").unwrap();
    assert_eq!(
        result.layers.len(),
        1,
        "bilinear upscale + merge should leave one layer, got {:?}",
        result.layers.iter().map(|l| l.color).collect::<Vec<_>>()
    );
}

#[test]
fn pixel_preset_keeps_isolated_pixels_logo_drops_them() {
    let red_at = |x: u32, y: u32| (x, y) == (0, 0) || (x, y) == (2, 0) || (x, y) == (0, 2);
    let img = image(4, 4, |x, y| if red_at(x, y) { RED } else { BLACK });

    let pixel = vectorize_with_preset(&img, "pixel").unwrap();
    assert_eq!(pixel.layers.len(), 2);
    assert_eq!(pixel.layers[0].color, Color::BLACK);
    let red_layer = &pixel.layers[1];
    // channel quantization during sampling may shave the top value
    assert!(red_layer.color.r >= 250 && red_layer.color.g < 10);
    assert_eq!(red_layer.paths.len(), 3, "three separate 1x1 fragments");

    let logo = vectorize_with_preset(&img, "logo").unwrap();
    assert_eq!(logo.layers.len(), 1, "fragments drop under the noise floor");
    // bilinear blending can pull the black centroid slightly off 0
    assert!(logo.layers[0].color.luminance() < 60);
}

#[test]
fn horizontal_gradient_produces_luminance_sorted_bands() {
    let img = image(100, 100, |x, _| {
        let v = (x as f64 / 99.0 * 255.0).round() as u8;
        [v, v, v, 255]
    });
    let result = vectorize_with_preset(&img, "photo").unwrap();

    assert!(
        result.layers.len() >= 4,
        "gradient should split into several bands, got {}",
        result.layers.len()
    );
    // strictly ascending luminance
    for pair in result.layers.windows(2) {
        assert!(pair[0].color.luminance() < pair[1].color.luminance());
    }
    // each band spans (nearly) the full canvas height
    let h = result.view_box_height as f64;
    for layer in &result.layers {
        let top = layer.paths.iter().map(|p| p.bbox.1).fold(f64::INFINITY, f64::min);
        let bottom = layer.paths.iter().map(|p| p.bbox.3).fold(0.0, f64::max);
        assert!(
            bottom - top >= 0.9 * h,
            "band for {:?} spans only {}..{}",
            layer.color,
            top,
            bottom
        );
    }
    // total emitted area is bounded by canvas * palette size
    let canvas = (result.view_box_width * result.view_box_height) as f64;
    let total: f64 = result.paths.iter().map(|p| p.area).sum();
    assert!(total <= canvas * result.colors.len() as f64);
}

#[test]
fn rectangle_outline_traces_as_outer_plus_hole() {
    let on_border = |x: u32, y: u32| {
        let inside = (8..=23).contains(&x) && (8..=23).contains(&y);
        let interior = (9..=22).contains(&x) && (9..=22).contains(&y);
        inside && !interior
    };
    let img = image(32, 32, |x, y| if on_border(x, y) { BLACK } else { WHITE });
    let result = vectorize_with_preset(&img, "lineart").unwrap();

    assert_eq!(result.layers.len(), 1);
    let layer = &result.layers[0];
    assert_eq!(layer.color, Color::BLACK);
    assert_eq!(layer.paths.len(), 1, "ring should be one path with a hole");

    let path = &layer.paths[0];
    assert_eq!(path.fill_rule, FillRule::EvenOdd);
    let subpaths = path.d.matches('M').count();
    assert_eq!(subpaths, 2, "outer boundary plus one hole: {}", path.d);
}

#[test]
fn output_is_deterministic() {
    let img = image(40, 40, |x, y| {
        if (x / 10 + y / 10) % 2 == 0 {
            [200, 40, 30, 255]
        } else {
            [20, 90, 200, 255]
        }
    });
    let a = vectorize_with_preset(&img, "simple").unwrap();
    let b = vectorize_with_preset(&img, "simple").unwrap();
    assert_eq!(a.svg, b.svg);
    assert_eq!(a.colors, b.colors);
}

#[test]
fn svg_document_structure_is_complete() {
    let img = image(10, 10, |x, _| if x < 5 { BLACK } else { WHITE });
    let result = vectorize_with_preset(&img, "simple").unwrap();

    assert!(result.svg.starts_with("<svg"));
    assert!(result.svg.ends_with("</svg>"));
    assert!(result.svg.contains("width=\"10\""));
    assert!(result.svg.contains(&format!(
        "viewBox=\"0 0 {} {}\"",
        result.view_box_width, result.view_box_height
    )));
    // background rect uses the brightest palette color
    assert!(result.svg.contains("<rect"));
}

#[test]
fn min_path_length_drops_sparse_layers() {
    let red_at = |x: u32, y: u32| (x, y) == (0, 0) || (x, y) == (2, 0) || (x, y) == (0, 2);
    let img = image(4, 4, |x, y| if red_at(x, y) { RED } else { BLACK });
    let opts = Options {
        preset: Some(Preset::Pixel),
        min_path_length: Some(usize::MAX),
        ..Options::default()
    };
    let result = vectorize(&img, &opts).unwrap();
    assert!(result.layers.is_empty());
}

#[test]
fn invalid_inputs_are_fatal() {
    assert!(matches!(
        RasterImage::new(3, 3, vec![0u8; 35]),
        Err(VectorError::BufferSize { .. })
    ));

    let img = image(4, 4, |_, _| BLACK);
    assert!(matches!(
        vectorize_with_preset(&img, "sketch"),
        Err(VectorError::UnknownPreset(_))
    ));

    let opts = Options {
        smoothness: Some(9.0),
        ..Options::default()
    };
    assert!(matches!(
        vectorize(&img, &opts),
        Err(VectorError::InvalidOption { .. })
    ));
}

#[test]
fn opaque_pixels_always_classify_into_the_palette() {
    // A mixed image: every opaque pixel must land on some palette entry,
    // visible through complete layer coverage of the canvas area.
    let img = image(30, 30, |x, y| {
        if x < 10 {
            BLACK
        } else if y < 15 {
            [220, 40, 40, 255]
        } else {
            WHITE
        }
    });
    let result = vectorize_with_preset(&img, "simple").unwrap();
    assert!(!result.layers.is_empty());
    assert!(result.colors.len() >= 2);
    // palette sorted ascending by luminance
    for pair in result.colors.windows(2) {
        assert!(pair[0].luminance() <= pair[1].luminance());
    }
}
