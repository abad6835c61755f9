//! Per-color layer construction: a binary membership bitmap plus a
//! continuous alpha field that locates sub-pixel boundaries between a
//! palette color and its nearest competitor.

use image::{GrayImage, Luma};
use imageproc::contrast::otsu_level;
use imageproc::distance_transform::Norm;
use imageproc::morphology::close;
use imageproc::region_labelling::{connected_components, Connectivity};

use crate::classify::TRANSPARENT;
use crate::color::Color;
use crate::config::Settings;
use crate::raster::RasterImage;

/// Fraction of opaque pixels below the threshold that flips the binary
/// path to white-on-black.
const AUTO_INVERT_SHARE: f64 = 0.4;

/// The color tolerance at which the binary threshold is pure Otsu.
/// Higher tolerances widen the ink class, lower ones narrow it.
const BINARY_TOLERANCE_BASELINE: f64 = 25.0;

/// One palette color's working buffers.
#[derive(Debug, Clone)]
pub struct LayerField {
    /// 255 where the pixel belongs to the layer, 0 elsewhere.
    pub bitmap: GrayImage,
    /// Low = strongly this color, high = strongly another. The 128 level
    /// is the perceptual boundary the tracer interpolates against.
    pub alpha: GrayImage,
    /// Foreground pixels after cleanup.
    pub pixel_count: usize,
}

/// Build the bitmap and alpha field for palette entry `index`.
pub fn build_color_layer(
    image: &RasterImage,
    map: &[u8],
    palette: &[Color],
    index: usize,
    settings: &Settings,
) -> LayerField {
    let (w, h) = (image.width(), image.height());
    let own = palette[index];

    let mut bitmap = GrayImage::new(w, h);
    let mut alpha = GrayImage::new(w, h);

    for idx in 0..image.pixel_count() {
        let x = (idx as u32) % w;
        let y = (idx as u32) / w;
        if map[idx] == index as u8 {
            bitmap.put_pixel(x, y, Luma([255]));
        }
        let a = if map[idx] == TRANSPARENT {
            255
        } else {
            membership_alpha(image.color_at(idx), own, palette, index)
        };
        alpha.put_pixel(x, y, Luma([a]));
    }

    if settings.blur_sigma > 0.0 {
        // Color alpha blur stays subtle; larger sigmas belong to the
        // binary path.
        let sigma = settings.blur_sigma.min(1.0) as f32;
        alpha = imageproc::filter::gaussian_blur_f32(&alpha, sigma);
    }

    finish(bitmap, alpha, Some(map), settings)
}

/// Build the single luminance layer used in binary mode.
///
/// The grayscale is shifted so the class boundary lands exactly on the
/// 128 crossing the tracer uses, and flipped first when the image is
/// mostly dark (white-on-black input). The boundary itself is the Otsu
/// level biased by the color tolerance relative to its default, so the
/// knob widens or narrows the ink class.
pub fn build_binary_layer(image: &RasterImage, settings: &Settings) -> LayerField {
    let mut gray = image.luminance_image();
    if settings.blur_sigma > 0.0 {
        gray = imageproc::filter::gaussian_blur_f32(&gray, settings.blur_sigma as f32);
    }

    // Dark class is g <= level (imageproc convention: foreground above
    // the level). A crisp black/white image can yield level 0.
    let mut level = otsu_level(&gray);
    let opaque: Vec<usize> = (0..image.pixel_count())
        .filter(|&i| image.is_opaque(i))
        .collect();
    if !opaque.is_empty() {
        let dark = opaque
            .iter()
            .filter(|&&i| gray.as_raw()[i] <= level)
            .count();
        if dark as f64 / opaque.len() as f64 > AUTO_INVERT_SHARE {
            for p in gray.pixels_mut() {
                p.0[0] = 255 - p.0[0];
            }
            level = 254u8.saturating_sub(level);
        }
    }

    // The tolerance bias moves the boundary off Otsu: at the default it
    // is a no-op.
    let bias = (settings.color_tolerance - BINARY_TOLERANCE_BASELINE).round() as i32;
    let level = (level as i32 + bias).clamp(0, 255);

    // Shift so the class boundary sits on the tracer's 128 crossing:
    // foreground (g <= level) maps below 128, background above.
    let (w, h) = gray.dimensions();
    let mut bitmap = GrayImage::new(w, h);
    let mut alpha = GrayImage::new(w, h);
    for y in 0..h {
        for x in 0..w {
            let g = gray.get_pixel(x, y).0[0] as i32;
            let shifted = (g - level + 127).clamp(0, 255) as u8;
            alpha.put_pixel(x, y, Luma([shifted]));
            if shifted < 128 {
                bitmap.put_pixel(x, y, Luma([255]));
            }
        }
    }

    finish(bitmap, alpha, None, settings)
}

/// Shared cleanup: speckle removal, closing, constrained dilation.
fn finish(
    mut bitmap: GrayImage,
    alpha: GrayImage,
    map: Option<&[u8]>,
    settings: &Settings,
) -> LayerField {
    if settings.speckle_ratio > 0.0 {
        remove_small_components(&mut bitmap, settings.speckle_ratio);
    }
    if settings.morphology {
        // Closing only: dilate then erode on the 4-neighborhood. Opening
        // would eat thin strokes.
        bitmap = close(&bitmap, Norm::L1, 1);
    }
    if settings.dilate_pixels > 0 {
        if let Some(map) = map {
            constrained_dilate(&mut bitmap, map, settings.dilate_pixels);
        }
    }

    let pixel_count = bitmap.pixels().filter(|p| p.0[0] != 0).count();
    LayerField {
        bitmap,
        alpha,
        pixel_count,
    }
}

/// Alpha from the distance ratio between the own color and the nearest
/// alternative: t = sqrt(d / (d + d_other)), smoothstepped to 0..255.
#[inline]
fn membership_alpha(pixel: Color, own: Color, palette: &[Color], index: usize) -> u8 {
    let d_own = pixel.dist(own);
    let mut d_other = f64::INFINITY;
    for (j, &p) in palette.iter().enumerate() {
        if j != index {
            d_other = d_other.min(pixel.dist(p));
        }
    }
    if !d_other.is_finite() {
        return 0; // single-color palette: everything is strongly "own"
    }
    let total = d_own + d_other;
    if total < 1e-9 {
        return 0;
    }
    let t = (d_own / total).sqrt();
    let s = 3.0 * t * t - 2.0 * t * t * t;
    (s * 255.0).round().clamp(0.0, 255.0) as u8
}

/// Remove connected components smaller than max(4, max_component / ratio).
fn remove_small_components(bitmap: &mut GrayImage, ratio: f64) {
    let labels = connected_components(bitmap, Connectivity::Four, Luma([0u8]));
    let mut sizes: Vec<usize> = Vec::new();
    for p in labels.pixels() {
        let l = p.0[0] as usize;
        if l == 0 {
            continue;
        }
        if l >= sizes.len() {
            sizes.resize(l + 1, 0);
        }
        sizes[l] += 1;
    }
    let max_size = sizes.iter().copied().max().unwrap_or(0);
    if max_size == 0 {
        return;
    }
    let threshold = ((max_size as f64 / ratio).floor() as usize).max(4);

    let (w, h) = bitmap.dimensions();
    for y in 0..h {
        for x in 0..w {
            let l = labels.get_pixel(x, y).0[0] as usize;
            if l != 0 && sizes[l] < threshold {
                bitmap.put_pixel(x, y, Luma([0]));
            }
        }
    }
}

/// Dilate the bitmap, but only into pixels the classifier assigned to
/// some color. Gap filling must never grow into transparency.
fn constrained_dilate(bitmap: &mut GrayImage, map: &[u8], passes: u32) {
    let (w, h) = bitmap.dimensions();
    for _ in 0..passes {
        let src = bitmap.clone();
        for y in 0..h {
            for x in 0..w {
                if src.get_pixel(x, y).0[0] != 0 {
                    continue;
                }
                let idx = (y * w + x) as usize;
                if map[idx] == TRANSPARENT {
                    continue;
                }
                let neighbor_set = (x > 0 && src.get_pixel(x - 1, y).0[0] != 0)
                    || (x + 1 < w && src.get_pixel(x + 1, y).0[0] != 0)
                    || (y > 0 && src.get_pixel(x, y - 1).0[0] != 0)
                    || (y + 1 < h && src.get_pixel(x, y + 1).0[0] != 0);
                if neighbor_set {
                    bitmap.put_pixel(x, y, Luma([255]));
                }
            }
        }
    }
}
