//! colortrace: layered color raster → vector (SVG) tracing.
//!
//! Takes an RGBA image and produces a stack of filled closed paths, one
//! layer per palette color, approximating the input with smooth cubics
//! and sharp corners where the shapes have them.
//!
//! # Example
//!
//! ```no_run
//! use colortrace::{vectorize_with_preset, RasterImage};
//!
//! # let (width, height, rgba_bytes) = (2u32, 2u32, vec![0u8; 16]);
//! let image = RasterImage::new(width, height, rgba_bytes)?;
//! let result = vectorize_with_preset(&image, "logo")?;
//! std::fs::write("out.svg", &result.svg)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! The pipeline: palette construction (weighted K-Means++), per-pixel
//! classification with mode-filter denoise, per-color binary layers with
//! a sub-pixel alpha field, marching-squares contour extraction,
//! simplification, corner detection, Chaikin smoothing, and cubic Bézier
//! fitting with handle retraction.

#![forbid(unsafe_code)]

mod analyze;
mod classify;
mod color;
mod config;
mod corners;
mod error;
mod fit;
mod layer;
mod palette;
mod pipeline;
mod raster;
mod simplify;
mod smooth;
mod svg;
mod trace;

use std::str::FromStr;
use std::sync::atomic::AtomicBool;

// Re-export kurbo so downstream users share the path types.
pub use kurbo;

pub use analyze::{analyze, Recommendation};
pub use color::Color;
pub use config::{ContourMethod, Options, Preset, Settings, TraceMode};
pub use error::VectorError;
pub use raster::RasterImage;
pub use svg::{FillRule, Layer, PathData, VectorResult};

/// Vectorize an image with explicit options.
///
/// With `options.preset == None` the image analyzer recommends a preset
/// (demoting "photo" to "illustration"; ask for photo explicitly if you
/// want it).
///
/// # Errors
///
/// Only invalid input fails: zero dimensions, a mismatched buffer, an
/// unknown preset tag, or an out-of-range option. Degenerate images
/// (fully transparent, single color) return a valid, possibly
/// background-only result.
pub fn vectorize(image: &RasterImage, options: &Options) -> Result<VectorResult, VectorError> {
    static NEVER: AtomicBool = AtomicBool::new(false);
    pipeline::run(image, options, &NEVER)
}

/// Vectorize with a named preset bundle: `"lineart"`, `"logo"`,
/// `"illustration"`, `"photo"`, `"pixel"`, or `"simple"`.
pub fn vectorize_with_preset(
    image: &RasterImage,
    preset_tag: &str,
) -> Result<VectorResult, VectorError> {
    let preset = Preset::from_str(preset_tag)?;
    vectorize(image, &Options::for_preset(preset))
}

/// Vectorize with a cancellation flag.
///
/// The flag is checked between pipeline stages and between palette
/// indices; raising it makes the call return [`VectorError::Cancelled`]
/// and discards partial results.
pub fn vectorize_cancellable(
    image: &RasterImage,
    options: &Options,
    cancel: &AtomicBool,
) -> Result<VectorResult, VectorError> {
    pipeline::run(image, options, cancel)
}
