//! Tuning parameters: user-facing option overrides and the concrete
//! per-preset bundles they resolve into.

use std::str::FromStr;

use crate::error::VectorError;

/// Named option bundle tuned for a category of input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preset {
    /// Black strokes on paper: binary threshold, sharp corners.
    Lineart,
    /// Flat-color graphics with a small palette.
    Logo,
    /// Rich flat-color art, moderate palette.
    Illustration,
    /// Continuous-tone input, large palette, heavy smoothing.
    Photo,
    /// Pixel art: nearest-neighbor scaling, straight-edge output.
    Pixel,
    /// Few-color graphics, lighter than logo.
    Simple,
}

impl Preset {
    pub fn tag(self) -> &'static str {
        match self {
            Preset::Lineart => "lineart",
            Preset::Logo => "logo",
            Preset::Illustration => "illustration",
            Preset::Photo => "photo",
            Preset::Pixel => "pixel",
            Preset::Simple => "simple",
        }
    }
}

impl FromStr for Preset {
    type Err = VectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "lineart" => Ok(Preset::Lineart),
            "logo" => Ok(Preset::Logo),
            "illustration" => Ok(Preset::Illustration),
            "photo" => Ok(Preset::Photo),
            "pixel" => Ok(Preset::Pixel),
            "simple" => Ok(Preset::Simple),
            other => Err(VectorError::UnknownPreset(other.to_string())),
        }
    }
}

/// Whether contours are fitted with cubics or emitted as polygons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TraceMode {
    #[default]
    Spline,
    Polygon,
}

/// Selects the contour extraction algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContourMethod {
    /// Marching squares with sub-pixel interpolation on the alpha field.
    /// The normative tracer.
    #[default]
    Marching,
    /// Border following on the binary bitmap. No sub-pixel positions,
    /// but robust on degenerate bitmaps.
    Border,
    /// Marching squares, retrying with border following when marching
    /// finds nothing in a non-empty bitmap.
    Hybrid,
}

impl ContourMethod {
    pub fn name(self) -> &'static str {
        match self {
            ContourMethod::Marching => "marching",
            ContourMethod::Border => "border",
            ContourMethod::Hybrid => "hybrid",
        }
    }
}

/// Caller-supplied overrides. Every field left as `None` takes its value
/// from the resolved preset bundle.
///
/// With no preset and no overrides the image analyzer picks the bundle.
#[derive(Debug, Clone, Default)]
pub struct Options {
    /// Preset bundle to start from. `None` = let the analyzer recommend.
    pub preset: Option<Preset>,
    /// Target palette size, 1–64.
    pub num_colors: Option<u32>,
    /// Palette merge threshold base (RGB units). In binary mode it
    /// biases the luminance threshold instead: the default (25) keeps
    /// pure Otsu, larger values widen the ink class.
    pub color_tolerance: Option<f64>,
    /// Simplifier epsilon and curve-fit error base.
    pub path_tolerance: Option<f64>,
    /// Chaikin iteration count, 0–3.
    pub smoothness: Option<f64>,
    /// Layers with fewer foreground pixels than this are dropped.
    pub min_path_length: Option<usize>,
    /// Force spline fitting or straight-line emission.
    pub mode: Option<TraceMode>,
    /// Force the single-layer luminance path.
    pub binary_mode: Option<bool>,
    /// Gaussian sigma applied to the alpha field.
    pub blur_sigma: Option<f64>,
    /// Apply closing morphology after thresholding.
    pub morphology: Option<bool>,
    /// Contour extraction algorithm.
    pub contour_method: Option<ContourMethod>,
    /// Color-constrained dilation passes (gap filling beyond the stroke).
    pub dilate_pixels: Option<u32>,
}

/// A fully resolved parameter bundle. All pipeline stages read from this.
#[derive(Debug, Clone)]
pub struct Settings {
    pub preset: Preset,
    pub num_colors: u32,
    pub color_tolerance: f64,
    pub path_tolerance: f64,
    pub smoothness: f64,
    pub min_path_length: usize,
    pub mode: TraceMode,
    pub binary_mode: bool,
    pub blur_sigma: f64,
    pub morphology: bool,
    pub contour_method: ContourMethod,
    pub dilate_pixels: u32,
    /// Run the 3x3 mode-filter denoise after classification.
    pub denoise: bool,
    /// Collapse 1-pixel H/V staircases during simplification.
    pub staircase: bool,
    /// Use the wider 140-degree corner threshold.
    pub aggressive_corners: bool,
    /// Connected components smaller than max(4, max_component / ratio)
    /// are removed. 0 disables the pass.
    pub speckle_ratio: f64,
}

impl Settings {
    /// The reference bundle for a preset. These values are normative.
    pub fn for_preset(preset: Preset) -> Settings {
        let base = Settings {
            preset,
            num_colors: 12,
            color_tolerance: 35.0,
            path_tolerance: 1.0,
            smoothness: 1.0,
            min_path_length: 0,
            mode: TraceMode::Spline,
            binary_mode: false,
            blur_sigma: 0.0,
            morphology: false,
            contour_method: ContourMethod::Marching,
            dilate_pixels: 0,
            denoise: true,
            staircase: false,
            aggressive_corners: false,
            speckle_ratio: 2000.0,
        };
        match preset {
            Preset::Lineart => Settings {
                num_colors: 2,
                // the neutral binary-threshold bias: pure Otsu
                color_tolerance: 25.0,
                binary_mode: true,
                staircase: true,
                aggressive_corners: true,
                speckle_ratio: 4000.0,
                ..base
            },
            Preset::Logo => Settings {
                color_tolerance: 45.0,
                morphology: true,
                staircase: true,
                ..base
            },
            Preset::Illustration => Settings {
                num_colors: 24,
                path_tolerance: 1.5,
                smoothness: 2.0,
                blur_sigma: 0.5,
                speckle_ratio: 1000.0,
                ..base
            },
            Preset::Photo => Settings {
                num_colors: 32,
                path_tolerance: 2.0,
                smoothness: 2.0,
                blur_sigma: 1.0,
                speckle_ratio: 500.0,
                ..base
            },
            Preset::Pixel => Settings {
                num_colors: 16,
                path_tolerance: 0.75,
                smoothness: 0.0,
                mode: TraceMode::Polygon,
                denoise: false,
                speckle_ratio: 0.0,
                ..base
            },
            Preset::Simple => Settings {
                num_colors: 8,
                color_tolerance: 45.0,
                morphology: true,
                staircase: true,
                ..base
            },
        }
    }

    /// The merge-threshold family that also swallows anti-aliasing grays.
    pub(crate) fn merges_neutrals(&self) -> bool {
        matches!(
            self.preset,
            Preset::Logo | Preset::Simple | Preset::Lineart
        )
    }
}

impl Options {
    /// Shorthand for a pure preset run.
    pub fn for_preset(preset: Preset) -> Options {
        Options {
            preset: Some(preset),
            ..Options::default()
        }
    }

    /// Merge the overrides into `preset`'s bundle and range-check them.
    pub(crate) fn resolve(&self, preset: Preset) -> Result<Settings, VectorError> {
        let mut s = Settings::for_preset(preset);
        if let Some(v) = self.num_colors {
            if !(1..=64).contains(&v) {
                return Err(VectorError::InvalidOption {
                    name: "numColors",
                    value: v as f64,
                    limits: "1..=64",
                });
            }
            s.num_colors = v;
        }
        if let Some(v) = self.color_tolerance {
            if !(v > 0.0) {
                return Err(VectorError::InvalidOption {
                    name: "colorTolerance",
                    value: v,
                    limits: "> 0",
                });
            }
            s.color_tolerance = v;
        }
        if let Some(v) = self.path_tolerance {
            if !(v > 0.0) {
                return Err(VectorError::InvalidOption {
                    name: "pathTolerance",
                    value: v,
                    limits: "> 0",
                });
            }
            s.path_tolerance = v;
        }
        if let Some(v) = self.smoothness {
            if !(0.0..=3.0).contains(&v) {
                return Err(VectorError::InvalidOption {
                    name: "smoothness",
                    value: v,
                    limits: "0..=3",
                });
            }
            s.smoothness = v;
        }
        if let Some(v) = self.blur_sigma {
            if !(v >= 0.0) {
                return Err(VectorError::InvalidOption {
                    name: "blurSigma",
                    value: v,
                    limits: ">= 0",
                });
            }
            s.blur_sigma = v;
        }
        if let Some(v) = self.min_path_length {
            s.min_path_length = v;
        }
        if let Some(v) = self.mode {
            s.mode = v;
        }
        if let Some(v) = self.binary_mode {
            s.binary_mode = v;
        }
        if let Some(v) = self.morphology {
            s.morphology = v;
        }
        if let Some(v) = self.contour_method {
            s.contour_method = v;
        }
        if let Some(v) = self.dilate_pixels {
            s.dilate_pixels = v;
        }
        Ok(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preset_tags_round_trip() {
        for p in [
            Preset::Lineart,
            Preset::Logo,
            Preset::Illustration,
            Preset::Photo,
            Preset::Pixel,
            Preset::Simple,
        ] {
            assert_eq!(p.tag().parse::<Preset>().unwrap(), p);
        }
    }

    #[test]
    fn unknown_preset_rejected() {
        assert!(matches!(
            "watercolor".parse::<Preset>(),
            Err(VectorError::UnknownPreset(_))
        ));
    }

    #[test]
    fn overrides_win_over_bundle() {
        let opts = Options {
            preset: Some(Preset::Logo),
            num_colors: Some(4),
            smoothness: Some(3.0),
            ..Options::default()
        };
        let s = opts.resolve(Preset::Logo).unwrap();
        assert_eq!(s.num_colors, 4);
        assert_eq!(s.smoothness, 3.0);
        // untouched fields come from the bundle
        assert!(s.morphology);
        assert_eq!(s.color_tolerance, 45.0);
    }

    #[test]
    fn out_of_range_option_is_fatal() {
        let opts = Options {
            num_colors: Some(65),
            ..Options::default()
        };
        assert!(matches!(
            opts.resolve(Preset::Logo),
            Err(VectorError::InvalidOption { name: "numColors", .. })
        ));
    }
}
