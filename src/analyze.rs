//! Image analysis: cheap color statistics that recommend a preset before
//! the expensive stages run.

use std::collections::HashMap;

use crate::color::Color;
use crate::config::Preset;
use crate::raster::RasterImage;

/// Histogram bins with fewer samples than this are ignored.
const MIN_BIN_COUNT: u32 = 10;

/// Greedy clustering radius for the first pass.
const CLUSTER_RADIUS: f64 = 25.0;

/// Wider radius used to separate simple/logo/illustration.
const RECLUSTER_RADIUS: f64 = 90.0;

/// The analyzer's verdict: a preset and a palette size to go with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Recommendation {
    pub preset: Preset,
    pub num_colors: u32,
    /// Populated 5-bit histogram bins.
    pub unique_bins: usize,
    /// Greedy cluster count at radius 25.
    pub clusters: usize,
}

/// Inspect the image and recommend a preset.
///
/// Builds a 5-bit-per-channel histogram of opaque pixels, drops sparse
/// bins, greedy-clusters the rest, and classifies from the counts.
pub fn analyze(image: &RasterImage) -> Recommendation {
    let mut bins: HashMap<u32, u32> = HashMap::new();
    for idx in 0..image.pixel_count() {
        if !image.is_opaque(idx) {
            continue;
        }
        let c = image.color_at(idx);
        let key = ((c.r as u32 & !7) << 16) | ((c.g as u32 & !7) << 8) | (c.b as u32 & !7);
        *bins.entry(key).or_insert(0) += 1;
    }

    let mut populated: Vec<(u32, u32)> = bins
        .into_iter()
        .filter(|&(_, count)| count >= MIN_BIN_COUNT)
        .collect();
    // Heaviest-first, key-tiebroken: greedy clustering must not depend on
    // hash iteration order.
    populated.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    let colors: Vec<Color> = populated
        .iter()
        .map(|&(key, _)| Color::new((key >> 16) as u8, (key >> 8) as u8, key as u8))
        .collect();

    let unique = colors.len();
    let clusters = greedy_cluster_count(&colors, CLUSTER_RADIUS);
    let variety = unique as f64 / clusters.max(1) as f64;

    let preset = if clusters <= 4 {
        Preset::Lineart
    } else if unique < 256 && clusters < 64 && variety < 3.0 {
        Preset::Pixel
    } else if unique > 5000 && clusters > 100 {
        Preset::Photo
    } else if clusters < 64 {
        // Ambiguous middle ground: widen the radius so shading variants
        // collapse into their parent color, then bracket.
        bracket(greedy_cluster_count(&colors, RECLUSTER_RADIUS))
    } else {
        bracket(clusters)
    };

    let num_colors = match preset {
        Preset::Lineart => 2,
        Preset::Pixel => (clusters as u32).clamp(2, 64),
        Preset::Simple => 8,
        Preset::Logo => 12,
        Preset::Illustration => 24,
        Preset::Photo => 32,
    };

    Recommendation {
        preset,
        num_colors,
        unique_bins: unique,
        clusters,
    }
}

fn bracket(clusters: usize) -> Preset {
    if clusters <= 8 {
        Preset::Simple
    } else if clusters <= 32 {
        Preset::Logo
    } else {
        Preset::Illustration
    }
}

/// Greedy clustering: colors join the first existing cluster whose seed is
/// within `radius`, otherwise they seed a new one. Only the count matters.
fn greedy_cluster_count(colors: &[Color], radius: f64) -> usize {
    let radius_sq = (radius * radius) as u32;
    let mut seeds: Vec<Color> = Vec::new();
    for &c in colors {
        if !seeds.iter().any(|&s| s.dist_sq(c) <= radius_sq) {
            seeds.push(c);
        }
    }
    seeds.len()
}
