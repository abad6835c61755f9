//! Palette construction: weighted K-Means++ over quantized samples,
//! adaptive neighbor merging, and the edge-color filter that discards
//! anti-aliasing artifacts lying between dominant colors.

use std::collections::HashMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::color::Color;
use crate::config::Settings;
use crate::raster::RasterImage;

/// Sampling aims for roughly this many pixels regardless of image size.
const SAMPLE_TARGET: usize = 500_000;

/// Lloyd iteration cap.
const MAX_ROUNDS: usize = 10;

/// Squared center movement below which iteration stops.
const CONVERGED_MOVE_SQ: f64 = 4.0;

/// Fixed roulette seed. Identical input must produce identical output.
const ROULETTE_SEED: u64 = 0x00c0_10f7_aced;

/// Both entries brighter than this qualify for the near-white force merge.
const BRIGHT_MERGE_LEVEL: f64 = 210.0;
const BRIGHT_MERGE_DIST_SQ: f64 = 2500.0;

/// Channels all above this snap the brightest entry to pure white.
const WHITE_SNAP_LEVEL: u8 = 230;

/// Edge-color projection window and distance.
const EDGE_T_MIN: f64 = 0.1;
const EDGE_T_MAX: f64 = 0.9;
const EDGE_PERP_DIST: f64 = 50.0;

/// A palette entry still carrying its sample weight.
#[derive(Debug, Clone, Copy)]
struct Entry {
    color: Color,
    weight: u64,
}

/// Build the palette for an image: sample, cluster, merge, filter.
///
/// Returns at most `settings.num_colors` colors sorted ascending by
/// luminance. An image with no opaque pixels yields a single mid gray.
pub fn build(image: &RasterImage, settings: &Settings) -> Vec<Color> {
    let samples = sample(image);
    if samples.is_empty() {
        return vec![Color::new(128, 128, 128)];
    }

    let k = settings.num_colors as usize;
    let mut entries = cluster(&samples, k);
    merge(&mut entries, settings);
    if settings.num_colors <= 16 {
        filter_edge_colors(&mut entries, settings.num_colors);
    }

    entries.sort_by_key(|e| e.color.luminance());
    entries.iter().map(|e| e.color).collect()
}

// ── Sampling ─────────────────────────────────────────────

/// Collect weighted samples: opaque pixels at a stride targeting ~500k,
/// channels snapped to the nearest even value (7-bit quantization).
fn sample(image: &RasterImage) -> Vec<(Color, u64)> {
    let n = image.pixel_count();
    let stride = n.div_ceil(SAMPLE_TARGET).max(1);

    let mut counts: HashMap<u32, u64> = HashMap::new();
    let mut idx = 0;
    while idx < n {
        if image.is_opaque(idx) {
            let c = image.color_at(idx);
            let key = (quantize(c.r) as u32) << 16
                | (quantize(c.g) as u32) << 8
                | quantize(c.b) as u32;
            *counts.entry(key).or_insert(0) += 1;
        }
        idx += stride;
    }

    let mut samples: Vec<(Color, u64)> = counts
        .into_iter()
        .map(|(key, count)| {
            (
                Color::new((key >> 16) as u8, (key >> 8) as u8, key as u8),
                count,
            )
        })
        .collect();
    // Heaviest first; the full RGB key as tiebreak keeps runs reproducible.
    samples.sort_by(|a, b| {
        b.1.cmp(&a.1)
            .then_with(|| (a.0.r, a.0.g, a.0.b).cmp(&(b.0.r, b.0.g, b.0.b)))
    });
    samples
}

#[inline]
fn quantize(v: u8) -> u8 {
    (((v as u16) + 1) & !1).min(254) as u8
}

// ── Weighted K-Means++ ───────────────────────────────────

/// Seed with K-Means++ and refine with up to [`MAX_ROUNDS`] Lloyd rounds.
fn cluster(samples: &[(Color, u64)], k: usize) -> Vec<Entry> {
    let centers = seed(samples, k);
    lloyd(samples, centers)
}

/// K-Means++ seeding: the heaviest sample first, then roulette draws over
/// D^2 * weight. A failed draw falls back to the farthest point.
fn seed(samples: &[(Color, u64)], k: usize) -> Vec<[f64; 3]> {
    let mut rng = StdRng::seed_from_u64(ROULETTE_SEED);
    let mut centers: Vec<[f64; 3]> = vec![to_f64(samples[0].0)];

    while centers.len() < k && centers.len() < samples.len() {
        let scores: Vec<f64> = samples
            .iter()
            .map(|&(c, w)| nearest_dist_sq(&centers, to_f64(c)) * w as f64)
            .collect();
        let total: f64 = scores.iter().sum();
        if total <= 0.0 {
            break; // every distinct sample is already a center
        }

        let mut draw = rng.gen::<f64>() * total;
        let mut chosen = None;
        for (i, &s) in scores.iter().enumerate() {
            draw -= s;
            if draw <= 0.0 && s > 0.0 {
                chosen = Some(i);
                break;
            }
        }
        // Numerical edge: roulette ran off the end. Take the farthest
        // weighted sample instead.
        let pick = chosen.unwrap_or_else(|| argmax(&scores));
        if scores[pick] <= 0.0 {
            break;
        }
        centers.push(to_f64(samples[pick].0));
    }
    centers
}

/// Lloyd refinement with weighted means. Empty clusters are re-seeded at
/// the farthest weighted sample.
fn lloyd(samples: &[(Color, u64)], mut centers: Vec<[f64; 3]>) -> Vec<Entry> {
    let mut weights = vec![0u64; centers.len()];

    for _ in 0..MAX_ROUNDS {
        let mut sums = vec![[0.0f64; 3]; centers.len()];
        let mut totals = vec![0u64; centers.len()];

        for &(c, w) in samples {
            let p = to_f64(c);
            let i = nearest_index(&centers, p);
            for ch in 0..3 {
                sums[i][ch] += p[ch] * w as f64;
            }
            totals[i] += w;
        }

        // Re-seed clusters that attracted nothing.
        for i in 0..centers.len() {
            if totals[i] == 0 {
                let far = samples
                    .iter()
                    .max_by(|a, b| {
                        let da = nearest_dist_sq(&centers, to_f64(a.0)) * a.1 as f64;
                        let db = nearest_dist_sq(&centers, to_f64(b.0)) * b.1 as f64;
                        da.partial_cmp(&db).unwrap()
                    })
                    .map(|&(c, _)| to_f64(c));
                if let Some(p) = far {
                    centers[i] = p;
                }
            }
        }

        let mut max_move = 0.0f64;
        for i in 0..centers.len() {
            if totals[i] == 0 {
                continue;
            }
            let new = [
                sums[i][0] / totals[i] as f64,
                sums[i][1] / totals[i] as f64,
                sums[i][2] / totals[i] as f64,
            ];
            max_move = max_move.max(dist_sq_f(centers[i], new));
            centers[i] = new;
        }
        weights = totals;
        if max_move <= CONVERGED_MOVE_SQ {
            break;
        }
    }

    centers
        .iter()
        .zip(weights)
        .filter(|&(_, w)| w > 0)
        .map(|(&c, w)| Entry {
            color: from_f64(c),
            weight: w,
        })
        .collect()
}

// ── Post-merge ───────────────────────────────────────────

/// Repeatedly snap the brightest entry toward white and merge the closest
/// pair below its adaptive threshold, until stable.
fn merge(entries: &mut Vec<Entry>, settings: &Settings) {
    loop {
        entries.sort_by_key(|e| e.color.luminance());
        snap_brightest_to_white(entries);

        let Some((i, j, toward_brighter)) = closest_mergeable(entries, settings) else {
            break;
        };
        let (a, b) = (entries[i], entries[j]);
        let merged = if toward_brighter {
            let brighter = if a.color.luminance() >= b.color.luminance() { a } else { b };
            Entry {
                color: brighter.color,
                weight: a.weight + b.weight,
            }
        } else {
            Entry {
                color: weighted_mean(a, b),
                weight: a.weight + b.weight,
            }
        };
        entries.remove(j.max(i));
        entries.remove(j.min(i));
        entries.push(merged);
    }
}

fn snap_brightest_to_white(entries: &mut [Entry]) {
    if let Some(last) = entries.last_mut() {
        let c = last.color;
        if c.r > WHITE_SNAP_LEVEL && c.g > WHITE_SNAP_LEVEL && c.b > WHITE_SNAP_LEVEL {
            last.color = Color::WHITE;
        }
    }
}

/// The closest pair below its adaptive threshold, if any. The bool marks
/// the near-white force merge (result keeps the brighter color).
fn closest_mergeable(entries: &[Entry], settings: &Settings) -> Option<(usize, usize, bool)> {
    let base = settings.color_tolerance * settings.color_tolerance;
    let mut best: Option<(usize, usize, bool, f64)> = None;

    for i in 0..entries.len() {
        for j in (i + 1)..entries.len() {
            let (a, b) = (entries[i].color, entries[j].color);
            let d = a.dist_sq(b) as f64;

            let bright = a.brightness() > BRIGHT_MERGE_LEVEL
                && b.brightness() > BRIGHT_MERGE_LEVEL
                && d < BRIGHT_MERGE_DIST_SQ;
            let mut threshold = base;
            if settings.merges_neutrals() && a.is_neutral() && b.is_neutral() {
                threshold *= 16.0;
            }

            if bright || d < threshold {
                match best {
                    Some((_, _, _, bd)) if bd <= d => {}
                    _ => best = Some((i, j, bright, d)),
                }
            }
        }
    }
    best.map(|(i, j, toward_brighter, _)| (i, j, toward_brighter))
}

fn weighted_mean(a: Entry, b: Entry) -> Color {
    let wa = a.weight as f64;
    let wb = b.weight as f64;
    let total = wa + wb;
    let mix = |x: u8, y: u8| ((x as f64 * wa + y as f64 * wb) / total).round() as u8;
    Color::new(
        mix(a.color.r, b.color.r),
        mix(a.color.g, b.color.g),
        mix(a.color.b, b.color.b),
    )
}

// ── Edge-color filter ────────────────────────────────────

/// Drop entries that sit on a line segment between two dominant colors:
/// these are almost always anti-aliasing blends, and their pixels will
/// reassign to a real color.
///
/// Entries far from every dominant color are independent hues and are
/// kept regardless of share.
fn filter_edge_colors(entries: &mut Vec<Entry>, target_k: u32) {
    if entries.len() < 3 {
        return;
    }
    let total: u64 = entries.iter().map(|e| e.weight).sum();
    if total == 0 {
        return;
    }
    let main_share = (0.1 / target_k as f64).max(0.005);

    let mut mains: Vec<usize> = (0..entries.len())
        .filter(|&i| entries[i].weight as f64 / total as f64 >= main_share)
        .collect();
    if mains.len() < 2 {
        // Promote by weight until two dominant colors exist.
        let mut by_weight: Vec<usize> = (0..entries.len()).collect();
        by_weight.sort_by(|&a, &b| entries[b].weight.cmp(&entries[a].weight));
        mains = by_weight.into_iter().take(2).collect();
    }

    // A low-share color that projects onto a main-main segment is a
    // blend; anything off every segment is an independent hue and stays
    // regardless of share.
    let is_main = |i: usize| mains.contains(&i);
    let keep: Vec<bool> = (0..entries.len())
        .map(|i| is_main(i) || !is_between_mains(entries[i].color, &mains, entries))
        .collect();

    let mut idx = 0;
    entries.retain(|_| {
        let k = keep[idx];
        idx += 1;
        k
    });
}

/// True when `c` projects onto some main-main segment at an interior
/// parameter with small perpendicular distance.
fn is_between_mains(c: Color, mains: &[usize], entries: &[Entry]) -> bool {
    for (ai, &a_idx) in mains.iter().enumerate() {
        for &b_idx in mains.iter().skip(ai + 1) {
            let a = to_f64(entries[a_idx].color);
            let b = to_f64(entries[b_idx].color);
            let p = to_f64(c);

            let ab = [b[0] - a[0], b[1] - a[1], b[2] - a[2]];
            let ap = [p[0] - a[0], p[1] - a[1], p[2] - a[2]];
            let len_sq = ab[0] * ab[0] + ab[1] * ab[1] + ab[2] * ab[2];
            if len_sq < 1e-9 {
                continue;
            }
            let t = (ap[0] * ab[0] + ap[1] * ab[1] + ap[2] * ab[2]) / len_sq;
            if !(EDGE_T_MIN..=EDGE_T_MAX).contains(&t) {
                continue;
            }
            let foot = [a[0] + ab[0] * t, a[1] + ab[1] * t, a[2] + ab[2] * t];
            let perp = dist_sq_f(p, foot).sqrt();
            if perp < EDGE_PERP_DIST {
                return true;
            }
        }
    }
    false
}

// ── Helpers ──────────────────────────────────────────────

#[inline]
fn to_f64(c: Color) -> [f64; 3] {
    [c.r as f64, c.g as f64, c.b as f64]
}

#[inline]
fn from_f64(p: [f64; 3]) -> Color {
    Color::new(
        p[0].round().clamp(0.0, 255.0) as u8,
        p[1].round().clamp(0.0, 255.0) as u8,
        p[2].round().clamp(0.0, 255.0) as u8,
    )
}

#[inline]
fn dist_sq_f(a: [f64; 3], b: [f64; 3]) -> f64 {
    let d0 = a[0] - b[0];
    let d1 = a[1] - b[1];
    let d2 = a[2] - b[2];
    d0 * d0 + d1 * d1 + d2 * d2
}

#[inline]
fn nearest_dist_sq(centers: &[[f64; 3]], p: [f64; 3]) -> f64 {
    centers
        .iter()
        .map(|&c| dist_sq_f(c, p))
        .fold(f64::INFINITY, f64::min)
}

#[inline]
fn nearest_index(centers: &[[f64; 3]], p: [f64; 3]) -> usize {
    let mut best = 0;
    let mut best_d = f64::INFINITY;
    for (i, &c) in centers.iter().enumerate() {
        let d = dist_sq_f(c, p);
        if d < best_d {
            best_d = d;
            best = i;
        }
    }
    best
}

fn argmax(scores: &[f64]) -> usize {
    let mut best = 0;
    for (i, &s) in scores.iter().enumerate() {
        if s > scores[best] {
            best = i;
        }
    }
    best
}
