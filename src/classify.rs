//! Pixel classification: assign every opaque pixel to its nearest palette
//! color, then knock out isolated misassignments with a mode filter.

use crate::color::Color;
use crate::raster::RasterImage;

/// Sentinel map value for transparent / unassigned pixels.
pub const TRANSPARENT: u8 = 255;

/// Number of double-buffered mode-filter passes.
const DENOISE_PASSES: usize = 2;

/// A neighbor color this frequent in the 3x3 window wins the pixel.
const MAJORITY_COUNT: u8 = 5;

/// Map each pixel to the index of its nearest palette color.
///
/// Transparent pixels get [`TRANSPARENT`]. The palette must be non-empty
/// and no longer than 64 entries, so indices never collide with the
/// sentinel.
pub fn classify(image: &RasterImage, palette: &[Color]) -> Vec<u8> {
    debug_assert!(!palette.is_empty() && palette.len() < TRANSPARENT as usize);
    (0..image.pixel_count())
        .map(|idx| {
            if !image.is_opaque(idx) {
                return TRANSPARENT;
            }
            nearest_index(image.color_at(idx), palette)
        })
        .collect()
}

#[inline]
fn nearest_index(c: Color, palette: &[Color]) -> u8 {
    let mut best = 0u8;
    let mut best_d = u32::MAX;
    for (i, &p) in palette.iter().enumerate() {
        let d = c.dist_sq(p);
        if d < best_d {
            best_d = d;
            best = i as u8;
        }
    }
    best
}

/// 3x3 mode-filter denoise, two double-buffered passes.
///
/// A pixel is replaced when it is isolated (its own color appears exactly
/// once in the window) or when another color reaches a 5-count majority.
/// Transparency is preserved and transparent neighbors never vote.
pub fn denoise(map: &mut [u8], width: u32, height: u32, palette_len: usize) {
    let w = width as usize;
    let h = height as usize;
    debug_assert_eq!(map.len(), w * h);

    let mut back = map.to_vec();
    for _ in 0..DENOISE_PASSES {
        mode_filter_pass(map, &mut back, w, h, palette_len);
        map.copy_from_slice(&back);
    }
}

fn mode_filter_pass(src: &[u8], dst: &mut [u8], w: usize, h: usize, palette_len: usize) {
    let mut counts = vec![0u8; palette_len];
    for y in 0..h {
        for x in 0..w {
            let idx = y * w + x;
            let center = src[idx];
            if center == TRANSPARENT {
                dst[idx] = TRANSPARENT;
                continue;
            }

            counts.iter_mut().for_each(|c| *c = 0);
            for ny in y.saturating_sub(1)..(y + 2).min(h) {
                for nx in x.saturating_sub(1)..(x + 2).min(w) {
                    let v = src[ny * w + nx];
                    if v != TRANSPARENT {
                        counts[v as usize] += 1;
                    }
                }
            }

            let own = counts[center as usize];
            let (mode, mode_count) = counts
                .iter()
                .enumerate()
                .max_by_key(|&(_, &c)| c)
                .map(|(i, &c)| (i as u8, c))
                .unwrap_or((center, own));

            dst[idx] = if own == 1 || (mode != center && mode_count >= MAJORITY_COUNT) {
                mode
            } else {
                center
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image_rgba(width: u32, height: u32, px: &[[u8; 4]]) -> RasterImage {
        let data = px.iter().flatten().copied().collect();
        RasterImage::new(width, height, data).unwrap()
    }

    #[test]
    fn every_opaque_pixel_gets_a_valid_index() {
        let palette = [Color::BLACK, Color::new(200, 0, 0), Color::WHITE];
        let img = image_rgba(
            2,
            2,
            &[
                [5, 5, 5, 255],
                [190, 20, 10, 255],
                [250, 250, 250, 255],
                [0, 0, 0, 10],
            ],
        );
        let map = classify(&img, &palette);
        assert_eq!(map, vec![0, 1, 2, TRANSPARENT]);
    }

    #[test]
    fn isolated_pixel_is_absorbed() {
        // One red pixel in a 3x3 sea of black: own count is 1.
        let mut map = vec![0u8; 9];
        map[4] = 1;
        denoise(&mut map, 3, 3, 2);
        assert_eq!(map, vec![0u8; 9]);
    }

    #[test]
    fn majority_overrides_minority_cluster() {
        // 5x1 row: center pixel differs but has only 3 neighbors, below
        // the majority count, and is not isolated either way.
        let mut map = vec![0, 0, 1, 0, 0];
        denoise(&mut map, 5, 1, 2);
        // own count == 1 in the 3-wide window -> absorbed
        assert_eq!(map, vec![0, 0, 0, 0, 0]);
    }

    #[test]
    fn transparency_is_preserved() {
        let mut map = vec![TRANSPARENT, 0, 0, TRANSPARENT, 0, 0, 0, 0, TRANSPARENT];
        denoise(&mut map, 3, 3, 1);
        assert_eq!(map[0], TRANSPARENT);
        assert_eq!(map[3], TRANSPARENT);
        assert_eq!(map[8], TRANSPARENT);
    }

    #[test]
    fn two_by_two_checkerboard_is_stable() {
        // Every pixel sees 2 of each color: no isolation, no majority.
        let mut map = vec![0, 1, 1, 0];
        denoise(&mut map, 2, 2, 2);
        assert_eq!(map, vec![0, 1, 1, 0]);
    }
}
