//! RGBA raster input: validation, sampling helpers, and the small-image
//! upscale that runs before everything else.

use image::imageops::FilterType;
use image::{GrayImage, RgbaImage};

use crate::color::Color;
use crate::error::VectorError;

/// Alpha at or above this makes a pixel opaque.
pub const OPAQUE_ALPHA: u8 = 128;

/// Images whose larger dimension is below this are upscaled before tracing.
pub const MIN_WORKING_DIM: u32 = 256;

/// A borrowed-by-value RGBA image: row-major, top-left origin, 4 bytes per
/// pixel.
#[derive(Debug, Clone)]
pub struct RasterImage {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl RasterImage {
    /// Wrap a raw RGBA buffer, rejecting zero dimensions and length
    /// mismatches.
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Result<Self, VectorError> {
        if width == 0 || height == 0 {
            return Err(VectorError::InvalidDimensions { width, height });
        }
        let expected = 4 * width as usize * height as usize;
        if data.len() != expected {
            return Err(VectorError::BufferSize {
                expected,
                found: data.len(),
            });
        }
        Ok(Self { width, height, data })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// RGB color at flat pixel index.
    #[inline]
    pub fn color_at(&self, idx: usize) -> Color {
        let o = idx * 4;
        Color::new(self.data[o], self.data[o + 1], self.data[o + 2])
    }

    #[inline]
    pub fn alpha_at(&self, idx: usize) -> u8 {
        self.data[idx * 4 + 3]
    }

    #[inline]
    pub fn is_opaque(&self, idx: usize) -> bool {
        self.alpha_at(idx) >= OPAQUE_ALPHA
    }

    pub fn opaque_count(&self) -> usize {
        (0..self.pixel_count()).filter(|&i| self.is_opaque(i)).count()
    }

    /// Integer upscale factor needed to reach the minimum working size,
    /// or 1 when the image is already large enough.
    pub fn upscale_factor(&self) -> u32 {
        let max_dim = self.width.max(self.height);
        if max_dim >= MIN_WORKING_DIM {
            1
        } else {
            MIN_WORKING_DIM.div_ceil(max_dim)
        }
    }

    /// Upscale by an integer factor. Bilinear by default; `nearest` keeps
    /// hard pixel edges for pixel-art input.
    pub(crate) fn upscale(&self, factor: u32, nearest: bool) -> RasterImage {
        if factor <= 1 {
            return self.clone();
        }
        let src = RgbaImage::from_raw(self.width, self.height, self.data.clone())
            .expect("buffer length validated at construction");
        let filter = if nearest {
            FilterType::Nearest
        } else {
            FilterType::Triangle
        };
        let scaled = image::imageops::resize(
            &src,
            self.width * factor,
            self.height * factor,
            filter,
        );
        RasterImage {
            width: scaled.width(),
            height: scaled.height(),
            data: scaled.into_raw(),
        }
    }

    /// Per-pixel luminance as a gray image. Transparent pixels read as
    /// white (paper).
    pub(crate) fn luminance_image(&self) -> GrayImage {
        let mut gray = GrayImage::new(self.width, self.height);
        for (idx, p) in gray.pixels_mut().enumerate() {
            p.0[0] = if self.is_opaque(idx) {
                let c = self.color_at(idx);
                // Rec. 601 integer weights
                ((c.r as u32 * 299 + c.g as u32 * 587 + c.b as u32 * 114) / 1000) as u8
            } else {
                255
            };
        }
        gray
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(width: u32, height: u32, rgba: [u8; 4]) -> RasterImage {
        let data = rgba
            .iter()
            .copied()
            .cycle()
            .take(4 * (width * height) as usize)
            .collect();
        RasterImage::new(width, height, data).unwrap()
    }

    #[test]
    fn rejects_zero_dimensions() {
        assert!(matches!(
            RasterImage::new(0, 4, vec![]),
            Err(VectorError::InvalidDimensions { .. })
        ));
    }

    #[test]
    fn rejects_short_buffer() {
        assert!(matches!(
            RasterImage::new(2, 2, vec![0; 15]),
            Err(VectorError::BufferSize { expected: 16, found: 15 })
        ));
    }

    #[test]
    fn upscale_factor_covers_small_images() {
        assert_eq!(solid(2, 2, [0, 0, 0, 255]).upscale_factor(), 128);
        assert_eq!(solid(100, 50, [0, 0, 0, 255]).upscale_factor(), 3);
        assert_eq!(solid(256, 64, [0, 0, 0, 255]).upscale_factor(), 1);
        assert_eq!(solid(300, 300, [0, 0, 0, 255]).upscale_factor(), 1);
    }

    #[test]
    fn nearest_upscale_preserves_hard_edges() {
        let mut data = vec![0u8; 16];
        // left pixel black opaque, right pixel white opaque
        data[0..4].copy_from_slice(&[0, 0, 0, 255]);
        data[4..8].copy_from_slice(&[255, 255, 255, 255]);
        data[8..12].copy_from_slice(&[0, 0, 0, 255]);
        data[12..16].copy_from_slice(&[255, 255, 255, 255]);
        let img = RasterImage::new(2, 2, data).unwrap();
        let up = img.upscale(4, true);
        assert_eq!(up.width(), 8);
        // every pixel is still pure black or pure white
        for idx in 0..up.pixel_count() {
            let c = up.color_at(idx);
            assert!(c == Color::BLACK || c == Color::WHITE, "blended pixel {c:?}");
        }
    }

    #[test]
    fn transparent_pixels_read_as_white_luminance() {
        let img = solid(3, 3, [0, 0, 0, 0]);
        let gray = img.luminance_image();
        assert!(gray.pixels().all(|p| p.0[0] == 255));
    }
}
