use thiserror::Error;

/// Errors surfaced across the public boundary.
///
/// Only invalid input and cancellation are fatal. Degenerate data (all
/// transparent, single color) produces an empty result instead, and
/// numeric degeneracies inside the fitters recover locally.
#[derive(Debug, Error)]
pub enum VectorError {
    /// Image has a zero dimension.
    #[error("invalid image dimensions {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    /// Pixel buffer length does not match 4 * width * height.
    #[error("image buffer length {found} does not match expected {expected}")]
    BufferSize { expected: usize, found: usize },

    /// Preset tag not recognized.
    #[error("unknown preset: {0:?}")]
    UnknownPreset(String),

    /// An option value is outside its documented range.
    #[error("option {name} = {value} out of range ({limits})")]
    InvalidOption {
        name: &'static str,
        value: f64,
        limits: &'static str,
    },

    /// The caller's cancellation flag was raised between stages.
    #[error("vectorization cancelled")]
    Cancelled,
}
