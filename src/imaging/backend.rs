//! Font metrics trait and shared error type.
//!
//! The [`TextMeasure`] trait is the one question the fitter asks of a font:
//! how big is this string at this size? Keeping it a trait lets the fitting
//! loop be tested with synthetic metrics, without a font file.
//!
//! The production implementation is [`LoadedFont`](super::font::LoadedFont),
//! backed by `rusttype`.

use super::color::ColorError;
use super::params::TextBox;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Failed to decode template image: {0}")]
    TemplateDecode(String),
    #[error("Failed to load font: {0}")]
    FontDecode(String),
    #[error("Invalid text region {width}x{height}: width and height must be positive")]
    InvalidRegion { width: u32, height: u32 },
    #[error("Invalid font size {0}: must be positive")]
    InvalidFontSize(u32),
    #[error("Invalid text color: {0}")]
    Color(#[from] ColorError),
    #[error("Encoding failed: {0}")]
    Encode(String),
}

/// Measures the tight ink box of a string at a given pixel size.
///
/// Implementations must be monotonic in `size` (a larger size never yields a
/// smaller box) and pure: the same inputs always return the same box.
pub trait TextMeasure: Sync {
    fn text_box(&self, text: &str, size: u32) -> TextBox;
}
