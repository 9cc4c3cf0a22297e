//! Parameter types for rendering.
//!
//! These structs describe *what* to draw, not *how*. They are the interface
//! between callers (the batch and preview stages) and the
//! [`operations`](super::operations) that do the pixel work.
//!
//! ## Types
//!
//! - [`Region`]: Target rectangle on the template, in template pixels.
//! - [`TextBox`]: Tight glyph-ink box of a string, relative to the draw origin.
//! - [`Quality`]: Lossy encoding quality (1–100, default 90). Clamped on construction.
//! - [`OutputFormat`]: Encoded artifact format (PDF, PNG, JPEG).

use serde::{Deserialize, Serialize};

/// Smallest font size the fitter will go down to.
pub const MIN_FONT_SIZE: u32 = 10;

/// Decrement between fitting attempts.
pub const FONT_SIZE_STEP: u32 = 2;

/// Rectangle on the template the text is centered in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn center_x(&self) -> f32 {
        self.x as f32 + self.width as f32 / 2.0
    }

    pub fn center_y(&self) -> f32 {
        self.y as f32 + self.height as f32 / 2.0
    }

    /// A region is usable only when it has area.
    pub fn is_valid(&self) -> bool {
        self.width > 0 && self.height > 0
    }
}

/// Tight bounding box of rendered text: `(left, top, right, bottom)` in pixels,
/// relative to the point the text is drawn at (top-left at the ascender line).
///
/// `left`/`top` are usually non-zero (the ink of "J" or "T" does not start
/// exactly at the origin), so centering must use [`TextBox::center_x`] rather
/// than `width / 2`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TextBox {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl TextBox {
    pub fn width(&self) -> u32 {
        (self.right - self.left).max(0) as u32
    }

    pub fn height(&self) -> u32 {
        (self.bottom - self.top).max(0) as u32
    }

    pub fn center_x(&self) -> f32 {
        (self.left + self.right) as f32 / 2.0
    }

    pub fn center_y(&self) -> f32 {
        (self.top + self.bottom) as f32 / 2.0
    }

    pub fn fits_within(&self, max_width: u32, max_height: u32) -> bool {
        self.width() <= max_width && self.height() <= max_height
    }

    /// The box moved by an integer offset.
    pub fn translate(&self, dx: i32, dy: i32) -> Self {
        Self {
            left: self.left + dx,
            top: self.top + dy,
            right: self.right + dx,
            bottom: self.bottom + dy,
        }
    }
}

/// Quality setting for lossy image encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(pub u32);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100))
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(90)
    }
}

/// Encoded artifact format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Single-page PDF with the certificate as a full-page image.
    #[default]
    Pdf,
    Png,
    Jpeg,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Pdf => "pdf",
            OutputFormat::Png => "png",
            OutputFormat::Jpeg => "jpg",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            OutputFormat::Pdf => "application/pdf",
            OutputFormat::Png => "image/png",
            OutputFormat::Jpeg => "image/jpeg",
        }
    }
}
