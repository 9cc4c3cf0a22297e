//! Certificate rendering in pure Rust, no system libraries.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Decode template** | `image::load_from_memory` |
//! | **Font metrics + glyphs** | `rusttype` |
//! | **Fit** | linear scan, step 2, floor 10 |
//! | **Encode** | `image` PNG/JPEG encoders, minimal PDF wrapper |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for fitting and placement math (unit testable)
//! - **Parameters**: Data structures describing a render
//! - **Backend**: [`TextMeasure`] trait + [`RenderError`]
//! - **Font**: [`LoadedFont`], the `rusttype` implementation
//! - **Operations**: High-level functions combining calculations + font

pub mod backend;
mod calculations;
pub mod color;
pub mod encode;
pub mod font;
pub mod operations;
mod params;

pub use backend::{RenderError, TextMeasure};
pub use calculations::{centered_origin, fit_font_size};
pub use color::{ColorError, parse_color};
pub use encode::{DEFAULT_PDF_DPI, EncodeSettings, encode};
pub use font::{LoadedFont, SizedFont};
pub use operations::{
    FittedFont, RenderRequest, RenderedImage, compose, decode_template, fit, fit_size, render,
    validate_placement,
};
pub use params::{FONT_SIZE_STEP, MIN_FONT_SIZE, OutputFormat, Quality, Region, TextBox};
