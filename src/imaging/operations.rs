//! High-level render operations.
//!
//! These functions combine calculations with the font backend:
//!
//! - [`fit`]: pick the largest size (step 2, floor 10) whose ink box fits a region
//! - [`compose`]: draw fitted text centered on a private copy of the template
//! - [`render`]: decode, fit, compose and encode one [`RenderRequest`]

use super::backend::{RenderError, TextMeasure};
use super::calculations::{centered_origin, fit_font_size};
use super::encode::{EncodeSettings, encode};
use super::font::{LoadedFont, SizedFont};
use super::params::{OutputFormat, Region, TextBox};
use image::{DynamicImage, Rgb, RgbImage};

/// A font bound to the size chosen by [`fit`], with the text's ink box at that size.
#[derive(Clone, Copy)]
pub struct FittedFont<'f> {
    pub font: SizedFont<'f>,
    pub text_box: TextBox,
}

impl FittedFont<'_> {
    pub fn size(&self) -> u32 {
        self.font.size()
    }
}

/// Fitting loop against any metrics source. See [`fit_font_size`].
pub fn fit_size(
    measure: &impl TextMeasure,
    text: &str,
    initial_size: u32,
    max_width: u32,
    max_height: u32,
) -> (u32, TextBox) {
    fit_font_size(initial_size, max_width, max_height, |size| {
        measure.text_box(text, size)
    })
}

/// Choose the largest font size, stepping down from `initial_size`, at which
/// `text` fits in `max_width` × `max_height`. Never fails: text that still
/// overflows at the floor size is returned at the floor size.
pub fn fit<'f>(
    font: &'f LoadedFont,
    text: &str,
    initial_size: u32,
    max_width: u32,
    max_height: u32,
) -> FittedFont<'f> {
    let (size, text_box) = fit_size(font, text, initial_size, max_width, max_height);
    FittedFont {
        font: font.at_size(size),
        text_box,
    }
}

/// Check the caller-supplied geometry before any decoding happens.
pub fn validate_placement(region: &Region, initial_size: u32) -> Result<(), RenderError> {
    if !region.is_valid() {
        return Err(RenderError::InvalidRegion {
            width: region.width,
            height: region.height,
        });
    }
    if initial_size == 0 {
        return Err(RenderError::InvalidFontSize(initial_size));
    }
    Ok(())
}

pub fn decode_template(bytes: &[u8]) -> Result<DynamicImage, RenderError> {
    image::load_from_memory(bytes).map_err(|e| RenderError::TemplateDecode(e.to_string()))
}

/// Draw `text` with `fitted` so its ink box is centered in `region`.
///
/// Works on an RGB copy of `template`; the template itself is never touched,
/// so one decoded template can back any number of certificates.
pub fn compose(
    template: &DynamicImage,
    fitted: &FittedFont<'_>,
    text: &str,
    region: &Region,
    color: Rgb<u8>,
) -> Result<RgbImage, RenderError> {
    if !region.is_valid() {
        return Err(RenderError::InvalidRegion {
            width: region.width,
            height: region.height,
        });
    }
    let mut canvas = template.to_rgb8();
    let origin = centered_origin(region, &fitted.text_box);
    fitted.font.draw(&mut canvas, text, origin, color);
    Ok(canvas)
}

/// Everything needed to render one certificate.
#[derive(Debug, Clone, Copy)]
pub struct RenderRequest<'a> {
    pub template: &'a [u8],
    pub font: &'a [u8],
    pub text: &'a str,
    pub region: Region,
    pub color: Rgb<u8>,
    pub initial_size: u32,
    pub format: OutputFormat,
}

/// Encoded output of [`render`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedImage {
    pub bytes: Vec<u8>,
    pub format: OutputFormat,
    pub font_size: u32,
}

/// Decode, fit, compose and encode a single request. No I/O.
pub fn render(
    request: &RenderRequest<'_>,
    settings: &EncodeSettings,
) -> Result<RenderedImage, RenderError> {
    validate_placement(&request.region, request.initial_size)?;
    let template = decode_template(request.template)?;
    let font = LoadedFont::from_bytes(request.font.to_vec())?;
    let fitted = fit(
        &font,
        request.text,
        request.initial_size,
        request.region.width,
        request.region.height,
    );
    let canvas = compose(
        &template,
        &fitted,
        request.text,
        &request.region,
        request.color,
    )?;
    Ok(RenderedImage {
        bytes: encode(&canvas, request.format, settings)?,
        format: request.format,
        font_size: fitted.size(),
    })
}
