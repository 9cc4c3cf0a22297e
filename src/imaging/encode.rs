//! Encoders for finished certificates.
//!
//! | Format | How |
//! |---|---|
//! | PNG | `image::codecs::png::PngEncoder` (lossless, preview) |
//! | JPEG | `image::codecs::jpeg::JpegEncoder` at [`Quality`] |
//! | PDF | single page; the certificate is a JPEG image XObject (`/DCTDecode`) scaled to fill the page |
//!
//! PDFs are assembled with `pdf-writer`: one catalog, one page, one image and
//! one content stream. The page size follows the image at `pdf_dpi`, so a
//! 1000×700 template at 100 dpi becomes a 720×504 pt page.

use super::backend::RenderError;
use super::calculations::pdf_page_size;
use super::params::{OutputFormat, Quality};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder, RgbImage};
use pdf_writer::{Content, Filter, Finish, Name, Pdf, Rect, Ref};

/// Resolution used for PDF pages when none is configured.
pub const DEFAULT_PDF_DPI: f32 = 100.0;

/// Knobs for the lossy/paginated encoders. PNG ignores both.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EncodeSettings {
    pub quality: Quality,
    pub pdf_dpi: f32,
}

impl Default for EncodeSettings {
    fn default() -> Self {
        Self {
            quality: Quality::default(),
            pdf_dpi: DEFAULT_PDF_DPI,
        }
    }
}

/// Encode a finished certificate into `format`.
pub fn encode(
    image: &RgbImage,
    format: OutputFormat,
    settings: &EncodeSettings,
) -> Result<Vec<u8>, RenderError> {
    match format {
        OutputFormat::Png => encode_png(image),
        OutputFormat::Jpeg => encode_jpeg(image, settings.quality),
        OutputFormat::Pdf => {
            let jpeg = encode_jpeg(image, settings.quality)?;
            Ok(write_pdf(&jpeg, image.width(), image.height(), settings.pdf_dpi))
        }
    }
}

fn encode_png(image: &RgbImage) -> Result<Vec<u8>, RenderError> {
    let mut buf = Vec::new();
    PngEncoder::new(&mut buf)
        .write_image(
            image.as_raw(),
            image.width(),
            image.height(),
            ExtendedColorType::Rgb8,
        )
        .map_err(|e| RenderError::Encode(format!("PNG encode failed: {e}")))?;
    Ok(buf)
}

fn encode_jpeg(image: &RgbImage, quality: Quality) -> Result<Vec<u8>, RenderError> {
    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, quality.value() as u8)
        .write_image(
            image.as_raw(),
            image.width(),
            image.height(),
            ExtendedColorType::Rgb8,
        )
        .map_err(|e| RenderError::Encode(format!("JPEG encode failed: {e}")))?;
    Ok(buf)
}

/// Wrap a baseline JPEG in a one-page PDF whose page is exactly the image.
fn write_pdf(jpeg: &[u8], width_px: u32, height_px: u32, dpi: f32) -> Vec<u8> {
    let (page_w, page_h) = pdf_page_size(width_px, height_px, dpi);
    let catalog_id = Ref::new(1);
    let page_tree_id = Ref::new(2);
    let page_id = Ref::new(3);
    let image_id = Ref::new(4);
    let content_id = Ref::new(5);
    let image_name = Name(b"Im0");

    let mut pdf = Pdf::new();
    pdf.set_version(1, 4);
    pdf.catalog(catalog_id).pages(page_tree_id);
    pdf.pages(page_tree_id).kids([page_id]).count(1);

    let mut page = pdf.page(page_id);
    page.media_box(Rect::new(0.0, 0.0, page_w, page_h));
    page.parent(page_tree_id);
    page.contents(content_id);
    page.resources().x_objects().pair(image_name, image_id);
    page.finish();

    let mut image = pdf.image_xobject(image_id, jpeg);
    image.filter(Filter::DctDecode);
    image.width(width_px as i32);
    image.height(height_px as i32);
    image.color_space().device_rgb();
    image.bits_per_component(8);
    image.finish();

    let mut content = Content::new();
    content.save_state();
    content.transform([page_w, 0.0, 0.0, page_h, 0.0, 0.0]);
    content.x_object(image_name);
    content.restore_state();
    pdf.stream(content_id, &content.finish());

    pdf.finish()
}
