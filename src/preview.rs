//! Single-shot preview rendering.
//!
//! Stateless and filesystem-free: template and font arrive as bytes, a PNG
//! comes back. A preview without a font is a caller error, so nothing is
//! rendered (or fetched) until the font is known.

use crate::imaging::{
    EncodeSettings, OutputFormat, Region, RenderError, RenderRequest, parse_color, render,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Initial font size when the request does not name one.
pub const DEFAULT_PREVIEW_FONT_SIZE: u32 = 120;

/// Largest initial size a preview accepts. Fitting scans down in steps of
/// two, so the initial size bounds the work done per request.
pub const MAX_PREVIEW_FONT_SIZE: u32 = 1000;

#[derive(Error, Debug)]
pub enum PreviewError {
    #[error("A font is required to render a preview")]
    FontRequired,
    #[error("Font size {size} exceeds the preview limit of {max}")]
    FontSizeTooLarge { size: u32, max: u32 },
    #[error("Could not fetch {url}: {reason}")]
    Fetch { url: String, reason: String },
    #[error(transparent)]
    Render(#[from] RenderError),
}

/// Render `text` into `region` of `template` and return PNG bytes.
pub fn preview(
    template: &[u8],
    font: Option<&[u8]>,
    text: &str,
    region: Region,
    color: &str,
    initial_size: u32,
) -> Result<Vec<u8>, PreviewError> {
    let font = font.ok_or(PreviewError::FontRequired)?;
    check_font_size(initial_size)?;
    let color = parse_color(color).map_err(RenderError::from)?;
    let request = RenderRequest {
        template,
        font,
        text,
        region,
        color,
        initial_size,
        format: OutputFormat::Png,
    };
    Ok(render(&request, &EncodeSettings::default())?.bytes)
}

fn check_font_size(size: u32) -> Result<(), PreviewError> {
    if size > MAX_PREVIEW_FONT_SIZE {
        return Err(PreviewError::FontSizeTooLarge {
            size,
            max: MAX_PREVIEW_FONT_SIZE,
        });
    }
    Ok(())
}

/// Preview payload as received from a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviewRequest {
    pub template_url: String,
    #[serde(default)]
    pub font_url: Option<String>,
    pub text: String,
    pub bbox_x: u32,
    pub bbox_y: u32,
    pub bbox_width: u32,
    pub bbox_height: u32,
    #[serde(default = "default_text_color")]
    pub text_color: String,
    #[serde(default = "default_font_size")]
    pub font_size: u32,
}

fn default_text_color() -> String {
    "#000000".to_string()
}

fn default_font_size() -> u32 {
    DEFAULT_PREVIEW_FONT_SIZE
}

impl PreviewRequest {
    pub fn region(&self) -> Region {
        Region::new(self.bbox_x, self.bbox_y, self.bbox_width, self.bbox_height)
    }
}

/// Resolve the request's resources with `fetch` and render it.
///
/// The font URL and size are checked first; a request failing either is
/// rejected before anything is fetched.
pub fn preview_request<F>(request: &PreviewRequest, mut fetch: F) -> Result<Vec<u8>, PreviewError>
where
    F: FnMut(&str) -> Result<Vec<u8>, String>,
{
    let font_url = request
        .font_url
        .as_deref()
        .filter(|url| !url.trim().is_empty())
        .ok_or(PreviewError::FontRequired)?;
    check_font_size(request.font_size)?;
    let fetch_one = |fetch: &mut F, url: &str| {
        fetch(url).map_err(|reason| PreviewError::Fetch {
            url: url.to_string(),
            reason,
        })
    };
    let font = fetch_one(&mut fetch, font_url)?;
    let template = fetch_one(&mut fetch, &request.template_url)?;
    preview(
        &template,
        Some(&font),
        &request.text,
        request.region(),
        &request.text_color,
        request.font_size,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{fixture_font_bytes, ink_box, white_template_png};

    fn request(font_url: Option<&str>) -> PreviewRequest {
        PreviewRequest {
            template_url: "template.png".to_string(),
            font_url: font_url.map(str::to_string),
            text: "Jane Doe".to_string(),
            bbox_x: 50,
            bbox_y: 40,
            bbox_width: 300,
            bbox_height: 80,
            text_color: "#000000".to_string(),
            font_size: 120,
        }
    }

    #[test]
    fn renders_png() {
        let template = white_template_png(400, 200);
        let font = fixture_font_bytes();
        let png = preview(
            &template,
            Some(&font),
            "Jane Doe",
            Region::new(50, 40, 300, 80),
            "navy",
            120,
        )
        .unwrap();
        assert!(png.starts_with(&[0x89, b'P', b'N', b'G']));
        let img = image::load_from_memory(&png).unwrap().to_rgb8();
        assert_eq!(img.dimensions(), (400, 200));
        let (left, top, right, bottom) = ink_box(&img).unwrap();
        assert!(left >= 50 && right < 350 && top >= 40 && bottom < 120);
    }

    #[test]
    fn missing_font_is_caller_error() {
        let template = white_template_png(100, 100);
        let result = preview(&template, None, "x", Region::new(0, 0, 50, 50), "#000", 20);
        assert!(matches!(result, Err(PreviewError::FontRequired)));
    }

    #[test]
    fn bad_color_is_render_error() {
        let template = white_template_png(100, 100);
        let font = fixture_font_bytes();
        let result = preview(
            &template,
            Some(&font),
            "x",
            Region::new(0, 0, 50, 50),
            "not-a-color",
            20,
        );
        assert!(matches!(result, Err(PreviewError::Render(RenderError::Color(_)))));
    }

    #[test]
    fn request_without_font_fetches_nothing() {
        let mut fetched = Vec::new();
        let result = preview_request(&request(None), |url| {
            fetched.push(url.to_string());
            Ok(Vec::new())
        });
        assert!(matches!(result, Err(PreviewError::FontRequired)));
        assert!(fetched.is_empty());

        let result = preview_request(&request(Some("  ")), |_| Ok(Vec::new()));
        assert!(matches!(result, Err(PreviewError::FontRequired)));
    }

    #[test]
    fn request_fetches_font_then_template() {
        let mut fetched = Vec::new();
        let png = preview_request(&request(Some("font.ttf")), |url| {
            fetched.push(url.to_string());
            Ok(match url {
                "font.ttf" => fixture_font_bytes(),
                _ => white_template_png(400, 200),
            })
        })
        .unwrap();
        assert_eq!(fetched, vec!["font.ttf", "template.png"]);
        assert!(!png.is_empty());
    }

    #[test]
    fn fetch_failure_names_url() {
        let result = preview_request(&request(Some("https://cdn/font.ttf")), |_| {
            Err("404".to_string())
        });
        match result {
            Err(PreviewError::Fetch { url, reason }) => {
                assert_eq!(url, "https://cdn/font.ttf");
                assert_eq!(reason, "404");
            }
            other => panic!("expected fetch error, got {other:?}"),
        }
    }

    #[test]
    fn oversized_font_rejected_before_fetch() {
        let mut req = request(Some("font.ttf"));
        req.font_size = u32::MAX;
        let mut fetched = Vec::new();
        let result = preview_request(&req, |url| {
            fetched.push(url.to_string());
            Ok(Vec::new())
        });
        assert!(matches!(
            result,
            Err(PreviewError::FontSizeTooLarge { size: u32::MAX, max: MAX_PREVIEW_FONT_SIZE })
        ));
        assert!(fetched.is_empty());
    }

    #[test]
    fn largest_allowed_size_still_fits() {
        let template = white_template_png(400, 200);
        let font = fixture_font_bytes();
        let png = preview(
            &template,
            Some(&font),
            "Jane Doe",
            Region::new(50, 40, 300, 80),
            "#000000",
            MAX_PREVIEW_FONT_SIZE,
        )
        .unwrap();
        let img = image::load_from_memory(&png).unwrap().to_rgb8();
        let (left, top, right, bottom) = ink_box(&img).unwrap();
        assert!(left >= 50 && right < 350 && top >= 40 && bottom < 120);
    }

    #[test]
    fn request_defaults() {
        let json = r#"{
            "template_url": "t.png",
            "font_url": "f.ttf",
            "text": "Jane",
            "bbox_x": 1, "bbox_y": 2, "bbox_width": 3, "bbox_height": 4
        }"#;
        let req: PreviewRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.text_color, "#000000");
        assert_eq!(req.font_size, DEFAULT_PREVIEW_FONT_SIZE);
        assert_eq!(req.region(), Region::new(1, 2, 3, 4));
    }
}
