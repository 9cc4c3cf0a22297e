//! TrueType/OpenType text measurement and rasterization via `rusttype`.
//!
//! The font file is parsed once into a [`LoadedFont`]. Each fitting attempt
//! asks for an immutable [`SizedFont`] view at one pixel size, so nothing
//! about the font source (file, upload, HTTP body) has to be re-read or
//! rewound between attempts.

use super::backend::{RenderError, TextMeasure};
use super::params::TextBox;
use image::{Rgb, RgbImage};
use rusttype::{Font, PositionedGlyph, Scale, point};

/// A parsed font, ready to be sized.
pub struct LoadedFont {
    font: Font<'static>,
}

impl LoadedFont {
    /// Parse font bytes. Fails with [`RenderError::FontDecode`] if the bytes
    /// are not a usable TrueType/OpenType font.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, RenderError> {
        Font::try_from_vec(bytes)
            .map(|font| Self { font })
            .ok_or_else(|| RenderError::FontDecode("not a TrueType/OpenType font".into()))
    }

    pub fn at_size(&self, size: u32) -> SizedFont<'_> {
        SizedFont {
            font: &self.font,
            size,
            scale: Scale::uniform(size as f32),
        }
    }
}

impl TextMeasure for LoadedFont {
    fn text_box(&self, text: &str, size: u32) -> TextBox {
        self.at_size(size).text_box(text)
    }
}

/// A font bound to one pixel size.
#[derive(Clone, Copy)]
pub struct SizedFont<'a> {
    font: &'a Font<'static>,
    size: u32,
    scale: Scale,
}

impl<'a> SizedFont<'a> {
    pub fn size(&self) -> u32 {
        self.size
    }

    /// Lay out `text` with the top-left of the line (ascender, left bearing
    /// origin) at `origin`.
    fn layout(&self, text: &str, origin: (i32, i32)) -> Vec<PositionedGlyph<'a>> {
        let ascent = self.font.v_metrics(self.scale).ascent;
        self.font
            .layout(
                text,
                self.scale,
                point(origin.0 as f32, origin.1 as f32 + ascent),
            )
            .collect()
    }

    /// Tight ink box of `text` drawn at origin `(0, 0)`.
    ///
    /// Whitespace-only or empty text has no ink and yields an empty box.
    pub fn text_box(&self, text: &str) -> TextBox {
        self.layout(text, (0, 0))
            .iter()
            .filter_map(|g| g.pixel_bounding_box())
            .fold(None, |acc: Option<TextBox>, bb| {
                Some(match acc {
                    None => TextBox {
                        left: bb.min.x,
                        top: bb.min.y,
                        right: bb.max.x,
                        bottom: bb.max.y,
                    },
                    Some(b) => TextBox {
                        left: b.left.min(bb.min.x),
                        top: b.top.min(bb.min.y),
                        right: b.right.max(bb.max.x),
                        bottom: b.bottom.max(bb.max.y),
                    },
                })
            })
            .unwrap_or_default()
    }

    /// Rasterize `text` onto `canvas` with its line origin at `origin`,
    /// alpha-blending glyph coverage over the existing pixels. Ink falling
    /// outside the canvas is clipped.
    pub fn draw(&self, canvas: &mut RgbImage, text: &str, origin: (i32, i32), color: Rgb<u8>) {
        let (width, height) = (canvas.width() as i32, canvas.height() as i32);
        for glyph in self.layout(text, origin) {
            let Some(bb) = glyph.pixel_bounding_box() else {
                continue;
            };
            glyph.draw(|gx, gy, coverage| {
                let px = bb.min.x + gx as i32;
                let py = bb.min.y + gy as i32;
                if px < 0 || py < 0 || px >= width || py >= height {
                    return;
                }
                let alpha = coverage.clamp(0.0, 1.0);
                if alpha <= 0.0 {
                    return;
                }
                let dst = canvas.get_pixel_mut(px as u32, py as u32);
                for c in 0..3 {
                    let blended = color.0[c] as f32 * alpha + dst.0[c] as f32 * (1.0 - alpha);
                    dst.0[c] = blended.round() as u8;
                }
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::fixture_font;

    #[test]
    fn rejects_non_font_bytes() {
        let result = LoadedFont::from_bytes(b"definitely not a font".to_vec());
        assert!(matches!(result, Err(RenderError::FontDecode(_))));
    }

    #[test]
    fn empty_text_has_empty_box() {
        let font = fixture_font();
        assert_eq!(font.at_size(40).text_box(""), TextBox::default());
        assert_eq!(font.at_size(40).text_box("   "), TextBox::default());
    }

    #[test]
    fn box_grows_with_size() {
        let font = fixture_font();
        let small = font.at_size(20).text_box("Jane Doe");
        let large = font.at_size(60).text_box("Jane Doe");
        assert!(large.width() > small.width());
        assert!(large.height() > small.height());
    }

    #[test]
    fn box_has_top_offset_below_ascender() {
        // Lowercase-only ink starts well below the ascender line.
        let font = fixture_font();
        let b = font.at_size(80).text_box("ace");
        assert!(b.top > 0, "expected positive top offset, got {b:?}");
    }

    #[test]
    fn draw_stays_inside_measured_box() {
        let loaded = fixture_font();
        let font = loaded.at_size(40);
        let text = "Hello";
        let b = font.text_box(text);
        let mut canvas = RgbImage::from_pixel(300, 120, Rgb([255, 255, 255]));
        let origin = (20, 30);
        font.draw(&mut canvas, text, origin, Rgb([0, 0, 0]));

        // One pixel of slack: the baseline is re-derived in float at the new origin.
        let placed = b.translate(origin.0, origin.1);
        let mut inked = 0;
        for (x, y, p) in canvas.enumerate_pixels() {
            if p.0 != [255, 255, 255] {
                inked += 1;
                let (x, y) = (x as i32, y as i32);
                assert!(x >= placed.left - 1 && x <= placed.right, "x {x} outside {placed:?}");
                assert!(y >= placed.top - 1 && y <= placed.bottom, "y {y} outside {placed:?}");
            }
        }
        assert!(inked > 0);
    }

    #[test]
    fn draw_clips_at_canvas_edges() {
        let loaded = fixture_font();
        let font = loaded.at_size(60);
        let mut canvas = RgbImage::from_pixel(40, 40, Rgb([255, 255, 255]));
        font.draw(&mut canvas, "WWWW", (-30, -20), Rgb([0, 0, 0]));
        assert_eq!(canvas.dimensions(), (40, 40));
    }
}
