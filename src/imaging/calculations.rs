//! Pure calculation functions for fitting and placement.
//!
//! All functions here are pure and testable without fonts or images.

use super::params::{FONT_SIZE_STEP, MIN_FONT_SIZE, Region, TextBox};

/// The size tried after `size` did not fit: one step down, never below the floor.
pub fn next_font_size(size: u32) -> u32 {
    size.saturating_sub(FONT_SIZE_STEP).max(MIN_FONT_SIZE)
}

/// Scan sizes from `initial` downwards until `measure` reports a box that fits.
///
/// Sizes tried are `initial, initial - 2, initial - 4, ...`, clamped at
/// [`MIN_FONT_SIZE`]. The scan stops at the floor even if the text still
/// overflows: some output always beats none. An `initial` below the floor is
/// measured once and returned as-is.
///
/// # Examples
/// ```
/// # use certgen::imaging::{TextBox, fit_font_size};
/// // 10 chars, each size/2 wide: fits a 100px box at size 20.
/// let (size, _) = fit_font_size(30, 100, 100, |s| TextBox {
///     left: 0, top: 0, right: (5 * s) as i32, bottom: s as i32,
/// });
/// assert_eq!(size, 20);
/// ```
pub fn fit_font_size(
    initial: u32,
    max_width: u32,
    max_height: u32,
    mut measure: impl FnMut(u32) -> TextBox,
) -> (u32, TextBox) {
    let mut size = initial;
    loop {
        let text_box = measure(size);
        if text_box.fits_within(max_width, max_height) || size <= MIN_FONT_SIZE {
            return (size, text_box);
        }
        size = next_font_size(size);
    }
}

/// Integer draw origin that puts the center of `text_box` on the center of `region`.
///
/// The box's own `left`/`top` offsets are part of its center, so a glyph
/// whose ink starts to the right of the origin is still visually centered.
/// Rounding to whole pixels keeps the rasterized ink box within half a
/// pixel of the exact placement.
pub fn centered_origin(region: &Region, text_box: &TextBox) -> (i32, i32) {
    let x = region.center_x() - text_box.center_x();
    let y = region.center_y() - text_box.center_y();
    (x.round() as i32, y.round() as i32)
}

/// PDF page size in points for an image shown at `dpi`.
pub fn pdf_page_size(width_px: u32, height_px: u32, dpi: f32) -> (f32, f32) {
    (width_px as f32 * 72.0 / dpi, height_px as f32 * 72.0 / dpi)
}
