//! Shared test utilities for the certgen test suite.
//!
//! Provides fixture loaders, synthetic templates, project-directory setup,
//! and pixel inspection helpers used by the imaging and pipeline tests.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let project = setup_project(&[("Jane Doe", "jane@example.com")]);
//! let config = project_config(project.path());
//! let summary = BatchPipeline::new(BatchConfig::from_cert_config(&config))
//!     .run(&CancelFlag::new(), None)
//!     .unwrap();
//! assert_eq!(summary.generated.len(), 1);
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use image::{ImageFormat, Rgb, RgbImage};

use crate::config::CertConfig;
use crate::imaging::LoadedFont;

// =========================================================================
// Fixtures
// =========================================================================

pub fn fixture_font_path() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures/fonts/DejaVuSans.ttf")
}

pub fn fixture_font_bytes() -> Vec<u8> {
    fs::read(fixture_font_path()).unwrap()
}

pub fn fixture_font() -> LoadedFont {
    LoadedFont::from_bytes(fixture_font_bytes()).unwrap()
}

/// A plain white template encoded as PNG.
pub fn white_template_png(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_pixel(width, height, Rgb([255, 255, 255]));
    let mut bytes = Vec::new();
    img.write_to(&mut std::io::Cursor::new(&mut bytes), ImageFormat::Png)
        .unwrap();
    bytes
}

// =========================================================================
// Project setup
// =========================================================================

/// Template size used by [`setup_project`]; large enough for the stock region.
pub const TEMPLATE_SIZE: (u32, u32) = (1000, 700);

/// Create a temp project with `template.png`, `font.ttf` and a
/// `participants.csv` listing `rows` in order.
pub fn setup_project(rows: &[(&str, &str)]) -> TempDir {
    let tmp = TempDir::new().unwrap();
    fs::write(
        tmp.path().join("template.png"),
        white_template_png(TEMPLATE_SIZE.0, TEMPLATE_SIZE.1),
    )
    .unwrap();
    fs::copy(fixture_font_path(), tmp.path().join("font.ttf")).unwrap();
    write_recipients(&tmp.path().join("participants.csv"), rows);
    tmp
}

pub fn write_recipients(path: &Path, rows: &[(&str, &str)]) {
    let mut writer = csv::Writer::from_path(path).unwrap();
    writer.write_record(["name", "email"]).unwrap();
    for (name, email) in rows {
        writer.write_record([name, email]).unwrap();
    }
    writer.flush().unwrap();
}

/// Stock config with every path anchored in `dir`.
pub fn project_config(dir: &Path) -> CertConfig {
    let mut config = CertConfig::default();
    config.resolve_paths(dir);
    config
}

/// Sorted names of the files in `dir` (empty if it does not exist).
pub fn file_names(dir: &Path) -> Vec<String> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut names: Vec<String> = entries
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

// =========================================================================
// Pixel inspection
// =========================================================================

/// Bounding box `(left, top, right, bottom)` of every non-white pixel,
/// with inclusive right/bottom. `None` for a blank image.
pub fn ink_box(img: &RgbImage) -> Option<(u32, u32, u32, u32)> {
    let mut bounds: Option<(u32, u32, u32, u32)> = None;
    for (x, y, pixel) in img.enumerate_pixels() {
        if pixel.0 == [255, 255, 255] {
            continue;
        }
        bounds = Some(match bounds {
            None => (x, y, x, y),
            Some((l, t, r, b)) => (l.min(x), t.min(y), r.max(x), b.max(y)),
        });
    }
    bounds
}
