//! End-to-end runs of both pipelines through the public API.
//!
//! Uses the bundled DejaVu Sans fixture and synthetic white templates; mail
//! goes to an in-memory recorder.

use certgen::batch::{BatchConfig, BatchError, BatchPipeline, CancelFlag};
use certgen::config::CertConfig;
use certgen::dispatch::{DispatchConfig, DispatchOutcome, DispatchPipeline, MinInterval};
use certgen::imaging::{LoadedFont, MIN_FONT_SIZE, Region, centered_origin, fit};
use certgen::mail::{Mail, MailError, MailSession, Mailer};
use certgen::preview::{PreviewError, PreviewRequest, preview_request};
use image::{Rgb, RgbImage};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tempfile::TempDir;

// =========================================================================
// Fixtures
// =========================================================================

fn font_path() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures/fonts/DejaVuSans.ttf")
}

fn white_png(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_pixel(width, height, Rgb([255, 255, 255]));
    let mut bytes = Vec::new();
    img.write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
        .unwrap();
    bytes
}

/// Project directory with template, font and a participant table.
fn project(csv: &str) -> (TempDir, CertConfig) {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("template.png"), white_png(1000, 700)).unwrap();
    fs::copy(font_path(), tmp.path().join("font.ttf")).unwrap();
    fs::write(tmp.path().join("participants.csv"), csv).unwrap();
    let mut config = CertConfig::default();
    config.resolve_paths(tmp.path());
    config.email.sender_email = "certs@uni.edu".to_string();
    config.email.app_password = "app-password".to_string();
    (tmp, config)
}

/// Pull the embedded JPEG back out of a generated one-page PDF.
fn pdf_image(pdf: &[u8]) -> RgbImage {
    let start = find(pdf, &[0xFF, 0xD8, 0xFF], 0).expect("image stream");
    let end = find(pdf, b"endstream", start).unwrap();
    image::load_from_memory(&pdf[start..end])
        .unwrap()
        .to_rgb8()
}

fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    haystack[from..]
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|p| p + from)
}

/// Bounds of clearly dark pixels, inclusive.
fn dark_box(img: &RgbImage) -> (u32, u32, u32, u32) {
    let mut b = (u32::MAX, u32::MAX, 0, 0);
    for (x, y, p) in img.enumerate_pixels() {
        if p.0.iter().map(|&c| c as u32).sum::<u32>() < 3 * 128 {
            b = (b.0.min(x), b.1.min(y), b.2.max(x), b.3.max(y));
        }
    }
    assert!(b.0 <= b.2, "no ink found");
    b
}

// =========================================================================
// Recording mailer
// =========================================================================

#[derive(Clone, Default)]
struct Recorder {
    sends: Arc<Mutex<Vec<(String, Instant)>>>,
    closed: Arc<Mutex<usize>>,
    refuse: bool,
}

struct RecorderSession(Recorder);

impl Mailer for Recorder {
    type Session = RecorderSession;

    fn connect(&self) -> Result<RecorderSession, MailError> {
        if self.refuse {
            return Err(MailError::Connect {
                host: "smtp.test".to_string(),
                port: 587,
                reason: "535 authentication failed".to_string(),
            });
        }
        Ok(RecorderSession(self.clone()))
    }
}

impl MailSession for RecorderSession {
    fn send(&mut self, mail: &Mail) -> Result<(), MailError> {
        self.0
            .sends
            .lock()
            .unwrap()
            .push((mail.to.clone(), Instant::now()));
        Ok(())
    }

    fn close(self) -> Result<(), MailError> {
        *self.0.closed.lock().unwrap() += 1;
        Ok(())
    }
}

// =========================================================================
// Scenarios
// =========================================================================

#[test]
fn jane_doe_certificate_is_fitted_and_centered() {
    let (tmp, mut config) = project("name,email\nJane Doe,jane@example.com\n");
    config.region = Region::new(400, 181, 203, 45);
    config.text.max_font_size = 80;

    let summary = BatchPipeline::new(BatchConfig::from_cert_config(&config))
        .run(&CancelFlag::new(), None)
        .unwrap();

    let path = tmp
        .path()
        .join("generated/certificate_jane_at_example_dot_com.pdf");
    assert!(path.is_file());
    let generated = &summary.generated[0];
    assert_eq!(generated.path, path);
    assert!((MIN_FONT_SIZE..=80).contains(&generated.font_size));

    // Computed placement is exact to half a pixel.
    let font = LoadedFont::from_bytes(fs::read(font_path()).unwrap()).unwrap();
    let fitted = fit(&font, "Jane Doe", 80, 203, 45);
    assert_eq!(fitted.size(), generated.font_size);
    let (x, y) = centered_origin(&config.region, &fitted.text_box);
    let placed = fitted.text_box.translate(x, y);
    assert!((placed.center_x() - config.region.center_x()).abs() <= 0.5);
    assert!((placed.center_y() - config.region.center_y()).abs() <= 0.5);

    // And the ink in the PDF really sits there.
    let img = pdf_image(&fs::read(&path).unwrap());
    assert_eq!(img.dimensions(), (1000, 700));
    let (l, t, r, b) = dark_box(&img);
    let cx = (l + r + 1) as f32 / 2.0;
    let cy = (t + b + 1) as f32 / 2.0;
    assert!((cx - config.region.center_x()).abs() <= 1.5, "x center {cx}");
    assert!((cy - config.region.center_y()).abs() <= 1.5, "y center {cy}");
}

#[test]
fn overlong_name_falls_back_to_floor_size() {
    let name = "Maximiliana Bartholomea Wolfeschlegelsteinhausenbergerdorff the Third";
    let (tmp, mut config) = project(&format!("name,email\n{name},max@example.com\n"));
    config.region = Region::new(10, 10, 40, 8);

    let summary = BatchPipeline::new(BatchConfig::from_cert_config(&config))
        .run(&CancelFlag::new(), None)
        .unwrap();

    assert_eq!(summary.generated[0].font_size, MIN_FONT_SIZE);
    assert!(
        tmp.path()
            .join("generated/certificate_max_at_example_dot_com.pdf")
            .is_file()
    );
}

#[test]
fn unloadable_font_writes_zero_files() {
    let (tmp, config) = project("name,email\nJane Doe,jane@example.com\nAda,ada@example.org\n");
    fs::write(tmp.path().join("font.ttf"), b"definitely not a font").unwrap();

    let result = BatchPipeline::new(BatchConfig::from_cert_config(&config))
        .run(&CancelFlag::new(), None);

    assert!(matches!(result, Err(BatchError::Font { .. })));
    let out = tmp.path().join("generated");
    assert!(!out.exists() || fs::read_dir(&out).unwrap().next().is_none());
}

#[test]
fn dispatch_skips_missing_certificate_and_paces_sends() {
    let (tmp, mut config) = project(
        "name,email\nJane Doe,jane@example.com\nAda,ada@example.org\nAlan,alan@example.net\n",
    );
    config.email.delay_seconds = 0.2;

    BatchPipeline::new(BatchConfig::from_cert_config(&config))
        .run(&CancelFlag::new(), None)
        .unwrap();
    fs::remove_file(
        tmp.path()
            .join("generated/certificate_ada_at_example_dot_org.pdf"),
    )
    .unwrap();

    let dispatch_config = DispatchConfig::from_cert_config(&config);
    let delay = dispatch_config.delay;
    let mailer = Recorder::default();
    let mut pacer = MinInterval::new(delay);
    let report = DispatchPipeline::new(dispatch_config)
        .run(&mailer, &mut pacer, &CancelFlag::new(), None)
        .unwrap();

    let outcomes = report.outcomes();
    assert_eq!(*outcomes[0], DispatchOutcome::Sent);
    assert!(matches!(outcomes[1], DispatchOutcome::Skipped { .. }));
    assert_eq!(*outcomes[2], DispatchOutcome::Sent);

    let sends = mailer.sends.lock().unwrap().clone();
    assert_eq!(sends.len(), 2);
    assert_eq!(sends[0].0, "jane@example.com");
    assert_eq!(sends[1].0, "alan@example.net");
    assert!(sends[1].1.duration_since(sends[0].1) >= delay);
    assert_eq!(*mailer.closed.lock().unwrap(), 1);
}

#[test]
fn failed_handshake_aborts_dispatch() {
    let (_tmp, config) = project("name,email\nJane Doe,jane@example.com\n");
    let mailer = Recorder {
        refuse: true,
        ..Recorder::default()
    };
    let result = DispatchPipeline::new(DispatchConfig::from_cert_config(&config)).run(
        &mailer,
        &mut MinInterval::new(Duration::ZERO),
        &CancelFlag::new(),
        None,
    );
    assert!(result.is_err());
    assert!(mailer.sends.lock().unwrap().is_empty());
}

#[test]
fn preview_without_font_is_rejected() {
    let request = PreviewRequest {
        template_url: "template.png".to_string(),
        font_url: None,
        text: "Jane Doe".to_string(),
        bbox_x: 400,
        bbox_y: 181,
        bbox_width: 203,
        bbox_height: 45,
        text_color: "#000000".to_string(),
        font_size: 120,
    };
    let mut fetches = 0;
    let result = preview_request(&request, |_| {
        fetches += 1;
        Ok(white_png(10, 10))
    });
    assert!(matches!(result, Err(PreviewError::FontRequired)));
    assert_eq!(fetches, 0);
}

#[test]
fn repeated_renders_are_identical() {
    let (tmp, config) = project("name,email\nJane Doe,jane@example.com\n");
    let pipeline = BatchPipeline::new(BatchConfig::from_cert_config(&config));
    let path = tmp
        .path()
        .join("generated/certificate_jane_at_example_dot_com.pdf");

    pipeline.run(&CancelFlag::new(), None).unwrap();
    let first = fs::read(&path).unwrap();
    pipeline.run(&CancelFlag::new(), None).unwrap();
    assert_eq!(fs::read(&path).unwrap(), first);
}
