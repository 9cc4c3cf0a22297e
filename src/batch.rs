//! Batch certificate generation.
//!
//! Renders one certificate per row of the recipient table and writes it to
//! the output directory under the name given by [`crate::naming`].
//!
//! ## Preconditions
//!
//! Everything a row needs is checked before the first row runs. A missing or
//! unparseable font, recipient table or template (or an invalid region, size
//! or color) aborts the run with zero files written.
//!
//! ## Per Row
//!
//! 1. Fit the recipient's name into the region (step 2, floor 10)
//! 2. Draw it, centered, on a private copy of the decoded template
//! 3. Encode (PDF by default)
//! 4. Write atomically: temp file in the output directory, then rename
//!
//! A failing row either aborts the run ([`RowFailurePolicy::Abort`], the
//! default) or is recorded in [`BatchSummary::failed`] while the rest proceed
//! ([`RowFailurePolicy::Continue`]).
//!
//! ## Parallel Processing
//!
//! With `parallel` set, rows are rendered on the global [rayon] pool. The font
//! and template are loaded once and shared read-only; each row owns its
//! canvas. The summary is always in table order.

use crate::config::CertConfig;
use crate::imaging::{
    EncodeSettings, LoadedFont, OutputFormat, Quality, Region, RenderError, compose,
    decode_template, encode, fit, parse_color, validate_placement,
};
use crate::naming::artifact_path;
use crate::recipients::{Recipient, RecipientsError, load_recipients};
use image::{DynamicImage, Rgb};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BatchError {
    #[error("Font not found: {0}")]
    FontNotFound(PathBuf),
    #[error("Font {path} could not be loaded: {source}")]
    Font {
        path: PathBuf,
        #[source]
        source: RenderError,
    },
    #[error("Template not found: {0}")]
    TemplateNotFound(PathBuf),
    #[error("Template {path} could not be decoded: {source}")]
    Template {
        path: PathBuf,
        #[source]
        source: RenderError,
    },
    #[error(transparent)]
    Recipients(#[from] RecipientsError),
    #[error("Invalid render settings: {0}")]
    Settings(#[from] RenderError),
    #[error("Could not create output directory {path}: {source}")]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Certificate for {name} <{email}> failed: {source}")]
    Row {
        name: String,
        email: String,
        #[source]
        source: RowError,
    },
}

/// Why a single row failed.
#[derive(Error, Debug)]
pub enum RowError {
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error("write failed: {0}")]
    Write(#[from] std::io::Error),
}

/// What a failing row does to the rest of the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RowFailurePolicy {
    /// Stop at the first failure and report it as the run's error.
    #[default]
    Abort,
    /// Record the failure and keep going.
    Continue,
}

/// Cooperative cancellation, checked before each row.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Everything a batch run needs, resolved from [`CertConfig`].
#[derive(Debug, Clone)]
pub struct BatchConfig {
    pub recipients: PathBuf,
    pub template: PathBuf,
    pub font: PathBuf,
    pub output_dir: PathBuf,
    pub region: Region,
    pub color: String,
    pub initial_size: u32,
    pub format: OutputFormat,
    pub encode: EncodeSettings,
    pub on_error: RowFailurePolicy,
    pub parallel: bool,
}

impl BatchConfig {
    pub fn from_cert_config(config: &CertConfig) -> Self {
        Self {
            recipients: config.paths.recipients.clone(),
            template: config.paths.template.clone(),
            font: config.paths.font.clone(),
            output_dir: config.paths.output_dir.clone(),
            region: config.region,
            color: config.text.color.clone(),
            initial_size: config.text.max_font_size,
            format: config.output.format,
            encode: EncodeSettings {
                quality: Quality::new(config.output.quality),
                pdf_dpi: config.output.pdf_dpi,
            },
            on_error: config.batch.on_error,
            parallel: config.batch.parallel,
        }
    }
}

/// Progress events sent to the caller while a batch runs.
#[derive(Debug, Clone)]
pub enum BatchEvent {
    Started {
        total: usize,
        output_dir: PathBuf,
    },
    Generated {
        /// 1-based row position in the table.
        index: usize,
        total: usize,
        recipient: Recipient,
        path: PathBuf,
        font_size: u32,
    },
    Failed {
        index: usize,
        total: usize,
        recipient: Recipient,
        reason: String,
    },
    Finished {
        generated: usize,
        failed: usize,
        cancelled: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeneratedCertificate {
    pub recipient: Recipient,
    pub path: PathBuf,
    pub font_size: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedRow {
    pub recipient: Recipient,
    pub reason: String,
}

/// Result of a batch run, in table order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub generated: Vec<GeneratedCertificate>,
    pub failed: Vec<FailedRow>,
    pub cancelled: bool,
}

/// Loaded, validated inputs shared by every row.
struct Assets {
    font: LoadedFont,
    template: DynamicImage,
    recipients: Vec<Recipient>,
    color: Rgb<u8>,
}

pub struct BatchPipeline {
    config: BatchConfig,
}

impl BatchPipeline {
    pub fn new(config: BatchConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Check every precondition without writing anything. Returns the number
    /// of recipients that would be processed.
    pub fn check(&self) -> Result<usize, BatchError> {
        Ok(self.load_assets()?.recipients.len())
    }

    /// Generate every certificate.
    pub fn run(
        &self,
        cancel: &CancelFlag,
        events: Option<Sender<BatchEvent>>,
    ) -> Result<BatchSummary, BatchError> {
        let assets = self.load_assets()?;
        let output_dir = &self.config.output_dir;
        std::fs::create_dir_all(output_dir).map_err(|source| BatchError::OutputDir {
            path: output_dir.clone(),
            source,
        })?;

        emit(
            &events,
            BatchEvent::Started {
                total: assets.recipients.len(),
                output_dir: output_dir.clone(),
            },
        );

        let summary = if self.config.parallel {
            self.run_parallel(&assets, cancel, &events)?
        } else {
            self.run_sequential(&assets, cancel, &events)?
        };

        emit(
            &events,
            BatchEvent::Finished {
                generated: summary.generated.len(),
                failed: summary.failed.len(),
                cancelled: summary.cancelled,
            },
        );
        Ok(summary)
    }

    fn load_assets(&self) -> Result<Assets, BatchError> {
        let c = &self.config;
        validate_placement(&c.region, c.initial_size)?;
        let color = parse_color(&c.color).map_err(RenderError::from)?;

        if !c.font.is_file() {
            return Err(BatchError::FontNotFound(c.font.clone()));
        }
        let font_bytes = std::fs::read(&c.font).map_err(|e| BatchError::Font {
            path: c.font.clone(),
            source: RenderError::FontDecode(e.to_string()),
        })?;
        let font = LoadedFont::from_bytes(font_bytes).map_err(|source| BatchError::Font {
            path: c.font.clone(),
            source,
        })?;

        let recipients = load_recipients(&c.recipients)?;

        if !c.template.is_file() {
            return Err(BatchError::TemplateNotFound(c.template.clone()));
        }
        let template_bytes = std::fs::read(&c.template).map_err(|e| BatchError::Template {
            path: c.template.clone(),
            source: RenderError::TemplateDecode(e.to_string()),
        })?;
        let template = decode_template(&template_bytes).map_err(|source| BatchError::Template {
            path: c.template.clone(),
            source,
        })?;

        Ok(Assets {
            font,
            template,
            recipients,
            color,
        })
    }

    fn render_row(&self, assets: &Assets, recipient: &Recipient) -> Result<GeneratedCertificate, RowError> {
        let c = &self.config;
        let fitted = fit(
            &assets.font,
            &recipient.name,
            c.initial_size,
            c.region.width,
            c.region.height,
        );
        let canvas = compose(
            &assets.template,
            &fitted,
            &recipient.name,
            &c.region,
            assets.color,
        )?;
        let bytes = encode(&canvas, c.format, &c.encode)?;
        let path = artifact_path(&c.output_dir, &recipient.email, c.format);
        write_atomic(&path, &bytes)?;
        Ok(GeneratedCertificate {
            recipient: recipient.clone(),
            path,
            font_size: fitted.size(),
        })
    }

    fn run_sequential(
        &self,
        assets: &Assets,
        cancel: &CancelFlag,
        events: &Option<Sender<BatchEvent>>,
    ) -> Result<BatchSummary, BatchError> {
        let total = assets.recipients.len();
        let mut summary = BatchSummary::default();
        for (i, recipient) in assets.recipients.iter().enumerate() {
            if cancel.is_cancelled() {
                summary.cancelled = true;
                break;
            }
            let result = self.render_row(assets, recipient);
            emit(events, row_event(i + 1, total, recipient, &result));
            self.record(&mut summary, recipient, result)?;
        }
        Ok(summary)
    }

    fn run_parallel(
        &self,
        assets: &Assets,
        cancel: &CancelFlag,
        events: &Option<Sender<BatchEvent>>,
    ) -> Result<BatchSummary, BatchError> {
        let total = assets.recipients.len();
        let aborted = AtomicBool::new(false);
        let abort_on_error = self.config.on_error == RowFailurePolicy::Abort;

        let results: Vec<Option<Result<GeneratedCertificate, RowError>>> = assets
            .recipients
            .par_iter()
            .enumerate()
            .map(|(i, recipient)| {
                if cancel.is_cancelled() || aborted.load(Ordering::SeqCst) {
                    return None;
                }
                let result = self.render_row(assets, recipient);
                if result.is_err() && abort_on_error {
                    aborted.store(true, Ordering::SeqCst);
                }
                emit(events, row_event(i + 1, total, recipient, &result));
                Some(result)
            })
            .collect();

        let mut summary = BatchSummary::default();
        for (recipient, result) in assets.recipients.iter().zip(results) {
            match result {
                Some(result) => self.record(&mut summary, recipient, result)?,
                // Rows skipped after an abort never reach here: the failing
                // row returns first. Anything else skipped was cancelled.
                None if !aborted.load(Ordering::SeqCst) => summary.cancelled = true,
                None => {}
            }
        }
        Ok(summary)
    }

    /// Fold one row into the summary, or turn it into the run's error.
    fn record(
        &self,
        summary: &mut BatchSummary,
        recipient: &Recipient,
        result: Result<GeneratedCertificate, RowError>,
    ) -> Result<(), BatchError> {
        match result {
            Ok(cert) => summary.generated.push(cert),
            Err(source) => match self.config.on_error {
                RowFailurePolicy::Abort => {
                    return Err(BatchError::Row {
                        name: recipient.name.clone(),
                        email: recipient.email.clone(),
                        source,
                    });
                }
                RowFailurePolicy::Continue => summary.failed.push(FailedRow {
                    recipient: recipient.clone(),
                    reason: source.to_string(),
                }),
            },
        }
        Ok(())
    }
}

fn row_event(
    index: usize,
    total: usize,
    recipient: &Recipient,
    result: &Result<GeneratedCertificate, RowError>,
) -> BatchEvent {
    match result {
        Ok(cert) => BatchEvent::Generated {
            index,
            total,
            recipient: recipient.clone(),
            path: cert.path.clone(),
            font_size: cert.font_size,
        },
        Err(e) => BatchEvent::Failed {
            index,
            total,
            recipient: recipient.clone(),
            reason: e.to_string(),
        },
    }
}

fn emit(events: &Option<Sender<BatchEvent>>, event: BatchEvent) {
    if let Some(tx) = events {
        tx.send(event).ok();
    }
}

/// Write `bytes` to a temp file next to `path`, then rename it into place.
/// Readers never observe a half-written certificate.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
