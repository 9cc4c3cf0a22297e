//! Run configuration.
//!
//! Handles loading, validating, and merging `certgen.toml`. Every pipeline
//! value lives here: input paths, the text region, fonts and colors, output
//! format, and mail settings. The binary loads it once and hands the
//! relevant parts to each stage; nothing in the library reads ambient state.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [paths]
//! recipients = "participants.csv"  # CSV with `name` and `email` columns
//! template = "template.png"        # Certificate background
//! font = "font.ttf"                # TrueType/OpenType font for the name
//! output_dir = "generated"         # Where certificates are written
//!
//! [region]                         # Where the name goes, in template pixels
//! x = 400
//! y = 181
//! width = 203
//! height = 45
//!
//! [text]
//! color = "#000000"                # Hex, rgb(r, g, b) or a color name
//! max_font_size = 80               # Starting size; shrinks by 2 down to 10
//!
//! [output]
//! format = "pdf"                   # pdf | png | jpeg
//! quality = 90                     # JPEG quality, also used inside PDFs
//! pdf_dpi = 100.0                  # Page size = pixels * 72 / dpi
//!
//! [batch]
//! on_error = "abort"               # abort | continue
//! parallel = false
//! max_processes = 4                # Omit for auto = CPU cores
//!
//! [email]
//! smtp_server = "smtp.gmail.com"
//! smtp_port = 587
//! security = "starttls"            # starttls | tls | none
//! sender_email = "your_email@gmail.com"
//! app_password = "your_app_password"
//! subject = "Your Certificate of Completion"
//! body = "Hi {name}, ..."
//! delay_seconds = 2.0
//! ```
//!
//! ## Paths and Credentials
//!
//! Relative paths are resolved against the directory holding the config
//! file, so a project folder can be run from anywhere. The `SENDER_EMAIL`
//! and `APP_PASSWORD` environment variables override the email credentials,
//! which keeps secrets out of the file.
//!
//! Config files are sparse: override just the values you want. Unknown keys
//! are rejected to catch typos early.

use crate::batch::RowFailurePolicy;
use crate::imaging::{OutputFormat, Region, parse_color};
use crate::mail::SmtpSecurity;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Default sender address; dispatch refuses to run while it is still set.
pub const PLACEHOLDER_SENDER: &str = "your_email@gmail.com";
/// Default app password; dispatch refuses to run while it is still set.
pub const PLACEHOLDER_PASSWORD: &str = "your_app_password";

/// Environment variable overriding `email.sender_email`.
pub const ENV_SENDER_EMAIL: &str = "SENDER_EMAIL";
/// Environment variable overriding `email.app_password`.
pub const ENV_APP_PASSWORD: &str = "APP_PASSWORD";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Full run configuration loaded from `certgen.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CertConfig {
    pub paths: PathsConfig,
    pub region: Region,
    pub text: TextConfig,
    pub output: OutputConfig,
    pub batch: BatchSettings,
    pub email: EmailConfig,
}

impl Default for CertConfig {
    fn default() -> Self {
        Self {
            paths: PathsConfig::default(),
            region: Region::new(400, 181, 203, 45),
            text: TextConfig::default(),
            output: OutputConfig::default(),
            batch: BatchSettings::default(),
            email: EmailConfig::default(),
        }
    }
}

impl CertConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.region.is_valid() {
            return Err(ConfigError::Validation(
                "region.width and region.height must be positive".into(),
            ));
        }
        if self.text.max_font_size == 0 {
            return Err(ConfigError::Validation(
                "text.max_font_size must be positive".into(),
            ));
        }
        parse_color(&self.text.color)
            .map_err(|e| ConfigError::Validation(format!("text.color: {e}")))?;
        if !(1..=100).contains(&self.output.quality) {
            return Err(ConfigError::Validation(
                "output.quality must be 1-100".into(),
            ));
        }
        if !(self.output.pdf_dpi.is_finite() && self.output.pdf_dpi > 0.0) {
            return Err(ConfigError::Validation(
                "output.pdf_dpi must be a positive number".into(),
            ));
        }
        if Duration::try_from_secs_f64(self.email.delay_seconds).is_err() {
            return Err(ConfigError::Validation(format!(
                "email.delay_seconds must be a non-negative number of seconds, got {}",
                self.email.delay_seconds
            )));
        }
        if self.email.smtp_port == 0 {
            return Err(ConfigError::Validation(
                "email.smtp_port must be non-zero".into(),
            ));
        }
        Ok(())
    }

    /// Anchor every relative path at `base` (the config file's directory).
    pub fn resolve_paths(&mut self, base: &Path) {
        let paths = &mut self.paths;
        for path in [
            &mut paths.recipients,
            &mut paths.template,
            &mut paths.font,
            &mut paths.output_dir,
        ] {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
    }

    /// Apply credential overrides from the environment (or any lookup).
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(sender) = lookup(ENV_SENDER_EMAIL).filter(|v| !v.is_empty()) {
            self.email.sender_email = sender;
        }
        if let Some(password) = lookup(ENV_APP_PASSWORD).filter(|v| !v.is_empty()) {
            self.email.app_password = password;
        }
    }
}

/// Input and output locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PathsConfig {
    /// CSV table with `name` and `email` columns.
    pub recipients: PathBuf,
    /// Certificate background image.
    pub template: PathBuf,
    /// Font used for the recipient's name.
    pub font: PathBuf,
    /// Directory certificates are written to and mailed from.
    pub output_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            recipients: PathBuf::from("participants.csv"),
            template: PathBuf::from("template.png"),
            font: PathBuf::from("font.ttf"),
            output_dir: PathBuf::from("generated"),
        }
    }
}

/// Text appearance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TextConfig {
    /// Fill color: `#rrggbb`, `#rgb`, `rgb(r, g, b)` or a color name.
    pub color: String,
    /// Size the fitter starts from before stepping down.
    pub max_font_size: u32,
}

impl Default for TextConfig {
    fn default() -> Self {
        Self {
            color: "#000000".to_string(),
            max_font_size: 80,
        }
    }
}

/// Artifact encoding.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    pub format: OutputFormat,
    /// JPEG quality (1-100); PDFs embed a JPEG at this quality.
    pub quality: u32,
    /// Resolution the PDF page is laid out at.
    pub pdf_dpi: f32,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Pdf,
            quality: 90,
            pdf_dpi: 100.0,
        }
    }
}

/// Batch generation behavior.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BatchSettings {
    /// What a failing row does to the rest of the run.
    pub on_error: RowFailurePolicy,
    /// Render rows on a thread pool instead of one at a time.
    pub parallel: bool,
    /// Maximum number of parallel workers.
    /// When absent or null, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &BatchSettings) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config
        .max_processes
        .map(|n| n.clamp(1, cores))
        .unwrap_or(cores)
}

/// Outgoing mail settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EmailConfig {
    pub smtp_server: String,
    pub smtp_port: u16,
    pub security: SmtpSecurity,
    pub sender_email: String,
    pub app_password: String,
    pub subject: String,
    /// Message body; `{name}` is replaced with the recipient's name.
    pub body: String,
    /// Minimum gap between two sends.
    pub delay_seconds: f64,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            smtp_server: "smtp.gmail.com".to_string(),
            smtp_port: 587,
            security: SmtpSecurity::StartTls,
            sender_email: PLACEHOLDER_SENDER.to_string(),
            app_password: PLACEHOLDER_PASSWORD.to_string(),
            subject: "Your Certificate of Completion".to_string(),
            body: "Hi {name},\n\nPlease find your certificate of completion attached.\n\nBest regards,\nThe Team".to_string(),
            delay_seconds: 2.0,
        }
    }
}

impl EmailConfig {
    /// `delay_seconds` as a duration. Negative or NaN is zero, overflow saturates.
    pub fn delay(&self) -> Duration {
        if self.delay_seconds.is_nan() || self.delay_seconds <= 0.0 {
            return Duration::ZERO;
        }
        Duration::try_from_secs_f64(self.delay_seconds).unwrap_or(Duration::MAX)
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the base layer user overrides are merged on top of.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(CertConfig::default())?)
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Merge user TOML text over the stock defaults, then deserialize and validate.
pub fn parse_config(content: &str) -> Result<CertConfig, ConfigError> {
    let overlay: toml::Value = toml::from_str(content)?;
    let merged = merge_toml(stock_defaults_value()?, overlay);
    let config: CertConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load the config file at `path`.
///
/// A missing file means "all defaults". Relative paths inside the config are
/// resolved against the file's directory, and credential environment
/// variables are applied last.
pub fn load_config(path: &Path) -> Result<CertConfig, ConfigError> {
    let mut config = if path.exists() {
        parse_config(&fs::read_to_string(path)?)?
    } else {
        CertConfig::default()
    };
    let base = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    config.resolve_paths(base);
    config.apply_env_overrides(|key| std::env::var(key).ok());
    Ok(config)
}

/// Returns a fully-commented stock `certgen.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# certgen configuration
# =====================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
#
# Relative paths are resolved against the directory this file lives in.
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Inputs and outputs
# ---------------------------------------------------------------------------
[paths]
# CSV with a header row; needs `name` and `email` columns (others ignored).
recipients = "participants.csv"
# Certificate background image (PNG or JPEG).
template = "template.png"
# TrueType/OpenType font used for the recipient's name.
font = "font.ttf"
# Certificates are written here as certificate_<email>.pdf and mailed from here.
output_dir = "generated"

# ---------------------------------------------------------------------------
# Text region, in template pixels
# ---------------------------------------------------------------------------
[region]
x = 400
y = 181
width = 203
height = 45

# ---------------------------------------------------------------------------
# Text appearance
# ---------------------------------------------------------------------------
[text]
# "#rrggbb", "#rgb", "rgb(r, g, b)" or a name such as "navy".
color = "#000000"
# The name starts at this size and shrinks by 2 until it fits (minimum 10).
max_font_size = 80

# ---------------------------------------------------------------------------
# Output encoding
# ---------------------------------------------------------------------------
[output]
# pdf | png | jpeg
format = "pdf"
# JPEG quality (1-100). PDFs embed the certificate as a JPEG at this quality.
quality = 90
# PDF page size is pixels * 72 / pdf_dpi points.
pdf_dpi = 100.0

# ---------------------------------------------------------------------------
# Batch generation
# ---------------------------------------------------------------------------
[batch]
# abort: the first failing certificate stops the run.
# continue: failures are listed at the end and the rest are still generated.
on_error = "abort"
# Render certificates on several cores.
parallel = false
# Maximum parallel workers. Omit to use every core.
# max_processes = 4

# ---------------------------------------------------------------------------
# Email dispatch
# ---------------------------------------------------------------------------
[email]
smtp_server = "smtp.gmail.com"
smtp_port = 587
# starttls | tls | none
security = "starttls"
# Prefer the SENDER_EMAIL / APP_PASSWORD environment variables over these.
sender_email = "your_email@gmail.com"
app_password = "your_app_password"
subject = "Your Certificate of Completion"
# {name} is replaced with the recipient's name.
body = """Hi {name},

Please find your certificate of completion attached.

Best regards,
The Team"""
# Minimum seconds between two sends, to stay under the server's rate limit.
delay_seconds = 2.0
"##
}
