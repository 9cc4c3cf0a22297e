//! # certgen
//!
//! Certificate compositing and dispatch. Given a template image, a font and a
//! target rectangle, certgen writes each participant's name in the largest
//! size that fits, centered in the rectangle, and saves one certificate per
//! participant. A separate step mails every certificate as an attachment.
//!
//! # Architecture: Two Independent Pipelines
//!
//! ```text
//! 1. Generate  participants.csv + template + font  →  generated/certificate_*.pdf
//! 2. Send      participants.csv + generated/       →  one email per participant
//! ```
//!
//! The pipelines never share memory. Send finds each certificate by
//! recomputing its filename from the participant's email address
//! ([`naming::artifact_file_name`]), so either step can be re-run alone: fix a
//! typo in one name, regenerate, and send again.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`imaging`] | Font fitting, centered compositing, PNG/JPEG/PDF encoding |
//! | [`batch`] | Pipeline 1: one certificate per participant, atomic writes, optional parallelism |
//! | [`dispatch`] | Pipeline 2: per-recipient mailing with pacing and failure isolation |
//! | [`preview`] | Single in-memory render from supplied bytes, returned as PNG |
//! | [`mail`] | Mail transport traits, `lettre` SMTP and dry-run implementations |
//! | [`recipients`] | CSV participant table loader |
//! | [`naming`] | `certificate_{email}.{ext}` filename convention |
//! | [`config`] | `certgen.toml` loading, validation, merging, env overrides |
//! | [`output`] | CLI output formatting of pipeline events and summaries |
//!
//! # Design Decisions
//!
//! ## Fitting by Tight Ink Box
//!
//! Text is measured by the union of its glyphs' pixel bounds rather than by
//! advance width and line height. The box can start right of or below the
//! drawing origin; centering subtracts those offsets, so a lone `J` or a
//! descender-heavy `gyp` sits visually centered. Sizes are scanned linearly
//! from the configured maximum in steps of 2 and stop at 10; text too long
//! for the box at 10 is still drawn at 10.
//!
//! ## Pure-Rust Rendering
//!
//! Fonts are rasterized with `rusttype`, images handled with `image`, and the
//! PDF wrapper is written by hand (one page, one JPEG XObject). There are no
//! system libraries to install.
//!
//! ## No Global State
//!
//! The binary loads [`config::CertConfig`] once and hands each pipeline its own
//! [`batch::BatchConfig`] or [`dispatch::DispatchConfig`]. Mail servers and
//! pacing are injected ([`mail::Mailer`], [`dispatch::Pacer`]), which is also
//! how the tests run without a network.

pub mod batch;
pub mod config;
pub mod dispatch;
pub mod imaging;
pub mod mail;
pub mod naming;
pub mod output;
pub mod preview;
pub mod recipients;

#[cfg(test)]
pub(crate) mod test_helpers;
