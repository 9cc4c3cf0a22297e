//! CLI output formatting for both pipelines.
//!
//! Every function here is pure: it turns an event or a summary into display
//! lines and leaves printing to the binary. The pipelines send events over a
//! channel and `main.rs` prints them from a printer thread as they arrive.
//!
//! # Entity Display Contract
//!
//! Each recipient is shown as a header line (positional index in the table,
//! name, email) followed by indented context lines: output file and chosen
//! font size, or the reason it was skipped or failed. End-of-run summaries
//! list every recipient that did not make it, so nothing has to be fished out
//! of scrollback.
//!
//! # Output Format
//!
//! ## Generate
//!
//! ```text
//! Generating 3 certificates → generated/
//! 001 Jane Doe <jane@example.com>
//!     certificate_jane_at_example_dot_com.pdf (font size 38)
//! 002 Ada Lovelace <ada@example.org>
//!     FAILED: write failed: permission denied
//! Generated 1, failed 1
//!
//! Failed (1)
//!     Ada Lovelace <ada@example.org>: write failed: permission denied
//! ```
//!
//! ## Send
//!
//! ```text
//! Session open, 3 recipients
//! 001 Jane Doe <jane@example.com>
//!     sent
//! 002 Ada Lovelace <ada@example.org>
//!     skipped: certificate not found: generated/certificate_ada_at_example_dot_org.pdf
//! Sent 1, skipped 1, failed 0
//! ```

use crate::batch::{BatchEvent, BatchSummary};
use crate::dispatch::{DispatchEvent, DispatchOutcome, DispatchReport};
use crate::recipients::Recipient;
use std::path::Path;

/// Header line shared by both pipelines: `001 Jane Doe <jane@example.com>`.
pub fn recipient_line(index: usize, recipient: &Recipient) -> String {
    format!("{:03} {} <{}>", index, recipient.name, recipient.email)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn with_cancel_note(line: String, cancelled: bool) -> String {
    if cancelled {
        format!("{line} (cancelled)")
    } else {
        line
    }
}

// ============================================================================
// Generate
// ============================================================================

/// Format a single batch progress event as display lines.
pub fn format_batch_event(event: &BatchEvent) -> Vec<String> {
    match event {
        BatchEvent::Started { total, output_dir } => vec![format!(
            "Generating {} certificates \u{2192} {}/",
            total,
            output_dir.display()
        )],
        BatchEvent::Generated {
            index,
            recipient,
            path,
            font_size,
            ..
        } => vec![
            recipient_line(*index, recipient),
            format!("    {} (font size {})", file_name(path), font_size),
        ],
        BatchEvent::Failed {
            index,
            recipient,
            reason,
            ..
        } => vec![
            recipient_line(*index, recipient),
            format!("    FAILED: {}", reason),
        ],
        BatchEvent::Finished {
            generated,
            failed,
            cancelled,
        } => vec![with_cancel_note(
            format!("Generated {}, failed {}", generated, failed),
            *cancelled,
        )],
    }
}

/// Format the end-of-run list of failed rows. Empty when nothing failed.
pub fn format_batch_summary(summary: &BatchSummary) -> Vec<String> {
    if summary.failed.is_empty() {
        return Vec::new();
    }
    let mut lines = vec![String::new(), format!("Failed ({})", summary.failed.len())];
    for row in &summary.failed {
        lines.push(format!(
            "    {} <{}>: {}",
            row.recipient.name, row.recipient.email, row.reason
        ));
    }
    lines
}

// ============================================================================
// Send
// ============================================================================

/// Format a single dispatch progress event as display lines.
pub fn format_dispatch_event(event: &DispatchEvent) -> Vec<String> {
    match event {
        DispatchEvent::Connected { total } => {
            vec![format!("Session open, {} recipients", total)]
        }
        DispatchEvent::Sent {
            index, recipient, ..
        } => vec![recipient_line(*index, recipient), "    sent".to_string()],
        DispatchEvent::Skipped {
            index,
            recipient,
            reason,
            ..
        } => vec![
            recipient_line(*index, recipient),
            format!("    skipped: {}", reason),
        ],
        DispatchEvent::Failed {
            index,
            recipient,
            reason,
            ..
        } => vec![
            recipient_line(*index, recipient),
            format!("    FAILED: {}", reason),
        ],
        DispatchEvent::CloseFailed { reason } => {
            vec![format!("Warning: closing the mail session failed: {}", reason)]
        }
        DispatchEvent::Finished {
            sent,
            skipped,
            failed,
            cancelled,
        } => vec![with_cancel_note(
            format!("Sent {}, skipped {}, failed {}", sent, skipped, failed),
            *cancelled,
        )],
    }
}

/// Format the end-of-run list of skipped and failed recipients.
pub fn format_dispatch_summary(report: &DispatchReport) -> Vec<String> {
    let mut skipped = Vec::new();
    let mut failed = Vec::new();
    for (i, entry) in report.entries.iter().enumerate() {
        let header = recipient_line(i + 1, &entry.recipient);
        match &entry.outcome {
            DispatchOutcome::Sent => {}
            DispatchOutcome::Skipped { reason } => {
                skipped.push(format!("    {}: {}", header, reason))
            }
            DispatchOutcome::Failed { reason } => {
                failed.push(format!("    {}: {}", header, reason))
            }
        }
    }

    let mut lines = Vec::new();
    for (title, group) in [("Skipped", skipped), ("Failed", failed)] {
        if group.is_empty() {
            continue;
        }
        lines.push(String::new());
        lines.push(format!("{} ({})", title, group.len()));
        lines.extend(group);
    }
    lines
}

/// Print lines to stdout.
pub fn print_lines(lines: &[String]) {
    for line in lines {
        println!("{}", line);
    }
}
