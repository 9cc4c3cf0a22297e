//! Centralized artifact naming.
//!
//! Generation and dispatch never share state: the mailer finds a certificate
//! purely by recomputing its filename from the recipient's email address.
//! Both stages go through this module, so the convention lives in one place:
//!
//! - `jane@example.com` → `certificate_jane_at_example_dot_com.pdf`
//! - `a.b@c.org` → `certificate_a_dot_b_at_c_dot_org.pdf`
//!
//! The attachment name shown to the recipient is derived from their display
//! name instead: `Jane Doe` → `Jane Doe_Certificate.pdf`.

use crate::imaging::OutputFormat;
use std::path::{Path, PathBuf};

/// Replace `@` with `_at_` and `.` with `_dot_`.
pub fn sanitize_email(email: &str) -> String {
    email.replace('@', "_at_").replace('.', "_dot_")
}

/// `certificate_{sanitized-email}.{ext}`
pub fn artifact_file_name(email: &str, format: OutputFormat) -> String {
    format!(
        "certificate_{}.{}",
        sanitize_email(email),
        format.extension()
    )
}

/// Full path of a recipient's certificate inside `output_dir`.
pub fn artifact_path(output_dir: &Path, email: &str, format: OutputFormat) -> PathBuf {
    output_dir.join(artifact_file_name(email, format))
}

/// `{name}_Certificate.{ext}`: the filename the recipient sees on the attachment.
pub fn attachment_file_name(name: &str, format: OutputFormat) -> String {
    format!("{}_Certificate.{}", name, format.extension())
}
