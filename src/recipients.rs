//! Participant table loading.
//!
//! The table is a CSV file with a header row. Two columns are required,
//! `name` and `email`; any others (team, track, ...) are ignored. Row order is
//! preserved and drives the processing order of both generation and dispatch.
//!
//! ```text
//! name,email,track
//! Jane Doe,jane@example.com,backend
//! Ada Lovelace,ada@example.org,math
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RecipientsError {
    #[error("Recipient table not found: {0}")]
    NotFound(PathBuf),
    #[error("Failed to read recipient table: {0}")]
    Csv(#[from] csv::Error),
    #[error("Recipient table is missing required column '{0}'")]
    MissingColumn(&'static str),
    #[error("Row {row}: '{column}' is empty")]
    EmptyField { row: usize, column: &'static str },
}

/// One participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    pub name: String,
    pub email: String,
}

impl Recipient {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }
}

/// Load recipients from a CSV file on disk.
pub fn load_recipients(path: &Path) -> Result<Vec<Recipient>, RecipientsError> {
    if !path.is_file() {
        return Err(RecipientsError::NotFound(path.to_path_buf()));
    }
    let reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)?;
    read_recipients(reader)
}

/// Parse recipients from any CSV source.
pub fn parse_recipients<R: std::io::Read>(input: R) -> Result<Vec<Recipient>, RecipientsError> {
    let reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(input);
    read_recipients(reader)
}

fn read_recipients<R: std::io::Read>(
    mut reader: csv::Reader<R>,
) -> Result<Vec<Recipient>, RecipientsError> {
    let headers = reader.headers()?.clone();
    for column in ["name", "email"] {
        if !headers.iter().any(|h| h == column) {
            return Err(RecipientsError::MissingColumn(column));
        }
    }

    let mut recipients = Vec::new();
    for (i, row) in reader.deserialize::<Recipient>().enumerate() {
        let recipient = row?;
        // Row numbers as a spreadsheet shows them: header is row 1.
        let row = i + 2;
        if recipient.name.is_empty() {
            return Err(RecipientsError::EmptyField {
                row,
                column: "name",
            });
        }
        if recipient.email.is_empty() {
            return Err(RecipientsError::EmptyField {
                row,
                column: "email",
            });
        }
        recipients.push(recipient);
    }
    Ok(recipients)
}
