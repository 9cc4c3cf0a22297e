//! Dry-run mailer.
//!
//! Builds every message exactly as the SMTP mailer would (so malformed
//! addresses still fail) and writes a one-line description instead of sending.

use super::{Mail, MailError, MailSession, Mailer, build_message};
use std::io::Write;
use std::sync::{Arc, Mutex};

pub struct ConsoleMailer<W> {
    out: Arc<Mutex<W>>,
}

impl ConsoleMailer<std::io::Stderr> {
    pub fn stderr() -> Self {
        Self::new(std::io::stderr())
    }
}

impl<W: Write> ConsoleMailer<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Arc::new(Mutex::new(out)),
        }
    }

    /// Recover the writer once every session has been closed.
    pub fn into_inner(self) -> Option<W> {
        Arc::try_unwrap(self.out)
            .ok()
            .and_then(|m| m.into_inner().ok())
    }
}

impl<W: Write> Mailer for ConsoleMailer<W> {
    type Session = ConsoleSession<W>;

    fn connect(&self) -> Result<ConsoleSession<W>, MailError> {
        Ok(ConsoleSession {
            out: Arc::clone(&self.out),
        })
    }
}

pub struct ConsoleSession<W> {
    out: Arc<Mutex<W>>,
}

impl<W: Write> MailSession for ConsoleSession<W> {
    fn send(&mut self, mail: &Mail) -> Result<(), MailError> {
        build_message(mail)?;
        let mut out = self
            .out
            .lock()
            .map_err(|_| MailError::Send("console output unavailable".to_string()))?;
        writeln!(
            out,
            "[dry run] To: {} | Subject: {} | Attachment: {} ({} bytes)",
            mail.to,
            mail.subject,
            mail.attachment.filename,
            mail.attachment.bytes.len()
        )
        .map_err(|e| MailError::Send(e.to_string()))
    }

    fn close(self) -> Result<(), MailError> {
        Ok(())
    }
}
