//! Email dispatch of generated certificates.
//!
//! Dispatch shares no state with generation. For each recipient it recomputes
//! the certificate path with [`crate::naming::artifact_path`] and mails
//! whatever is there.
//!
//! ## Preconditions (fatal, nothing sent)
//!
//! - the recipient table parses
//! - sender credentials are set and are not the stock placeholders
//! - one authenticated session opens ([`Mailer::connect`])
//!
//! ## Per Recipient
//!
//! | Situation | Outcome |
//! |---|---|
//! | no certificate file | [`DispatchOutcome::Skipped`] |
//! | send or message build fails | [`DispatchOutcome::Failed`] |
//! | delivered to the server | [`DispatchOutcome::Sent`] |
//!
//! One recipient's failure never stops the run. The session is closed exactly
//! once at the end, including after cancellation.
//!
//! ## Pacing
//!
//! Sends go through a [`Pacer`]. [`MinInterval`] waits before every send
//! except the first until `delay` has passed since the previous send. A
//! skipped recipient costs nothing, so two sends separated by a skip are
//! still exactly one interval apart.

use crate::batch::CancelFlag;
use crate::config::{CertConfig, PLACEHOLDER_PASSWORD, PLACEHOLDER_SENDER};
use crate::imaging::OutputFormat;
use crate::mail::{Attachment, Mail, MailError, MailSession, Mailer};
use crate::naming::{artifact_path, attachment_file_name};
use crate::recipients::{Recipient, RecipientsError, load_recipients};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error(transparent)]
    Recipients(#[from] RecipientsError),
    #[error(
        "Sender credentials are not configured: set SENDER_EMAIL and APP_PASSWORD, or [email] sender_email/app_password"
    )]
    MissingCredentials,
    #[error("{0}")]
    Session(#[source] MailError),
    #[error("Could not write report: {0}")]
    Report(#[from] std::io::Error),
    #[error("Could not serialize report: {0}")]
    Json(#[from] serde_json::Error),
}

/// Per-recipient result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum DispatchOutcome {
    Sent,
    Skipped { reason: String },
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchEntry {
    pub recipient: Recipient,
    #[serde(flatten)]
    pub outcome: DispatchOutcome,
}

/// Outcome of every processed recipient, in table order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchReport {
    pub entries: Vec<DispatchEntry>,
    pub cancelled: bool,
}

impl DispatchReport {
    pub fn outcomes(&self) -> Vec<&DispatchOutcome> {
        self.entries.iter().map(|e| &e.outcome).collect()
    }

    pub fn sent(&self) -> usize {
        self.count(|o| matches!(o, DispatchOutcome::Sent))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, DispatchOutcome::Skipped { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, DispatchOutcome::Failed { .. }))
    }

    fn count(&self, pred: impl Fn(&DispatchOutcome) -> bool) -> usize {
        self.entries.iter().filter(|e| pred(&e.outcome)).count()
    }

    /// Write the report as pretty JSON, e.g. to re-run failed recipients.
    pub fn write_json(&self, path: &Path) -> Result<(), DispatchError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

/// Spacing policy between consecutive sends.
pub trait Pacer {
    /// Called right before a send attempt; may block.
    fn before_send(&mut self);
    /// Called right after a send attempt, successful or not.
    fn after_send(&mut self);
}

/// Enforce a minimum gap between the end of one send and the start of the next.
#[derive(Debug, Clone)]
pub struct MinInterval {
    delay: Duration,
    last_send: Option<Instant>,
}

impl MinInterval {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            last_send: None,
        }
    }
}

impl Pacer for MinInterval {
    fn before_send(&mut self) {
        if let Some(last) = self.last_send {
            let elapsed = last.elapsed();
            if elapsed < self.delay {
                std::thread::sleep(self.delay - elapsed);
            }
        }
    }

    fn after_send(&mut self) {
        self.last_send = Some(Instant::now());
    }
}

/// Everything a dispatch run needs, resolved from [`CertConfig`].
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    pub recipients: PathBuf,
    pub output_dir: PathBuf,
    pub format: OutputFormat,
    pub sender_email: String,
    pub app_password: String,
    pub subject: String,
    /// Body template; `{name}` becomes the recipient's name.
    pub body: String,
    pub delay: Duration,
}

impl DispatchConfig {
    pub fn from_cert_config(config: &CertConfig) -> Self {
        Self {
            recipients: config.paths.recipients.clone(),
            output_dir: config.paths.output_dir.clone(),
            format: config.output.format,
            sender_email: config.email.sender_email.clone(),
            app_password: config.email.app_password.clone(),
            subject: config.email.subject.clone(),
            body: config.email.body.clone(),
            delay: config.email.delay(),
        }
    }

    /// Credentials must be present and must not be the stock placeholders.
    pub fn check_credentials(&self) -> Result<(), DispatchError> {
        let sender = self.sender_email.trim();
        let password = self.app_password.trim();
        if sender.is_empty()
            || password.is_empty()
            || sender == PLACEHOLDER_SENDER
            || password == PLACEHOLDER_PASSWORD
        {
            return Err(DispatchError::MissingCredentials);
        }
        Ok(())
    }
}

/// Progress events sent to the caller while dispatch runs.
#[derive(Debug, Clone)]
pub enum DispatchEvent {
    Connected {
        total: usize,
    },
    Sent {
        index: usize,
        total: usize,
        recipient: Recipient,
    },
    Skipped {
        index: usize,
        total: usize,
        recipient: Recipient,
        reason: String,
    },
    Failed {
        index: usize,
        total: usize,
        recipient: Recipient,
        reason: String,
    },
    CloseFailed {
        reason: String,
    },
    Finished {
        sent: usize,
        skipped: usize,
        failed: usize,
        cancelled: bool,
    },
}

pub struct DispatchPipeline {
    config: DispatchConfig,
}

impl DispatchPipeline {
    pub fn new(config: DispatchConfig) -> Self {
        Self { config }
    }

    /// Mail every recipient's certificate over one session from `mailer`.
    pub fn run<M: Mailer>(
        &self,
        mailer: &M,
        pacer: &mut impl Pacer,
        cancel: &CancelFlag,
        events: Option<Sender<DispatchEvent>>,
    ) -> Result<DispatchReport, DispatchError> {
        let recipients = load_recipients(&self.config.recipients)?;
        self.config.check_credentials()?;
        let mut session = mailer.connect().map_err(DispatchError::Session)?;

        let total = recipients.len();
        emit(&events, DispatchEvent::Connected { total });

        let mut report = DispatchReport::default();
        for (i, recipient) in recipients.iter().enumerate() {
            if cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }
            let outcome = self.dispatch_one(&mut session, pacer, recipient);
            emit(&events, outcome_event(i + 1, total, recipient, &outcome));
            report.entries.push(DispatchEntry {
                recipient: recipient.clone(),
                outcome,
            });
        }

        if let Err(e) = session.close() {
            emit(
                &events,
                DispatchEvent::CloseFailed {
                    reason: e.to_string(),
                },
            );
        }

        emit(
            &events,
            DispatchEvent::Finished {
                sent: report.sent(),
                skipped: report.skipped(),
                failed: report.failed(),
                cancelled: report.cancelled,
            },
        );
        Ok(report)
    }

    fn dispatch_one<S: MailSession>(
        &self,
        session: &mut S,
        pacer: &mut impl Pacer,
        recipient: &Recipient,
    ) -> DispatchOutcome {
        let c = &self.config;
        let path = artifact_path(&c.output_dir, &recipient.email, c.format);
        if !path.is_file() {
            return DispatchOutcome::Skipped {
                reason: format!("certificate not found: {}", path.display()),
            };
        }
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) => {
                return DispatchOutcome::Failed {
                    reason: format!("could not read {}: {e}", path.display()),
                };
            }
        };

        let mail = self.compose_mail(recipient, bytes);
        pacer.before_send();
        let result = session.send(&mail);
        pacer.after_send();
        match result {
            Ok(()) => DispatchOutcome::Sent,
            Err(e) => DispatchOutcome::Failed {
                reason: e.to_string(),
            },
        }
    }

    /// The message for one recipient: personalized body plus their certificate.
    pub fn compose_mail(&self, recipient: &Recipient, certificate: Vec<u8>) -> Mail {
        let c = &self.config;
        Mail {
            from: c.sender_email.clone(),
            to: recipient.email.clone(),
            subject: c.subject.clone(),
            body: c.body.replace("{name}", &recipient.name),
            attachment: Attachment {
                filename: attachment_file_name(&recipient.name, c.format),
                content_type: c.format.mime_type().to_string(),
                bytes: certificate,
            },
        }
    }
}

fn outcome_event(
    index: usize,
    total: usize,
    recipient: &Recipient,
    outcome: &DispatchOutcome,
) -> DispatchEvent {
    let recipient = recipient.clone();
    match outcome {
        DispatchOutcome::Sent => DispatchEvent::Sent {
            index,
            total,
            recipient,
        },
        DispatchOutcome::Skipped { reason } => DispatchEvent::Skipped {
            index,
            total,
            recipient,
            reason: reason.clone(),
        },
        DispatchOutcome::Failed { reason } => DispatchEvent::Failed {
            index,
            total,
            recipient,
            reason: reason.clone(),
        },
    }
}

fn emit(events: &Option<Sender<DispatchEvent>>, event: DispatchEvent) {
    if let Some(tx) = events {
        tx.send(event).ok();
    }
}
