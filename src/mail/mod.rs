//! Outgoing mail.
//!
//! The dispatch pipeline talks to mail servers only through two traits:
//!
//! - [`Mailer`]: knows how to open a session (connect, secure, log in)
//! - [`MailSession`]: an open, authenticated session that sends messages
//!   until it is closed
//!
//! | Implementation | Use |
//! |---|---|
//! | [`SmtpMailer`] | `lettre` SMTP transport (STARTTLS, implicit TLS or plain) |
//! | [`ConsoleMailer`] | `--dry-run`: validates and describes each message, sends nothing |
//!
//! Tests swap in a recording mock that never touches the network.

pub mod console;
pub mod smtp;

pub use console::ConsoleMailer;
pub use smtp::{SmtpMailer, SmtpSettings, build_message};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MailError {
    #[error("Could not open a mail session with {host}:{port}: {reason}")]
    Connect {
        host: String,
        port: u16,
        reason: String,
    },
    #[error("Invalid message: {0}")]
    Message(String),
    #[error("Send failed: {0}")]
    Send(String),
}

/// How the connection to the SMTP server is secured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SmtpSecurity {
    /// Plain connection upgraded with STARTTLS (port 587).
    #[default]
    StartTls,
    /// Implicit TLS from the first byte (port 465).
    Tls,
    /// No encryption. Only for local test servers.
    None,
}

/// A file attached to a [`Mail`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// One outgoing message: plain-text body plus a single attachment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mail {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub body: String,
    pub attachment: Attachment,
}

/// Opens mail sessions.
pub trait Mailer {
    type Session: MailSession;

    /// Connect, secure and authenticate. Fails without sending anything.
    fn connect(&self) -> Result<Self::Session, MailError>;
}

/// An open session; consumed by [`MailSession::close`].
pub trait MailSession {
    fn send(&mut self, mail: &Mail) -> Result<(), MailError>;
    fn close(self) -> Result<(), MailError>;
}

#[cfg(test)]
pub mod tests {
    //! Recording mailer for pipeline tests.

    use super::*;
    use std::sync::{Arc, Mutex};
    use std::time::Instant;

    /// Recorded mailer operation.
    #[derive(Debug, Clone)]
    pub enum MailOp {
        Connect,
        Send {
            to: String,
            subject: String,
            body: String,
            attachment: String,
            at: Instant,
        },
        Close,
    }

    /// Mock mailer that records operations without touching the network.
    #[derive(Default, Clone)]
    pub struct MockMailer {
        pub operations: Arc<Mutex<Vec<MailOp>>>,
        pub refuse_connect: bool,
        /// Recipients whose sends fail.
        pub failing: Vec<String>,
    }

    impl MockMailer {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn refusing() -> Self {
            Self {
                refuse_connect: true,
                ..Self::default()
            }
        }

        pub fn failing_for(addresses: &[&str]) -> Self {
            Self {
                failing: addresses.iter().map(|a| a.to_string()).collect(),
                ..Self::default()
            }
        }

        pub fn get_operations(&self) -> Vec<MailOp> {
            self.operations.lock().unwrap().clone()
        }

        /// Addresses of successful sends, in order.
        pub fn sent_to(&self) -> Vec<String> {
            self.get_operations()
                .into_iter()
                .filter_map(|op| match op {
                    MailOp::Send { to, .. } => Some(to),
                    _ => None,
                })
                .collect()
        }
    }

    pub struct MockSession {
        operations: Arc<Mutex<Vec<MailOp>>>,
        failing: Vec<String>,
    }

    impl Mailer for MockMailer {
        type Session = MockSession;

        fn connect(&self) -> Result<MockSession, MailError> {
            if self.refuse_connect {
                return Err(MailError::Connect {
                    host: "mock".to_string(),
                    port: 587,
                    reason: "authentication rejected".to_string(),
                });
            }
            self.operations.lock().unwrap().push(MailOp::Connect);
            Ok(MockSession {
                operations: Arc::clone(&self.operations),
                failing: self.failing.clone(),
            })
        }
    }

    impl MailSession for MockSession {
        fn send(&mut self, mail: &Mail) -> Result<(), MailError> {
            if self.failing.contains(&mail.to) {
                return Err(MailError::Send(format!("550 mailbox {} unavailable", mail.to)));
            }
            self.operations.lock().unwrap().push(MailOp::Send {
                to: mail.to.clone(),
                subject: mail.subject.clone(),
                body: mail.body.clone(),
                attachment: mail.attachment.filename.clone(),
                at: Instant::now(),
            });
            Ok(())
        }

        fn close(self) -> Result<(), MailError> {
            self.operations.lock().unwrap().push(MailOp::Close);
            Ok(())
        }
    }

    #[test]
    fn security_modes_parse_lowercase() {
        #[derive(Deserialize)]
        struct Wrapper {
            security: SmtpSecurity,
        }
        let w: Wrapper = toml::from_str("security = \"starttls\"").unwrap();
        assert_eq!(w.security, SmtpSecurity::StartTls);
        let w: Wrapper = toml::from_str("security = \"tls\"").unwrap();
        assert_eq!(w.security, SmtpSecurity::Tls);
        let w: Wrapper = toml::from_str("security = \"none\"").unwrap();
        assert_eq!(w.security, SmtpSecurity::None);
    }
}
