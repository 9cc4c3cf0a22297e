//! SMTP delivery via `lettre`.
//!
//! A session is one pooled [`SmtpTransport`]. Connecting runs a full
//! handshake (TLS and login) through `test_connection`, so bad credentials
//! surface before the first certificate goes out; later sends reuse the
//! pooled connection.

use super::{Mail, MailError, MailSession, Mailer, SmtpSecurity};
use crate::config::EmailConfig;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};

/// Server address and login.
#[derive(Debug, Clone)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub security: SmtpSecurity,
    pub username: String,
    pub password: String,
}

impl From<&EmailConfig> for SmtpSettings {
    fn from(email: &EmailConfig) -> Self {
        Self {
            host: email.smtp_server.clone(),
            port: email.smtp_port,
            security: email.security,
            username: email.sender_email.clone(),
            password: email.app_password.clone(),
        }
    }
}

pub struct SmtpMailer {
    settings: SmtpSettings,
}

impl SmtpMailer {
    pub fn new(settings: SmtpSettings) -> Self {
        Self { settings }
    }

    fn connect_error(&self, reason: impl ToString) -> MailError {
        MailError::Connect {
            host: self.settings.host.clone(),
            port: self.settings.port,
            reason: reason.to_string(),
        }
    }

    fn transport(&self) -> Result<SmtpTransport, MailError> {
        let s = &self.settings;
        let builder = match s.security {
            SmtpSecurity::StartTls => {
                SmtpTransport::starttls_relay(&s.host).map_err(|e| self.connect_error(e))?
            }
            SmtpSecurity::Tls => SmtpTransport::relay(&s.host).map_err(|e| self.connect_error(e))?,
            SmtpSecurity::None => SmtpTransport::builder_dangerous(&s.host),
        };
        Ok(builder
            .port(s.port)
            .credentials(Credentials::new(s.username.clone(), s.password.clone()))
            .build())
    }
}

impl Mailer for SmtpMailer {
    type Session = SmtpSession;

    fn connect(&self) -> Result<SmtpSession, MailError> {
        let transport = self.transport()?;
        match transport.test_connection() {
            Ok(true) => Ok(SmtpSession { transport }),
            Ok(false) => Err(self.connect_error("server did not accept the session")),
            Err(e) => Err(self.connect_error(e)),
        }
    }
}

pub struct SmtpSession {
    transport: SmtpTransport,
}

impl MailSession for SmtpSession {
    fn send(&mut self, mail: &Mail) -> Result<(), MailError> {
        let message = build_message(mail)?;
        self.transport
            .send(&message)
            .map(|_| ())
            .map_err(|e| MailError::Send(e.to_string()))
    }

    fn close(self) -> Result<(), MailError> {
        // Dropping the transport shuts down its connection pool.
        drop(self.transport);
        Ok(())
    }
}

/// Build the MIME message: `multipart/mixed` with a plain-text body and the
/// certificate attachment. Malformed addresses fail here, before any I/O.
pub fn build_message(mail: &Mail) -> Result<Message, MailError> {
    let from: Mailbox = mail
        .from
        .parse()
        .map_err(|e| MailError::Message(format!("invalid sender '{}': {e}", mail.from)))?;
    let to: Mailbox = mail
        .to
        .parse()
        .map_err(|e| MailError::Message(format!("invalid recipient '{}': {e}", mail.to)))?;
    let content_type = ContentType::parse(&mail.attachment.content_type).map_err(|e| {
        MailError::Message(format!(
            "invalid content type '{}': {e}",
            mail.attachment.content_type
        ))
    })?;

    Message::builder()
        .from(from)
        .to(to)
        .subject(mail.subject.clone())
        .multipart(
            MultiPart::mixed()
                .singlepart(SinglePart::plain(mail.body.clone()))
                .singlepart(
                    Attachment::new(mail.attachment.filename.clone())
                        .body(mail.attachment.bytes.clone(), content_type),
                ),
        )
        .map_err(|e| MailError::Message(e.to_string()))
}
