//! SMTP delivery.
//!
//! One connection is opened per report. Each recipient gets an individual
//! message; a failure for one recipient is recorded and the loop moves on.

use lettre::transport::smtp::authentication::{Credentials, Mechanism};
use lettre::transport::smtp::client::{SmtpConnection, TlsParameters};
use lettre::transport::smtp::commands::{Data, Mail, Rcpt, Rset};
use lettre::transport::smtp::extension::ClientId;
use lettre::Address;
use tracing::{debug, info, warn};

use crate::config::SmtpConfig;
use crate::errors::{LicenseError, LicenseResult};

/// An open mail session able to deliver raw messages.
pub trait MailTransport {
    /// Deliver `message` from `from` to the single address `to`.
    fn send_raw(&mut self, from: &str, to: &str, message: &str) -> LicenseResult<()>;

    /// Close the session. Called exactly once, after the last delivery attempt.
    fn close(&mut self);
}

impl<T: MailTransport + ?Sized> MailTransport for &mut T {
    fn send_raw(&mut self, from: &str, to: &str, message: &str) -> LicenseResult<()> {
        (**self).send_raw(from, to, message)
    }

    fn close(&mut self) {
        (**self).close()
    }
}

/// Result of delivering to one recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecipientOutcome {
    Delivered,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipientResult {
    pub recipient: String,
    pub outcome: RecipientOutcome,
}

/// Per-recipient outcomes of one send.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub results: Vec<RecipientResult>,
}

impl DeliveryReport {
    /// True when every recipient was delivered to.
    pub fn all_delivered(&self) -> bool {
        self.results
            .iter()
            .all(|r| r.outcome == RecipientOutcome::Delivered)
    }

    pub fn failures(&self) -> impl Iterator<Item = &RecipientResult> {
        self.results
            .iter()
            .filter(|r| r.outcome != RecipientOutcome::Delivered)
    }

    pub fn delivered_count(&self) -> usize {
        self.results.len() - self.failures().count()
    }
}

/// Build a minimal message: `To`, `From`, `Subject`, blank line, body.
pub fn compose_message(recipient: &str, sender: &str, subject: &str, message: &str) -> String {
    [
        format!("To: {recipient}"),
        format!("From: {sender}"),
        format!("Subject: {subject}"),
        String::new(),
        message.to_string(),
    ]
    .join("\r\n")
}

/// Send `message` to each recipient over `transport`, then close it.
pub fn send_smtp<T: MailTransport>(
    mut transport: T,
    sender: &str,
    recipients: &[String],
    message: &str,
    subject: &str,
) -> DeliveryReport {
    let mut report = DeliveryReport::default();

    for recipient in recipients {
        let body = compose_message(recipient, sender, subject, message);

        let outcome = match transport.send_raw(sender, recipient, &body) {
            Ok(()) => {
                println!("Report sent to {recipient}");
                info!(recipient = %recipient, "Report delivered");
                RecipientOutcome::Delivered
            }
            Err(e) => {
                warn!(recipient = %recipient, error = %e, "Report delivery failed");
                RecipientOutcome::Failed(e.to_string())
            }
        };

        report.results.push(RecipientResult {
            recipient: recipient.clone(),
            outcome,
        });
    }

    transport.close();
    report
}

fn mail_err(e: impl std::fmt::Display) -> LicenseError {
    LicenseError::MailError(e.to_string())
}

/// Convert bare `\n` line endings to `\r\n`.
fn to_crlf(message: &str) -> String {
    let mut out = String::with_capacity(message.len() + 16);
    let mut prev = '\0';
    for c in message.chars() {
        if c == '\n' && prev != '\r' {
            out.push('\r');
        }
        out.push(c);
        prev = c;
    }
    out
}

/// Authenticated SMTP session over STARTTLS.
pub struct SmtpMailer {
    conn: SmtpConnection,
}

impl SmtpMailer {
    /// Connect, upgrade with STARTTLS and log in.
    pub fn connect(config: &SmtpConfig) -> LicenseResult<Self> {
        config.require_complete()?;

        let hello = ClientId::Domain("localhost".to_string());

        debug!(server = %config.server, port = config.port, "Opening SMTP connection");
        let mut conn = SmtpConnection::connect(
            (config.server.as_str(), config.port),
            None,
            &hello,
            None,
            None,
        )
        .map_err(mail_err)?;

        let tls = TlsParameters::new(config.server.clone()).map_err(mail_err)?;
        conn.starttls(&tls, &hello).map_err(mail_err)?;

        let credentials = Credentials::new(config.username.clone(), config.password.clone());
        conn.auth(&[Mechanism::Plain, Mechanism::Login], &credentials)
            .map_err(mail_err)?;

        info!(server = %config.server, "SMTP session established");
        Ok(Self { conn })
    }

    /// One MAIL/RCPT/DATA exchange.
    ///
    /// Unlike `SmtpConnection::send`, a negative reply does not tear the
    /// connection down.
    fn transaction(&mut self, from: Address, to: Address, message: &str) -> LicenseResult<()> {
        self.conn
            .command(Mail::new(Some(from), vec![]))
            .map_err(mail_err)?;
        self.conn
            .command(Rcpt::new(to, vec![]))
            .map_err(mail_err)?;
        self.conn.command(Data).map_err(mail_err)?;
        self.conn
            .message(to_crlf(message).as_bytes())
            .map_err(mail_err)?;
        Ok(())
    }
}

impl MailTransport for SmtpMailer {
    fn send_raw(&mut self, from: &str, to: &str, message: &str) -> LicenseResult<()> {
        let from: Address = from.parse().map_err(mail_err)?;
        let to: Address = to.parse().map_err(mail_err)?;

        let result = self.transaction(from, to, message);

        // A rejected transaction leaves the session open; reset it so the
        // next recipient starts clean.
        if result.is_err() && !self.conn.has_broken() {
            if let Err(e) = self.conn.command(Rset) {
                debug!(error = %e, "SMTP RSET failed");
            }
        }

        result
    }

    fn close(&mut self) {
        if let Err(e) = self.conn.quit() {
            debug!(error = %e, "SMTP QUIT failed");
        }
    }
}
