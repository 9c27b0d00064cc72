//! Report rendering and delivery.

pub mod mailer;

pub use mailer::{
    compose_message, send_smtp, DeliveryReport, MailTransport, RecipientOutcome,
    RecipientResult, SmtpMailer,
};

use crate::config::ReportConfig;
use crate::evaluator::LicenseStatus;

pub const REQUIRES_ATTENTION: &str = "Requires Attention";
pub const VALID: &str = "Valid";

/// One `<name>: <state>` line per feature, CRLF separated.
pub fn render_summary(status: &LicenseStatus) -> String {
    status
        .iter()
        .map(|(name, concern)| {
            let state = if *concern { REQUIRES_ATTENTION } else { VALID };
            format!("{name}: {state}")
        })
        .collect::<Vec<_>>()
        .join("\r\n")
}

/// Full report body.
pub fn render_report(status: &LicenseStatus) -> String {
    format!(
        "\nArcGIS Licenses Report:\n\n{}\n    ",
        render_summary(status)
    )
}

/// Render `status` and mail it to every configured recipient.
pub fn send_report_email<T: MailTransport>(
    status: &LicenseStatus,
    report: &ReportConfig,
    sender: &str,
    transport: T,
) -> DeliveryReport {
    let message = render_report(status);
    send_smtp(
        transport,
        sender,
        &report.recipients,
        &message,
        &report.subject,
    )
}
