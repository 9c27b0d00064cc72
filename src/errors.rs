//! Error types shared across licwatch.

use thiserror::Error;

/// Everything that can stop a licwatch run.
///
/// Per-recipient mail failures are not represented here; they are collected
/// as [`crate::report::RecipientOutcome::Failed`] so one bad address never
/// aborts the batch.
#[derive(Debug, Error)]
pub enum LicenseError {
    /// Malformed command line.
    #[error("usage error: {0}")]
    UsageError(String),

    /// Configuration could not be loaded or failed validation.
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// Transport-level HTTP failure.
    #[error("network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    /// The portal refused the supplied credentials.
    #[error("authentication failed: {0}")]
    AuthError(String),

    /// The portal or server answered with an error object or unexpected payload.
    #[error("server error: {0}")]
    ServerError(String),

    /// A license expiration that cannot be represented as a calendar date.
    #[error("invalid expiration timestamp: {0} ms")]
    InvalidTimestamp(i64),

    /// No hosting server is federated with the portal.
    #[error("no hosting server is configured for this portal")]
    NoHostingServer,

    /// The SMTP session could not be opened or authenticated.
    #[error("mail error: {0}")]
    MailError(String),
}

pub type LicenseResult<T> = Result<T, LicenseError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_context() {
        let err = LicenseError::AuthError("Invalid username or password.".to_string());
        assert_eq!(
            err.to_string(),
            "authentication failed: Invalid username or password."
        );

        let err = LicenseError::InvalidTimestamp(i64::MAX);
        assert!(err.to_string().contains("ms"));
    }
}
