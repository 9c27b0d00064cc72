//! Configuration system for licwatch.
//!
//! Configuration is loaded from multiple sources with the following precedence:
//! 1. Environment variables (highest priority)
//! 2. `licwatch.toml` file, or the file passed with `--config`
//! 3. Default values (lowest priority)
//!
//! # Environment Variables
//!
//! - `SMTP_SERVER` - SMTP relay host
//! - `SMTP_PORT` - SMTP relay port (STARTTLS)
//! - `SMTP_USERNAME` - SMTP login, also used as the sender address
//! - `SMTP_PASSWORD` - SMTP password
//! - `LICWATCH_RECIPIENTS` - Comma-separated report recipients
//! - `LICWATCH_WINDOW_DAYS` - Days before expiration a license needs attention
//! - `LICWATCH_LOG_LEVEL` - Log level (trace, debug, info, warn, error)

use config::Config;
use serde::Deserialize;
use std::env;
use std::fmt;
use std::path::Path;

use crate::errors::{LicenseError, LicenseResult};

/// Default config file stem, resolved against the working directory.
pub const DEFAULT_CONFIG_NAME: &str = "licwatch";

/// Recipients used when none are configured.
pub const DEFAULT_RECIPIENTS: [&str; 2] = ["jroebuck@esri.com", "ssong@esri.com"];

/// Upper bound for `report.window_days` (roughly a century).
pub const MAX_WINDOW_DAYS: i64 = 36_500;

/// Subject line used when none is configured.
pub const DEFAULT_SUBJECT: &str = "ArcGIS Licensing Report";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Portal connection settings
    pub gis: GisConfig,
    /// Outgoing mail settings
    pub smtp: SmtpConfig,
    /// Report contents and evaluation rules
    pub report: ReportConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Portal connection settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GisConfig {
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Referer sent with token requests and echoed on every call
    pub referer: String,
    /// Requested token lifetime in minutes
    pub token_expiration_mins: u32,
}

impl Default for GisConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            referer: "licwatch".to_string(),
            token_expiration_mins: 60,
        }
    }
}

/// SMTP relay settings.
///
/// Values usually arrive through `SMTP_*` environment variables. Missing
/// values are only an error once a report is actually sent.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct SmtpConfig {
    pub server: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    /// Envelope and `From:` address; falls back to `username`
    pub sender: String,
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            server: String::new(),
            port: 587,
            username: String::new(),
            password: String::new(),
            sender: String::new(),
        }
    }
}

impl fmt::Debug for SmtpConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmtpConfig")
            .field("server", &self.server)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("sender", &self.sender)
            .finish()
    }
}

impl SmtpConfig {
    /// Address the report is sent from.
    pub fn sender(&self) -> &str {
        if self.sender.is_empty() {
            &self.username
        } else {
            &self.sender
        }
    }

    /// Ensure everything needed to open an authenticated session is present.
    pub fn require_complete(&self) -> LicenseResult<()> {
        let missing: Vec<&str> = [
            ("SMTP_SERVER", self.server.is_empty()),
            ("SMTP_USERNAME", self.username.is_empty()),
            ("SMTP_PASSWORD", self.password.is_empty()),
        ]
        .into_iter()
        .filter_map(|(name, is_missing)| is_missing.then_some(name))
        .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(LicenseError::ConfigError(format!(
                "missing SMTP settings: {}",
                missing.join(", ")
            )))
        }
    }
}

/// Which features end up in the status map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordPolicy {
    /// Record every feature with its concern flag
    #[default]
    Always,
    /// Record only expired or expiring features
    ConcernsOnly,
}

/// Report contents and evaluation rules.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    pub recipients: Vec<String>,
    pub subject: String,
    /// Days before expiration at which a license needs attention
    pub window_days: i64,
    pub record_policy: RecordPolicy,
    /// Treat a portal without a hosting server as a failure
    pub require_hosting_server: bool,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            recipients: DEFAULT_RECIPIENTS.iter().map(|r| r.to_string()).collect(),
            subject: DEFAULT_SUBJECT.to_string(),
            window_days: 30,
            record_policy: RecordPolicy::Always,
            require_hosting_server: false,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
        }
    }
}

fn config_err(e: config::ConfigError) -> LicenseError {
    LicenseError::ConfigError(e.to_string())
}

impl MonitorConfig {
    /// Load configuration from file and environment.
    ///
    /// With `path` set the file must exist; otherwise `licwatch.toml` is read
    /// if present.
    pub fn load(path: Option<&Path>) -> LicenseResult<Self> {
        let file = match path {
            Some(p) => config::File::from(p).required(true),
            None => config::File::with_name(DEFAULT_CONFIG_NAME).required(false),
        };

        let defaults = ReportConfig::default();

        let builder = Config::builder()
            // Start with defaults
            .set_default("gis.timeout_secs", 30)
            .map_err(config_err)?
            .set_default("gis.referer", "licwatch")
            .map_err(config_err)?
            .set_default("gis.token_expiration_mins", 60)
            .map_err(config_err)?
            .set_default("smtp.server", "")
            .map_err(config_err)?
            .set_default("smtp.port", 587)
            .map_err(config_err)?
            .set_default("smtp.username", "")
            .map_err(config_err)?
            .set_default("smtp.password", "")
            .map_err(config_err)?
            .set_default("smtp.sender", "")
            .map_err(config_err)?
            .set_default("report.recipients", defaults.recipients)
            .map_err(config_err)?
            .set_default("report.subject", defaults.subject)
            .map_err(config_err)?
            .set_default("report.window_days", defaults.window_days)
            .map_err(config_err)?
            .set_default("report.record_policy", "always")
            .map_err(config_err)?
            .set_default("report.require_hosting_server", false)
            .map_err(config_err)?
            .set_default("logging.level", "warn")
            .map_err(config_err)?
            .add_source(file)
            // Override with environment variables
            .set_override_option("smtp.server", env::var("SMTP_SERVER").ok())
            .map_err(config_err)?
            .set_override_option(
                "smtp.port",
                env::var("SMTP_PORT")
                    .ok()
                    .and_then(|v| v.parse::<i64>().ok()),
            )
            .map_err(config_err)?
            .set_override_option("smtp.username", env::var("SMTP_USERNAME").ok())
            .map_err(config_err)?
            .set_override_option("smtp.password", env::var("SMTP_PASSWORD").ok())
            .map_err(config_err)?
            .set_override_option(
                "report.recipients",
                env::var("LICWATCH_RECIPIENTS").ok().map(|v| {
                    v.split(',')
                        .map(str::trim)
                        .filter(|r| !r.is_empty())
                        .map(str::to_string)
                        .collect::<Vec<String>>()
                }),
            )
            .map_err(config_err)?
            .set_override_option(
                "report.window_days",
                env::var("LICWATCH_WINDOW_DAYS")
                    .ok()
                    .and_then(|v| v.parse::<i64>().ok()),
            )
            .map_err(config_err)?
            .set_override_option("logging.level", env::var("LICWATCH_LOG_LEVEL").ok())
            .map_err(config_err)?;

        let settings = builder
            .build()
            .map_err(|e| LicenseError::ConfigError(format!("failed to build config: {e}")))?;

        let config: Self = settings
            .try_deserialize()
            .map_err(|e| LicenseError::ConfigError(format!("failed to deserialize config: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    ///
    /// SMTP credentials are checked separately by
    /// [`SmtpConfig::require_complete`] so that `--dry-run` works without them.
    pub fn validate(&self) -> LicenseResult<()> {
        if self.gis.timeout_secs == 0 {
            return Err(LicenseError::ConfigError(
                "gis.timeout_secs must be greater than 0".to_string(),
            ));
        }

        if self.smtp.port == 0 {
            return Err(LicenseError::ConfigError(
                "smtp.port must be greater than 0".to_string(),
            ));
        }

        if self.report.window_days <= 0 {
            return Err(LicenseError::ConfigError(
                "report.window_days must be greater than 0".to_string(),
            ));
        }
        if self.report.window_days > MAX_WINDOW_DAYS {
            return Err(LicenseError::ConfigError(format!(
                "report.window_days must be at most {MAX_WINDOW_DAYS}"
            )));
        }

        if self.report.recipients.is_empty() {
            return Err(LicenseError::ConfigError(
                "report.recipients cannot be empty".to_string(),
            ));
        }

        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            other => {
                return Err(LicenseError::ConfigError(format!(
                    "logging.level must be one of: trace, debug, info, warn, error. Got '{other}'"
                )));
            }
        }

        Ok(())
    }
}
