//! Structured logging for licwatch.
//!
//! Logs go to stderr so stdout carries only the report output. The level comes
//! from `logging.level`, and `RUST_LOG` overrides it when set.
//!
//! # Usage
//!
//! ```rust,ignore
//! use licwatch::logging::init_logging;
//!
//! init_logging("info")?;
//! ```

use chrono::{DateTime, Local};
use tracing::{info, info_span, warn};
use tracing_subscriber::EnvFilter;

use crate::errors::{LicenseError, LicenseResult};

/// Install the global `fmt` subscriber.
///
/// Dependencies stay at `warn`; `level` applies to this crate only.
pub fn init_logging(level: &str) -> LicenseResult<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("warn,licwatch={}", level.to_lowercase())));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .map_err(|e| LicenseError::ConfigError(format!("failed to initialise logging: {e}")))
}

/// Classification of a feature license against the renewal window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LicenseEvent {
    /// Valid beyond the window
    Valid,
    /// Still valid but inside the window
    Expiring,
    /// Already past its expiration
    Expired,
}

impl LicenseEvent {
    pub fn classify(expires_at: DateTime<Local>, now: DateTime<Local>, concern: bool) -> Self {
        if expires_at < now {
            LicenseEvent::Expired
        } else if concern {
            LicenseEvent::Expiring
        } else {
            LicenseEvent::Valid
        }
    }
}

impl std::fmt::Display for LicenseEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            LicenseEvent::Valid => "valid",
            LicenseEvent::Expiring => "expiring",
            LicenseEvent::Expired => "expired",
        };
        write!(f, "{}", s)
    }
}

/// Log the classification of one feature license.
///
/// Concerning features are logged at `warn`, valid ones at `info`.
pub fn log_license_event(event: LicenseEvent, feature: &str, expires_at: DateTime<Local>) {
    let span = info_span!(
        "feature_license",
        event = %event,
        feature = %feature,
    );
    let _enter = span.enter();

    let expires_at = expires_at.format("%Y-%m-%d %H:%M:%S");
    match event {
        LicenseEvent::Valid => info!(expires_at = %expires_at, "License evaluated"),
        LicenseEvent::Expiring | LicenseEvent::Expired => {
            warn!(expires_at = %expires_at, "License requires attention")
        }
    }
}
