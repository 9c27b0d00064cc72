//! licwatch - ArcGIS Server license expiration report
//!
//! Connects to a Portal for ArcGIS, reads the feature licenses of its hosting
//! server, flags every license that is expired or expires within the renewal
//! window (30 days by default) and mails a plain-text report.
//!
//! # Example
//!
//! ```rust,ignore
//! use licwatch::clock::{Clock, SystemClock};
//! use licwatch::config::GisConfig;
//! use licwatch::evaluator::{get_license_status, EvaluationRules};
//! use licwatch::portal::{get_server_licenses, PortalSession};
//!
//! let session = PortalSession::connect(url, user, pass, &GisConfig::default()).await?;
//! let licenses = get_server_licenses(&session).await?;
//! let status = get_license_status(licenses.as_ref(), SystemClock.now(), EvaluationRules::default())?;
//! ```

pub mod cli;
pub mod clock;
pub mod config;
pub mod errors;
pub mod evaluator;
pub mod logging;
pub mod portal;
pub mod report;

pub use errors::{LicenseError, LicenseResult};
pub use evaluator::LicenseStatus;
