//! License expiration evaluation.
//!
//! Turns the feature list reported by a hosting server into a
//! [`LicenseStatus`] map: display name to "requires attention".

use chrono::{DateTime, Local, TimeDelta};
use std::collections::BTreeMap;

use crate::config::{RecordPolicy, ReportConfig};
use crate::errors::{LicenseError, LicenseResult};
use crate::logging::{log_license_event, LicenseEvent};
use crate::portal::responses::{FeatureLicense, ServerLicenses};

/// Feature display name mapped to `true` when the license needs attention.
pub type LicenseStatus = BTreeMap<String, bool>;

/// Default renewal look-ahead.
pub const DEFAULT_WINDOW_DAYS: i64 = 30;

/// How features are classified and which ones are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvaluationRules {
    pub window: TimeDelta,
    pub policy: RecordPolicy,
}

impl Default for EvaluationRules {
    fn default() -> Self {
        Self {
            window: TimeDelta::days(DEFAULT_WINDOW_DAYS),
            policy: RecordPolicy::Always,
        }
    }
}

impl TryFrom<&ReportConfig> for EvaluationRules {
    type Error = LicenseError;

    fn try_from(config: &ReportConfig) -> LicenseResult<Self> {
        let window = TimeDelta::try_days(config.window_days).ok_or_else(|| {
            LicenseError::ConfigError(format!(
                "report.window_days out of range: {}",
                config.window_days
            ))
        })?;

        Ok(Self {
            window,
            policy: config.record_policy,
        })
    }
}

/// True when `date` has passed or falls within 30 days of `now`.
pub fn expires_in_30_days_or_expired(date: DateTime<Local>, now: DateTime<Local>) -> bool {
    expires_within_window_or_expired(date, now, TimeDelta::days(DEFAULT_WINDOW_DAYS))
}

/// True when `date` is before `now` or at most `window` after it.
pub fn expires_within_window_or_expired(
    date: DateTime<Local>,
    now: DateTime<Local>,
    window: TimeDelta,
) -> bool {
    date < now || date - now <= window
}

/// Convert an ArcGIS millisecond timestamp to a local date-time.
///
/// Milliseconds are floored to whole seconds.
pub fn datetime_of_timestamp(timestamp_ms: i64) -> LicenseResult<DateTime<Local>> {
    let secs = timestamp_ms.div_euclid(1000);
    DateTime::from_timestamp(secs, 0)
        .map(|utc| utc.with_timezone(&Local))
        .ok_or(LicenseError::InvalidTimestamp(timestamp_ms))
}

/// Classify a single feature license.
pub fn is_expiring_concern(
    feature: &FeatureLicense,
    now: DateTime<Local>,
    window: TimeDelta,
) -> LicenseResult<bool> {
    let expires_at = datetime_of_timestamp(feature.expiration)?;
    let concern = expires_within_window_or_expired(expires_at, now, window);

    log_license_event(
        LicenseEvent::classify(expires_at, now, concern),
        &feature.display_name,
        expires_at,
    );

    Ok(concern)
}

/// Build the status map for a server's licenses.
///
/// `None` means the portal has no hosting server and yields an empty map.
pub fn get_license_status(
    licenses: Option<&ServerLicenses>,
    now: DateTime<Local>,
    rules: EvaluationRules,
) -> LicenseResult<LicenseStatus> {
    let mut status = LicenseStatus::new();

    let Some(licenses) = licenses else {
        return Ok(status);
    };

    for feature in &licenses.features {
        let concern = is_expiring_concern(feature, now, rules.window)?;
        if concern || rules.policy == RecordPolicy::Always {
            status.insert(feature.display_name.clone(), concern);
        }
    }

    Ok(status)
}

/// Names of features that need attention, in report order.
pub fn concerning_features(status: &LicenseStatus) -> Vec<&str> {
    status
        .iter()
        .filter(|(_, concern)| **concern)
        .map(|(name, _)| name.as_str())
        .collect()
}
