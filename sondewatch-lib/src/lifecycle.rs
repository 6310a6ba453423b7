use crate::constants::{ACTIVE_TIMEOUT_SECS, VISIBILITY_WINDOW_SECS};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::Display;

/// Lifecycle status of a sonde
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum DeviceStatus {
    #[default]
    Active,
    Finished,
}

/// Thresholds of the active → finished → expired lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecyclePolicy {
    /// Seconds without data after which a sonde is finished
    pub active_timeout_secs: u64,
    /// Seconds a finished sonde is kept before removal
    pub visibility_window_secs: u64,
}

impl Default for LifecyclePolicy {
    fn default() -> Self {
        Self {
            active_timeout_secs: ACTIVE_TIMEOUT_SECS,
            visibility_window_secs: VISIBILITY_WINDOW_SECS,
        }
    }
}

impl LifecyclePolicy {
    /// Seconds elapsed since `last_fix`; negative when the fix is in the future
    pub fn age_secs(now: DateTime<Utc>, last_fix: DateTime<Utc>) -> f64 {
        (now - last_fix).num_milliseconds() as f64 / 1000.0
    }

    pub fn classify(&self, age_secs: f64) -> DeviceStatus {
        if age_secs > self.active_timeout_secs as f64 {
            DeviceStatus::Finished
        } else {
            DeviceStatus::Active
        }
    }

    /// True when a sonde should be removed from the store
    pub fn is_expired(&self, status: DeviceStatus, age_secs: f64) -> bool {
        status == DeviceStatus::Finished && age_secs > self.visibility_window_secs as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_boundary() {
        let policy = LifecyclePolicy::default();
        assert_eq!(policy.classify(900.0), DeviceStatus::Active);
        assert_eq!(policy.classify(900.5), DeviceStatus::Finished);
        assert_eq!(policy.classify(-30.0), DeviceStatus::Active);
    }

    #[test]
    fn test_expiry_needs_finished_status() {
        let policy = LifecyclePolicy {
            active_timeout_secs: 60,
            visibility_window_secs: 3600,
        };
        assert!(!policy.is_expired(DeviceStatus::Finished, 3600.0));
        assert!(policy.is_expired(DeviceStatus::Finished, 3601.0));
        assert!(!policy.is_expired(DeviceStatus::Active, 7200.0));
        assert_eq!(DeviceStatus::Finished.to_string(), "finished");
    }
}
