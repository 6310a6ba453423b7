//! Engine configuration.
//!
//! Loaded from an optional TOML file merged with `SONDEWATCH_` environment
//! variables, nested keys separated by a double underscore:
//!
//! ```toml
//! [receiver]
//! name = "RX Gdynia Oksywie"
//! lat = 54.546
//! lon = 18.5501
//!
//! [lifecycle]
//! visibility_window_secs = 3600
//!
//! [parse.fallback]
//! layout = "custom"
//! identifier = 0
//! timestamp = 3
//! ```
//!
//! `SONDEWATCH_POLL__INTERVAL_MS=2000` overrides `poll.interval_ms`.

use crate::columns::FallbackTable;
use crate::constants::*;
use crate::error::SondeError;
use crate::lifecycle::LifecyclePolicy;
use crate::timestamp::NaiveZone;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Environment variable prefix
pub const ENV_PREFIX: &str = "SONDEWATCH_";

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub receiver: Receiver,
    pub lifecycle: LifecyclePolicy,
    pub history: HistoryConfig,
    pub events: EventsConfig,
    pub parse: ParseConfig,
    pub poll: PollConfig,
    pub feed: FeedConfig,
}

/// Fixed ground receiver
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Receiver {
    pub name: String,
    pub lat: f64,
    pub lon: f64,
}

impl Default for Receiver {
    fn default() -> Self {
        Self {
            name: "RX Gdynia Oksywie".to_string(),
            lat: DEFAULT_RX_LAT,
            lon: DEFAULT_RX_LON,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Maximum retained fixes per sonde
    pub capacity: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            capacity: HISTORY_LIMIT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventsConfig {
    /// Descent below the apex required to publish the burst marker (m)
    pub burst_hysteresis_m: f64,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            burst_hysteresis_m: BURST_HYSTERESIS_M,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParseConfig {
    pub fallback: FallbackTable,
    /// Zone for timestamps without an offset
    pub naive_zone: NaiveZone,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    pub interval_ms: u64,
    pub fetch_timeout_ms: u64,
    /// Attempts per cycle including the first one
    pub max_attempts: u32,
    /// Attempt `n` is followed by a pause of `n * retry_unit_ms`
    pub retry_unit_ms: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_ms: POLL_INTERVAL_MS,
            fetch_timeout_ms: FETCH_TIMEOUT_MS,
            max_attempts: FETCH_ATTEMPTS,
            retry_unit_ms: RETRY_UNIT_MS,
        }
    }
}

impl PollConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    /// Pause after failed attempt number `attempt` (1-based)
    pub fn retry_delay(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.retry_unit_ms.saturating_mul(u64::from(attempt)))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    /// Proxy endpoint, e.g. `https://example.org/api/radiosondy`
    pub url: Option<String>,
    /// Identifier substring filter
    pub filter: Option<String>,
}

impl EngineConfig {
    /// Defaults merged with `SONDEWATCH_` environment variables
    pub fn load() -> Result<Self, SondeError> {
        let config: Self = Self::figment(None).extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults, then the TOML file at `path`, then the environment
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, SondeError> {
        let config: Self = Self::figment(Some(path.as_ref())).extract()?;
        config.validate()?;
        Ok(config)
    }

    fn figment(path: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(EngineConfig::default()));
        if let Some(path) = path {
            figment = figment.merge(Toml::file(path));
        }
        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Reject values the engine cannot run with
    pub fn validate(&self) -> Result<(), SondeError> {
        if !(-90.0..=90.0).contains(&self.receiver.lat) || !(-180.0..=180.0).contains(&self.receiver.lon) {
            return Err(SondeError::InvalidConfig(format!(
                "receiver position {}, {} is out of range",
                self.receiver.lat, self.receiver.lon
            )));
        }
        if self.history.capacity == 0 {
            return Err(SondeError::InvalidConfig("history.capacity must be at least 1".to_string()));
        }
        if self.lifecycle.visibility_window_secs < self.lifecycle.active_timeout_secs {
            return Err(SondeError::InvalidConfig(
                "lifecycle.visibility_window_secs must not be shorter than active_timeout_secs".to_string(),
            ));
        }
        if !self.events.burst_hysteresis_m.is_finite() || self.events.burst_hysteresis_m < 0.0 {
            return Err(SondeError::InvalidConfig(
                "events.burst_hysteresis_m must be a non-negative number".to_string(),
            ));
        }
        if self.poll.interval_ms == 0 || self.poll.fetch_timeout_ms == 0 || self.poll.max_attempts == 0 {
            return Err(SondeError::InvalidConfig(
                "poll.interval_ms, poll.fetch_timeout_ms and poll.max_attempts must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = EngineConfig::default();
        config.validate().unwrap();
        assert_eq!(config.history.capacity, 600);
        assert_eq!(config.lifecycle.visibility_window_secs, 21_600);
        assert_eq!(config.poll.retry_delay(2), Duration::from_millis(2400));
    }

    #[test]
    fn test_load_from_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[lifecycle]\nvisibility_window_secs = 3600\n\n[parse]\nnaive_zone = \"utc\"\n\n[parse.fallback]\nlayout = \"custom\"\nidentifier = 2\n"
        )
        .unwrap();

        let config = EngineConfig::load_from(file.path()).unwrap();
        assert_eq!(config.lifecycle.visibility_window_secs, 3600);
        assert_eq!(config.lifecycle.active_timeout_secs, 900);
        assert_eq!(config.parse.naive_zone, NaiveZone::Utc);
        assert_eq!(config.parse.fallback.layout, "custom");
        assert_eq!(config.parse.fallback.identifier, Some(2));
        // unnamed offsets keep the export layout
        assert_eq!(config.parse.fallback.latitude, Some(5));
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let mut config = EngineConfig::default();
        config.history.capacity = 0;
        assert!(matches!(config.validate(), Err(SondeError::InvalidConfig(_))));

        let mut config = EngineConfig::default();
        config.lifecycle.visibility_window_secs = 10;
        assert!(config.validate().is_err());
    }
}
