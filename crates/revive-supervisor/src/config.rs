//! Recovery Configuration
//!
//! Defines the limits and timings that drive the recovery manager.

use revive_core_recovery::{
    RecoveryError, RestartPolicy, DEFAULT_HISTORY_CAPACITY, DEFAULT_MAX_RESTART_ATTEMPTS,
    DEFAULT_RESTART_COOLDOWN_SECS,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How long `stop_monitoring` waits for the health monitor task to exit
pub const MONITOR_STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// Recovery manager configuration
///
/// Durations are (de)serialized as fractional seconds, so a TOML section
/// looks like:
///
/// ```toml
/// max_restart_attempts = 3
/// restart_cooldown = 300
/// health_check_interval = 30
/// history_capacity = 1000
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecoveryConfig {
    /// Non-forced restarts allowed before the module is left alone
    ///
    /// **Default:** 3
    pub max_restart_attempts: u32,

    /// Minimum time between two restart attempts of the same module
    ///
    /// **Default:** 5 minutes
    #[serde(with = "duration_secs")]
    pub restart_cooldown: Duration,

    /// How often the health monitor polls every module
    ///
    /// **Default:** 30 seconds
    #[serde(with = "duration_secs")]
    pub health_check_interval: Duration,

    /// Recovery records retained across all modules
    ///
    /// **Default:** 1000
    pub history_capacity: usize,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            max_restart_attempts: DEFAULT_MAX_RESTART_ATTEMPTS,
            restart_cooldown: Duration::from_secs(DEFAULT_RESTART_COOLDOWN_SECS),
            health_check_interval: Duration::from_secs(30),
            history_capacity: DEFAULT_HISTORY_CAPACITY,
        }
    }
}

impl RecoveryConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), RecoveryError> {
        if self.max_restart_attempts == 0 {
            return Err(RecoveryError::InvalidConfig(
                "max_restart_attempts must be at least 1".to_string(),
            ));
        }

        if self.health_check_interval.is_zero() {
            return Err(RecoveryError::InvalidConfig(
                "health_check_interval must be greater than 0".to_string(),
            ));
        }

        if self.history_capacity == 0 {
            return Err(RecoveryError::InvalidConfig(
                "history_capacity must be at least 1".to_string(),
            ));
        }

        Ok(())
    }

    /// Restart policy derived from this configuration
    pub fn restart_policy(&self) -> RestartPolicy {
        RestartPolicy::new(self.max_restart_attempts, self.restart_cooldown)
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RecoveryConfig::default();

        assert_eq!(config.max_restart_attempts, 3);
        assert_eq!(config.restart_cooldown, Duration::from_secs(300));
        assert_eq!(config.health_check_interval, Duration::from_secs(30));
        assert_eq!(config.history_capacity, 1000);

        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_failures() {
        let mut config = RecoveryConfig::default();

        config.max_restart_attempts = 0;
        assert!(config.validate().is_err());
        config.max_restart_attempts = 3;

        config.health_check_interval = Duration::ZERO;
        assert!(config.validate().is_err());
        config.health_check_interval = Duration::from_secs(30);

        config.history_capacity = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_cooldown_is_valid() {
        let config = RecoveryConfig {
            restart_cooldown: Duration::ZERO,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
        assert_eq!(config.restart_policy().cooldown, Duration::ZERO);
    }

    #[test]
    fn test_toml_round_trip_with_fractional_seconds() {
        let parsed: RecoveryConfig = toml::from_str(
            r#"
            max_restart_attempts = 5
            restart_cooldown = 0.25
            "#,
        )
        .unwrap();

        assert_eq!(parsed.max_restart_attempts, 5);
        assert_eq!(parsed.restart_cooldown, Duration::from_millis(250));
        // Unspecified fields fall back to defaults
        assert_eq!(parsed.health_check_interval, Duration::from_secs(30));
        assert_eq!(parsed.history_capacity, 1000);
    }

    #[test]
    fn test_negative_duration_rejected() {
        let parsed: Result<RecoveryConfig, _> = toml::from_str("restart_cooldown = -1.0");
        assert!(parsed.is_err());
    }
}
