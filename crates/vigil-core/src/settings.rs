//! Monitor settings shared across the probe, ledger, and scheduler crates

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tunables for the whole monitoring pipeline
///
/// Loadable from the optional `monitor` section of the registry document;
/// every field has a serde default matching the documented behavior.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MonitorSettings {
    /// Interval between full probe cycles
    #[serde(with = "humantime_serde")]
    pub check_interval: Duration,

    /// Interval for refreshing exported metrics from the ledger without probing
    #[serde(with = "humantime_serde")]
    pub metrics_interval: Duration,

    /// Maximum concurrent probes within one cycle
    pub max_concurrent_checks: usize,

    /// HTTP attempts per check (first try + retries)
    pub retry_attempts: u32,

    /// Hard timeout per HTTP attempt
    #[serde(with = "humantime_serde")]
    pub probe_timeout: Duration,

    /// Consecutive failures required to open the circuit breaker
    pub breaker_threshold: i64,

    /// How long an open breaker suppresses probes before auto-reset
    #[serde(with = "humantime_serde")]
    pub breaker_timeout: Duration,

    /// Rolling window length for uptime and score computation
    pub uptime_window: usize,

    /// Cap on the detailed per-provider history list
    pub history_cap: usize,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            check_interval: Duration::from_secs(60),
            metrics_interval: Duration::from_secs(30),
            max_concurrent_checks: 10,
            retry_attempts: 3,
            probe_timeout: Duration::from_secs(10),
            breaker_threshold: 5,
            breaker_timeout: Duration::from_secs(300),
            uptime_window: 100,
            history_cap: 1000,
        }
    }
}

impl MonitorSettings {
    /// Validate invariants that serde cannot express
    pub fn validate(&self) -> crate::Result<()> {
        if self.max_concurrent_checks == 0 {
            return Err(crate::Error::Config(
                "max_concurrent_checks must be > 0".to_string(),
            ));
        }
        if self.retry_attempts == 0 {
            return Err(crate::Error::Config("retry_attempts must be > 0".to_string()));
        }
        if self.breaker_threshold <= 0 {
            return Err(crate::Error::Config(
                "breaker_threshold must be > 0".to_string(),
            ));
        }
        if self.uptime_window == 0 {
            return Err(crate::Error::Config("uptime_window must be > 0".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = MonitorSettings::default();
        assert_eq!(settings.check_interval, Duration::from_secs(60));
        assert_eq!(settings.max_concurrent_checks, 10);
        assert_eq!(settings.retry_attempts, 3);
        assert_eq!(settings.breaker_threshold, 5);
        assert_eq!(settings.breaker_timeout, Duration::from_secs(300));
        assert_eq!(settings.uptime_window, 100);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_deserialize_partial_overrides() {
        let yaml = r#"
check_interval: "30s"
breaker_threshold: 3
"#;
        let settings: MonitorSettings = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(settings.check_interval, Duration::from_secs(30));
        assert_eq!(settings.breaker_threshold, 3);
        // untouched fields keep their defaults
        assert_eq!(settings.uptime_window, 100);
    }

    #[test]
    fn test_validate_rejects_zero_concurrency() {
        let settings = MonitorSettings {
            max_concurrent_checks: 0,
            ..Default::default()
        };
        assert!(settings.validate().is_err());
    }
}
