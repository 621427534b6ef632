//! Configuration management for Gatekeeper.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use crate::admission::KeyStrategy;
use crate::error::{GatekeeperError, Result};

/// Main configuration for the Gatekeeper service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatekeeperConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Admission limiter configuration
    #[serde(default)]
    pub limiter: LimiterConfig,
}

impl Default for GatekeeperConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            limiter: LimiterConfig::default(),
        }
    }
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP server listen address
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
        }
    }
}

fn default_listen_addr() -> SocketAddr {
    "127.0.0.1:5000".parse().unwrap()
}

/// Admission limiter configuration.
///
/// Read once at startup and never mutated afterwards. Every field has a
/// serde default so a partial (or absent) configuration file still yields
/// a working limiter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimiterConfig {
    /// Maximum burst size: tokens held by a full bucket
    #[serde(default = "default_capacity")]
    pub capacity: u32,

    /// Bucket refill rate in tokens per second
    #[serde(default = "default_refill_rate")]
    pub refill_rate_per_sec: f64,

    /// Seconds of inactivity after which a key's bucket may be evicted
    #[serde(default = "default_idle_eviction_secs")]
    pub idle_eviction_secs: u64,

    /// Interval in seconds between eviction sweeps
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,

    /// How admission keys are derived from inbound requests
    #[serde(default)]
    pub key_strategy: KeyStrategy,
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            refill_rate_per_sec: default_refill_rate(),
            idle_eviction_secs: default_idle_eviction_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
            key_strategy: KeyStrategy::default(),
        }
    }
}

fn default_capacity() -> u32 {
    100
}

fn default_refill_rate() -> f64 {
    10.0
}

fn default_idle_eviction_secs() -> u64 {
    300
}

fn default_sweep_interval_secs() -> u64 {
    30
}

impl LimiterConfig {
    /// Inactivity threshold after which a bucket is eligible for eviction.
    pub fn idle_eviction_after(&self) -> Duration {
        Duration::from_secs(self.idle_eviction_secs)
    }

    /// Interval between background eviction sweeps.
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

impl GatekeeperConfig {
    /// Load configuration from a file path.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: GatekeeperConfig = serde_yaml::from_str(&contents)
            .map_err(|e| GatekeeperError::Config(e.to_string()))?;
        Ok(config)
    }

    /// Validate the configuration.
    ///
    /// Called once at startup, before the server binds. A validation
    /// failure is fatal: the process must not begin serving with a
    /// meaningless limiter.
    pub fn validate(&self) -> Result<()> {
        if self.limiter.capacity < 1 {
            return Err(GatekeeperError::Config(
                "limiter.capacity must be at least 1".to_string(),
            ));
        }
        if !(self.limiter.refill_rate_per_sec > 0.0) {
            return Err(GatekeeperError::Config(
                "limiter.refill_rate_per_sec must be positive".to_string(),
            ));
        }
        if self.limiter.idle_eviction_secs == 0 {
            return Err(GatekeeperError::Config(
                "limiter.idle_eviction_secs must be positive".to_string(),
            ));
        }
        if self.limiter.sweep_interval_secs == 0 {
            return Err(GatekeeperError::Config(
                "limiter.sweep_interval_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = GatekeeperConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let mut config = GatekeeperConfig::default();
        config.limiter.capacity = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_non_positive_refill_rate_rejected() {
        let mut config = GatekeeperConfig::default();
        config.limiter.refill_rate_per_sec = 0.0;
        assert!(config.validate().is_err());

        config.limiter.refill_rate_per_sec = -1.0;
        assert!(config.validate().is_err());

        config.limiter.refill_rate_per_sec = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_durations_rejected() {
        let mut config = GatekeeperConfig::default();
        config.limiter.idle_eviction_secs = 0;
        assert!(config.validate().is_err());

        let mut config = GatekeeperConfig::default();
        config.limiter.sweep_interval_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let yaml = r#"
limiter:
  capacity: 5
  refill_rate_per_sec: 1.0
  key_strategy: forwarded-header
"#;
        let config: GatekeeperConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.limiter.capacity, 5);
        assert_eq!(config.limiter.refill_rate_per_sec, 1.0);
        assert_eq!(config.limiter.key_strategy, KeyStrategy::ForwardedHeader);
        assert_eq!(config.limiter.idle_eviction_secs, 300);
        assert_eq!(config.server.listen_addr, default_listen_addr());
    }
}
