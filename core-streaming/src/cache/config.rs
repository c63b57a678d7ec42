//! Cache configuration and timing policy

use core_runtime::config::StreamingConfig;
use std::time::Duration;

/// Configuration for the resolved-URL cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// How long a resolved URL is served after being cached (default: 50 min).
    /// Sits inside the backend's real signed-URL lifetime with a buffer.
    pub validity_window: Duration,

    /// Entries closer than this to expiry count as near-expiry (default: 10 min)
    pub near_expiry_threshold: Duration,

    /// Background refresh cadence per active group (default: 40 min)
    pub refresh_interval: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            validity_window: Duration::from_secs(50 * 60),
            near_expiry_threshold: Duration::from_secs(10 * 60),
            refresh_interval: Duration::from_secs(40 * 60),
        }
    }
}

impl From<&StreamingConfig> for CacheConfig {
    fn from(config: &StreamingConfig) -> Self {
        Self {
            validity_window: config.validity_window,
            refresh_interval: config.refresh_interval,
            ..Self::default()
        }
    }
}

impl CacheConfig {
    /// Create a new cache configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the validity window.
    pub fn with_validity_window(mut self, window: Duration) -> Self {
        self.validity_window = window;
        self
    }

    /// Set the near-expiry threshold.
    pub fn with_near_expiry_threshold(mut self, threshold: Duration) -> Self {
        self.near_expiry_threshold = threshold;
        self
    }

    /// Set the background refresh interval.
    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval;
        self
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.validity_window.is_zero() {
            return Err("validity_window must be greater than 0".to_string());
        }

        if self.refresh_interval.is_zero() {
            return Err("refresh_interval must be greater than 0".to_string());
        }

        if self.refresh_interval >= self.validity_window {
            return Err("refresh_interval must be shorter than validity_window".to_string());
        }

        if self.near_expiry_threshold >= self.validity_window {
            return Err("near_expiry_threshold must be shorter than validity_window".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CacheConfig::default();
        assert_eq!(config.validity_window, Duration::from_secs(3000));
        assert_eq!(config.near_expiry_threshold, Duration::from_secs(600));
        assert_eq!(config.refresh_interval, Duration::from_secs(2400));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let refresh_too_slow = CacheConfig::default()
            .with_refresh_interval(Duration::from_secs(3000));
        assert!(refresh_too_slow.validate().is_err());

        let zero_window = CacheConfig::default().with_validity_window(Duration::ZERO);
        assert!(zero_window.validate().is_err());

        let threshold_too_wide = CacheConfig::default()
            .with_near_expiry_threshold(Duration::from_secs(3600));
        assert!(threshold_too_wide.validate().is_err());
    }
}
