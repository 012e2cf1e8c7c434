//! Timer manager configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{TimerError, TimerResult};

/// Longest accepted tick period.
pub const MAX_TICK_PERIOD: Duration = Duration::from_secs(3600);

/// Configuration fixed at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimerConfig {
    /// Number of timer slots; the maximum number of timers that exist at once.
    pub pool_capacity: usize,
    /// Number of registry buckets.
    pub bucket_count: usize,
    /// Wall-clock length of one tick, used by [`IntervalTicker`](crate::IntervalTicker).
    pub tick_period: Duration,
    /// Capacity of the tick notification channel.
    pub tick_queue_depth: usize,
    /// Name of the timer task thread.
    pub worker_name: String,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            pool_capacity: 16,
            bucket_count: 10,
            tick_period: Duration::from_millis(100),
            tick_queue_depth: 1024,
            worker_name: "softtimer-task".to_string(),
        }
    }
}

impl TimerConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> TimerResult<()> {
        if self.pool_capacity == 0 {
            return Err(TimerError::invalid_configuration(
                "pool_capacity must be greater than 0",
            ));
        }
        if u32::try_from(self.pool_capacity).map_or(true, |c| c == u32::MAX) {
            return Err(TimerError::invalid_configuration(
                "pool_capacity must be below u32::MAX",
            ));
        }
        if self.bucket_count == 0 {
            return Err(TimerError::invalid_configuration(
                "bucket_count must be greater than 0",
            ));
        }
        if u32::try_from(self.bucket_count).is_err() {
            return Err(TimerError::invalid_configuration(
                "bucket_count must fit in u32",
            ));
        }
        if self.tick_period.is_zero() {
            return Err(TimerError::invalid_configuration(
                "tick_period must be greater than 0",
            ));
        }
        if self.tick_period > MAX_TICK_PERIOD {
            return Err(TimerError::invalid_configuration(format!(
                "tick_period must be at most {}s",
                MAX_TICK_PERIOD.as_secs()
            )));
        }
        if self.tick_queue_depth == 0 {
            return Err(TimerError::invalid_configuration(
                "tick_queue_depth must be greater than 0",
            ));
        }
        Ok(())
    }

    /// Create a configuration builder.
    #[must_use]
    pub fn builder() -> TimerConfigBuilder {
        TimerConfigBuilder::default()
    }
}

/// Builder for `TimerConfig`.
#[derive(Debug, Default)]
pub struct TimerConfigBuilder {
    config: TimerConfig,
}

impl TimerConfigBuilder {
    /// Set the number of timer slots.
    #[must_use]
    pub fn pool_capacity(mut self, capacity: usize) -> Self {
        self.config.pool_capacity = capacity;
        self
    }

    /// Set the number of registry buckets.
    #[must_use]
    pub fn bucket_count(mut self, buckets: usize) -> Self {
        self.config.bucket_count = buckets;
        self
    }

    /// Set the tick period.
    #[must_use]
    pub fn tick_period(mut self, period: Duration) -> Self {
        self.config.tick_period = period;
        self
    }

    /// Set the tick channel capacity.
    #[must_use]
    pub fn tick_queue_depth(mut self, depth: usize) -> Self {
        self.config.tick_queue_depth = depth;
        self
    }

    /// Set the timer task thread name.
    #[must_use]
    pub fn worker_name(mut self, name: impl Into<String>) -> Self {
        self.config.worker_name = name.into();
        self
    }

    /// Build the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn build(self) -> TimerResult<TimerConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(TimerConfig::default().validate().is_ok());
    }

    #[test]
    fn test_config_builder() {
        let config = TimerConfig::builder()
            .pool_capacity(4)
            .bucket_count(8)
            .tick_period(Duration::from_millis(5))
            .tick_queue_depth(32)
            .worker_name("timers")
            .build()
            .unwrap();

        assert_eq!(config.pool_capacity, 4);
        assert_eq!(config.bucket_count, 8);
        assert_eq!(config.tick_period, Duration::from_millis(5));
        assert_eq!(config.tick_queue_depth, 32);
        assert_eq!(config.worker_name, "timers");
    }

    #[test]
    fn test_config_validation() {
        let config = TimerConfig {
            pool_capacity: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = TimerConfig {
            bucket_count: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = TimerConfig {
            tick_period: Duration::ZERO,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = TimerConfig {
            tick_queue_depth: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_tick_period_upper_bound() {
        let config = TimerConfig {
            tick_period: MAX_TICK_PERIOD,
            ..Default::default()
        };
        assert!(config.validate().is_ok());

        let err = TimerConfig::builder()
            .tick_period(Duration::MAX)
            .build()
            .unwrap_err();
        assert!(matches!(err, TimerError::InvalidConfiguration(_)));
        assert!(err.to_string().contains("tick_period must be at most 3600s"));

        let config = TimerConfig {
            tick_period: MAX_TICK_PERIOD + Duration::from_nanos(1),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: TimerConfig = serde_json::from_str(r#"{"pool_capacity": 3}"#).unwrap();
        assert_eq!(config.pool_capacity, 3);
        assert_eq!(config.bucket_count, 10);
        assert!(config.validate().is_ok());
    }
}
