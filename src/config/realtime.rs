//! Realtime channel configuration

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

/// Reconnection and queueing behavior of the realtime channel.
#[derive(Debug, Clone, Deserialize)]
pub struct RealtimeConfig {
    /// Delay before the first reconnect attempt, in milliseconds
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,

    /// Upper bound for the reconnect delay, in milliseconds
    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,

    /// Growth factor applied after each failed attempt
    #[serde(default = "default_multiplier")]
    pub backoff_multiplier: f64,

    /// Give up after this many consecutive failed attempts (unbounded if unset)
    #[serde(default)]
    pub max_reconnect_attempts: Option<u32>,

    /// Frames that may wait for an open connection
    #[serde(default = "default_queue_capacity")]
    pub outbound_queue_capacity: usize,
}

impl RealtimeConfig {
    /// Delay before reconnect attempt number `attempt` (1-based).
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(32) as i32;
        let delay = self.initial_backoff_ms as f64 * self.backoff_multiplier.powi(exponent);
        Duration::from_millis(delay.min(self.max_backoff_ms as f64) as u64)
    }

    /// True once `attempt` exceeds the configured limit.
    pub fn attempts_exhausted(&self, attempt: u32) -> bool {
        self.max_reconnect_attempts.is_some_and(|max| attempt > max)
    }

    /// Validate realtime configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.initial_backoff_ms == 0 || self.initial_backoff_ms > self.max_backoff_ms {
            return Err(ValidationError::InvalidBackoff);
        }
        if self.backoff_multiplier.is_nan() || self.backoff_multiplier < 1.0 {
            return Err(ValidationError::InvalidBackoffMultiplier);
        }
        if self.outbound_queue_capacity == 0 || self.outbound_queue_capacity > 4096 {
            return Err(ValidationError::InvalidQueueCapacity);
        }
        Ok(())
    }
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_ms: default_max_backoff(),
            backoff_multiplier: default_multiplier(),
            max_reconnect_attempts: None,
            outbound_queue_capacity: default_queue_capacity(),
        }
    }
}

fn default_initial_backoff() -> u64 {
    1_000
}

fn default_max_backoff() -> u64 {
    10_000
}

fn default_multiplier() -> f64 {
    1.3
}

fn default_queue_capacity() -> usize {
    64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_realtime_defaults() {
        let config = RealtimeConfig::default();
        assert_eq!(config.outbound_queue_capacity, 64);
        assert_eq!(config.max_reconnect_attempts, None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_backoff_grows_and_caps() {
        let config = RealtimeConfig {
            initial_backoff_ms: 100,
            max_backoff_ms: 1_000,
            backoff_multiplier: 2.0,
            ..Default::default()
        };
        assert_eq!(config.backoff_delay(1), Duration::from_millis(100));
        assert_eq!(config.backoff_delay(2), Duration::from_millis(200));
        assert_eq!(config.backoff_delay(4), Duration::from_millis(800));
        assert_eq!(config.backoff_delay(5), Duration::from_millis(1_000));
        assert_eq!(config.backoff_delay(500), Duration::from_millis(1_000));
    }

    #[test]
    fn test_attempt_limit() {
        let config = RealtimeConfig {
            max_reconnect_attempts: Some(3),
            ..Default::default()
        };
        assert!(!config.attempts_exhausted(3));
        assert!(config.attempts_exhausted(4));
        assert!(!RealtimeConfig::default().attempts_exhausted(u32::MAX));
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let config = RealtimeConfig {
            initial_backoff_ms: 20_000,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ValidationError::InvalidBackoff));

        let config = RealtimeConfig {
            backoff_multiplier: 0.5,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ValidationError::InvalidBackoffMultiplier));

        let config = RealtimeConfig {
            outbound_queue_capacity: 0,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ValidationError::InvalidQueueCapacity));
    }
}
