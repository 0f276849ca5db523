use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Largest `max_timeout_ms` for which the percentage window cannot overflow.
pub const MAX_TIMEOUT_MS: u64 = u64::MAX / 100;

/// Operator-facing bounds for per-request timeouts.
///
/// Generated timeouts fall uniformly within
/// `[max_timeout * start_percent / 100, max_timeout * stop_percent / 100]`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TimeoutConfig {
    pub max_timeout_ms: u64,
    pub start_percent: u8,
    pub stop_percent: u8,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            max_timeout_ms: 60_000,
            start_percent: 80,
            stop_percent: 95,
        }
    }
}

impl TimeoutConfig {
    pub fn new(max_timeout: Duration, start_percent: u8, stop_percent: u8) -> Result<Self, ConfigError> {
        let max_timeout_ms = u64::try_from(max_timeout.as_millis())
            .map_err(|_| ConfigError::TimeoutTooLarge(max_timeout.as_millis()))?;
        let config = Self {
            max_timeout_ms,
            start_percent,
            stop_percent,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_timeout_ms == 0 {
            return Err(ConfigError::ZeroTimeout);
        }
        if self.max_timeout_ms > MAX_TIMEOUT_MS {
            return Err(ConfigError::TimeoutTooLarge(u128::from(self.max_timeout_ms)));
        }
        for percent in [self.start_percent, self.stop_percent] {
            if percent > 100 {
                return Err(ConfigError::PercentOutOfRange(percent));
            }
        }
        if self.start_percent > self.stop_percent {
            return Err(ConfigError::InvertedWindow {
                start: self.start_percent,
                stop: self.stop_percent,
            });
        }
        Ok(())
    }

    pub fn max_timeout(&self) -> Duration {
        Duration::from_millis(self.max_timeout_ms)
    }

    /// Inclusive millisecond window the random part is drawn from.
    ///
    /// Saturates instead of overflowing for configs that skipped `validate`.
    pub fn window_ms(&self) -> (u64, u64) {
        let percent_of = |percent: u8| {
            self.max_timeout_ms
                .saturating_mul(u64::from(percent.min(100)))
                / 100
        };
        let low = percent_of(self.start_percent);
        let high = percent_of(self.stop_percent).max(low);
        (low, high)
    }
}
