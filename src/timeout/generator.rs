//! Jittered Request Timeouts
//!
//! Spreads the deadlines of requests sent to many nodes at once so that
//! unresponsive nodes do not all time out (and get retried) in the same
//! instant, and pads each deadline with the expected round-trip latency.

use super::types::TimeoutConfig;
use crate::error::ConfigError;

use parking_lot::RwLock;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;

pub struct RequestTimeoutGenerator {
    /// Immutable snapshot, replaced as a whole on reconfiguration.
    config: RwLock<Arc<TimeoutConfig>>,
    round_trip_latency_budget: Duration,
}

impl RequestTimeoutGenerator {
    pub fn new(config: TimeoutConfig, round_trip_latency_budget: Duration) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config: RwLock::new(Arc::new(config)),
            round_trip_latency_budget,
        })
    }

    pub fn config(&self) -> Arc<TimeoutConfig> {
        self.config.read().clone()
    }

    pub fn round_trip_latency_budget(&self) -> Duration {
        self.round_trip_latency_budget
    }

    /// Swaps in a new configuration. An invalid one is rejected and the
    /// current configuration stays in force.
    pub fn reconfigure(&self, config: TimeoutConfig) -> Result<(), ConfigError> {
        config.validate()?;
        let previous = std::mem::replace(&mut *self.config.write(), Arc::new(config));
        if *previous != config {
            tracing::info!(
                "Request timeout window changed: {}ms [{}%, {}%] -> {}ms [{}%, {}%]",
                previous.max_timeout_ms,
                previous.start_percent,
                previous.stop_percent,
                config.max_timeout_ms,
                config.start_percent,
                config.stop_percent
            );
        }
        Ok(())
    }

    pub fn generate(&self) -> Duration {
        self.generate_with(&mut rand::thread_rng(), None)
    }

    /// Timeout for a node with an optional measured latency. A hint replaces
    /// the fixed latency budget for that call.
    pub fn generate_for(&self, latency_hint: Option<Duration>) -> Duration {
        self.generate_with(&mut rand::thread_rng(), latency_hint)
    }

    pub fn generate_with<R: Rng>(&self, rng: &mut R, latency_hint: Option<Duration>) -> Duration {
        let config = self.config();
        self.draw(rng, &config, latency_hint)
    }

    /// Draws from `config` instead of the generator's own snapshot, for
    /// callers that keep the window inside a larger configuration snapshot.
    pub fn generate_within(&self, config: &TimeoutConfig, latency_hint: Option<Duration>) -> Duration {
        self.draw(&mut rand::thread_rng(), config, latency_hint)
    }

    fn draw<R: Rng>(&self, rng: &mut R, config: &TimeoutConfig, latency_hint: Option<Duration>) -> Duration {
        let (low, high) = config.window_ms();
        let jittered = if low == high {
            low
        } else {
            rng.gen_range(low..=high)
        };
        let latency = latency_hint.unwrap_or(self.round_trip_latency_budget);
        Duration::from_millis(jittered).saturating_add(latency)
    }
}
