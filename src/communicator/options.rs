use crate::codec::CompressionType;
use crate::error::ConfigError;
use crate::state::DEFAULT_DISTRIBUTION_BITS;
use crate::timeout::TimeoutConfig;
use serde::{Deserialize, Serialize};

/// Tunables pushed to the communicator through `propagate_options`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CommunicatorOptions {
    pub timeout: TimeoutConfig,
    /// Expected distribution bits; bundles announcing other values are logged.
    pub distribution_bits: u8,
    pub compression: CompressionType,
}

impl Default for CommunicatorOptions {
    fn default() -> Self {
        Self {
            timeout: TimeoutConfig::default(),
            distribution_bits: DEFAULT_DISTRIBUTION_BITS,
            compression: CompressionType::Fast,
        }
    }
}

impl CommunicatorOptions {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.timeout.validate()
    }
}
