#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Number of serializers in the fallback pool if not otherwise configured.
/// Best if prime.
pub const DEFAULT_POOL_SIZE: usize = 31;

/// Queue depth at which a serializer raises the process-wide overload alert.
pub const DEFAULT_QUEUE_HIGH_WATER: usize = 500;

/// Queue depth at which an alerting serializer clears its alert again.
pub const DEFAULT_QUEUE_LOW_WATER: usize = 450;

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone)]
pub struct DistributorConfig {
    /// Size of the fallback serializer pool used when a message carries no
    /// dialog or transaction affinity.
    pub pool_size: usize,
    /// Per-serializer queue depth that raises the overload alert.
    pub queue_high_water: usize,
    /// Queue depth at which an alerting serializer goes quiet again.
    pub queue_low_water: usize,
    /// Digest realm carried by the synthetic auth handed to unidentified
    /// requests.
    pub artificial_realm: String,
}

impl Default for DistributorConfig {
    fn default() -> Self {
        Self {
            pool_size: DEFAULT_POOL_SIZE,
            queue_high_water: DEFAULT_QUEUE_HIGH_WATER,
            queue_low_water: DEFAULT_QUEUE_LOW_WATER,
            artificial_realm: "asterisk".into(),
        }
    }
}

impl DistributorConfig {
    pub fn validate(&self) -> Result<()> {
        if self.pool_size == 0 {
            return Err(Error::Configuration("pool_size must be at least 1".into()));
        }
        if self.queue_low_water >= self.queue_high_water {
            return Err(Error::Configuration(
                "queue_low_water must be below queue_high_water".into(),
            ));
        }
        if self.artificial_realm.is_empty() {
            return Err(Error::Configuration(
                "artificial_realm must not be empty".into(),
            ));
        }
        Ok(())
    }
}
