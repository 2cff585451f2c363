//! Registry configuration

use std::time::Duration;

/// Default delay between a registrant disconnect and removal of its record
pub const DEFAULT_EVICTION_GRACE_PERIOD: Duration = Duration::from_secs(10);

/// Configuration for the service registry
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// How long a disconnected registrant's record stays (as `DOWN`) before
    /// it is removed, so quick reconnects don't flap the registry
    pub eviction_grace_period: Duration,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            eviction_grace_period: DEFAULT_EVICTION_GRACE_PERIOD,
        }
    }
}

impl RegistryConfig {
    /// Set the eviction grace period
    pub fn eviction_grace_period(mut self, period: Duration) -> Self {
        self.eviction_grace_period = period;
        self
    }
}
