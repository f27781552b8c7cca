//! Configuration types for the manager and its source connections

use std::time::Duration;

/// Manager-wide settings
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Capacity of each source's outbound request queue
    pub source_queue_capacity: usize,
    /// Capacity of each machine's manifest channel
    pub manifest_channel_capacity: usize,
    /// Redial policy for source connections
    pub backoff: BackoffConfig,
    /// Upper bound on a single dial attempt
    pub dial_timeout: Duration,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            source_queue_capacity: 4096,
            manifest_channel_capacity: 16,
            backoff: BackoffConfig::default(),
            dial_timeout: Duration::from_secs(15),
        }
    }
}

/// Exponential backoff between failed dials
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffConfig {
    /// Delay after the first failure, and after any successful connect
    pub initial: Duration,
    /// Ceiling the delay never exceeds
    pub max: Duration,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(100),
            max: Duration::from_secs(60),
        }
    }
}
