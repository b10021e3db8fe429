//! Hue adapter configuration.

use serde::Deserialize;

/// Configuration for the Hue adapter.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HueConfig {
    /// Total time budget for the link-button pairing loop, in seconds.
    pub pairing_timeout_secs: u16,
    /// Delay between link-button pairing attempts, in seconds.
    pub pairing_poll_interval_secs: u16,
    /// State-polling interval while the bridge is reachable, in seconds.
    pub poll_interval_secs: u16,
    /// Ceiling for the exponential polling backoff after repeated failures.
    pub max_backoff_secs: u16,
    /// Consecutive poll failures before backoff kicks in.
    pub backoff_after_failures: u8,
    /// Maximum commands per second sent to a single bridge.
    pub rate_limit_per_s: u8,
}

impl Default for HueConfig {
    fn default() -> Self {
        Self {
            pairing_timeout_secs: 30,
            pairing_poll_interval_secs: 1,
            poll_interval_secs: 1,
            max_backoff_secs: 60,
            backoff_after_failures: 5,
            rate_limit_per_s: 10,
        }
    }
}
