//! Session configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default resync cadence.
pub const DEFAULT_SYNC_INTERVAL_MS: u64 = 1000;

/// Lower bound applied to the resync cadence.
pub const MIN_SYNC_INTERVAL_MS: u64 = 100;

/// How a skip is expressed on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipMode {
    /// Send `skip_to_next` only; the coordinator pauses and advances in one step.
    #[default]
    Atomic,
    /// Send `stop`, then `skip_to_next`.
    StopThenSkip,
}

/// Configuration for a `TimerSession`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Milliseconds between `sync_request` frames while connected.
    pub sync_interval_ms: u64,
    /// Wire form of skip.
    pub skip_mode: SkipMode,
    /// Discard sequenced snapshots that are not newer than the applied one.
    pub reject_stale_snapshots: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            sync_interval_ms: DEFAULT_SYNC_INTERVAL_MS,
            skip_mode: SkipMode::default(),
            reject_stale_snapshots: true,
        }
    }
}

impl SyncConfig {
    /// Parse configuration from JSON. Missing keys take their defaults.
    ///
    /// # Errors
    /// Returns error if the JSON is invalid.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Set the resync cadence.
    #[must_use]
    pub fn with_sync_interval(mut self, interval: Duration) -> Self {
        self.sync_interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Set the skip mode.
    #[must_use]
    pub const fn with_skip_mode(mut self, skip_mode: SkipMode) -> Self {
        self.skip_mode = skip_mode;
        self
    }

    /// Enable or disable stale snapshot rejection.
    #[must_use]
    pub const fn with_reject_stale_snapshots(mut self, reject: bool) -> Self {
        self.reject_stale_snapshots = reject;
        self
    }

    /// Effective resync cadence.
    #[must_use]
    pub fn sync_interval(&self) -> Duration {
        Duration::from_millis(self.sync_interval_ms.max(MIN_SYNC_INTERVAL_MS))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SyncConfig::default();
        assert_eq!(config.sync_interval(), Duration::from_secs(1));
        assert_eq!(config.skip_mode, SkipMode::Atomic);
        assert!(config.reject_stale_snapshots);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = SyncConfig::from_json(r#"{"skip_mode":"stop_then_skip"}"#).unwrap();
        assert_eq!(config.skip_mode, SkipMode::StopThenSkip);
        assert_eq!(config.sync_interval_ms, DEFAULT_SYNC_INTERVAL_MS);
    }

    #[test]
    fn test_interval_floor() {
        let config = SyncConfig::default().with_sync_interval(Duration::ZERO);
        assert_eq!(config.sync_interval(), Duration::from_millis(MIN_SYNC_INTERVAL_MS));
    }
}
