/**
 * Configuration constants for the snapshot cache and the interrogator
 */
use std::time::Duration;

/// Seconds between two periodic collections
pub const DEFAULT_REFRESH_INTERVAL_SECONDS: u64 = 30;

/// Maximum age in seconds before the HTTP layer treats the cache as stale
pub const CACHE_MAX_AGE_SECONDS: u64 = 30;

/// How long `Interrogator::stop` waits for the loop task before giving up
pub const STOP_JOIN_TIMEOUT_SECONDS: u64 = 10;

/// Value reported in the `source` field of every outbound event
pub const SERVICE_NAME: &str = "clusterwatch";

/// Runtime settings for the background interrogator
#[derive(Debug, Clone)]
pub struct InterrogatorConfig {
    /// Sleep between two periodic collections
    pub interval: Duration,
    /// Bound on how long `stop()` waits for the loop to exit
    pub stop_timeout: Duration,
    /// Name stamped into published metrics
    pub source_name: String,
}

impl InterrogatorConfig {
    #[must_use]
    pub fn with_interval(interval: Duration) -> Self {
        Self {
            interval,
            ..Self::default()
        }
    }
}

impl Default for InterrogatorConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(DEFAULT_REFRESH_INTERVAL_SECONDS),
            stop_timeout: Duration::from_secs(STOP_JOIN_TIMEOUT_SECONDS),
            source_name: SERVICE_NAME.to_string(),
        }
    }
}

/// Validate configuration constants at compile time
const _: () = {
    assert!(
        DEFAULT_REFRESH_INTERVAL_SECONDS > 0,
        "DEFAULT_REFRESH_INTERVAL_SECONDS must be greater than 0"
    );
    assert!(CACHE_MAX_AGE_SECONDS > 0, "CACHE_MAX_AGE_SECONDS must be greater than 0");
    assert!(STOP_JOIN_TIMEOUT_SECONDS > 0, "STOP_JOIN_TIMEOUT_SECONDS must be greater than 0");
};
