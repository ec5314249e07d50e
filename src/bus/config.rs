/**
 * Timing constants for the message bridge
 */
use std::time::Duration;

/// Default NATS endpoint inside the cluster
pub const DEFAULT_BUS_URL: &str = "nats://nats-service:4222";

/// How long `start()` waits for the first connection before reporting
pub const CONNECT_GRACE_MILLIS: u64 = 2_000;

/// Upper bound a caller waits for one publish to complete
pub const PUBLISH_TIMEOUT_MILLIS: u64 = 5_000;

/// Upper bound the loop waits for in-flight sends when stopping
pub const DRAIN_TIMEOUT_MILLIS: u64 = 5_000;

#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub connect_grace: Duration,
    pub publish_timeout: Duration,
    pub drain_timeout: Duration,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            connect_grace: Duration::from_millis(CONNECT_GRACE_MILLIS),
            publish_timeout: Duration::from_millis(PUBLISH_TIMEOUT_MILLIS),
            drain_timeout: Duration::from_millis(DRAIN_TIMEOUT_MILLIS),
        }
    }
}

/// Validate configuration constants at compile time
const _: () = {
    assert!(CONNECT_GRACE_MILLIS > 0, "CONNECT_GRACE_MILLIS must be greater than 0");
    assert!(PUBLISH_TIMEOUT_MILLIS > 0, "PUBLISH_TIMEOUT_MILLIS must be greater than 0");
    assert!(DRAIN_TIMEOUT_MILLIS > 0, "DRAIN_TIMEOUT_MILLIS must be greater than 0");
};
