use derive_more::From;
use k8s_openapi::serde_json;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug, From)]
pub enum Error {
    #[from]
    Json(serde_json::Error),

    #[from]
    Kube(kube::Error),

    #[from]
    Infer(kube::config::InferConfigError),

    #[from]
    Bus(BusError),

    /// Custom error message
    Custom(String),
}

impl core::fmt::Display for Error {
    fn fmt(&self, fmt: &mut core::fmt::Formatter) -> core::result::Result<(), core::fmt::Error> {
        write!(fmt, "{self:?}")
    }
}

impl std::error::Error for Error {}

/// Failures on the message bus side of the service.
///
/// None of these are fatal: the bridge reports them and callers get `false`.
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    #[error("bus connection failed: {0}")]
    Connect(String),

    #[error("subscribe to {subject} failed: {reason}")]
    Subscribe { subject: String, reason: String },

    #[error("publish to {subject} failed: {reason}")]
    Publish { subject: String, reason: String },

    #[error("publish to {subject} timed out after {timeout_ms}ms")]
    Timeout { subject: String, timeout_ms: u128 },

    #[error("payload for {subject} could not be serialized: {reason}")]
    Serialize { subject: String, reason: String },

    #[error("flush failed: {0}")]
    Flush(String),

    #[error("bridge is not connected")]
    NotConnected,

    #[error("bridge event loop has exited")]
    Closed,
}
