pub mod cache;
pub mod client;
pub mod cluster;
pub mod deployments;
pub mod pods;
mod utils;

pub use cluster::KubeSnapshotSource;

/// Default user agent for `clusterwatch` - automatically uses the package version
///
/// Can be overridden at runtime via the `CLUSTERWATCH_USER_AGENT` environment variable.
pub const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));
