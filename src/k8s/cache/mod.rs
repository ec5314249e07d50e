pub mod config;
pub mod fetcher;
pub mod guarded;
pub mod interrogator;
pub mod snapshot;
pub mod snapshot_cache;

pub use config::InterrogatorConfig;
pub use fetcher::SnapshotSource;
pub use guarded::GuardedCell;
pub use interrogator::{Interrogator, InterrogatorStatus};
pub use snapshot::{DeploymentRecord, PodRecord, Snapshot};
pub use snapshot_cache::{CacheStats, CacheView, SnapshotCache};
