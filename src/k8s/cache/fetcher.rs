use super::snapshot::Snapshot;
use crate::error::Result;
use async_trait::async_trait;

/// Anything that can produce a complete cluster snapshot.
///
/// Implementations either return every pod and deployment or fail as a
/// whole; a partial snapshot is never returned.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    async fn fetch_snapshot(&self) -> Result<Snapshot>;

    /// Short name used in logs and health output
    fn name(&self) -> &'static str {
        "snapshot-source"
    }
}
