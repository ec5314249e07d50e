use super::{deployments, pods};
use crate::error::Result;
use crate::k8s::cache::{Snapshot, SnapshotSource};
use async_trait::async_trait;
use kube::Client;
use std::time::Instant;
use tracing::{error, info};

/// Snapshot source backed by the Kubernetes API server
#[derive(Clone)]
pub struct KubeSnapshotSource {
    client: Client,
}

impl KubeSnapshotSource {
    #[must_use]
    pub const fn new(client: Client) -> Self {
        Self { client }
    }

    /// Build a source from the inferred kube config
    ///
    /// # Errors
    ///
    /// Will return `Err` if no kube config can be found
    pub async fn try_default() -> Result<Self> {
        let client = super::client::new(Some(super::USER_AGENT)).await?;
        Ok(Self::new(client))
    }
}

#[async_trait]
impl SnapshotSource for KubeSnapshotSource {
    async fn fetch_snapshot(&self) -> Result<Snapshot> {
        let start = Instant::now();
        info!("Fetching cluster data from Kubernetes API...");

        let pods = pods::list_all(self.client.clone()).await.map_err(|e| {
            error!("❌ Error fetching pods: {}", e);
            e
        })?;
        let deployments = deployments::list_all(self.client.clone()).await.map_err(|e| {
            error!("❌ Error fetching deployments: {}", e);
            e
        })?;

        info!(
            "Cluster data fetch completed in {:.2}s - {} pods, {} deployments",
            start.elapsed().as_secs_f64(),
            pods.len(),
            deployments.len()
        );
        Ok(Snapshot::new(pods, deployments))
    }

    fn name(&self) -> &'static str {
        "kubernetes"
    }
}
