use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};

/// Phase reported for pods whose status carries none
pub const UNKNOWN_PHASE: &str = "Unknown";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodRecord {
    pub name: String,
    pub namespace: String,
    pub status: String,
    pub creation_timestamp: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentRecord {
    pub name: String,
    pub namespace: String,
    pub replicas: Option<i32>,
    pub ready_replicas: Option<i32>,
    pub creation_timestamp: Option<String>,
}

/// Point-in-time capture of the cluster's pods and deployments.
///
/// Fields are private so a built snapshot cannot be edited; the cache swaps
/// whole `Arc<Snapshot>` values instead.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pods: Vec<PodRecord>,
    deployments: Vec<DeploymentRecord>,
    pod_count: usize,
    deployment_count: usize,
    #[serde(serialize_with = "as_epoch_millis")]
    fetch_timestamp: DateTime<Utc>,
}

impl Snapshot {
    #[must_use]
    pub fn new(pods: Vec<PodRecord>, deployments: Vec<DeploymentRecord>) -> Self {
        Self::at(pods, deployments, Utc::now())
    }

    #[must_use]
    pub fn at(
        pods: Vec<PodRecord>,
        deployments: Vec<DeploymentRecord>,
        fetch_timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            pod_count: pods.len(),
            deployment_count: deployments.len(),
            pods,
            deployments,
            fetch_timestamp,
        }
    }

    #[must_use]
    pub fn pods(&self) -> &[PodRecord] {
        &self.pods
    }

    #[must_use]
    pub fn deployments(&self) -> &[DeploymentRecord] {
        &self.deployments
    }

    #[must_use]
    pub const fn pod_count(&self) -> usize {
        self.pod_count
    }

    #[must_use]
    pub const fn deployment_count(&self) -> usize {
        self.deployment_count
    }

    /// Number of records the cache reports as its entry count
    #[must_use]
    pub const fn entry_count(&self) -> usize {
        self.pod_count + self.deployment_count
    }

    #[must_use]
    pub const fn fetch_timestamp(&self) -> DateTime<Utc> {
        self.fetch_timestamp
    }
}

fn as_epoch_millis<S: Serializer>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_i64(ts.timestamp_millis())
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::serde_json;

    fn pod(name: &str) -> PodRecord {
        PodRecord {
            name: name.to_string(),
            namespace: "default".to_string(),
            status: "Running".to_string(),
            creation_timestamp: None,
        }
    }

    #[test]
    fn test_counts_are_derived() {
        let snapshot = Snapshot::new(vec![pod("a"), pod("b")], vec![]);
        assert_eq!(snapshot.pod_count(), 2);
        assert_eq!(snapshot.deployment_count(), 0);
        assert_eq!(snapshot.entry_count(), 2);
    }

    #[test]
    fn test_json_shape() {
        let ts = DateTime::from_timestamp_millis(1_700_000_000_123).unwrap();
        let deployment = DeploymentRecord {
            name: "web".to_string(),
            namespace: "prod".to_string(),
            replicas: Some(3),
            ready_replicas: None,
            creation_timestamp: Some("2024-01-01T00:00:00Z".to_string()),
        };
        let snapshot = Snapshot::at(vec![pod("a")], vec![deployment], ts);
        let json = serde_json::to_value(&snapshot).unwrap();

        assert_eq!(json["podCount"], 1);
        assert_eq!(json["deploymentCount"], 1);
        assert_eq!(json["fetchTimestamp"], 1_700_000_000_123_i64);
        assert_eq!(json["pods"][0]["status"], "Running");
        assert!(json["pods"][0]["creationTimestamp"].is_null());
        assert_eq!(json["deployments"][0]["replicas"], 3);
        assert!(json["deployments"][0]["readyReplicas"].is_null());
    }
}
