use super::utils::format_time;
use crate::k8s::cache::snapshot::DeploymentRecord;
use k8s_openapi::api::apps::v1::Deployment;
use kube::api::ListParams;
use kube::{Api, Client};

pub(crate) fn to_deployment_record(deployment: &Deployment) -> DeploymentRecord {
    DeploymentRecord {
        name: deployment.metadata.name.clone().unwrap_or_default(),
        namespace: deployment.metadata.namespace.clone().unwrap_or_default(),
        replicas: deployment.spec.as_ref().and_then(|spec| spec.replicas),
        ready_replicas: deployment
            .status
            .as_ref()
            .and_then(|status| status.ready_replicas),
        creation_timestamp: deployment
            .metadata
            .creation_timestamp
            .as_ref()
            .and_then(format_time),
    }
}

/// List every deployment in every namespace
///
/// # Errors
///
/// Will return `Err` if data can not be retrieved from k8s cluster api
pub async fn list_all(client: Client) -> Result<Vec<DeploymentRecord>, kube::Error> {
    let deployments: Api<Deployment> = Api::all(client);
    let deployment_list = deployments.list(&ListParams::default()).await?;
    Ok(deployment_list.items.iter().map(to_deployment_record).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::apps::v1::{DeploymentSpec, DeploymentStatus};
    use kube::api::ObjectMeta;

    #[test]
    fn test_replica_counts() {
        let deployment = Deployment {
            metadata: ObjectMeta {
                name: Some("web".to_string()),
                namespace: Some("default".to_string()),
                ..ObjectMeta::default()
            },
            spec: Some(DeploymentSpec {
                replicas: Some(3),
                ..DeploymentSpec::default()
            }),
            status: Some(DeploymentStatus {
                ready_replicas: Some(2),
                ..DeploymentStatus::default()
            }),
        };
        let record = to_deployment_record(&deployment);
        assert_eq!(record.replicas, Some(3));
        assert_eq!(record.ready_replicas, Some(2));
    }

    #[test]
    fn test_missing_spec_and_status() {
        let record = to_deployment_record(&Deployment::default());
        assert!(record.replicas.is_none());
        assert!(record.ready_replicas.is_none());
        assert!(record.name.is_empty());
    }
}
