use super::utils::format_time;
use crate::k8s::cache::snapshot::{PodRecord, UNKNOWN_PHASE};
use k8s_openapi::api::core::v1::Pod;
use kube::api::ListParams;
use kube::{Api, Client};

pub(crate) fn to_pod_record(pod: &Pod) -> PodRecord {
    PodRecord {
        name: pod.metadata.name.clone().unwrap_or_default(),
        namespace: pod.metadata.namespace.clone().unwrap_or_default(),
        status: pod
            .status
            .as_ref()
            .and_then(|status| status.phase.clone())
            .unwrap_or_else(|| UNKNOWN_PHASE.to_string()),
        creation_timestamp: pod.metadata.creation_timestamp.as_ref().and_then(format_time),
    }
}

/// List every pod in every namespace
///
/// # Errors
///
/// Will return `Err` if data can not be retrieved from k8s cluster api
pub async fn list_all(client: Client) -> Result<Vec<PodRecord>, kube::Error> {
    let pods: Api<Pod> = Api::all(client);
    let pod_list = pods.list(&ListParams::default()).await?;
    Ok(pod_list.items.iter().map(to_pod_record).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::PodStatus;
    use kube::api::ObjectMeta;

    #[test]
    fn test_missing_phase_defaults_to_unknown() {
        let pod = Pod {
            metadata: ObjectMeta {
                name: Some("api-0".to_string()),
                namespace: Some("prod".to_string()),
                ..ObjectMeta::default()
            },
            ..Pod::default()
        };
        let record = to_pod_record(&pod);
        assert_eq!(record.name, "api-0");
        assert_eq!(record.namespace, "prod");
        assert_eq!(record.status, "Unknown");
        assert!(record.creation_timestamp.is_none());
    }

    #[test]
    fn test_phase_is_copied() {
        let pod = Pod {
            status: Some(PodStatus {
                phase: Some("Pending".to_string()),
                ..PodStatus::default()
            }),
            ..Pod::default()
        };
        assert_eq!(to_pod_record(&pod).status, "Pending");
    }
}
