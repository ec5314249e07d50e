use chrono::Utc;
use serde::Serialize;

/// Payload published on `k8s.metrics` after each successful collection
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsEvent {
    pub pod_count: usize,
    pub deployment_count: usize,
    /// Epoch milliseconds
    pub timestamp: i64,
    pub source: String,
}

impl MetricsEvent {
    #[must_use]
    pub fn new(pod_count: usize, deployment_count: usize, source: &str) -> Self {
        Self {
            pod_count,
            deployment_count,
            timestamp: now_millis(),
            source: source.to_string(),
        }
    }
}

pub const ACTION_CACHE_REFRESH_TRIGGERED: &str = "cache_refresh_triggered";
pub const ACTION_CLUSTER_INFO_ACCESSED: &str = "cluster_info_accessed";
pub const ACTION_SERVICE_STARTED: &str = "service_started";

/// Payload published on `k8s.events`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LifecycleEvent {
    pub action: &'static str,
    pub source: String,
    pub timestamp: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pod_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_cache: Option<bool>,
}

impl LifecycleEvent {
    fn new(action: &'static str, source: &str) -> Self {
        Self {
            action,
            source: source.to_string(),
            timestamp: now_millis(),
            pod_count: None,
            from_cache: None,
        }
    }

    #[must_use]
    pub fn cache_refresh_triggered(source: &str) -> Self {
        Self::new(ACTION_CACHE_REFRESH_TRIGGERED, source)
    }

    #[must_use]
    pub fn cluster_info_accessed(source: &str, pod_count: usize, from_cache: bool) -> Self {
        Self {
            pod_count: Some(pod_count),
            from_cache: Some(from_cache),
            ..Self::new(ACTION_CLUSTER_INFO_ACCESSED, source)
        }
    }

    #[must_use]
    pub fn service_started(source: &str) -> Self {
        Self::new(ACTION_SERVICE_STARTED, source)
    }
}

#[must_use]
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::serde_json;

    #[test]
    fn test_metrics_event_keys() {
        let json = serde_json::to_value(MetricsEvent::new(4, 2, "clusterwatch")).unwrap();
        assert_eq!(json["podCount"], 4);
        assert_eq!(json["deploymentCount"], 2);
        assert_eq!(json["source"], "clusterwatch");
        assert!(json["timestamp"].as_i64().unwrap() > 0);
    }

    #[test]
    fn test_optional_fields_are_omitted() {
        let json = serde_json::to_value(LifecycleEvent::cache_refresh_triggered("cw")).unwrap();
        assert_eq!(json["action"], "cache_refresh_triggered");
        assert!(json.get("podCount").is_none());
        assert!(json.get("fromCache").is_none());

        let event = LifecycleEvent::cluster_info_accessed("cw", 7, true);
        let json = serde_json::to_value(event).unwrap();
        assert_eq!(json["podCount"], 7);
        assert_eq!(json["fromCache"], true);
    }
}
