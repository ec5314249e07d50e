use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use k8s_openapi::serde_json;

/// Render a k8s timestamp the way the API server does (RFC 3339).
pub(crate) fn format_time(time: &Time) -> Option<String> {
    match serde_json::to_value(time) {
        Ok(serde_json::Value::String(s)) => Some(s),
        _ => None,
    }
}
