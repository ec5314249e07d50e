use super::AppState;
use crate::bus::events::now_millis;
use axum::extract::State;
use axum::Json;
use k8s_openapi::serde_json::{json, Value};

/// `GET /health`: always 200, `status` says whether anything is degraded
pub async fn health(State(state): State<AppState>) -> Json<Value> {
    let kubernetes = state.source.is_some();
    let nats = state.bridge.as_ref().is_some_and(|bridge| bridge.is_connected());
    let interrogator = state
        .interrogator
        .as_ref()
        .is_some_and(|interrogator| interrogator.is_running());

    let status = if kubernetes && nats { "healthy" } else { "degraded" };

    Json(json!({
        "status": status,
        "service": state.service_name,
        "timestamp": now_millis(),
        "services": {
            "kubernetes": kubernetes,
            "cache": state.cache.is_valid(),
            "nats": nats,
            "interrogator": interrogator,
        },
        "cacheStats": state.cache.stats(),
    }))
}

/// `GET /api/status`
pub async fn status(State(state): State<AppState>) -> Json<Value> {
    let mut services = json!({ "cache": state.cache.stats() });

    services["kubernetes"] = state.source.as_ref().map_or_else(
        || json!({ "status": "unavailable" }),
        |source| json!({ "status": "connected", "source": source.name() }),
    );
    if let Some(interrogator) = &state.interrogator {
        services["interrogator"] = json!(interrogator.status());
    }
    if let Some(bridge) = &state.bridge {
        let connection = if bridge.is_connected() { "connected" } else { "disconnected" };
        services["nats"] = json!({
            "status": connection,
            "url": bridge.url(),
            "subjects": bridge.subjects(),
        });
    }

    Json(json!({
        "service": state.service_name,
        "timestamp": now_millis(),
        "uptimeSeconds": state.started_at.elapsed().as_secs(),
        "services": services,
    }))
}
