use super::{ApiError, AppState};
use crate::bus::events::LifecycleEvent;
use crate::bus::EVENTS_SUBJECT;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::Json;
use k8s_openapi::serde_json::{json, Value};

/// `GET /api/cache/stats`
pub async fn stats(State(state): State<AppState>) -> Response {
    match &state.interrogator {
        Some(interrogator) => Json(interrogator.status()).into_response(),
        None => Json(state.cache.stats()).into_response(),
    }
}

/// `POST /api/cache/refresh`
pub async fn refresh(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let interrogator = state
        .interrogator
        .as_ref()
        .ok_or_else(|| ApiError::Unavailable("interrogator not available".to_string()))?;

    // The collection runs in the background; its outcome shows up in the stats.
    drop(interrogator.force_update());
    let event = LifecycleEvent::cache_refresh_triggered(&state.service_name);
    state.publish_event(EVENTS_SUBJECT, &event).await;

    Ok(Json(json!({ "status": "cache refresh triggered" })))
}

/// `POST /api/cache/invalidate`
pub async fn invalidate(State(state): State<AppState>) -> Json<Value> {
    state.cache.invalidate();
    Json(json!({ "status": "cache invalidated" }))
}
