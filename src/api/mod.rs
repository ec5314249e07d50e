/**
 * HTTP routes over the cache, the interrogator and the bridge.
 *
 * Handlers only map requests onto those services; all state arrives through
 * `AppState`.
 */
pub mod cache;
pub mod cluster;
pub mod health;

use crate::bus::MessageBridge;
use crate::k8s::cache::{Interrogator, SnapshotCache, SnapshotSource};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use k8s_openapi::serde_json::json;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::error;

#[derive(Clone)]
pub struct AppState {
    pub service_name: String,
    pub cache: Arc<SnapshotCache>,
    /// Absent when no cluster could be reached at startup
    pub source: Option<Arc<dyn SnapshotSource>>,
    pub interrogator: Option<Arc<Interrogator>>,
    pub bridge: Option<Arc<MessageBridge>>,
    pub started_at: Instant,
}

impl AppState {
    /// Publish an event if a bridge is configured; failures are only logged.
    pub(crate) async fn publish_event<T: Serialize + Sync>(&self, subject: &str, event: &T) {
        if let Some(bridge) = &self.bridge {
            bridge.publish_async(subject, event).await;
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/api/status", get(health::status))
        .route("/api/cluster/info", get(cluster::info))
        .route("/api/cluster/pods", get(cluster::pods))
        .route("/api/cluster/deployments", get(cluster::deployments))
        .route("/api/cache/stats", get(cache::stats))
        .route("/api/cache/refresh", post(cache::refresh))
        .route("/api/cache/invalidate", post(cache::invalidate))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Error body returned by every route: `{"error": "..."}`
#[derive(Debug)]
pub enum ApiError {
    Unavailable(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::Unavailable(message) => (StatusCode::SERVICE_UNAVAILABLE, message),
            Self::Internal(message) => (StatusCode::INTERNAL_SERVER_ERROR, message),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl From<crate::error::Error> for ApiError {
    fn from(e: crate::error::Error) -> Self {
        error!("❌ Request failed: {}", e);
        Self::Internal(e.to_string())
    }
}
