use super::{ApiError, AppState};
use crate::bus::events::LifecycleEvent;
use crate::bus::EVENTS_SUBJECT;
use crate::k8s::cache::config::CACHE_MAX_AGE_SECONDS;
use crate::k8s::cache::snapshot_cache::millis_i64;
use crate::k8s::cache::Snapshot;
use axum::extract::{Query, State};
use axum::Json;
use k8s_openapi::serde_json::{self, json, Value};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

const CACHE_MAX_AGE: Duration = Duration::from_secs(CACHE_MAX_AGE_SECONDS);

#[derive(Debug, Default, Deserialize)]
pub struct InfoQuery {
    force: Option<String>,
}

impl InfoQuery {
    fn force(&self) -> bool {
        self.force
            .as_deref()
            .is_some_and(|value| value.eq_ignore_ascii_case("true"))
    }
}

/// Where a response's snapshot came from
struct Served {
    snapshot: Arc<Snapshot>,
    /// Set when served from the cache
    cache_age: Option<Duration>,
}

impl Served {
    const fn source(&self) -> &'static str {
        if self.cache_age.is_some() { "cache" } else { "fresh" }
    }
}

/// Serve from the cache while it is younger than the max age, otherwise
/// fetch from the cluster and install the result.
async fn cached_or_fresh(state: &AppState, force: bool) -> Result<Served, ApiError> {
    if !force {
        if let Some(view) = state.cache.read_fresh(CACHE_MAX_AGE) {
            return Ok(Served {
                snapshot: view.snapshot,
                cache_age: Some(view.age),
            });
        }
    }

    let source = state
        .source
        .as_ref()
        .ok_or_else(|| ApiError::Unavailable("kubernetes source not available".to_string()))?;
    let snapshot = Arc::new(source.fetch_snapshot().await?);
    state.cache.update(snapshot.clone());
    Ok(Served {
        snapshot,
        cache_age: None,
    })
}

/// `GET /api/cluster/info?force=bool`
pub async fn info(
    State(state): State<AppState>,
    Query(query): Query<InfoQuery>,
) -> Result<Json<Value>, ApiError> {
    let served = cached_or_fresh(&state, query.force()).await?;

    let mut body =
        serde_json::to_value(served.snapshot.as_ref()).map_err(crate::error::Error::from)?;
    body["source"] = json!(served.source());
    if let Some(age) = served.cache_age {
        body["cacheAge"] = json!(millis_i64(age));
    }

    let event = LifecycleEvent::cluster_info_accessed(
        &state.service_name,
        served.snapshot.pod_count(),
        served.cache_age.is_some(),
    );
    state.publish_event(EVENTS_SUBJECT, &event).await;

    Ok(Json(body))
}

/// `GET /api/cluster/pods`
pub async fn pods(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let served = cached_or_fresh(&state, false).await?;
    Ok(Json(json!({
        "pods": served.snapshot.pods(),
        "count": served.snapshot.pod_count(),
        "source": served.source(),
    })))
}

/// `GET /api/cluster/deployments`
pub async fn deployments(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let served = cached_or_fresh(&state, false).await?;
    Ok(Json(json!({
        "deployments": served.snapshot.deployments(),
        "count": served.snapshot.deployment_count(),
        "source": served.source(),
    })))
}
