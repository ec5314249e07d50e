/**
 * Process-wide wiring.
 *
 * Builds the cache, bridge and interrogator once, hands them to the HTTP
 * layer through `AppState`, and tears them down in reverse order.
 */
use crate::api::{self, AppState};
use crate::bus::events::LifecycleEvent;
use crate::bus::{
    self, BridgeConfig, BusTransport, CLUSTER_INFO_REQUEST_SUBJECT, COMMANDS_SUBJECT,
    ClusterInfoHandler, CommandHandler, EVENTS_SUBJECT, EventLogger, MessageBridge,
};
use crate::k8s::cache::config::SERVICE_NAME;
use crate::k8s::cache::{Interrogator, InterrogatorConfig, SnapshotCache, SnapshotSource};
use crate::k8s::KubeSnapshotSource;
use axum::Router;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub service_name: String,
    pub bus_url: String,
    pub bridge: BridgeConfig,
    pub interrogator: InterrogatorConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            service_name: SERVICE_NAME.to_string(),
            bus_url: bus::config::DEFAULT_BUS_URL.to_string(),
            bridge: BridgeConfig::default(),
            interrogator: InterrogatorConfig::default(),
        }
    }
}

pub struct Service {
    state: AppState,
}

impl Service {
    /// Start against the real cluster and bus.
    ///
    /// A missing kube config or an unreachable bus is logged and leaves the
    /// service running in a degraded state.
    pub async fn start(config: ServiceConfig) -> Self {
        info!("Initializing {} services...", config.service_name);

        let kube_source = KubeSnapshotSource::try_default().await;
        let source: Option<Arc<dyn SnapshotSource>> = match kube_source {
            Ok(source) => {
                info!("Loaded Kubernetes config");
                Some(Arc::new(source))
            }
            Err(e) => {
                error!("❌ Failed to load Kubernetes config: {}", e);
                None
            }
        };
        let transport = bus::transport_for_url(&config.bus_url, &config.service_name);

        Self::assemble(config, source, transport).await
    }

    /// Start with explicit collaborators.
    pub async fn assemble(
        config: ServiceConfig,
        source: Option<Arc<dyn SnapshotSource>>,
        transport: Arc<dyn BusTransport>,
    ) -> Self {
        let cache = Arc::new(SnapshotCache::new());

        let bridge = Arc::new(
            MessageBridge::with_config(config.bus_url.clone(), transport, config.bridge.clone())
                .with_handler(
                    COMMANDS_SUBJECT,
                    Arc::new(CommandHandler::new(&config.service_name, cache.clone())),
                )
                .with_handler(EVENTS_SUBJECT, Arc::new(EventLogger))
                .with_handler(
                    CLUSTER_INFO_REQUEST_SUBJECT,
                    Arc::new(ClusterInfoHandler::new(cache.clone())),
                ),
        );
        let starter = bridge.clone();
        let connected = tokio::task::spawn_blocking(move || starter.start())
            .await
            .unwrap_or(false);
        if connected {
            info!("NATS bridge started successfully");
        } else {
            warn!("⚠️  NATS bridge failed to start, events will not be published");
        }

        let interrogator = source.clone().map(|source| {
            let interrogator = Arc::new(Interrogator::new(
                source,
                cache.clone(),
                Some(bridge.clone()),
                config.interrogator.clone(),
            ));
            interrogator.start();
            interrogator
        });
        if interrogator.is_none() {
            warn!("⚠️  No cluster source, background collection disabled");
        }

        info!("All services initialized");
        Self {
            state: AppState {
                service_name: config.service_name,
                cache,
                source,
                interrogator,
                bridge: Some(bridge),
                started_at: Instant::now(),
            },
        }
    }

    #[must_use]
    pub const fn state(&self) -> &AppState {
        &self.state
    }

    #[must_use]
    pub fn router(&self) -> Router {
        api::router(self.state.clone())
    }

    /// Tell the bus the service is up
    pub async fn announce(&self) {
        let event = LifecycleEvent::service_started(&self.state.service_name);
        self.state.publish_event(EVENTS_SUBJECT, &event).await;
    }

    /// Stop the interrogator, then the bridge.
    pub async fn shutdown(self) {
        info!("Shutting down {}...", self.state.service_name);
        if let Some(interrogator) = &self.state.interrogator {
            interrogator.stop().await;
        }
        if let Some(bridge) = self.state.bridge.clone() {
            if let Err(e) = tokio::task::spawn_blocking(move || bridge.stop()).await {
                error!("❌ Error stopping NATS bridge: {}", e);
            }
        }
        info!("{} shutdown complete", self.state.service_name);
    }
}
