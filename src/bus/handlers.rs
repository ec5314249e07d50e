use super::{BusConnection, InboundMessage};
use crate::k8s::cache::SnapshotCache;
use async_trait::async_trait;
use bytes::Bytes;
use k8s_openapi::serde_json::{self, json, Value};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Handles messages for one subscribed subject.
///
/// Handlers run on the bridge's event loop. They may publish through
/// `connection` directly but must not wait on the bridge's own `publish`.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, message: &InboundMessage, connection: &dyn BusConnection);
}

async fn reply_json<T: Serialize + Sync>(
    connection: &dyn BusConnection,
    message: &InboundMessage,
    body: &T,
) {
    let Some(reply) = message.reply.as_deref() else {
        return;
    };
    match serde_json::to_vec(body) {
        Ok(bytes) => {
            if let Err(e) = connection.publish(reply, Bytes::from(bytes)).await {
                error!("❌ Error replying on {}: {}", reply, e);
            }
        }
        Err(e) => error!("❌ Error encoding reply for {}: {}", message.subject, e),
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandReply {
    pub source: String,
    pub command: String,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
}

/// Acknowledges `k8s.commands` messages.
///
/// `status` and `cluster-info` also carry a result, the latter answered from
/// the cache; any other command is acknowledged without one.
pub struct CommandHandler {
    source: String,
    cache: Arc<SnapshotCache>,
}

impl CommandHandler {
    #[must_use]
    pub fn new(source: &str, cache: Arc<SnapshotCache>) -> Self {
        Self {
            source: source.to_string(),
            cache,
        }
    }

    fn result_for(&self, command: &str) -> Option<Value> {
        match command {
            "status" => Some(json!({ "status": "healthy", "service": self.source })),
            "cluster-info" => Some(self.cache.read().map_or_else(
                || json!({ "error": "cluster data not cached" }),
                |snapshot| {
                    json!({
                        "podCount": snapshot.pod_count(),
                        "deploymentCount": snapshot.deployment_count(),
                        "fetchTimestamp": snapshot.fetch_timestamp().timestamp_millis(),
                    })
                },
            )),
            _ => None,
        }
    }
}

#[async_trait]
impl MessageHandler for CommandHandler {
    async fn handle(&self, message: &InboundMessage, connection: &dyn BusConnection) {
        let command = message.text().trim().to_string();
        info!("📨 Received command: {}", command);

        let reply = CommandReply {
            source: self.source.clone(),
            result: self.result_for(&command),
            command,
            status: "acknowledged",
        };
        reply_json(connection, message, &reply).await;
    }
}

/// Logs every message seen on `k8s.events`
#[derive(Debug, Default)]
pub struct EventLogger;

#[async_trait]
impl MessageHandler for EventLogger {
    async fn handle(&self, message: &InboundMessage, _connection: &dyn BusConnection) {
        info!("📨 Received event: {}", message.text());
    }
}

/// Answers `k8s.cluster.info.request` with the cached snapshot
pub struct ClusterInfoHandler {
    cache: Arc<SnapshotCache>,
}

impl ClusterInfoHandler {
    #[must_use]
    pub const fn new(cache: Arc<SnapshotCache>) -> Self {
        Self { cache }
    }
}

#[async_trait]
impl MessageHandler for ClusterInfoHandler {
    async fn handle(&self, message: &InboundMessage, connection: &dyn BusConnection) {
        info!("📨 Received cluster info request");
        if message.reply.is_none() {
            warn!("⚠️  Cluster info request without reply subject, ignoring");
            return;
        }
        match self.cache.read() {
            Some(snapshot) => reply_json(connection, message, snapshot.as_ref()).await,
            None => {
                let body = json!({ "error": "cluster data not cached" });
                reply_json(connection, message, &body).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::k8s::cache::{PodRecord, Snapshot};

    fn cache_with_one_pod() -> Arc<SnapshotCache> {
        let cache = Arc::new(SnapshotCache::new());
        cache.update(Snapshot::new(
            vec![PodRecord {
                name: "api-0".to_string(),
                namespace: "default".to_string(),
                status: "Running".to_string(),
                creation_timestamp: None,
            }],
            vec![],
        ));
        cache
    }

    #[test]
    fn test_known_commands_have_results() {
        let handler = CommandHandler::new("clusterwatch", cache_with_one_pod());
        assert_eq!(handler.result_for("status").unwrap()["status"], "healthy");
        assert_eq!(handler.result_for("cluster-info").unwrap()["podCount"], 1);
        assert!(handler.result_for("reboot").is_none());
    }

    #[test]
    fn test_cluster_info_on_empty_cache() {
        let handler = CommandHandler::new("clusterwatch", Arc::new(SnapshotCache::new()));
        assert!(handler.result_for("cluster-info").unwrap().get("error").is_some());
    }
}
