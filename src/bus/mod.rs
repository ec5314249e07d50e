/**
 * Message bus plumbing.
 *
 * `MessageBridge` owns the only connection to the bus and runs it on its own
 * thread. Everything else talks to the bus through the bridge.
 */
pub mod bridge;
pub mod config;
pub mod events;
pub mod handlers;
pub mod memory;
pub mod nats;

use crate::error::BusError;
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use std::sync::Arc;

pub use bridge::MessageBridge;
pub use config::BridgeConfig;
pub use handlers::{ClusterInfoHandler, CommandHandler, EventLogger, MessageHandler};
pub use memory::MemoryTransport;
pub use nats::NatsTransport;

/// Collection metrics, published after every successful cycle
pub const METRICS_SUBJECT: &str = "k8s.metrics";
/// Access and lifecycle events; also consumed for logging
pub const EVENTS_SUBJECT: &str = "k8s.events";
/// Inbound commands, acknowledged when a reply subject is present
pub const COMMANDS_SUBJECT: &str = "k8s.commands";
/// Inbound request/reply for the cached cluster snapshot
pub const CLUSTER_INFO_REQUEST_SUBJECT: &str = "k8s.cluster.info.request";

/// URL scheme that selects the in-process bus
pub const MEMORY_URL_SCHEME: &str = "memory://";

/// A message delivered to one of our subscriptions
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub subject: String,
    pub payload: Bytes,
    pub reply: Option<String>,
}

impl InboundMessage {
    #[must_use]
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.payload).into_owned()
    }
}

pub type InboundStream = BoxStream<'static, InboundMessage>;

/// Opens connections to a bus
#[async_trait]
pub trait BusTransport: Send + Sync {
    async fn connect(&self, url: &str) -> Result<Arc<dyn BusConnection>, BusError>;
}

/// A live bus connection. Only the bridge's event loop calls into it.
#[async_trait]
pub trait BusConnection: Send + Sync {
    async fn publish(&self, subject: &str, payload: Bytes) -> Result<(), BusError>;

    async fn subscribe(&self, subject: &str) -> Result<InboundStream, BusError>;

    /// Push out anything still buffered
    async fn flush(&self) -> Result<(), BusError>;
}

/// Pick the transport for `url`: `memory://` stays in process, anything else is NATS.
#[must_use]
pub fn transport_for_url(url: &str, client_name: &str) -> Arc<dyn BusTransport> {
    if url.starts_with(MEMORY_URL_SCHEME) {
        Arc::new(MemoryTransport::new())
    } else {
        Arc::new(NatsTransport::new(client_name))
    }
}
