use super::{BusConnection, BusTransport, InboundMessage, InboundStream};
use crate::error::BusError;
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

/// A message that went through the in-process bus
#[derive(Debug, Clone)]
pub struct PublishedMessage {
    pub subject: String,
    pub payload: Bytes,
}

#[derive(Default)]
struct MemoryBus {
    subscribers: Mutex<HashMap<String, Vec<mpsc::UnboundedSender<InboundMessage>>>>,
    published: Mutex<Vec<PublishedMessage>>,
    publish_delay: Mutex<Duration>,
    connect_delay: Mutex<Duration>,
    refuse_connections: AtomicBool,
    fail_publishes: AtomicBool,
    connections: AtomicUsize,
}

impl MemoryBus {
    fn deliver(&self, message: &InboundMessage) -> usize {
        let mut subscribers = self.subscribers.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(senders) = subscribers.get_mut(&message.subject) else {
            return 0;
        };
        senders.retain(|sender| sender.send(message.clone()).is_ok());
        senders.len()
    }

    fn add_subscriber(&self, subject: &str) -> mpsc::UnboundedReceiver<InboundMessage> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(subject.to_string())
            .or_default()
            .push(tx);
        rx
    }
}

/// In-process bus with exact-subject routing.
///
/// Clones share one bus, so a test can keep a handle to inspect traffic and
/// inject inbound messages while the bridge owns the connection. Slow or
/// failing transports can be simulated with `set_publish_delay`,
/// `set_connect_delay`, `fail_publishes` and `refuse_connections`.
#[derive(Clone, Default)]
pub struct MemoryTransport {
    bus: Arc<MemoryBus>,
}

impl MemoryTransport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_publish_delay(&self, delay: Duration) {
        *self.bus.publish_delay.lock().unwrap_or_else(PoisonError::into_inner) = delay;
    }

    pub fn set_connect_delay(&self, delay: Duration) {
        *self.bus.connect_delay.lock().unwrap_or_else(PoisonError::into_inner) = delay;
    }

    pub fn refuse_connections(&self, refuse: bool) {
        self.bus.refuse_connections.store(refuse, Ordering::SeqCst);
    }

    pub fn fail_publishes(&self, fail: bool) {
        self.bus.fail_publishes.store(fail, Ordering::SeqCst);
    }

    /// Number of successful `connect` calls so far
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.bus.connections.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn published(&self) -> Vec<PublishedMessage> {
        self.bus
            .published
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    #[must_use]
    pub fn published_on(&self, subject: &str) -> Vec<Bytes> {
        self.published()
            .into_iter()
            .filter(|message| message.subject == subject)
            .map(|message| message.payload)
            .collect()
    }

    /// Deliver a message as if another client had published it.
    /// Returns how many subscribers received it.
    pub fn inject(&self, subject: &str, payload: impl Into<Bytes>, reply: Option<&str>) -> usize {
        self.bus.deliver(&InboundMessage {
            subject: subject.to_string(),
            payload: payload.into(),
            reply: reply.map(str::to_string),
        })
    }

    /// Listen on `subject` from outside the bridge
    #[must_use]
    pub fn listen(&self, subject: &str) -> mpsc::UnboundedReceiver<InboundMessage> {
        self.bus.add_subscriber(subject)
    }

    /// Number of live subscribers on `subject`
    #[must_use]
    pub fn subscriber_count(&self, subject: &str) -> usize {
        self.bus
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(subject)
            .map_or(0, Vec::len)
    }
}

#[async_trait]
impl BusTransport for MemoryTransport {
    async fn connect(&self, url: &str) -> Result<Arc<dyn BusConnection>, BusError> {
        let delay = *self.bus.connect_delay.lock().unwrap_or_else(PoisonError::into_inner);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if self.bus.refuse_connections.load(Ordering::SeqCst) {
            return Err(BusError::Connect(format!("{url} refused the connection")));
        }
        self.bus.connections.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(MemoryConnection {
            bus: self.bus.clone(),
        }))
    }
}

struct MemoryConnection {
    bus: Arc<MemoryBus>,
}

#[async_trait]
impl BusConnection for MemoryConnection {
    async fn publish(&self, subject: &str, payload: Bytes) -> Result<(), BusError> {
        let delay = *self.bus.publish_delay.lock().unwrap_or_else(PoisonError::into_inner);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if self.bus.fail_publishes.load(Ordering::SeqCst) {
            return Err(BusError::Publish {
                subject: subject.to_string(),
                reason: "memory bus rejected the message".to_string(),
            });
        }

        self.bus
            .published
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(PublishedMessage {
                subject: subject.to_string(),
                payload: payload.clone(),
            });
        self.bus.deliver(&InboundMessage {
            subject: subject.to_string(),
            payload,
            reply: None,
        });
        Ok(())
    }

    async fn subscribe(&self, subject: &str) -> Result<InboundStream, BusError> {
        let rx = self.bus.add_subscriber(subject);
        Ok(UnboundedReceiverStream::new(rx).boxed())
    }

    async fn flush(&self) -> Result<(), BusError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_reaches_subscribers() {
        let transport = MemoryTransport::new();
        let connection = transport.connect("memory://").await.unwrap();
        let mut stream = connection.subscribe("k8s.events").await.unwrap();

        connection
            .publish("k8s.events", Bytes::from_static(b"hello"))
            .await
            .unwrap();

        let message = stream.next().await.unwrap();
        assert_eq!(message.text(), "hello");
        assert_eq!(transport.published_on("k8s.events").len(), 1);
        assert!(transport.published_on("k8s.metrics").is_empty());
    }

    #[tokio::test]
    async fn test_refused_connection() {
        let transport = MemoryTransport::new();
        transport.refuse_connections(true);
        assert!(transport.connect("memory://").await.is_err());
        assert_eq!(transport.connection_count(), 0);
    }
}
