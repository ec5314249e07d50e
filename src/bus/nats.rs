use super::{BusConnection, BusTransport, InboundMessage, InboundStream};
use crate::error::BusError;
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use std::sync::Arc;

/// Transport backed by a core NATS client
#[derive(Debug, Clone)]
pub struct NatsTransport {
    client_name: String,
}

impl NatsTransport {
    #[must_use]
    pub fn new(client_name: &str) -> Self {
        Self {
            client_name: client_name.to_string(),
        }
    }
}

#[async_trait]
impl BusTransport for NatsTransport {
    async fn connect(&self, url: &str) -> Result<Arc<dyn BusConnection>, BusError> {
        let client = async_nats::ConnectOptions::new()
            .name(&self.client_name)
            .connect(url)
            .await
            .map_err(|e| BusError::Connect(e.to_string()))?;
        Ok(Arc::new(NatsConnection { client }))
    }
}

struct NatsConnection {
    client: async_nats::Client,
}

#[async_trait]
impl BusConnection for NatsConnection {
    async fn publish(&self, subject: &str, payload: Bytes) -> Result<(), BusError> {
        self.client
            .publish(subject.to_string(), payload)
            .await
            .map_err(|e| BusError::Publish {
                subject: subject.to_string(),
                reason: e.to_string(),
            })
    }

    async fn subscribe(&self, subject: &str) -> Result<InboundStream, BusError> {
        let subscriber = self
            .client
            .subscribe(subject.to_string())
            .await
            .map_err(|e| BusError::Subscribe {
                subject: subject.to_string(),
                reason: e.to_string(),
            })?;

        Ok(subscriber
            .map(|message| InboundMessage {
                subject: message.subject.to_string(),
                payload: message.payload,
                reply: message.reply.map(|reply| reply.to_string()),
            })
            .boxed())
    }

    async fn flush(&self) -> Result<(), BusError> {
        self.client
            .flush()
            .await
            .map_err(|e| BusError::Flush(e.to_string()))
    }
}
