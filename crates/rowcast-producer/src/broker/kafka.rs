//! Kafka broker backed by librdkafka

use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::error::KafkaError;
use rdkafka::producer::{DeliveryFuture, FutureProducer, FutureRecord};
use rdkafka::types::RDKafkaErrorCode;
use std::time::Duration;
use tracing::{info, warn};

use super::{FlushReport, MessageBroker};
use crate::config::KafkaConfig;
use crate::error::SendError;

/// Wait before retrying an enqueue while librdkafka's local queue is full
const QUEUE_FULL_BACKOFF: Duration = Duration::from_millis(100);

/// Producer that keeps one delivery future per message until the next flush
pub struct KafkaBroker {
    producer: FutureProducer,
    pending: Vec<DeliveryFuture>,
}

impl KafkaBroker {
    pub fn new(config: &KafkaConfig) -> Result<Self, SendError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", &config.bootstrap_servers)
            .set("client.id", &config.client_id)
            .set("message.timeout.ms", config.message_timeout_ms.to_string())
            .create()
            .map_err(|e| SendError::Client(e.to_string()))?;

        info!(servers = %config.bootstrap_servers, "Kafka producer initialized");

        Ok(Self {
            producer,
            pending: Vec::new(),
        })
    }
}

#[async_trait]
impl MessageBroker for KafkaBroker {
    async fn send(&mut self, topic: &str, payload: Vec<u8>) -> Result<(), SendError> {
        loop {
            let record = FutureRecord::<(), [u8]>::to(topic).payload(payload.as_slice());
            match self.producer.send_result(record).map_err(|(err, _)| err) {
                Ok(delivery) => {
                    self.pending.push(delivery);
                    return Ok(());
                },
                Err(KafkaError::MessageProduction(RDKafkaErrorCode::QueueFull)) => {
                    tokio::time::sleep(QUEUE_FULL_BACKOFF).await;
                },
                Err(err) => {
                    return Err(SendError::Enqueue {
                        topic: topic.to_string(),
                        message: err.to_string(),
                    })
                },
            }
        }
    }

    async fn flush(&mut self) -> Result<FlushReport, SendError> {
        let mut report = FlushReport::default();

        for delivery in std::mem::take(&mut self.pending) {
            match delivery.await {
                Ok(Ok(_)) => report.delivered += 1,
                Ok(Err((err, _))) => {
                    warn!(error = %err, "Message delivery failed");
                    report.undelivered += 1;
                },
                Err(_) => {
                    warn!("Delivery report dropped before completion");
                    report.undelivered += 1;
                },
            }
        }

        Ok(report)
    }
}
