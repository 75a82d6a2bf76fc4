//! Chunk publication
//!
//! Each record becomes one message; the chunk ends with a single flush. A
//! record that cannot be encoded or sent is logged, counted and skipped, so
//! one bad row never holds back the rest of its chunk.

use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

use crate::broker::MessageBroker;
use crate::encoder::RecordEncoder;
use crate::extract::Record;

/// Whether every record of a chunk made it to the broker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkStatus {
    /// Every record sent and acknowledged by the flush
    Complete,
    /// At least one record dropped, or the flush itself failed
    Partial,
}

/// Tally of one chunk's publication
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChunkOutcome {
    pub records: usize,
    /// Accepted by `send`
    pub sent: usize,
    pub encode_failures: usize,
    pub send_failures: usize,
    /// Accepted by `send` but reported failed by the flush
    pub undelivered: usize,
    pub flushed: bool,
}

impl ChunkOutcome {
    pub fn status(&self) -> ChunkStatus {
        if self.flushed && self.dropped() == 0 {
            ChunkStatus::Complete
        } else {
            ChunkStatus::Partial
        }
    }

    /// Records known to be lost
    pub fn dropped(&self) -> usize {
        self.encode_failures + self.send_failures + self.undelivered
    }

    /// Records the broker confirmed
    pub fn delivered(&self) -> usize {
        if self.flushed {
            self.sent - self.undelivered
        } else {
            0
        }
    }
}

/// Encodes records and publishes them to one topic
pub struct ChunkPublisher {
    broker: Box<dyn MessageBroker>,
    encoder: Arc<dyn RecordEncoder>,
    topic: String,
}

impl ChunkPublisher {
    pub fn new(
        broker: Box<dyn MessageBroker>,
        encoder: Arc<dyn RecordEncoder>,
        topic: impl Into<String>,
    ) -> Self {
        Self {
            broker,
            encoder,
            topic: topic.into(),
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Send every record of `chunk` in order, then flush once
    #[instrument(skip(self, chunk), fields(topic = %self.topic, records = chunk.len()))]
    pub async fn publish(&mut self, chunk: &[Record]) -> ChunkOutcome {
        let mut outcome = ChunkOutcome {
            records: chunk.len(),
            ..ChunkOutcome::default()
        };

        for (index, record) in chunk.iter().enumerate() {
            let payload = match self.encoder.encode(record) {
                Ok(payload) => payload,
                Err(e) => {
                    error!(index, error = %e, "Failed to encode record, dropping it");
                    outcome.encode_failures += 1;
                    continue;
                },
            };

            match self.broker.send(&self.topic, payload).await {
                Ok(()) => outcome.sent += 1,
                Err(e) => {
                    error!(index, error = %e, "Failed to send record, dropping it");
                    outcome.send_failures += 1;
                },
            }
        }

        match self.broker.flush().await {
            Ok(report) => {
                outcome.flushed = true;
                outcome.undelivered = report.undelivered;
                if report.undelivered > 0 {
                    warn!(undelivered = report.undelivered, "Broker did not confirm every message");
                }
            },
            Err(e) => error!(error = %e, "Flush failed"),
        }

        match outcome.status() {
            ChunkStatus::Complete => {
                info!("Sent {} messages to topic '{}'", outcome.sent, self.topic)
            },
            ChunkStatus::Partial => warn!(
                sent = outcome.sent,
                dropped = outcome.dropped(),
                flushed = outcome.flushed,
                "Chunk published partially"
            ),
        }
        debug!(?outcome, "Chunk outcome");

        outcome
    }
}
