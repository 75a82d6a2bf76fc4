use async_trait::async_trait;
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::Mutex;

use super::{FlushReport, MessageBroker};
use crate::error::SendError;

/// A message accepted by [`MemoryBroker`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedMessage {
    pub topic: String,
    pub payload: Vec<u8>,
    /// Number of flushes completed before this message was sent
    pub batch: usize,
}

#[derive(Debug, Default)]
struct Inner {
    pending: Vec<PublishedMessage>,
    delivered: Vec<PublishedMessage>,
    /// Zero-based send attempts that are rejected at enqueue time
    reject_sends: BTreeSet<usize>,
    /// Zero-based send attempts that are accepted but never delivered
    lose_sends: BTreeSet<usize>,
    lost: BTreeSet<usize>,
    attempts: usize,
    flushes: usize,
}

/// In-memory broker for tests and dry runs.
///
/// Messages move from pending to delivered on [`flush`](MessageBroker::flush).
/// Clones share state, so a test can inspect what the pipeline published.
#[derive(Debug, Clone, Default)]
pub struct MemoryBroker {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject the `n`th send attempt (zero-based) with an enqueue error
    pub async fn reject_send(&self, n: usize) {
        self.inner.lock().await.reject_sends.insert(n);
    }

    /// Accept the `n`th send attempt but report it undelivered on flush
    pub async fn lose_send(&self, n: usize) {
        self.inner.lock().await.lose_sends.insert(n);
    }

    /// Messages delivered by completed flushes, in send order
    pub async fn delivered(&self) -> Vec<PublishedMessage> {
        self.inner.lock().await.delivered.clone()
    }

    /// Messages sent but not yet flushed
    pub async fn pending(&self) -> usize {
        self.inner.lock().await.pending.len()
    }

    pub async fn flushes(&self) -> usize {
        self.inner.lock().await.flushes
    }

    /// Successful `send` calls, delivered or not
    pub async fn accepted(&self) -> usize {
        let inner = self.inner.lock().await;
        inner.attempts - inner.reject_sends.iter().filter(|n| **n < inner.attempts).count()
    }
}

#[async_trait]
impl MessageBroker for MemoryBroker {
    async fn send(&mut self, topic: &str, payload: Vec<u8>) -> Result<(), SendError> {
        let mut inner = self.inner.lock().await;
        let attempt = inner.attempts;
        inner.attempts += 1;

        if inner.reject_sends.contains(&attempt) {
            return Err(SendError::Enqueue {
                topic: topic.to_string(),
                message: format!("send {attempt} rejected"),
            });
        }
        if inner.lose_sends.contains(&attempt) {
            let index = inner.pending.len();
            inner.lost.insert(index);
        }

        let batch = inner.flushes;
        inner.pending.push(PublishedMessage {
            topic: topic.to_string(),
            payload,
            batch,
        });
        Ok(())
    }

    async fn flush(&mut self) -> Result<FlushReport, SendError> {
        let mut inner = self.inner.lock().await;
        let pending = std::mem::take(&mut inner.pending);
        let lost = std::mem::take(&mut inner.lost);

        let mut report = FlushReport::default();
        for (index, message) in pending.into_iter().enumerate() {
            if lost.contains(&index) {
                report.undelivered += 1;
            } else {
                report.delivered += 1;
                inner.delivered.push(message);
            }
        }

        inner.flushes += 1;
        Ok(report)
    }
}
