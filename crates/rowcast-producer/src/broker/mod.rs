//! Message broker access
//!
//! One message per record; chunk boundaries are marked only by [`flush`].
//!
//! [`flush`]: MessageBroker::flush

use async_trait::async_trait;

use crate::error::SendError;

#[cfg(feature = "kafka")]
pub mod kafka;
pub mod memory;

#[cfg(feature = "kafka")]
pub use kafka::KafkaBroker;
pub use memory::MemoryBroker;

/// Result of a flush
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushReport {
    /// Messages acknowledged since the previous flush
    pub delivered: usize,
    /// Messages the broker rejected or timed out on
    pub undelivered: usize,
}

#[async_trait]
pub trait MessageBroker: Send {
    /// Submit one message. Success means the message was accepted for
    /// delivery, not that it was delivered.
    async fn send(&mut self, topic: &str, payload: Vec<u8>) -> Result<(), SendError>;

    /// Block until every message submitted since the last flush has been
    /// acknowledged or has failed.
    async fn flush(&mut self) -> Result<FlushReport, SendError>;
}
