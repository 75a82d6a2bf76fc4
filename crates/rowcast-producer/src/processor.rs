//! Per-file processing
//!
//! Extract, batch and publish one object. Failures stay inside the file:
//! [`FileProcessor::process`] never returns an error, it reports what
//! happened in a [`FileReport`].

use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, instrument, warn};

use crate::batch::ChunkedExt;
use crate::error::ExtractError;
use crate::extract::RowExtractor;
use crate::publisher::{ChunkOutcome, ChunkPublisher, ChunkStatus};
use crate::schema::ProducerSchema;
use crate::storage::ObjectStore;

/// How processing of one file ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    /// Every row was read; individual records may still have been dropped
    Completed,
    /// The object disappeared between listing and download
    Missing,
    /// Download or parsing failed; rows after the failure were abandoned
    Aborted(String),
}

/// Counted result of processing one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileReport {
    pub key: String,
    pub outcome: FileOutcome,
    pub chunks: usize,
    pub partial_chunks: usize,
    pub records: usize,
    pub sent: usize,
    pub delivered: usize,
    pub dropped: usize,
}

impl FileReport {
    fn new(key: &str) -> Self {
        Self {
            key: key.to_string(),
            outcome: FileOutcome::Completed,
            chunks: 0,
            partial_chunks: 0,
            records: 0,
            sent: 0,
            delivered: 0,
            dropped: 0,
        }
    }

    fn add_chunk(&mut self, chunk: &ChunkOutcome) {
        self.chunks += 1;
        if chunk.status() == ChunkStatus::Partial {
            self.partial_chunks += 1;
        }
        self.records += chunk.records;
        self.sent += chunk.sent;
        self.delivered += chunk.delivered();
        self.dropped += chunk.dropped();
    }

    pub fn is_completed(&self) -> bool {
        self.outcome == FileOutcome::Completed
    }
}

/// Runs extractor, batcher and publisher over one file at a time
pub struct FileProcessor {
    schema: Arc<ProducerSchema>,
    publisher: ChunkPublisher,
    chunk_size: usize,
    chunk_pause: Duration,
}

impl FileProcessor {
    pub fn new(schema: Arc<ProducerSchema>, publisher: ChunkPublisher, chunk_size: usize) -> Self {
        Self {
            schema,
            publisher,
            chunk_size: chunk_size.max(1),
            chunk_pause: Duration::ZERO,
        }
    }

    /// Sleep this long after every full chunk
    pub fn with_chunk_pause(mut self, pause: Duration) -> Self {
        self.chunk_pause = pause;
        self
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    #[instrument(skip(self, store), fields(topic = %self.publisher.topic()))]
    pub async fn process(&mut self, store: &dyn ObjectStore, key: &str) -> FileReport {
        let mut report = FileReport::new(key);

        let mut extractor = match RowExtractor::open(store, key, self.schema.field_set()).await {
            Ok(extractor) => extractor,
            Err(ExtractError::MissingSource(_)) => {
                warn!("File not found, skipping");
                report.outcome = FileOutcome::Missing;
                return report;
            },
            Err(e) => {
                error!(error = %e, "Failed to open file");
                report.outcome = FileOutcome::Aborted(e.to_string());
                return report;
            },
        };

        let mut failure = None;
        let rows = extractor.by_ref().map_while(|row| match row {
            Ok(record) => Some(record),
            Err(e) => {
                failure = Some(e);
                None
            },
        });

        for chunk in rows.chunked(self.chunk_size) {
            let outcome = self.publisher.publish(&chunk).await;
            report.add_chunk(&outcome);

            if chunk.len() == self.chunk_size && !self.chunk_pause.is_zero() {
                tokio::time::sleep(self.chunk_pause).await;
            }
        }

        if let Some(e) = failure {
            error!(error = %e, records = report.records, "Extraction failed, abandoning the rest of the file");
            report.outcome = FileOutcome::Aborted(e.to_string());
        } else {
            info!(
                chunks = report.chunks,
                records = report.records,
                delivered = report.delivered,
                dropped = report.dropped,
                "Finished file"
            );
        }

        report
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::broker::MemoryBroker;
    use crate::encoder::AvroEncoder;
    use crate::schema::tests::SAMPLE;
    use crate::error::StorageError;
    use crate::storage::{MemoryStore, ObjectSummary};

    fn processor(broker: &MemoryBroker, chunk_size: usize) -> FileProcessor {
        let schema = Arc::new(ProducerSchema::parse(SAMPLE).unwrap());
        let publisher = ChunkPublisher::new(
            Box::new(broker.clone()),
            Arc::new(AvroEncoder::new(schema.clone())),
            "reclamacoes",
        );
        FileProcessor::new(schema, publisher, chunk_size)
    }

    /// Latin-1 file with an accented header
    fn rows(n: usize) -> Vec<u8> {
        let mut text = b"Ano;Institui\xe7\xe3o financeira\n".to_vec();
        for i in 0..n {
            text.extend_from_slice(format!("2024;BANCO {i}\n").as_bytes());
        }
        text
    }

    #[tokio::test]
    async fn chunks_by_size_with_one_flush_each() {
        let store = MemoryStore::new();
        store.insert("a.csv", rows(12));
        let broker = MemoryBroker::new();

        let report = processor(&broker, 10).process(&store, "a.csv").await;

        assert!(report.is_completed());
        assert_eq!((report.chunks, report.records, report.delivered), (2, 12, 12));
        assert_eq!(broker.flushes().await, 2);
        assert_eq!(broker.delivered().await.len(), 12);
    }

    #[tokio::test]
    async fn missing_file_publishes_nothing() {
        let store = MemoryStore::new();
        store.insert_vanished("gone.csv");
        let broker = MemoryBroker::new();

        let report = processor(&broker, 10).process(&store, "gone.csv").await;

        assert_eq!(report.outcome, FileOutcome::Missing);
        assert_eq!(report.chunks, 0);
        assert_eq!(broker.flushes().await, 0);
    }

    /// Lists one key and fails every download with a request error
    struct BrokenStore;

    #[async_trait::async_trait]
    impl ObjectStore for BrokenStore {
        async fn list(&self, _prefix: &str) -> Result<Vec<ObjectSummary>, StorageError> {
            Ok(vec![ObjectSummary::new("a.csv")])
        }

        async fn get(&self, _key: &str) -> Result<Vec<u8>, StorageError> {
            Err(StorageError::request("get", "connection reset"))
        }
    }

    #[tokio::test]
    async fn download_failure_aborts_the_file() {
        let broker = MemoryBroker::new();

        let report = processor(&broker, 10).process(&BrokenStore, "a.csv").await;

        assert!(matches!(report.outcome, FileOutcome::Aborted(ref m) if m.contains("connection reset")));
        assert_eq!(broker.flushes().await, 0);
    }

    #[tokio::test]
    async fn bad_record_is_dropped_not_fatal() {
        let store = MemoryStore::new();
        store.insert("d.csv", "ano;instituicao_financeira\n2024;A\nabc;B\n2023;C\n");
        let broker = MemoryBroker::new();

        let report = processor(&broker, 10).process(&store, "d.csv").await;

        assert!(report.is_completed());
        assert_eq!((report.records, report.sent, report.dropped), (3, 2, 1));
        assert_eq!(report.partial_chunks, 1);
        assert_eq!(broker.flushes().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn pauses_after_full_chunks_only() {
        let store = MemoryStore::new();
        store.insert("p.csv", rows(5));
        let broker = MemoryBroker::new();
        let mut processor = processor(&broker, 2).with_chunk_pause(Duration::from_secs(20));

        let started = tokio::time::Instant::now();
        let report = processor.process(&store, "p.csv").await;

        assert_eq!(report.chunks, 3);
        assert_eq!(started.elapsed(), Duration::from_secs(40));
    }
}
