//! Poll loop
//!
//! List, process every matching object in listing order, sleep, repeat.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

use crate::broker::MessageBroker;
use crate::config::{ProducerConfig, SourceConfig};
use crate::encoder::AvroEncoder;
use crate::error::Result;
use crate::ledger::{JsonFileLedger, NoopLedger, ProcessedLedger};
use crate::processor::{FileOutcome, FileProcessor, FileReport};
use crate::publisher::ChunkPublisher;
use crate::schema::ProducerSchema;
use crate::storage::ObjectStore;

/// Counted result of one listing pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Keys that matched the suffix
    pub listed: usize,
    pub skipped_by_ledger: usize,
    pub completed: usize,
    pub missing: usize,
    pub aborted: usize,
    pub records: usize,
    pub delivered: usize,
    pub dropped: usize,
    pub files: Vec<FileReport>,
}

impl CycleReport {
    fn add_file(&mut self, file: FileReport) {
        match file.outcome {
            FileOutcome::Completed => self.completed += 1,
            FileOutcome::Missing => self.missing += 1,
            FileOutcome::Aborted(_) => self.aborted += 1,
        }
        self.records += file.records;
        self.delivered += file.delivered;
        self.dropped += file.dropped;
        self.files.push(file);
    }

    /// Files handed to the processor
    pub fn processed(&self) -> usize {
        self.files.len()
    }
}

pub struct PollLoop {
    store: Box<dyn ObjectStore>,
    processor: FileProcessor,
    ledger: Box<dyn ProcessedLedger>,
    source: SourceConfig,
    interval: Duration,
}

impl PollLoop {
    pub fn new(
        store: Box<dyn ObjectStore>,
        processor: FileProcessor,
        source: SourceConfig,
        interval: Duration,
    ) -> Self {
        Self {
            store,
            processor,
            ledger: Box::new(NoopLedger),
            source,
            interval,
        }
    }

    pub fn with_ledger(mut self, ledger: Box<dyn ProcessedLedger>) -> Self {
        self.ledger = ledger;
        self
    }

    /// Wire the pipeline from configuration.
    ///
    /// Loads the schema and, when `LEDGER_PATH` is set, the ledger file; a
    /// failure of either is fatal.
    pub fn from_config(
        config: &ProducerConfig,
        store: Box<dyn ObjectStore>,
        broker: Box<dyn MessageBroker>,
    ) -> Result<Self> {
        let schema = Arc::new(ProducerSchema::from_file(&config.pipeline.schema_path)?);
        info!(
            schema = schema.name(),
            fields = schema.fields().len(),
            path = %config.pipeline.schema_path.display(),
            "Loaded schema"
        );

        let encoder = Arc::new(AvroEncoder::new(schema.clone()));
        let publisher = ChunkPublisher::new(broker, encoder, config.kafka.topic.clone());
        let processor = FileProcessor::new(schema, publisher, config.pipeline.chunk_size)
            .with_chunk_pause(config.pipeline.chunk_pause);

        let ledger: Box<dyn ProcessedLedger> = match &config.pipeline.ledger_path {
            Some(path) => {
                let ledger = JsonFileLedger::open(path)?;
                info!(path = %path.display(), entries = ledger.len(), "Using processed-file ledger");
                Box::new(ledger)
            },
            None => Box::new(NoopLedger),
        };

        Ok(Self::new(
            store,
            processor,
            config.source.clone(),
            config.pipeline.process_interval,
        )
        .with_ledger(ledger))
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Keys under the prefix ending with the suffix, with their markers.
    /// A listing failure yields nothing.
    async fn discover(&self) -> Vec<(String, Option<String>)> {
        let objects = match self.store.list(&self.source.prefix).await {
            Ok(objects) => objects,
            Err(e) => {
                error!(prefix = %self.source.prefix, error = %e, "Failed to list files");
                return Vec::new();
            },
        };

        objects
            .into_iter()
            .filter(|o| o.key.ends_with(&self.source.suffix))
            .map(|o| (o.key, o.marker))
            .collect()
    }

    /// One listing pass over the store
    #[instrument(skip(self), fields(prefix = %self.source.prefix))]
    pub async fn run_cycle(&mut self) -> CycleReport {
        info!("Checking for {} files", self.source.suffix);
        let keys = self.discover().await;

        let mut report = CycleReport {
            listed: keys.len(),
            ..CycleReport::default()
        };

        if keys.is_empty() {
            warn!("No {} files found", self.source.suffix);
            return report;
        }

        for (key, marker) in keys {
            if self.ledger.is_processed(&key, marker.as_deref()) {
                debug!(key, "Already processed, skipping");
                report.skipped_by_ledger += 1;
                continue;
            }

            let file = self.processor.process(self.store.as_ref(), &key).await;
            if file.is_completed() {
                if let Err(e) = self.ledger.mark_processed(&key, marker.as_deref()) {
                    error!(key, error = %e, "Failed to record processed file");
                }
            }
            report.add_file(file);
        }

        info!(
            files = report.processed(),
            completed = report.completed,
            missing = report.missing,
            aborted = report.aborted,
            skipped = report.skipped_by_ledger,
            delivered = report.delivered,
            dropped = report.dropped,
            "Cycle finished"
        );

        report
    }

    /// Cycle forever, sleeping `interval` between passes
    pub async fn run(&mut self) {
        loop {
            self.run_cycle().await;
            info!("Waiting for {} seconds before checking again", self.interval.as_secs());
            tokio::time::sleep(self.interval).await;
        }
    }
}
