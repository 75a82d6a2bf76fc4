//! Configuration management

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use rowcast_common::env;

use crate::error::{ProducerError, Result};
use crate::storage::StorageConfig;

// ============================================================================
// Defaults
// ============================================================================

/// Records per chunk (one flush per chunk).
pub const DEFAULT_CHUNK_SIZE: usize = 10;

/// Sleep between poll cycles, in seconds.
pub const DEFAULT_PROCESS_INTERVAL_SECS: u64 = 60;

/// Sleep after each full chunk, in seconds.
pub const DEFAULT_CHUNK_PAUSE_SECS: u64 = 20;

/// Only keys ending with this are processed.
pub const DEFAULT_FILE_SUFFIX: &str = ".csv";

pub const DEFAULT_BOOTSTRAP_SERVERS: &str = "localhost:9092";

pub const DEFAULT_TOPIC: &str = "my-topic";

pub const DEFAULT_CLIENT_ID: &str = "rowcast";

/// Upper bound librdkafka spends delivering one message, retries included.
pub const DEFAULT_MESSAGE_TIMEOUT_MS: u64 = 30_000;

pub const DEFAULT_SCHEMA_PATH: &str = "schemas/reclamacoes.avsc";

/// Full producer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProducerConfig {
    pub storage: StorageConfig,
    pub source: SourceConfig,
    pub kafka: KafkaConfig,
    pub pipeline: PipelineConfig,
}

/// Which objects to pick up
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceConfig {
    pub prefix: String,
    pub suffix: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            prefix: String::new(),
            suffix: DEFAULT_FILE_SUFFIX.to_string(),
        }
    }
}

/// Kafka connection and destination
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct KafkaConfig {
    pub bootstrap_servers: String,
    pub topic: String,
    pub client_id: String,
    pub message_timeout_ms: u64,
}

impl Default for KafkaConfig {
    fn default() -> Self {
        Self {
            bootstrap_servers: DEFAULT_BOOTSTRAP_SERVERS.to_string(),
            topic: DEFAULT_TOPIC.to_string(),
            client_id: DEFAULT_CLIENT_ID.to_string(),
            message_timeout_ms: DEFAULT_MESSAGE_TIMEOUT_MS,
        }
    }
}

/// Batching, pacing and schema location
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PipelineConfig {
    pub schema_path: PathBuf,
    pub chunk_size: usize,
    pub process_interval: Duration,
    pub chunk_pause: Duration,
    /// JSON ledger of processed objects; `None` reprocesses every cycle
    pub ledger_path: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            schema_path: PathBuf::from(DEFAULT_SCHEMA_PATH),
            chunk_size: DEFAULT_CHUNK_SIZE,
            process_interval: Duration::from_secs(DEFAULT_PROCESS_INTERVAL_SECS),
            chunk_pause: Duration::from_secs(DEFAULT_CHUNK_PAUSE_SECS),
            ledger_path: None,
        }
    }
}

impl ProducerConfig {
    /// Seed the environment from a `.env` file, then read it.
    ///
    /// An explicit `env_file` must exist; without one, a `.env` in the
    /// working directory is used when present.
    pub fn load(env_file: Option<&Path>) -> Result<Self> {
        match env_file {
            Some(path) => {
                dotenvy::from_path(path).map_err(|e| {
                    ProducerError::Config(format!("cannot load {}: {e}", path.display()))
                })?;
            },
            None => {
                dotenvy::dotenv().ok();
            },
        }

        Self::from_env()
    }

    /// Build from process environment variables
    pub fn from_env() -> Result<Self> {
        let config = Self {
            storage: StorageConfig::from_env()?,
            source: SourceConfig {
                prefix: env::var("S3_PATH_PREFIX").unwrap_or_default(),
                suffix: env::var("S3_FILE_SUFFIX").unwrap_or_else(|| DEFAULT_FILE_SUFFIX.to_string()),
            },
            kafka: KafkaConfig {
                bootstrap_servers: env::var("KAFKA_BOOTSTRAP_SERVERS")
                    .unwrap_or_else(|| DEFAULT_BOOTSTRAP_SERVERS.to_string()),
                topic: env::var("KAFKA_TOPIC").unwrap_or_else(|| DEFAULT_TOPIC.to_string()),
                client_id: env::var("KAFKA_CLIENT_ID").unwrap_or_else(|| DEFAULT_CLIENT_ID.to_string()),
                message_timeout_ms: env::parse_or("KAFKA_MESSAGE_TIMEOUT_MS", DEFAULT_MESSAGE_TIMEOUT_MS)?,
            },
            pipeline: PipelineConfig {
                schema_path: env::var("SCHEMA_PATH")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_SCHEMA_PATH)),
                chunk_size: env::parse_or("CHUNK_SIZE", DEFAULT_CHUNK_SIZE)?,
                process_interval: Duration::from_secs(env::parse_or(
                    "PROCESS_INTERVAL_SECS",
                    DEFAULT_PROCESS_INTERVAL_SECS,
                )?),
                chunk_pause: Duration::from_secs(env::parse_or(
                    "CHUNK_PAUSE_SECS",
                    DEFAULT_CHUNK_PAUSE_SECS,
                )?),
                ledger_path: env::var("LEDGER_PATH").map(PathBuf::from),
            },
        };

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("S3_BUCKET_NAME", &self.storage.bucket),
            ("AWS_DEFAULT_REGION", &self.storage.region),
            ("KAFKA_BOOTSTRAP_SERVERS", &self.kafka.bootstrap_servers),
            ("KAFKA_TOPIC", &self.kafka.topic),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(ProducerError::Config(format!("{name} must not be empty")));
            }
        }

        if self.pipeline.chunk_size == 0 {
            return Err(ProducerError::Config("CHUNK_SIZE must be at least 1".to_string()));
        }

        if self.kafka.message_timeout_ms == 0 {
            return Err(ProducerError::Config(
                "KAFKA_MESSAGE_TIMEOUT_MS must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}
