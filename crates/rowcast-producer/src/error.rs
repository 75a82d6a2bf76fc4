//! Error types for the producer
//!
//! Only [`ProducerError`] (configuration, schema, ledger load) is fatal, and
//! only at startup. Everything else is recovered at the smallest unit it
//! affects: a listing failure empties one cycle, an [`ExtractError`] ends one
//! file, and [`EncodingError`]/[`SendError`] drop one record.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

use rowcast_common::EnvError;

/// Result type alias for startup operations
pub type Result<T> = std::result::Result<T, ProducerError>;

/// Fatal startup failures
#[derive(Error, Debug)]
pub enum ProducerError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("Broker error: {0}")]
    Broker(#[from] SendError),
}

impl From<EnvError> for ProducerError {
    fn from(err: EnvError) -> Self {
        ProducerError::Config(err.to_string())
    }
}

/// The schema file could not be turned into a usable record schema
#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("Schema file not found or unreadable at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse schema: {0}")]
    Parse(String),

    #[error("Schema must be an Avro record, found {0}")]
    NotARecord(String),

    #[error("Field '{field}' is not supported: {reason}")]
    UnsupportedField { field: String, reason: String },
}

/// Object store failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Storage {operation} failed: {message}")]
    Request { operation: String, message: String },
}

impl StorageError {
    pub fn request(operation: impl Into<String>, message: impl fmt::Display) -> Self {
        StorageError::Request {
            operation: operation.into(),
            message: message.to_string(),
        }
    }
}

/// Per-file extraction failures
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("Source object is missing: {0}")]
    MissingSource(String),

    #[error("Failed to fetch {key}: {source}")]
    Storage {
        key: String,
        #[source]
        source: StorageError,
    },

    #[error("Failed to parse {key} near line {line}: {source}")]
    Parse {
        key: String,
        line: u64,
        #[source]
        source: csv::Error,
    },
}

/// One field that could not be coerced to its declared type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDiagnostic {
    pub field: String,
    pub expected: String,
    pub found: Option<String>,
    pub reason: String,
}

impl fmt::Display for FieldDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.found {
            Some(value) => write!(
                f,
                "{}: expected {}, found {:?} ({})",
                self.field, self.expected, value, self.reason
            ),
            None => write!(f, "{}: expected {}, found null ({})", self.field, self.expected, self.reason),
        }
    }
}

fn join_diagnostics(diagnostics: &[FieldDiagnostic]) -> String {
    diagnostics
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Per-record encoding failures
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EncodingError {
    #[error("Record does not match schema: {}", join_diagnostics(.0))]
    InvalidFields(Vec<FieldDiagnostic>),

    #[error("Avro serialization failed: {0}")]
    Serialize(String),
}

impl EncodingError {
    /// Field-level diagnostics, empty for serializer failures
    pub fn diagnostics(&self) -> &[FieldDiagnostic] {
        match self {
            EncodingError::InvalidFields(diagnostics) => diagnostics,
            EncodingError::Serialize(_) => &[],
        }
    }
}

/// Broker failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SendError {
    #[error("Broker client could not be created: {0}")]
    Client(String),

    #[error("Failed to enqueue message for '{topic}': {message}")]
    Enqueue { topic: String, message: String },

    #[error("Flush failed: {0}")]
    Flush(String),
}

/// Processed-file ledger failures
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Ledger IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Ledger file {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
