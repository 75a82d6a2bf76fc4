//! Rowcast Producer Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Streams delimited text files from an S3 bucket into a Kafka topic, one
//! Avro-encoded message per row.
//!
//! # Pipeline
//!
//! Each poll cycle lists the bucket and runs every matching object through:
//!
//! 1. [`extract`]: Latin-1 decoding, `;`-delimited parsing, header
//!    [`sanitize`]-ing and schema filtering into [`Record`]s
//! 2. [`batch`]: bounded, order-preserving chunks
//! 3. [`publisher`]: [`encoder`] per record, one broker send per record,
//!    one flush per chunk
//!
//! [`processor`] drives the three for one file and [`poll`] drives the
//! processor over the bucket forever.
//!
//! # Failure isolation
//!
//! - A listing failure empties one cycle
//! - A missing or unreadable file ends that file only
//! - A record that cannot be encoded or sent is dropped and counted
//!
//! Only startup (configuration, schema, ledger file) can fail the process.
//!
//! # Collaborators
//!
//! Storage and broker sit behind [`ObjectStore`] and [`MessageBroker`]. The
//! S3 store is always built; the Kafka broker needs the `kafka` feature.
//! [`MemoryStore`] and [`MemoryBroker`] back the tests.
//!
//! [`Record`]: extract::Record
//! [`ObjectStore`]: storage::ObjectStore
//! [`MessageBroker`]: broker::MessageBroker
//! [`MemoryStore`]: storage::MemoryStore
//! [`MemoryBroker`]: broker::MemoryBroker

pub mod batch;
pub mod broker;
pub mod config;
pub mod encoder;
pub mod error;
pub mod extract;
pub mod ledger;
pub mod poll;
pub mod processor;
pub mod publisher;
pub mod sanitize;
pub mod schema;
pub mod storage;

pub use config::ProducerConfig;
pub use error::{ProducerError, Result};
pub use poll::{CycleReport, PollLoop};
