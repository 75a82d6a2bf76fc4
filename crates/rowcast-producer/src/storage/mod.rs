//! Object store access
//!
//! The pipeline only needs two calls: list keys under a prefix and fetch one
//! object's bytes. [`S3Store`] talks to S3 or MinIO; [`MemoryStore`] backs
//! tests and local experiments.

use async_trait::async_trait;

use crate::error::StorageError;

pub mod config;
pub mod memory;
pub mod s3;

pub use config::StorageConfig;
pub use memory::MemoryStore;
pub use s3::S3Store;

/// One listed object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectSummary {
    pub key: String,
    /// Changes whenever the object's content changes (the ETag on S3)
    pub marker: Option<String>,
}

impl ObjectSummary {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            marker: None,
        }
    }

    pub fn with_marker(mut self, marker: impl Into<String>) -> Self {
        self.marker = Some(marker.into());
        self
    }
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Every object whose key starts with `prefix`, in the store's order
    async fn list(&self, prefix: &str) -> Result<Vec<ObjectSummary>, StorageError>;

    /// Full body of `key`; [`StorageError::NotFound`] when it does not exist
    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError>;
}
