use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::{ObjectStore, ObjectSummary};
use crate::error::StorageError;

#[derive(Debug, Default)]
struct Inner {
    /// `None` bodies are listed but fail `get` with NotFound
    objects: BTreeMap<String, (Option<Vec<u8>>, u64)>,
    fail_listing: bool,
    gets: Vec<String>,
}

/// In-memory object store.
///
/// Clones share the same contents, so a test can keep a handle while the
/// poll loop owns another. Listing returns keys in lexicographic order.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store `data` under `key`, bumping the object's marker
    pub fn insert(&self, key: impl Into<String>, data: impl Into<Vec<u8>>) {
        let mut inner = self.lock();
        let entry = inner.objects.entry(key.into()).or_insert((None, 0));
        entry.0 = Some(data.into());
        entry.1 += 1;
    }

    /// List `key` but make every `get` of it fail with NotFound, as when an
    /// object is deleted between listing and download
    pub fn insert_vanished(&self, key: impl Into<String>) {
        self.lock().objects.insert(key.into(), (None, 0));
    }

    pub fn remove(&self, key: &str) {
        self.lock().objects.remove(key);
    }

    /// Make subsequent `list` calls fail
    pub fn set_fail_listing(&self, fail: bool) {
        self.lock().fail_listing = fail;
    }

    /// Keys passed to `get`, in call order
    pub fn gets(&self) -> Vec<String> {
        self.lock().gets.clone()
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn list(&self, prefix: &str) -> Result<Vec<ObjectSummary>, StorageError> {
        let inner = self.lock();
        if inner.fail_listing {
            return Err(StorageError::request("list", "listing disabled"));
        }

        Ok(inner
            .objects
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(key, (_, version))| ObjectSummary::new(key.clone()).with_marker(format!("v{version}")))
            .collect())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        let mut inner = self.lock();
        inner.gets.push(key.to_string());

        match inner.objects.get(key) {
            Some((Some(data), _)) => Ok(data.clone()),
            _ => Err(StorageError::NotFound(key.to_string())),
        }
    }
}
