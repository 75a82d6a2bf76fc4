//! Processed-file ledger
//!
//! The poll loop asks the ledger before processing an object and tells it
//! once the object completed. An entry matches only when both the key and the
//! object's marker (its ETag) are unchanged, so an overwritten file is picked
//! up again. Objects listed without a marker match on key alone.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

use crate::error::LedgerError;

/// Memory of processed objects across poll cycles
pub trait ProcessedLedger: Send {
    fn is_processed(&self, key: &str, marker: Option<&str>) -> bool;

    fn mark_processed(&mut self, key: &str, marker: Option<&str>) -> Result<(), LedgerError>;
}

/// Remembers nothing: every cycle reprocesses every listed file
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopLedger;

impl ProcessedLedger for NoopLedger {
    fn is_processed(&self, _key: &str, _marker: Option<&str>) -> bool {
        false
    }

    fn mark_processed(&mut self, _key: &str, _marker: Option<&str>) -> Result<(), LedgerError> {
        Ok(())
    }
}

/// One processed object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub marker: Option<String>,
    pub processed_at: DateTime<Utc>,
}

type Entries = BTreeMap<String, LedgerEntry>;

fn matches(entries: &Entries, key: &str, marker: Option<&str>) -> bool {
    entries
        .get(key)
        .is_some_and(|entry| entry.marker.as_deref() == marker)
}

fn record(entries: &mut Entries, key: &str, marker: Option<&str>) {
    entries.insert(
        key.to_string(),
        LedgerEntry {
            marker: marker.map(str::to_string),
            processed_at: Utc::now(),
        },
    );
}

/// In-process ledger; clones share entries
#[derive(Debug, Clone, Default)]
pub struct MemoryLedger {
    entries: Arc<Mutex<Entries>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Entries> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn entries(&self) -> Entries {
        self.lock().clone()
    }
}

impl ProcessedLedger for MemoryLedger {
    fn is_processed(&self, key: &str, marker: Option<&str>) -> bool {
        matches(&self.lock(), key, marker)
    }

    fn mark_processed(&mut self, key: &str, marker: Option<&str>) -> Result<(), LedgerError> {
        record(&mut self.lock(), key, marker);
        Ok(())
    }
}

/// Ledger persisted as a JSON object of key to [`LedgerEntry`].
///
/// The whole file is rewritten after every mark, through a temporary file
/// renamed over the original.
#[derive(Debug)]
pub struct JsonFileLedger {
    path: PathBuf,
    entries: Entries,
}

impl JsonFileLedger {
    /// Load `path`, starting empty when it does not exist yet
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, LedgerError> {
        let path = path.into();
        let entries = match std::fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|source| LedgerError::Corrupt {
                path: path.clone(),
                source,
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Entries::new(),
            Err(source) => return Err(LedgerError::Io { path, source }),
        };

        debug!(path = %path.display(), entries = entries.len(), "Loaded ledger");
        Ok(Self { path, entries })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn persist(&self) -> Result<(), LedgerError> {
        let io_err = |source| LedgerError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }

        let body = serde_json::to_vec_pretty(&self.entries).map_err(|source| LedgerError::Corrupt {
            path: self.path.clone(),
            source,
        })?;

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        std::fs::write(&tmp, body).map_err(io_err)?;
        std::fs::rename(&tmp, &self.path).map_err(io_err)
    }
}

impl ProcessedLedger for JsonFileLedger {
    fn is_processed(&self, key: &str, marker: Option<&str>) -> bool {
        matches(&self.entries, key, marker)
    }

    fn mark_processed(&mut self, key: &str, marker: Option<&str>) -> Result<(), LedgerError> {
        record(&mut self.entries, key, marker);
        self.persist()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn noop_never_remembers() {
        let mut ledger = NoopLedger;
        ledger.mark_processed("a.csv", Some("v1")).unwrap();
        assert!(!ledger.is_processed("a.csv", Some("v1")));
    }

    #[test]
    fn memory_matches_key_and_marker() {
        let mut ledger = MemoryLedger::new();
        ledger.mark_processed("a.csv", Some("v1")).unwrap();

        assert!(ledger.is_processed("a.csv", Some("v1")));
        assert!(!ledger.is_processed("a.csv", Some("v2")));
        assert!(!ledger.is_processed("a.csv", None));
        assert!(!ledger.is_processed("b.csv", Some("v1")));

        ledger.mark_processed("b.csv", None).unwrap();
        assert!(ledger.is_processed("b.csv", None));
    }

    #[test]
    fn json_ledger_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("ledger.json");

        let mut ledger = JsonFileLedger::open(&path).unwrap();
        assert!(ledger.is_empty());
        ledger.mark_processed("in/a.csv", Some("\"etag-1\"")).unwrap();

        let reopened = JsonFileLedger::open(&path).unwrap();
        assert_eq!(reopened.len(), 1);
        assert!(reopened.is_processed("in/a.csv", Some("\"etag-1\"")));
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.json");
        std::fs::write(&path, "not json").unwrap();

        let err = JsonFileLedger::open(&path).unwrap_err();
        assert!(matches!(err, LedgerError::Corrupt { .. }));
    }

    #[test]
    fn entries_are_readable_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.json");
        let mut ledger = JsonFileLedger::open(&path).unwrap();
        ledger.mark_processed("a.csv", Some("v3")).unwrap();

        let raw: serde_json::Value = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(raw["a.csv"]["marker"], "v3");
        assert!(raw["a.csv"]["processed_at"].is_string());
    }
}
