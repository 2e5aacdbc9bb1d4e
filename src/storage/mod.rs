//! Persistence module
//!
//! Timers and analytics history are stored as two independent JSON blobs under
//! fixed keys. The `Storage` trait is the read/write contract; the stores on top
//! of it own validation and reconciliation.

pub mod history_store;
pub mod timer_store;

use std::{
    collections::HashMap,
    fs,
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex,
    },
};
use thiserror::Error;

pub use history_store::{HistoryReport, HistoryStore};
pub use timer_store::{LoadReport, TimerStore};

/// Key of the persisted timer mapping
pub const TIMERS_KEY: &str = "tv-timers";
/// Key of the persisted analytics history
pub const ANALYTICS_KEY: &str = "tv-analytics";

/// Errors raised by storage backends
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to read/write storage: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to encode or decode stored data: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Storage backend unavailable: {0}")]
    Unavailable(String),
}

/// Keyed blob storage
pub trait Storage: Send + Sync {
    /// Read the blob under `key`, `None` if nothing was ever written
    fn read(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Replace the blob under `key`
    fn write(&self, key: &str, blob: &str) -> Result<(), StorageError>;
}

/// One `<key>.json` file per key inside a data directory
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

impl Storage for FileStorage {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(fs::read_to_string(path)?))
    }

    fn write(&self, key: &str, blob: &str) -> Result<(), StorageError> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(key);
        let tmp = self.dir.join(format!(".{}.json.tmp", key));
        fs::write(&tmp, blob)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }
}

/// In-process storage; clones share the same contents
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    blobs: Arc<Mutex<HashMap<String, String>>>,
    fail_writes: Arc<AtomicBool>,
    writes: Arc<AtomicUsize>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following write fail until switched back
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of successful writes so far
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Seed a raw blob, bypassing the write counter
    pub fn insert_raw(&self, key: &str, blob: &str) {
        if let Ok(mut blobs) = self.blobs.lock() {
            blobs.insert(key.to_string(), blob.to_string());
        }
    }
}

impl Storage for MemoryStorage {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        let blobs = self
            .blobs
            .lock()
            .map_err(|e| StorageError::Unavailable(format!("memory storage poisoned: {}", e)))?;
        Ok(blobs.get(key).cloned())
    }

    fn write(&self, key: &str, blob: &str) -> Result<(), StorageError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("writes disabled".to_string()));
        }
        let mut blobs = self
            .blobs
            .lock()
            .map_err(|e| StorageError::Unavailable(format!("memory storage poisoned: {}", e)))?;
        blobs.insert(key.to_string(), blob.to_string());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_storage_roundtrip_and_missing_key() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path().join("nested"));

        assert!(storage.read(TIMERS_KEY).unwrap().is_none());
        storage.write(TIMERS_KEY, "{}").unwrap();
        assert_eq!(storage.read(TIMERS_KEY).unwrap().as_deref(), Some("{}"));
        assert!(dir.path().join("nested").join("tv-timers.json").exists());
    }

    #[test]
    fn memory_storage_can_refuse_writes() {
        let storage = MemoryStorage::new();
        storage.write(ANALYTICS_KEY, "a").unwrap();
        storage.set_fail_writes(true);
        assert!(storage.write(ANALYTICS_KEY, "b").is_err());
        assert_eq!(storage.read(ANALYTICS_KEY).unwrap().as_deref(), Some("a"));
        assert_eq!(storage.write_count(), 1);
    }
}
