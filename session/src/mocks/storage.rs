use super::lock;
use crate::error::StorageError;
use crate::storage::{KeyValueStore, MemoryStorage};
use std::sync::{Arc, Mutex};

/// A storage call observed by [`RecordingStorage`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageOp {
    /// `get_item(key)`
    Get(String),
    /// `set_item(key, _)`
    Set(String),
    /// `remove_item(key)`
    Remove(String),
}

/// In-memory storage that records every call made through it.
///
/// Seed it through [`RecordingStorage::inner`] to keep the seeding out of
/// the recording.
#[derive(Debug, Clone, Default)]
pub struct RecordingStorage {
    inner: MemoryStorage,
    ops: Arc<Mutex<Vec<StorageOp>>>,
}

impl RecordingStorage {
    /// Empty storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The storage behind the recorder.
    #[must_use]
    pub fn inner(&self) -> MemoryStorage {
        self.inner.clone()
    }

    /// Calls so far, in order.
    #[must_use]
    pub fn ops(&self) -> Vec<StorageOp> {
        lock(&self.ops).clone()
    }

    fn record(&self, op: StorageOp) {
        lock(&self.ops).push(op);
    }
}

impl KeyValueStore for RecordingStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.record(StorageOp::Get(key.to_string()));
        self.inner.get_item(key)
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.record(StorageOp::Set(key.to_string()));
        self.inner.set_item(key, value)
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        self.record(StorageOp::Remove(key.to_string()));
        self.inner.remove_item(key)
    }
}

/// Storage whose every call fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailingStorage;

impl KeyValueStore for FailingStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        Err(StorageError::Read {
            key: key.to_string(),
            reason: "storage disabled".to_string(),
        })
    }

    fn set_item(&self, key: &str, _value: &str) -> Result<(), StorageError> {
        Err(StorageError::Write {
            key: key.to_string(),
            reason: "quota exceeded".to_string(),
        })
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        Err(StorageError::Remove {
            key: key.to_string(),
            reason: "storage disabled".to_string(),
        })
    }
}
