//! Key-value slot backing the token cache.
//!
//! Any backend may fail; the token cache treats a failed read as a miss and
//! ignores failed writes and removals.

use crate::error::StorageError;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

/// Synchronous string key-value storage.
pub trait KeyValueStore: Send + Sync {
    /// Read the value under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Read`] if the backend cannot be read.
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Write `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Write`] if the backend rejects the write.
    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Remove the value under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Remove`] if the backend rejects the removal.
    fn remove_item(&self, key: &str) -> Result<(), StorageError>;
}

/// In-memory storage.
///
/// Clones share the same map. [`MemoryStorage::shared`] is the process-wide
/// instance used when no storage is configured, so sessions created one
/// after another reuse each other's tokens.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    items: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStorage {
    /// Create an empty, private storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide storage.
    #[must_use]
    pub fn shared() -> Self {
        static SHARED: OnceLock<MemoryStorage> = OnceLock::new();
        SHARED.get_or_init(Self::new).clone()
    }

    fn items(&self) -> MutexGuard<'_, HashMap<String, String>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of stored keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items().len()
    }

    /// Whether nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items().is_empty()
    }
}

impl KeyValueStore for MemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.items().get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.items().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        self.items().remove(key);
        Ok(())
    }
}
