//! In-process backend. Always present as the last tier so the store
//! surface keeps working when every durable tier is gone.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use super::backend::{BackendError, StorageBackend};

#[derive(Default)]
pub struct MemoryBackend {
    entries: RwLock<HashMap<String, String>>,
    disabled: AtomicBool,
}

impl MemoryBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Flips availability. Used to simulate an unavailable tier in tests
    /// and degraded embedders.
    pub fn set_available(&self, available: bool) {
        self.disabled.store(!available, Ordering::Relaxed);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl StorageBackend for MemoryBackend {
    fn name(&self) -> &str {
        "memory"
    }

    fn available(&self) -> bool {
        !self.disabled.load(Ordering::Relaxed)
    }

    fn read(&self, key: &str) -> Result<Option<String>, BackendError> {
        if !self.available() {
            return Err(BackendError::Unavailable);
        }
        let entries = self
            .entries
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> Result<(), BackendError> {
        if !self.available() {
            return Err(BackendError::Unavailable);
        }
        let mut entries = self
            .entries
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}
