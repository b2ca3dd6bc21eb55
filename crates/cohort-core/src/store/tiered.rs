//! The tiered store and its self-healing reconciler.

use std::sync::Arc;

use tracing::{debug, warn};

use super::backend::StorageBackend;
use super::memory::MemoryBackend;

/// Ordered persistence tiers, most durable first.
///
/// All operations degrade instead of failing: a tier that errors is
/// treated as absent for that call and logged at debug level. Callers
/// therefore never handle storage errors, they only observe `Option`.
pub struct TieredStore {
    backends: Vec<Arc<dyn StorageBackend>>,
}

impl TieredStore {
    /// Builds a store over `backends` in priority order.
    ///
    /// An in-process memory tier is appended when the list is empty so the
    /// surface keeps working even with no durable persistence configured.
    #[must_use]
    pub fn new(mut backends: Vec<Arc<dyn StorageBackend>>) -> Self {
        if backends.is_empty() {
            backends.push(Arc::new(MemoryBackend::new()));
        }
        Self { backends }
    }

    /// Single memory tier, for tests and ephemeral embedders.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(vec![Arc::new(MemoryBackend::new())])
    }

    #[must_use]
    pub fn tier_names(&self) -> Vec<&str> {
        self.backends.iter().map(|b| b.name()).collect()
    }

    /// Reads `key` from the highest-priority tier that has it.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<String> {
        for backend in &self.backends {
            if !backend.available() {
                continue;
            }
            match backend.read(key) {
                Ok(Some(value)) => return Some(value),
                Ok(None) => {},
                Err(err) => {
                    debug!(backend = backend.name(), key, error = %err, "tier read failed, treating as absent");
                },
            }
        }
        None
    }

    /// Writes `key` to every available tier.
    pub fn put(&self, key: &str, value: &str) {
        let mut accepted = 0usize;
        for backend in &self.backends {
            if !backend.available() {
                continue;
            }
            match backend.write(key, value) {
                Ok(()) => accepted += 1,
                Err(err) => {
                    debug!(backend = backend.name(), key, error = %err, "tier write failed");
                },
            }
        }
        if accepted == 0 {
            warn!(key, "no storage tier accepted the write, value held in flight only");
        }
    }

    /// Reads `key` across all tiers and repairs divergence.
    ///
    /// The highest-priority tier holding a value wins. Every other tier
    /// that is missing the key or disagrees is rewritten to the winner, so
    /// a tier that was wiped or restored from an old snapshot converges
    /// back on the next lookup.
    #[must_use]
    pub fn reconcile(&self, key: &str) -> Option<String> {
        let mut observed: Vec<Option<String>> = Vec::with_capacity(self.backends.len());
        for backend in &self.backends {
            if !backend.available() {
                observed.push(None);
                continue;
            }
            match backend.read(key) {
                Ok(value) => observed.push(value),
                Err(err) => {
                    debug!(backend = backend.name(), key, error = %err, "tier read failed during reconcile");
                    observed.push(None);
                },
            }
        }

        let winner = observed.iter().flatten().next()?.clone();

        let mut healed = 0usize;
        for (backend, seen) in self.backends.iter().zip(&observed) {
            if seen.as_deref() == Some(winner.as_str()) || !backend.available() {
                continue;
            }
            match backend.write(key, &winner) {
                Ok(()) => healed += 1,
                Err(err) => {
                    debug!(backend = backend.name(), key, error = %err, "tier heal write failed");
                },
            }
        }
        if healed > 0 {
            debug!(key, healed, "reconciled divergent storage tiers");
        }

        Some(winner)
    }
}
