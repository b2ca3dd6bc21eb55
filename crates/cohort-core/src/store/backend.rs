//! Storage backend trait and error taxonomy.

use thiserror::Error;

/// Errors a single backend may surface.
///
/// These never escape the tiered layer: the reconciler logs them and
/// treats the backend as absent for that operation.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Filesystem failure while reading or writing.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Embedded database failure.
    #[error("database error: {0}")]
    Database(String),

    /// Stored bytes could not be parsed or produced.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Backend declined the operation (read-only mount, quota, disabled).
    #[error("backend unavailable")]
    Unavailable,
}

impl From<rusqlite::Error> for BackendError {
    fn from(err: rusqlite::Error) -> Self {
        BackendError::Database(err.to_string())
    }
}

/// One persistence tier.
///
/// Implementations are synchronous and cheap per call; values are small
/// strings. `available` is advisory: a backend may still fail a read or
/// write after reporting available, and callers must tolerate that.
pub trait StorageBackend: Send + Sync {
    /// Stable backend name for logs, e.g. `"sqlite"`.
    fn name(&self) -> &str;

    /// Whether the backend currently accepts operations.
    fn available(&self) -> bool {
        true
    }

    /// Reads the value for `key`, `None` when absent.
    fn read(&self, key: &str) -> Result<Option<String>, BackendError>;

    /// Writes `value` under `key`, replacing any previous value.
    fn write(&self, key: &str, value: &str) -> Result<(), BackendError>;
}
