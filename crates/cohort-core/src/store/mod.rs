//! Tiered key-value persistence with self-healing reads.
//!
//! Identity labels, variant assignments, funnel progress, and the delivery
//! journal all persist through one small surface: string keys to string
//! values across an ordered list of backends.
//!
//! ```text
//!   TieredStore
//!     ├── SqliteBackend   (most durable, first priority)
//!     ├── FileBackend
//!     └── MemoryBackend   (always present, last resort)
//! ```
//!
//! Reads walk the tiers in priority order and return the first hit. Writes
//! go to every available tier. [`TieredStore::reconcile`] additionally
//! repairs divergence: when tiers disagree, the highest-priority value wins
//! and is written back to every other tier. A backend that errors is
//! treated as absent; the store surface itself never fails.
//!
//! Key space:
//!
//! | prefix                         | value                         |
//! |--------------------------------|-------------------------------|
//! | `label:{fingerprint}`          | assigned label                |
//! | `labels:registry`              | JSON array of issued labels   |
//! | `variant:{experiment}:{fp}`    | assigned variant              |
//! | `funnel:{funnel}:{label}`      | JSON funnel progress          |
//! | `identity:user:{fingerprint}`  | JSON declared identity        |
//! | `delivery:queue`               | JSON delivery journal         |

mod backend;
mod file;
mod memory;
mod sqlite;
mod tiered;

pub use backend::{BackendError, StorageBackend};
pub use file::FileBackend;
pub use memory::MemoryBackend;
pub use sqlite::SqliteBackend;
pub use tiered::TieredStore;
