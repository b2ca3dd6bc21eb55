//! Environment signal collection and canonical serialization.
//!
//! A signal is one observable fact about the client environment (screen
//! geometry, language, timezone, platform, ...). Signals are gathered from
//! registered providers into an immutable [`SignalBundle`], serialized into
//! a canonical byte-stable form, and hashed into the session fingerprint.
//!
//! ```text
//!   providers ──collect──▶ SignalBundle ──canonicalize──▶ "{...}" ──sha256──▶ Fingerprint
//! ```
//!
//! Canonical form rules:
//! - object keys sorted lexicographically by UTF-8 byte value
//! - integers only, no floating point representation exists in the model
//! - minimal string escaping (quote, backslash, control characters)
//! - no insignificant whitespace
//!
//! Two bundles with the same categories and values always canonicalize to
//! the same bytes regardless of collection order.

mod bundle;
mod canonical;
mod provider;

pub use bundle::{SignalBundle, SignalValue};
pub use canonical::canonicalize;
pub use provider::{AsyncSignalProvider, ProviderSet, SignalProvider, StaticSignal};
