//! Pseudonymous session identity.
//!
//! Identity is derived, not declared: the collected signal bundle is
//! canonicalized and hashed into a [`Fingerprint`], and the fingerprint is
//! mapped to a human-readable [label](label) of the form
//! `AdjectiveAnimal0000`. The mapping persists through the tiered store so
//! the same environment resolves to the same label across sessions, and a
//! wiped tier is repaired from the surviving ones on lookup.
//!
//! Labels are pseudonymous handles for display, never identifiers for
//! joining data sets. Collisions across distinct fingerprints are accepted
//! after a bounded number of redraws.

mod engine;
mod fingerprint;
pub mod label;

pub use engine::{DeclaredIdentity, Identity, IdentityEngine, ANONYMOUS_LABEL};
pub use fingerprint::{Fingerprint, FingerprintError, FINGERPRINT_HEX_LEN};
