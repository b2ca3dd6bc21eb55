//! Session fingerprint: sha-256 over the canonical signal form.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::signal::SignalBundle;

/// Length of a fingerprint rendered as lowercase hex.
pub const FINGERPRINT_HEX_LEN: usize = 64;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FingerprintError {
    #[error("fingerprint must be {FINGERPRINT_HEX_LEN} hex characters, got {0}")]
    InvalidLength(usize),

    #[error("fingerprint contains non-hex character at index {0}")]
    InvalidCharacter(usize),
}

/// A 256-bit digest of the canonical signal bundle, stored as lowercase
/// hex. Equal bundles yield equal fingerprints regardless of signal
/// collection order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Hashes the bundle's canonical form.
    #[must_use]
    pub fn compute(bundle: &SignalBundle) -> Self {
        let canonical = bundle.canonical_form();
        let digest = Sha256::digest(canonical.as_bytes());
        Self(hex::encode(digest))
    }

    /// Parses a fingerprint from hex, accepting either case.
    pub fn from_hex(raw: &str) -> Result<Self, FingerprintError> {
        if raw.len() != FINGERPRINT_HEX_LEN {
            return Err(FingerprintError::InvalidLength(raw.len()));
        }
        if let Some(bad) = raw.bytes().position(|b| !b.is_ascii_hexdigit()) {
            return Err(FingerprintError::InvalidCharacter(bad));
        }
        Ok(Self(raw.to_ascii_lowercase()))
    }

    #[must_use]
    pub fn as_hex(&self) -> &str {
        &self.0
    }

    /// First eight hex characters, for log lines.
    #[must_use]
    pub fn short(&self) -> &str {
        &self.0[..8]
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
