//! Subcommand implementations.

pub mod fingerprint;
pub mod health;
pub mod send;
pub mod variant;
