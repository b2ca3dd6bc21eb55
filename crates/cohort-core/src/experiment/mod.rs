//! Deterministic experiment bucketing.
//!
//! A fingerprint is mapped into the unit interval by hashing
//! `fingerprint || experiment-name` and scaling the first eight digest
//! bytes; the variant is found by walking the weight list until the
//! accumulated weight passes that point. The mapping is pure, so every
//! client everywhere agrees on the assignment without coordination, and
//! assignments are additionally persisted so a client keeps its variant
//! even if the definition's weights change later.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::identity::Fingerprint;
use crate::store::TieredStore;

/// 2^64 as f64; denominator for scaling the digest prefix.
const UNIT_DENOMINATOR: f64 = 18_446_744_073_709_551_616.0;

#[derive(Debug, Error, PartialEq)]
pub enum ExperimentError {
    #[error("experiment `{0}` has no variants")]
    NoVariants(String),

    #[error("experiment `{name}` defines {weights} weights for {variants} variants")]
    WeightCount {
        name: String,
        variants: usize,
        weights: usize,
    },

    #[error("experiment `{name}` has duplicate variant `{variant}`")]
    DuplicateVariant { name: String, variant: String },

    #[error("experiment `{name}` weight for `{variant}` must be finite and non-negative")]
    InvalidWeight { name: String, variant: String },

    #[error("experiment `{0}` weights sum to zero")]
    ZeroWeightSum(String),
}

/// An experiment as registered by the caller.
///
/// `weights` parallels `variants`; omitted weights mean a uniform split.
/// Weights are normalized by their sum, so `[8, 1, 1]` reads as 80/10/10.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentDefinition {
    pub name: String,
    pub variants: Vec<String>,
    #[serde(default)]
    pub weights: Option<Vec<f64>>,
    #[serde(default)]
    pub starts_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub ends_at: Option<DateTime<Utc>>,
    #[serde(default = "default_active")]
    pub active: bool,
}

const fn default_active() -> bool {
    true
}

impl ExperimentDefinition {
    /// Uniform split over `variants`.
    pub fn uniform(
        name: impl Into<String>,
        variants: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            name: name.into(),
            variants: variants.into_iter().map(Into::into).collect(),
            weights: None,
            starts_at: None,
            ends_at: None,
            active: true,
        }
    }

    /// Weighted split; weights need not sum to one.
    pub fn weighted(
        name: impl Into<String>,
        variants: impl IntoIterator<Item = impl Into<String>>,
        weights: impl IntoIterator<Item = f64>,
    ) -> Self {
        Self {
            weights: Some(weights.into_iter().collect()),
            ..Self::uniform(name, variants)
        }
    }

    #[must_use]
    pub fn with_window(
        mut self,
        starts_at: Option<DateTime<Utc>>,
        ends_at: Option<DateTime<Utc>>,
    ) -> Self {
        self.starts_at = starts_at;
        self.ends_at = ends_at;
        self
    }

    pub fn validate(&self) -> Result<(), ExperimentError> {
        if self.variants.is_empty() {
            return Err(ExperimentError::NoVariants(self.name.clone()));
        }
        for (i, variant) in self.variants.iter().enumerate() {
            if self.variants[..i].contains(variant) {
                return Err(ExperimentError::DuplicateVariant {
                    name: self.name.clone(),
                    variant: variant.clone(),
                });
            }
        }
        if let Some(weights) = &self.weights {
            if weights.len() != self.variants.len() {
                return Err(ExperimentError::WeightCount {
                    name: self.name.clone(),
                    variants: self.variants.len(),
                    weights: weights.len(),
                });
            }
            for (variant, weight) in self.variants.iter().zip(weights) {
                if !weight.is_finite() || *weight < 0.0 {
                    return Err(ExperimentError::InvalidWeight {
                        name: self.name.clone(),
                        variant: variant.clone(),
                    });
                }
            }
            if weights.iter().sum::<f64>() <= 0.0 {
                return Err(ExperimentError::ZeroWeightSum(self.name.clone()));
            }
        }
        Ok(())
    }

    fn is_open_at(&self, now: DateTime<Utc>) -> bool {
        self.active
            && self.starts_at.map_or(true, |t| now >= t)
            && self.ends_at.map_or(true, |t| now < t)
    }

    /// Walks the normalized weights until the running sum passes `unit`.
    /// Falls back to the first variant when rounding leaves no match.
    fn select(&self, unit: f64) -> &str {
        let uniform = 1.0 / self.variants.len() as f64;
        let sum: f64 = self
            .weights
            .as_ref()
            .map_or(1.0, |w| w.iter().sum());
        let mut acc = 0.0;
        for (i, variant) in self.variants.iter().enumerate() {
            let weight = self
                .weights
                .as_ref()
                .map_or(uniform, |w| w[i] / sum);
            acc += weight;
            if unit < acc {
                return variant;
            }
        }
        &self.variants[0]
    }
}

/// Maps a fingerprint and experiment name onto `[0, 1)`.
///
/// The digest prefix is interpreted big-endian so the mapping is identical
/// across platforms.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn unit_interval(fingerprint: &Fingerprint, experiment: &str) -> f64 {
    let mut hasher = Sha256::new();
    hasher.update(fingerprint.as_hex().as_bytes());
    hasher.update(experiment.as_bytes());
    let digest = hasher.finalize();
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(prefix) as f64 / UNIT_DENOMINATOR
}

/// Registry of experiment definitions plus persisted assignments.
pub struct Experiments {
    store: Arc<TieredStore>,
    definitions: RwLock<HashMap<String, ExperimentDefinition>>,
}

impl Experiments {
    #[must_use]
    pub fn new(store: Arc<TieredStore>) -> Self {
        Self {
            store,
            definitions: RwLock::new(HashMap::new()),
        }
    }

    /// Registers a definition. Re-registering a name replaces the earlier
    /// definition; live assignments are unaffected because they are sticky.
    pub fn create(&self, definition: ExperimentDefinition) -> Result<(), ExperimentError> {
        definition.validate()?;
        let mut definitions = self
            .definitions
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if definitions.contains_key(&definition.name) {
            warn!(
                experiment = definition.name,
                "experiment redefined, later definition wins"
            );
        }
        definitions.insert(definition.name.clone(), definition);
        Ok(())
    }

    /// Flips the active flag. Existing assignments remain readable.
    pub fn set_active(&self, name: &str, active: bool) {
        let mut definitions = self
            .definitions
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        match definitions.get_mut(name) {
            Some(def) => def.active = active,
            None => warn!(experiment = name, "cannot toggle unknown experiment"),
        }
    }

    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let definitions = self
            .definitions
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let mut names: Vec<String> = definitions.keys().cloned().collect();
        names.sort();
        names
    }

    /// Returns the sticky variant for `fingerprint` in `name`.
    ///
    /// Unknown experiments yield `None` with a warning. A closed or
    /// inactive experiment still returns an assignment made while it was
    /// open, but never mints a new one.
    #[must_use]
    pub fn assign(&self, name: &str, fingerprint: &Fingerprint) -> Option<String> {
        self.assign_at(name, fingerprint, Utc::now())
    }

    #[must_use]
    pub fn assign_at(
        &self,
        name: &str,
        fingerprint: &Fingerprint,
        now: DateTime<Utc>,
    ) -> Option<String> {
        let definitions = self
            .definitions
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let Some(definition) = definitions.get(name) else {
            warn!(experiment = name, "variant requested for unknown experiment");
            return None;
        };

        let key = assignment_key(name, fingerprint);
        if let Some(existing) = self.store.get(&key) {
            return Some(existing);
        }

        if !definition.is_open_at(now) {
            debug!(
                experiment = name,
                fingerprint = fingerprint.short(),
                "experiment closed, no new assignment"
            );
            return None;
        }

        let unit = unit_interval(fingerprint, name);
        let variant = definition.select(unit).to_string();
        self.store.put(&key, &variant);
        info!(
            experiment = name,
            fingerprint = fingerprint.short(),
            variant,
            "variant assigned"
        );
        Some(variant)
    }
}

fn assignment_key(name: &str, fingerprint: &Fingerprint) -> String {
    format!("variant:{}:{}", name, fingerprint.as_hex())
}
