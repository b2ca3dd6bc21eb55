//! Identity resolution over the tiered store.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::fingerprint::Fingerprint;
use super::label;
use crate::signal::ProviderSet;
use crate::store::TieredStore;

/// Label used before resolution completes and whenever no identity exists.
pub const ANONYMOUS_LABEL: &str = "Anonymous";

pub(crate) const LABEL_REGISTRY_KEY: &str = "labels:registry";

pub(crate) fn label_key(fingerprint: &Fingerprint) -> String {
    format!("label:{}", fingerprint.as_hex())
}

fn user_key(fingerprint: &Fingerprint) -> String {
    format!("identity:user:{}", fingerprint.as_hex())
}

/// A resolved session identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub fingerprint: Fingerprint,
    pub label: String,
}

/// A caller-declared identity attached to a fingerprint via `identify`.
/// Declarations are additive metadata; they never change the fingerprint
/// or the label. A later declaration replaces an earlier one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeclaredIdentity {
    pub user_id: String,
    #[serde(default)]
    pub traits: BTreeMap<String, serde_json::Value>,
    pub declared_at: DateTime<Utc>,
}

/// Maps signal bundles to stable pseudonymous labels.
pub struct IdentityEngine {
    store: Arc<TieredStore>,
}

impl IdentityEngine {
    #[must_use]
    pub fn new(store: Arc<TieredStore>) -> Self {
        Self { store }
    }

    /// Collects signals, fingerprints them, and resolves the label.
    pub async fn resolve(&self, providers: &ProviderSet) -> Identity {
        let started = std::time::Instant::now();
        let bundle = providers.collect_bundle().await;
        let fingerprint = Fingerprint::compute(&bundle);
        let label = self.resolve_fingerprint(&fingerprint);
        info!(
            fingerprint = fingerprint.short(),
            label,
            signals = bundle.len(),
            elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            "session identity resolved"
        );
        Identity { fingerprint, label }
    }

    /// Returns the label for `fingerprint`, generating and persisting one
    /// on first sight.
    ///
    /// The lookup goes through [`TieredStore::reconcile`] so divergent
    /// tiers converge on the stored label before any new one is drawn.
    pub fn resolve_fingerprint(&self, fingerprint: &Fingerprint) -> String {
        self.resolve_fingerprint_with(fingerprint, &mut rand::thread_rng())
    }

    /// Same as [`resolve_fingerprint`](Self::resolve_fingerprint) with an
    /// injected randomness source, for deterministic tests.
    pub fn resolve_fingerprint_with<R: Rng + ?Sized>(
        &self,
        fingerprint: &Fingerprint,
        rng: &mut R,
    ) -> String {
        let key = label_key(fingerprint);
        if let Some(existing) = self.store.reconcile(&key) {
            return existing;
        }

        let mut registry = self.load_registry();
        let generated = label::generate_unique(rng, |candidate| registry.contains(candidate));
        if generated.collided {
            debug!(
                label = generated.label,
                "label retry budget exhausted, accepting collision"
            );
        }
        registry.insert(generated.label.clone());

        // Persist the assignment before handing the label out so a second
        // resolution of the same fingerprint cannot race it to a redraw.
        self.store.put(&key, &generated.label);
        self.store_registry(&registry);
        debug!(
            fingerprint = fingerprint.short(),
            label = generated.label,
            "assigned new label"
        );
        generated.label
    }

    /// Attaches a declared identity to `fingerprint`, replacing any
    /// earlier declaration.
    pub fn attach_declared(&self, fingerprint: &Fingerprint, declared: &DeclaredIdentity) {
        match serde_json::to_string(declared) {
            Ok(raw) => self.store.put(&user_key(fingerprint), &raw),
            Err(err) => {
                debug!(error = %err, "declared identity not serializable, dropping");
            },
        }
    }

    /// Reads back the declared identity for `fingerprint`, if any.
    #[must_use]
    pub fn declared(&self, fingerprint: &Fingerprint) -> Option<DeclaredIdentity> {
        let raw = self.store.get(&user_key(fingerprint))?;
        match serde_json::from_str(&raw) {
            Ok(declared) => Some(declared),
            Err(err) => {
                debug!(error = %err, "stored declared identity unreadable, ignoring");
                None
            },
        }
    }

    fn load_registry(&self) -> BTreeSet<String> {
        let Some(raw) = self.store.get(LABEL_REGISTRY_KEY) else {
            return BTreeSet::new();
        };
        match serde_json::from_str(&raw) {
            Ok(registry) => registry,
            Err(err) => {
                debug!(error = %err, "label registry unreadable, starting fresh");
                BTreeSet::new()
            },
        }
    }

    fn store_registry(&self, registry: &BTreeSet<String>) {
        match serde_json::to_string(registry) {
            Ok(raw) => self.store.put(LABEL_REGISTRY_KEY, &raw),
            Err(err) => {
                debug!(error = %err, "label registry not serializable, skipping persist");
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;
    use crate::signal::{SignalBundle, StaticSignal};
    use crate::store::{MemoryBackend, StorageBackend};

    fn fingerprint_of(lang: &str) -> Fingerprint {
        let mut bundle = SignalBundle::new();
        bundle.insert("lang", lang);
        Fingerprint::compute(&bundle)
    }

    #[test]
    fn same_fingerprint_keeps_its_label() {
        let store = Arc::new(TieredStore::in_memory());
        let engine = IdentityEngine::new(store);
        let fp = fingerprint_of("en-US");

        let first = engine.resolve_fingerprint(&fp);
        let second = engine.resolve_fingerprint(&fp);
        assert_eq!(first, second);
    }

    #[test]
    fn label_survives_engine_restart() {
        let store = Arc::new(TieredStore::in_memory());
        let fp = fingerprint_of("en-US");

        let first = IdentityEngine::new(store.clone()).resolve_fingerprint(&fp);
        let second = IdentityEngine::new(store).resolve_fingerprint(&fp);
        assert_eq!(first, second);
    }

    #[test]
    fn wiped_primary_tier_is_repaired_from_secondary() {
        let secondary = Arc::new(MemoryBackend::new());
        let fp = fingerprint_of("en-US");

        let original = {
            let store = Arc::new(TieredStore::new(vec![
                Arc::new(MemoryBackend::new()),
                secondary.clone(),
            ]));
            IdentityEngine::new(store).resolve_fingerprint(&fp)
        };

        // Fresh primary simulates a wiped tier; the secondary survives.
        let fresh_primary = Arc::new(MemoryBackend::new());
        let store = Arc::new(TieredStore::new(vec![
            fresh_primary.clone(),
            secondary,
        ]));
        let resolved = IdentityEngine::new(store).resolve_fingerprint(&fp);

        assert_eq!(resolved, original);
        assert_eq!(
            fresh_primary.read(&label_key(&fp)).unwrap(),
            Some(original)
        );
    }

    #[test]
    fn unavailable_primary_tier_does_not_lose_the_label() {
        let primary = Arc::new(MemoryBackend::new());
        let secondary = Arc::new(MemoryBackend::new());
        let store = Arc::new(TieredStore::new(vec![primary.clone(), secondary]));
        let engine = IdentityEngine::new(store);
        let fp = fingerprint_of("en-US");

        primary.set_available(false);
        let assigned = engine.resolve_fingerprint(&fp);

        // The label lives in the surviving tier; once the primary returns
        // the reconciling read copies it back.
        primary.set_available(true);
        assert_eq!(engine.resolve_fingerprint(&fp), assigned);
        assert_eq!(primary.read(&label_key(&fp)).unwrap(), Some(assigned));
    }

    #[test]
    fn registered_label_is_not_reissued() {
        let store = Arc::new(TieredStore::in_memory());
        let engine = IdentityEngine::new(store.clone());

        // Occupy exactly the label a seed-9 draw would produce.
        let first_draw = label::generate(&mut StdRng::seed_from_u64(9));
        store.put(
            LABEL_REGISTRY_KEY,
            &serde_json::to_string(&vec![first_draw.clone()]).unwrap(),
        );

        let fp = fingerprint_of("en-US");
        let label = engine.resolve_fingerprint_with(&fp, &mut StdRng::seed_from_u64(9));
        assert_ne!(label, first_draw);
    }

    #[test]
    fn distinct_fingerprints_land_in_registry() {
        let store = Arc::new(TieredStore::in_memory());
        let engine = IdentityEngine::new(store.clone());

        let a = engine.resolve_fingerprint(&fingerprint_of("en-US"));
        let b = engine.resolve_fingerprint(&fingerprint_of("de-DE"));

        let registry: BTreeSet<String> =
            serde_json::from_str(&store.get(LABEL_REGISTRY_KEY).unwrap()).unwrap();
        assert!(registry.contains(&a));
        assert!(registry.contains(&b));
    }

    #[test]
    fn declared_identity_round_trip_and_overwrite() {
        let store = Arc::new(TieredStore::in_memory());
        let engine = IdentityEngine::new(store);
        let fp = fingerprint_of("en-US");

        assert!(engine.declared(&fp).is_none());

        let first = DeclaredIdentity {
            user_id: "u-1".to_string(),
            traits: BTreeMap::new(),
            declared_at: Utc::now(),
        };
        engine.attach_declared(&fp, &first);
        assert_eq!(engine.declared(&fp).unwrap().user_id, "u-1");

        let second = DeclaredIdentity {
            user_id: "u-2".to_string(),
            traits: BTreeMap::new(),
            declared_at: Utc::now(),
        };
        engine.attach_declared(&fp, &second);
        assert_eq!(engine.declared(&fp).unwrap().user_id, "u-2");
    }

    #[tokio::test]
    async fn resolve_collects_hashes_and_labels() {
        let store = Arc::new(TieredStore::in_memory());
        let engine = IdentityEngine::new(store);
        let providers = ProviderSet::new()
            .with_provider(StaticSignal::new("screen", "1920x1080x24"))
            .with_provider(StaticSignal::new("lang", "en-US"));

        let identity = engine.resolve(&providers).await;
        assert_eq!(identity.fingerprint.as_hex().len(), 64);
        assert!(!identity.label.is_empty());

        let again = engine.resolve(&providers).await;
        assert_eq!(again, identity);
    }
}
