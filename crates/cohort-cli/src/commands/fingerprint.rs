//! `cohort fingerprint` - fingerprint and label for a signals file.
//!
//! The signals file is a JSON object mapping category names to values,
//! e.g. `{"screen": "1920x1080x24", "color_depth": 24, "touch": false}`.
//! Float values are rejected: the canonical profile is integer-only, so
//! providers must scale fractional readings before they reach a bundle.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use cohort_core::identity::IdentityEngine;
use cohort_core::signal::SignalBundle;
use cohort_core::store::TieredStore;
use cohort_core::{CohortConfig, Fingerprint};

/// Computes the fingerprint for `signals_path` and resolves its label.
///
/// With `persist` the label assignment goes through the tiers configured
/// in `config_path` and will be the same one a real client session gets;
/// without it the resolution is ephemeral.
pub fn run(config_path: &Path, signals_path: &Path, persist: bool) -> Result<()> {
    let raw = std::fs::read_to_string(signals_path)
        .with_context(|| format!("failed to read signals file {}", signals_path.display()))?;
    let bundle: SignalBundle = serde_json::from_str(&raw)
        .context("signals file must be a JSON object of category to bool/integer/string/list/map")?;

    let fingerprint = Fingerprint::compute(&bundle);
    // Visible with --log-level debug when chasing fingerprint drift
    // between platforms.
    tracing::debug!(
        canonical = bundle.canonical_form(),
        "canonicalized signal bundle"
    );

    let store = if persist {
        let config = CohortConfig::from_file(config_path)
            .with_context(|| format!("failed to load config {}", config_path.display()))?;
        Arc::new(config.build_store())
    } else {
        Arc::new(TieredStore::in_memory())
    };
    let label = IdentityEngine::new(store).resolve_fingerprint(&fingerprint);

    println!("signals:     {}", bundle.len());
    println!("fingerprint: {}", fingerprint.as_hex());
    println!("label:       {label}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIGNALS: &str = r#"{"lang":"en-US","screen":"1920x1080x24"}"#;

    #[test]
    fn persisted_run_stores_the_label_under_the_configured_tiers() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("cohort.toml");
        std::fs::write(
            &config_path,
            format!(
                "endpoint = \"https://hooks.example.test/cohort\"\n\n[storage]\nfile_path = \"{}\"\n",
                dir.path().join("state.json").display()
            ),
        )
        .unwrap();
        let signals_path = dir.path().join("signals.json");
        std::fs::write(&signals_path, SIGNALS).unwrap();

        run(&config_path, &signals_path, true).unwrap();

        let bundle: SignalBundle = serde_json::from_str(SIGNALS).unwrap();
        let fingerprint = Fingerprint::compute(&bundle);
        let config = CohortConfig::from_file(&config_path).unwrap();
        let stored = config
            .build_store()
            .get(&format!("label:{}", fingerprint.as_hex()));
        assert!(stored.is_some(), "label should land in the file tier");
    }

    #[test]
    fn float_signal_values_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let signals_path = dir.path().join("signals.json");
        std::fs::write(&signals_path, r#"{"ratio":1.5}"#).unwrap();
        let err = run(Path::new("unused.toml"), &signals_path, false);
        assert!(err.is_err());
    }
}
