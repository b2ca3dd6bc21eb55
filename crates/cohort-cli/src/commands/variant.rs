//! `cohort variant` - evaluate experiment bucketing for a fingerprint.
//!
//! The evaluation is ephemeral: the definition lives in a throwaway
//! in-memory store and nothing is persisted. Because bucketing is a pure
//! function of (fingerprint, experiment name, variants, weights), the
//! printed variant matches what any client with that fingerprint gets.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use cohort_core::experiment::{self, ExperimentDefinition, Experiments};
use cohort_core::store::TieredStore;
use cohort_core::Fingerprint;

pub fn run(
    experiment: &str,
    fingerprint: &str,
    variants: Vec<String>,
    weights: Vec<f64>,
) -> Result<()> {
    let fingerprint = Fingerprint::from_hex(fingerprint)
        .context("fingerprint must be 64 hex characters")?;

    let definition = if weights.is_empty() {
        ExperimentDefinition::uniform(experiment, variants)
    } else {
        ExperimentDefinition::weighted(experiment, variants, weights)
    };

    let registry = Experiments::new(Arc::new(TieredStore::in_memory()));
    registry
        .create(definition)
        .context("invalid experiment definition")?;
    let Some(variant) = registry.assign(experiment, &fingerprint) else {
        bail!("assignment failed for experiment `{experiment}`");
    };

    println!(
        "unit:    {:.6}",
        experiment::unit_interval(&fingerprint, experiment)
    );
    println!("variant: {variant}");
    Ok(())
}
