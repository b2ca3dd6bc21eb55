//! `cohort health` - configured tiers and journaled delivery backlog.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use cohort_core::delivery::DeliveryQueue;
use cohort_core::CohortConfig;

/// Prints a store-side snapshot for a deployment: which tiers mounted and
/// how many payloads the last session left in the journal.
pub fn run(config_path: &Path) -> Result<()> {
    let config = CohortConfig::from_file(config_path)
        .with_context(|| format!("failed to load config {}", config_path.display()))?;
    let store = Arc::new(config.build_store());

    println!("endpoint:  {}", config.endpoint);
    println!("tiers:     {}", store.tier_names().join(" -> "));

    let queue = DeliveryQueue::with_journal(store);
    println!("journaled: {} payload(s) awaiting delivery", queue.len());
    Ok(())
}
