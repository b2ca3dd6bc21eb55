//! `cohort send` - post a test observation to the configured endpoint.
//!
//! Useful when wiring up a new webhook: `--dry-run` prints the exact JSON
//! body that would be posted, and a real run reports how the endpoint
//! answered.

use std::path::Path;

use anyhow::{bail, Context, Result};
use cohort_core::delivery::{payload_for, HttpTransport, Transport, TransportResult};
use cohort_core::{CohortConfig, OutboundObservation};

pub fn run(
    config_path: &Path,
    kind: &str,
    properties: &[String],
    label: &str,
    dry_run: bool,
) -> Result<()> {
    let config = CohortConfig::from_file(config_path)
        .with_context(|| format!("failed to load config {}", config_path.display()))?;

    let mut observation = OutboundObservation::new(kind, label).with_source("cohort-cli");
    for pair in properties {
        let (key, value) = parse_property(pair)?;
        observation = observation.with_property(key, value);
    }
    let payload = payload_for(&observation, &config.sender());

    if dry_run {
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;
    let result = rt.block_on(async { HttpTransport::new(&config.endpoint).send(&payload).await });

    match result {
        TransportResult::Delivered => {
            println!("delivered observation '{kind}' to {}", config.endpoint);
            Ok(())
        },
        TransportResult::Rejected { status } => {
            bail!("endpoint rejected the payload with status {status}")
        },
        TransportResult::NetworkError { message } => bail!("network error: {message}"),
    }
}

/// Splits `key=value`; the value is taken as JSON when it parses as JSON
/// and as a bare string otherwise, so `count=3` is a number and
/// `path=/pricing` is a string.
fn parse_property(pair: &str) -> Result<(String, serde_json::Value)> {
    let Some((key, value)) = pair.split_once('=') else {
        bail!("property `{pair}` is not of the form key=value");
    };
    let value = serde_json::from_str(value).unwrap_or_else(|_| serde_json::json!(value));
    Ok((key.to_string(), value))
}
