//! cohort - operator CLI for the cohort telemetry pipeline.
//!
//! Offline tooling around a `cohort.toml` deployment: compute the
//! fingerprint and label a signals file resolves to, evaluate experiment
//! bucketing, post a test observation to the webhook, and inspect the
//! journaled delivery backlog.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

mod commands;

/// cohort - operator tooling for the cohort telemetry pipeline
#[derive(Parser, Debug)]
#[command(name = "cohort")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to the client configuration file
    #[arg(short, long, default_value = "cohort.toml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Compute the fingerprint and label for a signals file
    Fingerprint {
        /// Path to a JSON object of signal categories
        signals: PathBuf,

        /// Resolve the label through the configured store instead of an
        /// ephemeral in-memory one
        #[arg(long)]
        persist: bool,
    },

    /// Evaluate which variant a fingerprint falls into
    Variant {
        /// Experiment name
        experiment: String,

        /// Fingerprint as 64 lowercase hex characters
        fingerprint: String,

        /// Comma-separated variant names in definition order
        #[arg(long, value_delimiter = ',', required = true)]
        variants: Vec<String>,

        /// Comma-separated weights matching --variants; uniform when
        /// omitted
        #[arg(long, value_delimiter = ',')]
        weights: Vec<f64>,
    },

    /// Send a test observation to the configured endpoint
    Send {
        /// Observation kind, e.g. page_view
        kind: String,

        /// Properties as key=value pairs (values parsed as JSON when
        /// possible, kept as strings otherwise)
        #[arg(short, long = "property")]
        properties: Vec<String>,

        /// Label to attribute the observation to
        #[arg(long, default_value = "Anonymous")]
        label: String,

        /// Print the wire payload instead of sending it
        #[arg(long)]
        dry_run: bool,
    },

    /// Show the configured tiers and the journaled delivery backlog
    Health,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    match cli.command {
        Commands::Fingerprint { signals, persist } => {
            commands::fingerprint::run(&cli.config, &signals, persist)
        },
        Commands::Variant {
            experiment,
            fingerprint,
            variants,
            weights,
        } => commands::variant::run(&experiment, &fingerprint, variants, weights),
        Commands::Send {
            kind,
            properties,
            label,
            dry_run,
        } => commands::send::run(&cli.config, &kind, &properties, &label, dry_run),
        Commands::Health => commands::health::run(&cli.config),
    }
}
