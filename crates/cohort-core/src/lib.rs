//! # cohort-core
//!
//! Client-side telemetry with pseudonymous identity, deterministic
//! experiments, funnels, and resilient webhook delivery.
//!
//! A [`CohortClient`] resolves who a session is (a signal fingerprint
//! mapped to a stable `Adjective Animal NNNN` label), decides what the
//! session sees (sticky experiment variants), tracks what the session
//! does (funnels), and ships observations to a chat-webhook endpoint
//! without ever blocking or failing the host application.
//!
//! ## Runtime Requirements
//!
//! Delivery runs on tokio: immediate sends are spawned tasks and the
//! flush worker is a background task. Construct the client wherever you
//! like, but call the async surface ([`CohortClient::resolve_identity`],
//! [`CohortClient::flush`], [`CohortClient::shutdown`]) from within a
//! runtime. Submission outside a runtime degrades to the queued path
//! instead of panicking.
//!
//! ```rust,ignore
//! use cohort_core::{CohortClient, CohortConfig, ProviderSet, StaticSignal};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = CohortConfig::new("https://hooks.example.test/T000/B000");
//!     let client = CohortClient::from_config(&config);
//!     client.start();
//!
//!     let providers = ProviderSet::new()
//!         .with_provider(StaticSignal::new("app_version", "1.4.2"));
//!     let identity = client.resolve_identity(&providers).await;
//!     tracing::info!(label = identity.label, "session started");
//!
//!     client.submit_observation("app_started", Default::default());
//!     client.shutdown().await;
//! }
//! ```
//!
//! ## Modules
//!
//! - [`signal`]: Signal providers and the canonical bundle encoding
//! - [`identity`]: Fingerprinting and label assignment
//! - [`store`]: Tiered key-value persistence with read-repair
//! - [`experiment`]: Deterministic hash-bucketed experiments
//! - [`funnel`]: Multi-step journey tracking with completion windows
//! - [`delivery`]: Queued, batched, retrying webhook delivery
//! - [`config`]: TOML configuration surface
//! - [`client`]: The embedding facade tying the pieces together

#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod client;
pub mod config;
pub mod delivery;
pub mod experiment;
pub mod funnel;
pub mod identity;
pub mod signal;
pub mod store;

pub use client::CohortClient;
pub use config::{CohortConfig, ConfigError, StorageConfig};
pub use delivery::{
    DeliveryPipeline, ExclusionRules, OutboundObservation, PipelineConfig, PipelineHealth,
    Priority, Submission,
};
pub use experiment::{ExperimentDefinition, ExperimentError, Experiments};
pub use funnel::{FunnelDefinition, FunnelError, FunnelStep, Funnels, StepOutcome};
pub use identity::{Fingerprint, Identity, IdentityEngine, ANONYMOUS_LABEL};
pub use signal::{ProviderSet, SignalBundle, SignalProvider, SignalValue, StaticSignal};
pub use store::{StorageBackend, TieredStore};
