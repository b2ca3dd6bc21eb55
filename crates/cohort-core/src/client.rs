//! The client context object.
//!
//! [`CohortClient`] owns every moving part: the tiered store, the
//! identity engine, experiment and funnel registries, and the delivery
//! pipeline. Embedders construct it from a [`CohortConfig`], call
//! [`start`](CohortClient::start) to launch the flush worker, resolve
//! identity once, and then use the submission methods freely. Every
//! method degrades instead of failing; telemetry must never take the
//! host application down.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::json;
use tokio::sync::OnceCell;
use tokio::task::JoinHandle;
use tracing::warn;

use crate::config::CohortConfig;
use crate::delivery::{
    DeliveryPipeline, DeliveryQueue, HttpTransport, OutboundObservation, PipelineHealth,
    Priority, Submission, Transport,
};
use crate::experiment::{ExperimentDefinition, ExperimentError, Experiments};
use crate::funnel::{FunnelDefinition, FunnelError, Funnels, StepOutcome};
use crate::identity::{DeclaredIdentity, Identity, IdentityEngine, ANONYMOUS_LABEL};
use crate::signal::ProviderSet;
use crate::store::TieredStore;

pub struct CohortClient {
    store: Arc<TieredStore>,
    engine: IdentityEngine,
    experiments: Experiments,
    funnels: Funnels,
    pipeline: DeliveryPipeline,
    identity: OnceCell<Identity>,
    worker: Mutex<Option<JoinHandle<()>>>,
    observations_submitted: AtomicU64,
    funnels_completed: AtomicU64,
    session_started: DateTime<Utc>,
}

impl CohortClient {
    /// Builds a client posting to the configured webhook over HTTPS.
    #[must_use]
    pub fn from_config(config: &CohortConfig) -> Self {
        let transport: Arc<dyn Transport> = Arc::new(HttpTransport::new(&config.endpoint));
        Self::with_transport(config, transport)
    }

    /// Builds a client over an injected transport. This is the seam tests
    /// and non-HTTP embedders use.
    #[must_use]
    pub fn with_transport(config: &CohortConfig, transport: Arc<dyn Transport>) -> Self {
        let store = Arc::new(config.build_store());
        let queue = if config.persist_queue {
            DeliveryQueue::with_journal(store.clone())
        } else {
            DeliveryQueue::new()
        };
        let pipeline = DeliveryPipeline::new(
            config.pipeline_config(),
            config.sender(),
            config.filter(),
            transport,
            queue,
        );
        Self {
            engine: IdentityEngine::new(store.clone()),
            experiments: Experiments::new(store.clone()),
            funnels: Funnels::new(store.clone()),
            store,
            pipeline,
            identity: OnceCell::new(),
            worker: Mutex::new(None),
            observations_submitted: AtomicU64::new(0),
            funnels_completed: AtomicU64::new(0),
            session_started: Utc::now(),
        }
    }

    /// Launches the background flush worker. Calling it twice is a no-op.
    pub fn start(&self) {
        let mut worker = self
            .worker
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if worker.is_none() {
            *worker = Some(self.pipeline.spawn_worker());
        }
    }

    /// Collects signals and resolves the session identity, once. Later
    /// calls return the cached identity without touching the providers.
    pub async fn resolve_identity(&self, providers: &ProviderSet) -> Identity {
        self.identity
            .get_or_init(|| self.engine.resolve(providers))
            .await
            .clone()
    }

    #[must_use]
    pub fn identity(&self) -> Option<&Identity> {
        self.identity.get()
    }

    /// The session label, or the anonymous placeholder before resolution.
    #[must_use]
    pub fn current_label(&self) -> String {
        self.identity
            .get()
            .map_or_else(|| ANONYMOUS_LABEL.to_string(), |i| i.label.clone())
    }

    /// Attaches a caller-declared identity to the current fingerprint and
    /// emits an `identify` observation.
    pub fn identify(
        &self,
        user_id: impl Into<String>,
        traits: BTreeMap<String, serde_json::Value>,
    ) -> Submission {
        let user_id = user_id.into();
        match self.identity.get() {
            Some(identity) => {
                let declared = DeclaredIdentity {
                    user_id: user_id.clone(),
                    traits,
                    declared_at: Utc::now(),
                };
                self.engine.attach_declared(&identity.fingerprint, &declared);
            },
            None => {
                warn!("identify called before identity resolution, declaration not persisted");
            },
        }
        self.submit_with(
            OutboundObservation::new("identify", self.current_label())
                .with_property("user_id", json!(user_id)),
        )
    }

    pub fn create_experiment(&self, definition: ExperimentDefinition) -> Result<(), ExperimentError> {
        self.experiments.create(definition)
    }

    /// Sticky variant for the current session, `None` before identity
    /// resolution or for unknown experiments.
    #[must_use]
    pub fn get_variant(&self, experiment: &str) -> Option<String> {
        let Some(identity) = self.identity.get() else {
            warn!(experiment, "variant requested before identity resolution");
            return None;
        };
        self.experiments.assign(experiment, &identity.fingerprint)
    }

    pub fn create_funnel(&self, definition: FunnelDefinition) -> Result<(), FunnelError> {
        self.funnels.create(definition)
    }

    /// Records a funnel step for the current session and emits the
    /// matching observations: one per recording for auditing, plus a
    /// `funnel_completed` observation the single time a journey finishes.
    pub fn record_funnel_step(
        &self,
        funnel: &str,
        step: &str,
        properties: BTreeMap<String, serde_json::Value>,
    ) -> StepOutcome {
        let label = self.current_label();
        let outcome = self
            .funnels
            .record_step(funnel, step, properties.clone(), &label);

        if let StepOutcome::Recorded {
            first_time,
            completed_funnel,
        } = outcome
        {
            let mut observation = OutboundObservation::new("funnel_step", label.clone())
                .with_properties(properties)
                .with_property("funnel", json!(funnel))
                .with_property("step", json!(step));
            if !first_time {
                observation = observation.with_property("repeat", json!(true));
            }
            self.submit_with(observation);

            if completed_funnel {
                self.funnels_completed.fetch_add(1, Ordering::Relaxed);
                self.submit_with(
                    OutboundObservation::new("funnel_completed", label)
                        .with_property("funnel", json!(funnel)),
                );
            }
        }
        outcome
    }

    /// Submits a normal-priority observation.
    pub fn submit_observation(
        &self,
        kind: impl Into<String>,
        properties: BTreeMap<String, serde_json::Value>,
    ) -> Submission {
        self.submit_with(
            OutboundObservation::new(kind, self.current_label()).with_properties(properties),
        )
    }

    /// Submits a high-priority error observation; attempted immediately
    /// even while the pipeline believes it is offline.
    pub fn submit_error(
        &self,
        message: impl Into<String>,
        properties: BTreeMap<String, serde_json::Value>,
    ) -> Submission {
        self.submit_with(
            OutboundObservation::new("error", self.current_label())
                .with_properties(properties)
                .with_property("message", json!(message.into()))
                .with_priority(Priority::High),
        )
    }

    #[must_use]
    pub fn health(&self) -> PipelineHealth {
        self.pipeline.health()
    }

    /// Tells the pipeline what the embedder knows about connectivity.
    pub fn set_online(&self, online: bool) {
        self.pipeline.set_online(online);
    }

    /// Drains the queue outside the normal cadence.
    pub async fn flush(&self) {
        self.pipeline.flush_now().await;
    }

    /// Stops the worker, sends a session summary, and makes one bounded
    /// final drain. Whatever cannot be sent in time stays journaled.
    pub async fn shutdown(&self) {
        let worker = self
            .worker
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .take();

        let summary = OutboundObservation::new("session_summary", self.current_label())
            .with_property(
                "observations_submitted",
                json!(self.observations_submitted.load(Ordering::Relaxed)),
            )
            .with_property(
                "funnels_completed",
                json!(self.funnels_completed.load(Ordering::Relaxed)),
            )
            .with_property(
                "session_secs",
                json!((Utc::now() - self.session_started).num_seconds()),
            );
        self.pipeline.shutdown(Some(summary)).await;

        if let Some(worker) = worker {
            let _ = tokio::time::timeout(Duration::from_secs(1), worker).await;
        }
    }

    /// The tiered store backing this client, mainly for diagnostics.
    #[must_use]
    pub fn store(&self) -> &Arc<TieredStore> {
        &self.store
    }

    fn submit_with(&self, observation: OutboundObservation) -> Submission {
        self.observations_submitted.fetch_add(1, Ordering::Relaxed);
        self.pipeline.submit(observation)
    }
}
