//! Funnels: multi-step journeys with idempotent step recording.
//!
//! Progress is tracked per (funnel, label) and persisted through the
//! tiered store. Recording a step that is already recorded changes
//! nothing and keeps the first timestamp. Completion fires at most once
//! per journey, when every required step is present inside the
//! completion window measured from the first recorded step.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::store::TieredStore;

#[derive(Debug, Error, PartialEq)]
pub enum FunnelError {
    #[error("funnel `{0}` has no steps")]
    NoSteps(String),

    #[error("funnel `{name}` has duplicate step `{step}`")]
    DuplicateStep { name: String, step: String },
}

/// One step in a funnel definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunnelStep {
    pub name: String,
    /// Required steps gate completion; optional steps are recorded but
    /// not waited for.
    pub required: bool,
}

impl FunnelStep {
    pub fn required(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            required: true,
        }
    }

    pub fn optional(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            required: false,
        }
    }
}

/// A funnel as registered by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunnelDefinition {
    pub name: String,
    pub steps: Vec<FunnelStep>,
    /// Seconds allowed between the first recorded step and completion.
    /// Zero disables the window.
    #[serde(default)]
    pub completion_window_secs: u32,
}

impl FunnelDefinition {
    pub fn new(name: impl Into<String>, steps: impl IntoIterator<Item = FunnelStep>) -> Self {
        Self {
            name: name.into(),
            steps: steps.into_iter().collect(),
            completion_window_secs: 0,
        }
    }

    #[must_use]
    pub fn with_completion_window_secs(mut self, secs: u32) -> Self {
        self.completion_window_secs = secs;
        self
    }

    pub fn validate(&self) -> Result<(), FunnelError> {
        if self.steps.is_empty() {
            return Err(FunnelError::NoSteps(self.name.clone()));
        }
        for (i, step) in self.steps.iter().enumerate() {
            if self.steps[..i].iter().any(|s| s.name == step.name) {
                return Err(FunnelError::DuplicateStep {
                    name: self.name.clone(),
                    step: step.name.clone(),
                });
            }
        }
        Ok(())
    }

    fn has_step(&self, step: &str) -> bool {
        self.steps.iter().any(|s| s.name == step)
    }

    fn required_steps(&self) -> impl Iterator<Item = &str> {
        self.steps
            .iter()
            .filter(|s| s.required)
            .map(|s| s.name.as_str())
    }
}

/// One recorded step: first completion time plus the properties supplied
/// with that first recording.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepRecord {
    pub completed_at: DateTime<Utc>,
    #[serde(default)]
    pub properties: BTreeMap<String, serde_json::Value>,
}

/// Persisted journey state for one (funnel, label).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunnelProgress {
    pub started_at: DateTime<Utc>,
    pub steps: BTreeMap<String, StepRecord>,
    /// At-most-once latch for the completion event.
    pub completion_emitted: bool,
}

impl FunnelProgress {
    fn new(now: DateTime<Utc>) -> Self {
        Self {
            started_at: now,
            steps: BTreeMap::new(),
            completion_emitted: false,
        }
    }
}

/// Outcome of a step recording, for the caller to turn into observations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Recorded {
        /// False when the step was already recorded.
        first_time: bool,
        /// True exactly once per journey, when this recording completed
        /// the funnel.
        completed_funnel: bool,
    },
    /// Unknown funnel or step; nothing was recorded.
    Ignored,
}

/// Registry of funnel definitions plus persisted per-label progress.
pub struct Funnels {
    store: Arc<TieredStore>,
    definitions: RwLock<HashMap<String, FunnelDefinition>>,
}

impl Funnels {
    #[must_use]
    pub fn new(store: Arc<TieredStore>) -> Self {
        Self {
            store,
            definitions: RwLock::new(HashMap::new()),
        }
    }

    /// Registers a definition; a later definition for the same name wins.
    pub fn create(&self, definition: FunnelDefinition) -> Result<(), FunnelError> {
        definition.validate()?;
        let mut definitions = self
            .definitions
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if definitions.contains_key(&definition.name) {
            warn!(
                funnel = definition.name,
                "funnel redefined, later definition wins"
            );
        }
        definitions.insert(definition.name.clone(), definition);
        Ok(())
    }

    pub fn record_step(
        &self,
        funnel: &str,
        step: &str,
        properties: BTreeMap<String, serde_json::Value>,
        label: &str,
    ) -> StepOutcome {
        self.record_step_at(funnel, step, properties, label, Utc::now())
    }

    pub fn record_step_at(
        &self,
        funnel: &str,
        step: &str,
        properties: BTreeMap<String, serde_json::Value>,
        label: &str,
        now: DateTime<Utc>,
    ) -> StepOutcome {
        let definitions = self
            .definitions
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let Some(definition) = definitions.get(funnel) else {
            warn!(funnel, "step recorded for unknown funnel, ignoring");
            return StepOutcome::Ignored;
        };
        if !definition.has_step(step) {
            warn!(funnel, step, "unknown step for funnel, ignoring");
            return StepOutcome::Ignored;
        }

        let key = progress_key(funnel, label);
        let mut progress = self.load_progress(&key, now);

        if progress.steps.contains_key(step) {
            debug!(funnel, step, label, "step already recorded, keeping first timestamp");
            return StepOutcome::Recorded {
                first_time: false,
                completed_funnel: false,
            };
        }

        progress.steps.insert(
            step.to_string(),
            StepRecord {
                completed_at: now,
                properties,
            },
        );

        let mut completed_funnel = false;
        if !progress.completion_emitted
            && definition
                .required_steps()
                .all(|required| progress.steps.contains_key(required))
        {
            if within_window(definition, &progress, now) {
                progress.completion_emitted = true;
                completed_funnel = true;
                info!(funnel, label, "funnel completed");
            } else {
                debug!(funnel, label, "required steps complete outside window, not emitting");
            }
        }

        self.persist_progress(&key, &progress);
        StepOutcome::Recorded {
            first_time: true,
            completed_funnel,
        }
    }

    /// Reads back the journey state for (funnel, label), if any.
    #[must_use]
    pub fn progress(&self, funnel: &str, label: &str) -> Option<FunnelProgress> {
        let raw = self.store.get(&progress_key(funnel, label))?;
        match serde_json::from_str(&raw) {
            Ok(progress) => Some(progress),
            Err(err) => {
                debug!(funnel, label, error = %err, "stored funnel progress unreadable");
                None
            },
        }
    }

    fn load_progress(&self, key: &str, now: DateTime<Utc>) -> FunnelProgress {
        let Some(raw) = self.store.get(key) else {
            return FunnelProgress::new(now);
        };
        match serde_json::from_str(&raw) {
            Ok(progress) => progress,
            Err(err) => {
                debug!(key, error = %err, "stored funnel progress unreadable, restarting journey");
                FunnelProgress::new(now)
            },
        }
    }

    fn persist_progress(&self, key: &str, progress: &FunnelProgress) {
        match serde_json::to_string(progress) {
            Ok(raw) => self.store.put(key, &raw),
            Err(err) => {
                debug!(key, error = %err, "funnel progress not serializable, skipping persist");
            },
        }
    }
}

fn within_window(
    definition: &FunnelDefinition,
    progress: &FunnelProgress,
    now: DateTime<Utc>,
) -> bool {
    if definition.completion_window_secs == 0 {
        return true;
    }
    now - progress.started_at <= Duration::seconds(i64::from(definition.completion_window_secs))
}

fn progress_key(funnel: &str, label: &str) -> String {
    format!("funnel:{funnel}:{label}")
}
