//! The outbound observation record.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Delivery priority. High-priority observations (errors, teardown
/// summaries) attempt transmission immediately even when the pipeline
/// believes it is offline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Normal,
    High,
}

/// One observation accepted from the caller, stamped and labeled before
/// it enters the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundObservation {
    /// Unique id, kept across retries so receivers can deduplicate.
    pub id: Uuid,
    /// Event kind, e.g. `"page_view"`, `"error"`, `"funnel_completed"`.
    pub kind: String,
    #[serde(default)]
    pub properties: BTreeMap<String, serde_json::Value>,
    pub timestamp: DateTime<Utc>,
    /// Pseudonymous label of the submitting session.
    pub label: String,
    pub priority: Priority,
    /// Optional component that produced the observation.
    #[serde(default)]
    pub source: Option<String>,
}

impl OutboundObservation {
    pub fn new(kind: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind: kind.into(),
            properties: BTreeMap::new(),
            timestamp: Utc::now(),
            label: label.into(),
            priority: Priority::Normal,
            source: None,
        }
    }

    #[must_use]
    pub fn with_properties(mut self, properties: BTreeMap<String, serde_json::Value>) -> Self {
        self.properties = properties;
        self
    }

    #[must_use]
    pub fn with_property(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.properties.insert(key.into(), value);
        self
    }

    #[must_use]
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}
