//! Signal values and the collected bundle.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::canonical;

/// A single collected signal value.
///
/// The model admits integers but not floats: fractional hardware readings
/// (device pixel ratio and friends) must be scaled into integers by the
/// provider so that canonical serialization stays byte-stable across
/// platforms with different float formatting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SignalValue {
    /// Boolean flag, e.g. cookies enabled.
    Bool(bool),
    /// Signed integer, e.g. color depth or hardware concurrency.
    Integer(i64),
    /// Free-form string, e.g. user agent or locale tag.
    String(String),
    /// Ordered list of values, e.g. installed plugin names.
    List(Vec<SignalValue>),
    /// Nested map keyed by attribute name.
    Map(BTreeMap<String, SignalValue>),
}

impl From<bool> for SignalValue {
    fn from(v: bool) -> Self {
        SignalValue::Bool(v)
    }
}

impl From<i64> for SignalValue {
    fn from(v: i64) -> Self {
        SignalValue::Integer(v)
    }
}

impl From<i32> for SignalValue {
    fn from(v: i32) -> Self {
        SignalValue::Integer(i64::from(v))
    }
}

impl From<u32> for SignalValue {
    fn from(v: u32) -> Self {
        SignalValue::Integer(i64::from(v))
    }
}

impl From<&str> for SignalValue {
    fn from(v: &str) -> Self {
        SignalValue::String(v.to_string())
    }
}

impl From<String> for SignalValue {
    fn from(v: String) -> Self {
        SignalValue::String(v)
    }
}

impl<V: Into<SignalValue>> From<Vec<V>> for SignalValue {
    fn from(v: Vec<V>) -> Self {
        SignalValue::List(v.into_iter().map(Into::into).collect())
    }
}

/// The complete set of signals collected for one session.
///
/// Categories are keyed by name and held in a sorted map, so iteration
/// order is already canonical. The bundle is assembled once during
/// identity resolution and treated as immutable afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SignalBundle {
    signals: BTreeMap<String, SignalValue>,
}

impl SignalBundle {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a signal under `category`, replacing any earlier value for
    /// the same category.
    pub fn insert(&mut self, category: impl Into<String>, value: impl Into<SignalValue>) {
        self.signals.insert(category.into(), value.into());
    }

    #[must_use]
    pub fn get(&self, category: &str) -> Option<&SignalValue> {
        self.signals.get(category)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.signals.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.signals.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &SignalValue)> {
        self.signals.iter()
    }

    pub(crate) fn entries(&self) -> &BTreeMap<String, SignalValue> {
        &self.signals
    }

    /// Serializes the bundle into its canonical string form.
    ///
    /// An empty bundle canonicalizes to `{}` so a client that yields no
    /// signals at all still produces a stable (shared) fingerprint.
    #[must_use]
    pub fn canonical_form(&self) -> String {
        canonical::canonicalize(self)
    }
}

impl FromIterator<(String, SignalValue)> for SignalBundle {
    fn from_iter<T: IntoIterator<Item = (String, SignalValue)>>(iter: T) -> Self {
        Self {
            signals: iter.into_iter().collect(),
        }
    }
}
