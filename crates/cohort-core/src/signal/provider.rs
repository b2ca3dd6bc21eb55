//! Signal providers and bundle collection.

use async_trait::async_trait;
use tracing::debug;

use super::bundle::{SignalBundle, SignalValue};

/// A synchronous source for one signal category.
///
/// Providers must not panic. A provider that cannot produce its signal
/// (missing permission, absent hardware) returns `None` and the category
/// is simply absent from the bundle.
pub trait SignalProvider: Send + Sync {
    /// Category name this provider fills, e.g. `"screen"` or `"lang"`.
    fn category(&self) -> &str;

    /// Collects the current value, or `None` when unavailable.
    fn collect(&self) -> Option<SignalValue>;
}

/// An asynchronous source for one signal category.
///
/// Same contract as [`SignalProvider`]; used for probes that need I/O.
/// A slow async provider delays identity resolution, so implementations
/// should bound their own waiting.
#[async_trait]
pub trait AsyncSignalProvider: Send + Sync {
    fn category(&self) -> &str;

    async fn collect(&self) -> Option<SignalValue>;
}

/// Fixed-value provider, useful for tests and for host applications that
/// already hold the signal.
pub struct StaticSignal {
    category: String,
    value: SignalValue,
}

impl StaticSignal {
    pub fn new(category: impl Into<String>, value: impl Into<SignalValue>) -> Self {
        Self {
            category: category.into(),
            value: value.into(),
        }
    }
}

impl SignalProvider for StaticSignal {
    fn category(&self) -> &str {
        &self.category
    }

    fn collect(&self) -> Option<SignalValue> {
        Some(self.value.clone())
    }
}

/// An ordered collection of providers that assembles the session bundle.
///
/// Synchronous providers run first, then asynchronous ones in registration
/// order. When two providers claim the same category the later one wins.
#[derive(Default)]
pub struct ProviderSet {
    sync: Vec<Box<dyn SignalProvider>>,
    asynchronous: Vec<Box<dyn AsyncSignalProvider>>,
}

impl ProviderSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_provider(mut self, provider: impl SignalProvider + 'static) -> Self {
        self.sync.push(Box::new(provider));
        self
    }

    #[must_use]
    pub fn with_async_provider(mut self, provider: impl AsyncSignalProvider + 'static) -> Self {
        self.asynchronous.push(Box::new(provider));
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sync.len() + self.asynchronous.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sync.is_empty() && self.asynchronous.is_empty()
    }

    /// Collects every available signal into a bundle.
    ///
    /// Provider failures degrade to absence: the bundle is still produced
    /// and hashed, it just carries fewer categories.
    pub async fn collect_bundle(&self) -> SignalBundle {
        let mut bundle = SignalBundle::new();
        for provider in &self.sync {
            match provider.collect() {
                Some(value) => bundle.insert(provider.category(), value),
                None => {
                    debug!(category = provider.category(), "signal unavailable, skipping");
                },
            }
        }
        for provider in &self.asynchronous {
            match provider.collect().await {
                Some(value) => bundle.insert(provider.category(), value),
                None => {
                    debug!(category = provider.category(), "signal unavailable, skipping");
                },
            }
        }
        bundle
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Unavailable;

    impl SignalProvider for Unavailable {
        fn category(&self) -> &str {
            "battery"
        }

        fn collect(&self) -> Option<SignalValue> {
            None
        }
    }

    struct AsyncProbe;

    #[async_trait]
    impl AsyncSignalProvider for AsyncProbe {
        fn category(&self) -> &str {
            "latency_bucket"
        }

        async fn collect(&self) -> Option<SignalValue> {
            Some(SignalValue::Integer(3))
        }
    }

    #[tokio::test]
    async fn collects_available_signals_only() {
        let set = ProviderSet::new()
            .with_provider(StaticSignal::new("lang", "en-US"))
            .with_provider(Unavailable)
            .with_async_provider(AsyncProbe);

        let bundle = set.collect_bundle().await;
        assert_eq!(bundle.len(), 2);
        assert!(bundle.get("battery").is_none());
        assert_eq!(bundle.get("latency_bucket"), Some(&SignalValue::Integer(3)));
    }

    #[tokio::test]
    async fn later_provider_wins_category() {
        let set = ProviderSet::new()
            .with_provider(StaticSignal::new("lang", "en-US"))
            .with_provider(StaticSignal::new("lang", "de-DE"));

        let bundle = set.collect_bundle().await;
        assert_eq!(bundle.get("lang"), Some(&SignalValue::from("de-DE")));
    }

    #[tokio::test]
    async fn empty_set_yields_empty_bundle() {
        let bundle = ProviderSet::new().collect_bundle().await;
        assert!(bundle.is_empty());
        assert_eq!(bundle.canonical_form(), "{}");
    }
}
