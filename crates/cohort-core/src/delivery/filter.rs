//! Pre-queue filtering: exclusion rules and the sampling draw.

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::observation::OutboundObservation;

/// Deny-lists applied before sampling. Matches are exact.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExclusionRules {
    #[serde(default)]
    pub kinds: Vec<String>,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub sources: Vec<String>,
}

impl ExclusionRules {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty() && self.labels.is_empty() && self.sources.is_empty()
    }
}

/// Why an observation was dropped before queueing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterReason {
    SampledOut,
    ExcludedKind,
    ExcludedLabel,
    ExcludedSource,
}

impl FilterReason {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            FilterReason::SampledOut => "sampled_out",
            FilterReason::ExcludedKind => "excluded_kind",
            FilterReason::ExcludedLabel => "excluded_label",
            FilterReason::ExcludedSource => "excluded_source",
        }
    }
}

impl std::fmt::Display for FilterReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decides which observations enter the pipeline at all.
///
/// Exclusion rules run first because they are deterministic; the sampling
/// draw only spends randomness on observations that survive them.
pub struct ObservationFilter {
    sampling_rate: f64,
    rules: ExclusionRules,
}

impl ObservationFilter {
    /// `sampling_rate` is clamped into `[0, 1]`; 1 keeps everything.
    #[must_use]
    pub fn new(sampling_rate: f64, rules: ExclusionRules) -> Self {
        Self {
            sampling_rate: sampling_rate.clamp(0.0, 1.0),
            rules,
        }
    }

    /// `None` means the observation passes.
    #[must_use]
    pub fn evaluate(&self, observation: &OutboundObservation) -> Option<FilterReason> {
        self.evaluate_with(observation, &mut rand::thread_rng())
    }

    #[must_use]
    pub fn evaluate_with<R: Rng + ?Sized>(
        &self,
        observation: &OutboundObservation,
        rng: &mut R,
    ) -> Option<FilterReason> {
        if self.rules.kinds.contains(&observation.kind) {
            return Some(FilterReason::ExcludedKind);
        }
        if self.rules.labels.contains(&observation.label) {
            return Some(FilterReason::ExcludedLabel);
        }
        if let Some(source) = &observation.source {
            if self.rules.sources.contains(source) {
                return Some(FilterReason::ExcludedSource);
            }
        }
        if self.sampling_rate < 1.0 && rng.gen::<f64>() >= self.sampling_rate {
            return Some(FilterReason::SampledOut);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;

    fn observation() -> OutboundObservation {
        OutboundObservation::new("page_view", "CalmHeron1204").with_source("web")
    }

    #[test]
    fn full_rate_with_no_rules_passes_everything() {
        let filter = ObservationFilter::new(1.0, ExclusionRules::default());
        assert_eq!(filter.evaluate(&observation()), None);
    }

    #[test]
    fn zero_rate_samples_everything_out() {
        let filter = ObservationFilter::new(0.0, ExclusionRules::default());
        assert_eq!(
            filter.evaluate(&observation()),
            Some(FilterReason::SampledOut)
        );
    }

    #[test]
    fn exclusion_rules_match_each_dimension() {
        let rules = ExclusionRules {
            kinds: vec!["heartbeat".to_string()],
            labels: vec!["NoisyOtter9999".to_string()],
            sources: vec!["web".to_string()],
        };
        let filter = ObservationFilter::new(1.0, rules);

        let by_kind = OutboundObservation::new("heartbeat", "CalmHeron1204");
        assert_eq!(
            filter.evaluate(&by_kind),
            Some(FilterReason::ExcludedKind)
        );

        let by_label = OutboundObservation::new("page_view", "NoisyOtter9999");
        assert_eq!(
            filter.evaluate(&by_label),
            Some(FilterReason::ExcludedLabel)
        );

        assert_eq!(
            filter.evaluate(&observation()),
            Some(FilterReason::ExcludedSource)
        );
    }

    #[test]
    fn exclusion_wins_over_sampling() {
        let rules = ExclusionRules {
            kinds: vec!["page_view".to_string()],
            ..ExclusionRules::default()
        };
        let filter = ObservationFilter::new(0.0, rules);
        assert_eq!(
            filter.evaluate(&observation()),
            Some(FilterReason::ExcludedKind)
        );
    }

    #[test]
    fn sampling_rate_holds_over_many_draws() {
        let filter = ObservationFilter::new(0.25, ExclusionRules::default());
        let mut rng = StdRng::seed_from_u64(42);
        let obs = observation();
        let kept = (0..10_000)
            .filter(|_| filter.evaluate_with(&obs, &mut rng).is_none())
            .count();
        assert!(
            (2_300..=2_700).contains(&kept),
            "sampling drifted: kept {kept}/10000 at rate 0.25"
        );
    }

    #[test]
    fn out_of_range_rates_are_clamped() {
        let filter = ObservationFilter::new(7.5, ExclusionRules::default());
        assert_eq!(filter.evaluate(&observation()), None);
        let filter = ObservationFilter::new(-1.0, ExclusionRules::default());
        assert_eq!(
            filter.evaluate(&observation()),
            Some(FilterReason::SampledOut)
        );
    }
}
