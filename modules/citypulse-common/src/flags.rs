use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

/// Every pipeline stage that can be toggled at runtime. Flags are read from
/// `FEATURE_<NAME>` env vars at startup and stay mutable so an operator can
/// roll a stage back without a restart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feature {
    Normalization,
    EmojiSlang,
    SemanticExpansion,
    EntityExtraction,
    SubIntentDetection,
    MicroCategories,
    MultiLabelClassification,
    HyperlocalBoosts,
    SmallVenueBoost,
    IndependenceBoost,
    MomentumBoost,
    ClusterVibrancy,
    NeighborhoodContext,
    AdaptiveRanking,
    Deduplication,
    CircuitBreaker,
    CostOptimization,
    DistributedCache,
    RequestCancellation,
    SmartFallbacks,
    UxFeedback,
    Metrics,
}

impl Feature {
    pub const ALL: [Feature; 22] = [
        Feature::Normalization,
        Feature::EmojiSlang,
        Feature::SemanticExpansion,
        Feature::EntityExtraction,
        Feature::SubIntentDetection,
        Feature::MicroCategories,
        Feature::MultiLabelClassification,
        Feature::HyperlocalBoosts,
        Feature::SmallVenueBoost,
        Feature::IndependenceBoost,
        Feature::MomentumBoost,
        Feature::ClusterVibrancy,
        Feature::NeighborhoodContext,
        Feature::AdaptiveRanking,
        Feature::Deduplication,
        Feature::CircuitBreaker,
        Feature::CostOptimization,
        Feature::DistributedCache,
        Feature::RequestCancellation,
        Feature::SmartFallbacks,
        Feature::UxFeedback,
        Feature::Metrics,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Feature::Normalization => "normalization",
            Feature::EmojiSlang => "emoji_slang",
            Feature::SemanticExpansion => "semantic_expansion",
            Feature::EntityExtraction => "entity_extraction",
            Feature::SubIntentDetection => "sub_intent_detection",
            Feature::MicroCategories => "micro_categories",
            Feature::MultiLabelClassification => "multi_label_classification",
            Feature::HyperlocalBoosts => "hyperlocal_boosts",
            Feature::SmallVenueBoost => "small_venue_boost",
            Feature::IndependenceBoost => "independence_boost",
            Feature::MomentumBoost => "momentum_boost",
            Feature::ClusterVibrancy => "cluster_vibrancy",
            Feature::NeighborhoodContext => "neighborhood_context",
            Feature::AdaptiveRanking => "adaptive_ranking",
            Feature::Deduplication => "deduplication",
            Feature::CircuitBreaker => "circuit_breaker",
            Feature::CostOptimization => "cost_optimization",
            Feature::DistributedCache => "distributed_cache",
            Feature::RequestCancellation => "request_cancellation",
            Feature::SmartFallbacks => "smart_fallbacks",
            Feature::UxFeedback => "ux_feedback",
            Feature::Metrics => "metrics",
        }
    }

    /// The env var that seeds this flag, e.g. `FEATURE_ADAPTIVE_RANKING`.
    pub fn env_key(&self) -> String {
        format!("FEATURE_{}", self.as_str().to_uppercase())
    }

    fn index(&self) -> usize {
        Feature::ALL.iter().position(|f| f == self).expect("feature in ALL")
    }
}

impl std::fmt::Display for Feature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Feature {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Feature::ALL
            .iter()
            .find(|f| f.as_str() == s)
            .copied()
            .ok_or_else(|| format!("unknown Feature: {s}"))
    }
}

/// Runtime-mutable flag registry. All flags default to enabled; env vars
/// can turn a stage off at boot, and the diagnostics API can flip any flag
/// while the process runs.
pub struct FeatureFlags {
    states: [AtomicBool; 22],
}

impl FeatureFlags {
    /// All features on. The baseline for tests and local runs.
    pub fn all_enabled() -> Self {
        Self {
            states: std::array::from_fn(|_| AtomicBool::new(true)),
        }
    }

    /// Seed from `FEATURE_<NAME>=true|false` env vars; unset means enabled.
    pub fn from_env() -> Self {
        let flags = Self::all_enabled();
        for feature in Feature::ALL {
            if let Ok(value) = std::env::var(feature.env_key()) {
                let enabled = value.eq_ignore_ascii_case("true") || value == "1";
                flags.set(feature, enabled);
            }
        }
        flags
    }

    pub fn is_enabled(&self, feature: Feature) -> bool {
        self.states[feature.index()].load(Ordering::Relaxed)
    }

    pub fn set(&self, feature: Feature, enabled: bool) {
        self.states[feature.index()].store(enabled, Ordering::Relaxed);
    }

    /// Stable name→state view for the diagnostics endpoint.
    pub fn snapshot(&self) -> BTreeMap<&'static str, bool> {
        Feature::ALL
            .iter()
            .map(|f| (f.as_str(), self.is_enabled(*f)))
            .collect()
    }
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self::all_enabled()
    }
}
