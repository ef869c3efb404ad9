pub mod breaker;
pub mod cache;
pub mod cost;
pub mod dedup;
pub mod executor;
pub mod feedback;
pub mod health;
pub mod inflight;
pub mod metrics;
pub mod plan;
pub mod quality;
pub mod ranker;
pub mod resolve;

pub use breaker::{CircuitBreaker, CircuitState};
pub use cache::TtlCache;
pub use cost::{CostOptimizer, CostReport};
pub use executor::{
    EngineConfig, FallbackAttempt, SearchEngine, SearchMeta, SearchOutcome, SearchRequest,
};
pub use feedback::{FeedbackChip, UxFeedback};
pub use health::{ComponentHealth, HealthReport, HealthStatus};
pub use metrics::{MetricsSnapshot, SearchMetrics};
pub use plan::build_plan;
pub use quality::{QualityGrade, QualityOptions, QualityOutcome};
pub use ranker::{rank, FactorScores, RankedResult, RankingContext};
pub use resolve::{resolve, GeoTable};
