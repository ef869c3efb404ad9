//! Confidence-gated model fallback. The rule classifier runs first; only a
//! low-confidence reading consults the model, and only inside the daily
//! cost/rate envelope. With no API key configured the pipeline is fully
//! deterministic.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use ai_client::{Claude, ExtractOptions};
use citypulse_common::{
    BudgetLevel, Category, CityPulseError, GroupSize, IntentKind, Mood, SearchIntent,
};

use crate::classifier;
use crate::normalizer;

/// Rule readings at or above this confidence never consult the model.
pub const RULE_CONFIDENCE_GATE: f32 = 0.65;

const MODEL_TEMPERATURE: f32 = 0.3;
const MODEL_MAX_TOKENS: u32 = 150;
const MODEL_TIMEOUT: Duration = Duration::from_secs(5);

/// Daily spend cap in hundredths of a cent ($5).
const DAILY_SPEND_CAP: u64 = 50_000;
const DAILY_CALL_CAP: u32 = 500;
/// Flat per-call cost estimate: one cent.
const CALL_COST: u64 = 100;

const CACHE_TTL_HOURS: i64 = 24;
const CACHE_CAPACITY: usize = 1000;

/// Which classifier produced the final intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassifierSource {
    RuleBased,
    Model,
    /// The model was wanted but unavailable or failed; rules stand.
    RuleBasedFallback,
}

impl ClassifierSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RuleBased => "rule_based",
            Self::Model => "model",
            Self::RuleBasedFallback => "rule_based_fallback",
        }
    }
}

/// The hybrid classifier's answer.
#[derive(Debug, Clone)]
pub struct ClassifiedIntent {
    pub intent: SearchIntent,
    pub source: ClassifierSource,
    /// True when the intent came from the model (fresh call or cached).
    pub used_model: bool,
}

/// Strict schema the model must fill.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
struct ModelIntentWire {
    intent_type: IntentKind,
    categories: Vec<Category>,
    mood: Option<Mood>,
    budget: Option<BudgetLevel>,
    group_size: Option<GroupSize>,
    keywords: Vec<String>,
    confidence: f32,
    #[allow(dead_code)]
    reasoning: String,
}

const SYSTEM_PROMPT: &str = "You classify short local-discovery queries. \
Decide whether the user wants a place, an event, or both; pick categories \
only from the closed set; extract concrete search keywords; and report \
mood, budget, and group size when the query implies them. Confidence \
reflects how unambiguous the query is.";

// --- Daily usage envelope ---

#[derive(Debug, Clone, Copy)]
struct UsageDay {
    day: NaiveDate,
    calls: u32,
    spent: u64,
}

/// Tracks model spend against the daily caps. Counters reset when the UTC
/// calendar day rolls over, detected on read.
pub struct ModelUsageTracker {
    inner: Mutex<UsageDay>,
    spend_cap: u64,
    call_cap: u32,
}

impl ModelUsageTracker {
    pub fn new() -> Self {
        Self::with_caps(DAILY_SPEND_CAP, DAILY_CALL_CAP)
    }

    pub fn with_caps(spend_cap: u64, call_cap: u32) -> Self {
        Self {
            inner: Mutex::new(UsageDay {
                day: NaiveDate::MIN,
                calls: 0,
                spent: 0,
            }),
            spend_cap,
            call_cap,
        }
    }

    /// Reserve budget for one call. Returns false when either cap would be
    /// exceeded.
    pub fn try_acquire(&self, now: DateTime<Utc>) -> bool {
        let mut usage = self.inner.lock().expect("usage lock");
        let today = now.date_naive();
        if usage.day != today {
            *usage = UsageDay {
                day: today,
                calls: 0,
                spent: 0,
            };
        }
        if usage.calls + 1 > self.call_cap || usage.spent + CALL_COST > self.spend_cap {
            return false;
        }
        usage.calls += 1;
        usage.spent += CALL_COST;
        true
    }

    pub fn report(&self, now: DateTime<Utc>) -> ModelCostReport {
        let mut usage = self.inner.lock().expect("usage lock");
        let today = now.date_naive();
        if usage.day != today {
            *usage = UsageDay {
                day: today,
                calls: 0,
                spent: 0,
            };
        }
        ModelCostReport {
            date: usage.day,
            calls: usage.calls,
            calls_remaining: self.call_cap.saturating_sub(usage.calls),
            spent_cents: usage.spent as f64 / 100.0,
            cap_cents: self.spend_cap as f64 / 100.0,
        }
    }
}

impl Default for ModelUsageTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot for the diagnostics endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct ModelCostReport {
    pub date: NaiveDate,
    pub calls: u32,
    pub calls_remaining: u32,
    pub spent_cents: f64,
    pub cap_cents: f64,
}

// --- 24h intent cache ---

#[derive(Debug, Clone)]
struct CachedIntent {
    intent: SearchIntent,
    expires_at: DateTime<Utc>,
}

/// Bounded model-intent cache. Capacity overflow evicts the entry closest
/// to expiry; a key's value is never mutated in place — expiry replaces it.
struct IntentCache {
    entries: Mutex<HashMap<String, CachedIntent>>,
    capacity: usize,
}

impl IntentCache {
    fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            capacity,
        }
    }

    fn get(&self, key: &str, now: DateTime<Utc>) -> Option<SearchIntent> {
        let entries = self.entries.lock().expect("cache lock");
        entries
            .get(key)
            .filter(|cached| cached.expires_at > now)
            .map(|cached| cached.intent.clone())
    }

    fn insert(&self, key: String, intent: SearchIntent, now: DateTime<Utc>) {
        let mut entries = self.entries.lock().expect("cache lock");
        entries.retain(|_, cached| cached.expires_at > now);
        if entries.len() >= self.capacity {
            if let Some(oldest) = entries
                .iter()
                .min_by_key(|(_, cached)| cached.expires_at)
                .map(|(k, _)| k.clone())
            {
                entries.remove(&oldest);
            }
        }
        entries.insert(
            key,
            CachedIntent {
                intent,
                expires_at: now + chrono::Duration::hours(CACHE_TTL_HOURS),
            },
        );
    }

    fn len(&self) -> usize {
        self.entries.lock().expect("cache lock").len()
    }
}

// --- Hybrid classifier ---

pub struct HybridClassifier {
    model: Option<Claude>,
    usage: ModelUsageTracker,
    cache: IntentCache,
}

impl HybridClassifier {
    /// `model` is None when no API key is configured; classification is then
    /// purely rule-based.
    pub fn new(model: Option<Claude>) -> Self {
        Self {
            model,
            usage: ModelUsageTracker::new(),
            cache: IntentCache::new(CACHE_CAPACITY),
        }
    }

    pub fn model_available(&self) -> bool {
        self.model.is_some()
    }

    pub fn cost_report(&self, now: DateTime<Utc>) -> ModelCostReport {
        self.usage.report(now)
    }

    /// Classify a raw query, consulting the model only below the confidence
    /// gate and inside the daily envelope. Never fails.
    pub async fn classify(&self, raw: &str, now: DateTime<Utc>) -> ClassifiedIntent {
        let rule_intent = classifier::classify(raw);
        if rule_intent.confidence >= RULE_CONFIDENCE_GATE {
            return ClassifiedIntent {
                intent: rule_intent,
                source: ClassifierSource::RuleBased,
                used_model: false,
            };
        }

        let Some(model) = &self.model else {
            return ClassifiedIntent {
                intent: rule_intent,
                source: ClassifierSource::RuleBasedFallback,
                used_model: false,
            };
        };

        let cache_key = normalizer::normalize(raw).normalized;
        if let Some(cached) = self.cache.get(&cache_key, now) {
            debug!(query = %cache_key, "model intent cache hit");
            return ClassifiedIntent {
                intent: cached,
                source: ClassifierSource::Model,
                used_model: true,
            };
        }

        if !self.usage.try_acquire(now) {
            warn!("model classifier daily envelope exhausted, using rules");
            return ClassifiedIntent {
                intent: rule_intent,
                source: ClassifierSource::RuleBasedFallback,
                used_model: false,
            };
        }

        let options = ExtractOptions {
            temperature: MODEL_TEMPERATURE,
            max_tokens: MODEL_MAX_TOKENS,
            timeout: MODEL_TIMEOUT,
        };
        match model
            .extract::<ModelIntentWire>(SYSTEM_PROMPT, raw, options)
            .await
        {
            Ok(wire) => {
                let merged = merge(rule_intent, wire);
                self.cache.insert(cache_key, merged.clone(), now);
                ClassifiedIntent {
                    intent: merged,
                    source: ClassifierSource::Model,
                    used_model: true,
                }
            }
            Err(e) => {
                let err = CityPulseError::ModelCall(e.to_string());
                warn!(error = %err, "using rule-based intent");
                ClassifiedIntent {
                    intent: rule_intent,
                    source: ClassifierSource::RuleBasedFallback,
                    used_model: false,
                }
            }
        }
    }
}

/// Merge rule: the rules keep time and location (they are better at spans
/// the model hallucinates); the model supplies kind, categories, keywords,
/// and sub-intent refinements.
fn merge(rule: SearchIntent, wire: ModelIntentWire) -> SearchIntent {
    let mut keywords: Vec<String> = wire
        .keywords
        .into_iter()
        .map(|k| k.trim().to_lowercase())
        .filter(|k| !k.is_empty())
        .collect();
    keywords.dedup();
    keywords.truncate(10);
    if keywords.is_empty() {
        keywords = rule.keywords;
    }

    let mut categories = wire.categories;
    categories.dedup();
    if categories.is_empty() {
        categories = rule.categories;
    }

    let mut sub = rule.sub;
    sub.mood = wire.mood.or(sub.mood);
    sub.budget = wire.budget.or(sub.budget);
    sub.group = wire.group_size.or(sub.group);

    SearchIntent {
        kind: wire.intent_type,
        keywords,
        vibes: rule.vibes,
        categories,
        time: rule.time,
        location: rule.location,
        confidence: wire.confidence.clamp(0.0, 1.0),
        sub,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use citypulse_common::{LocationHint, TimeContext, TimeLabel};

    fn now() -> DateTime<Utc> {
        "2025-01-15T19:00:00Z".parse().expect("test instant")
    }

    #[tokio::test]
    async fn confident_rule_readings_never_consult_the_model() {
        // Unroutable base URL: any attempted call would error loudly.
        let model = Claude::new("test-key", "claude-3-5-haiku-latest")
            .with_base_url("http://127.0.0.1:1");
        let hybrid = HybridClassifier::new(Some(model));

        let outcome = hybrid.classify("coffee near me", now()).await;
        assert_eq!(outcome.source, ClassifierSource::RuleBased);
        assert!(!outcome.used_model);
        assert!(outcome.intent.confidence >= RULE_CONFIDENCE_GATE);
    }

    #[tokio::test]
    async fn no_model_means_rule_fallback() {
        let hybrid = HybridClassifier::new(None);
        let outcome = hybrid.classify("I want to meet women", now()).await;
        assert_eq!(outcome.source, ClassifierSource::RuleBasedFallback);
        assert!(!outcome.used_model);
        assert_eq!(outcome.intent.kind, IntentKind::Both);
    }

    #[tokio::test]
    async fn failed_model_calls_fall_back_to_rules() {
        let model = Claude::new("test-key", "claude-3-5-haiku-latest")
            .with_base_url("http://127.0.0.1:1");
        let hybrid = HybridClassifier::new(Some(model));

        let outcome = hybrid.classify("something cool idk", now()).await;
        assert_eq!(outcome.source, ClassifierSource::RuleBasedFallback);
        assert!(!outcome.used_model);
    }

    #[test]
    fn usage_tracker_enforces_the_call_cap() {
        let tracker = ModelUsageTracker::with_caps(u64::MAX / 2, 3);
        let t = now();
        assert!(tracker.try_acquire(t));
        assert!(tracker.try_acquire(t));
        assert!(tracker.try_acquire(t));
        assert!(!tracker.try_acquire(t));

        let report = tracker.report(t);
        assert_eq!(report.calls, 3);
        assert_eq!(report.calls_remaining, 0);
    }

    #[test]
    fn usage_tracker_enforces_the_spend_cap() {
        let tracker = ModelUsageTracker::with_caps(250, 500);
        let t = now();
        assert!(tracker.try_acquire(t)); // 100
        assert!(tracker.try_acquire(t)); // 200
        assert!(!tracker.try_acquire(t)); // would be 300 > 250
    }

    #[test]
    fn usage_resets_at_day_rollover() {
        let tracker = ModelUsageTracker::with_caps(100, 1);
        let day_one = now();
        assert!(tracker.try_acquire(day_one));
        assert!(!tracker.try_acquire(day_one));

        let day_two = day_one + chrono::Duration::days(1);
        assert!(tracker.try_acquire(day_two));
        assert_eq!(tracker.report(day_two).calls, 1);
    }

    #[test]
    fn cache_expires_and_bounds_capacity() {
        let cache = IntentCache::new(2);
        let t = now();

        cache.insert("a".into(), SearchIntent::browse(), t);
        cache.insert("b".into(), SearchIntent::browse(), t + chrono::Duration::hours(1));
        assert!(cache.get("a", t + chrono::Duration::hours(1)).is_some());

        // Third insert evicts the soonest-to-expire entry ("a").
        cache.insert("c".into(), SearchIntent::browse(), t + chrono::Duration::hours(2));
        assert_eq!(cache.len(), 2);
        assert!(cache.get("a", t + chrono::Duration::hours(2)).is_none());
        assert!(cache.get("b", t + chrono::Duration::hours(2)).is_some());

        // Expired entries are invisible.
        assert!(cache.get("b", t + chrono::Duration::hours(30)).is_none());
    }

    #[test]
    fn merge_keeps_rule_time_and_location() {
        let mut rule = SearchIntent::browse();
        rule.time = Some(TimeContext::label(TimeLabel::Tonight));
        rule.location = LocationHint::NearMe;

        let wire = ModelIntentWire {
            intent_type: IntentKind::Both,
            categories: vec![Category::Nightlife, Category::Social],
            mood: None,
            budget: None,
            group_size: Some(GroupSize::LargeGroup),
            keywords: vec!["Bars".into(), "meetups".into()],
            confidence: 0.8,
            reasoning: "social query".into(),
        };

        let merged = merge(rule, wire);
        assert_eq!(merged.time.map(|t| t.label), Some(TimeLabel::Tonight));
        assert_eq!(merged.location, LocationHint::NearMe);
        assert_eq!(merged.categories, vec![Category::Nightlife, Category::Social]);
        assert_eq!(merged.keywords, vec!["bars", "meetups"]);
        assert_eq!(merged.sub.group, Some(GroupSize::LargeGroup));
        assert!((merged.confidence - 0.8).abs() < f32::EPSILON);
    }
}
