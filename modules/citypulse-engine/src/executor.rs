//! The search orchestrator: classify, plan, resolve, fan out with caching
//! and in-flight coalescing, dedupe, rank, shape, and — when the list comes
//! up short — walk the progressive fallback ladder. Never returns an error;
//! every failure mode degrades to a valid (possibly empty) outcome.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Datelike, Timelike, Utc, Weekday};
use serde::Serialize;
use tracing::{debug, info, warn};

use citypulse_common::taxonomy::related_terms;
use citypulse_common::{
    CityPulseError, Config, EventsQuery, Feature, FeatureFlags, GeoPoint, IntentKind, PlacesQuery,
    SearchIntent, SearchResult, UserContext, EVENTS_MAX_RESULTS, EVENTS_RADIUS_MAX_MILES,
    PLACES_MAX_RESULTS, PLACES_RADIUS_MAX_METERS,
};
use citypulse_intent::{classify, ClassifiedIntent, ClassifierSource, HybridClassifier};
use citypulse_providers::{EventsProvider, PlacesProvider};

use crate::breaker::CircuitBreaker;
use crate::cache::{
    events_cache_key, places_cache_key, provider_ttl, ranked_cache_key, ranked_ttl, TtlCache,
};
use crate::cost::{CostOptimizer, CostReport};
use crate::dedup::dedupe;
use crate::feedback::{feedback_for, UxFeedback};
use crate::inflight::InflightMap;
use crate::metrics::SearchMetrics;
use crate::plan::build_plan;
use crate::quality::{enhance, QualityGrade, QualityOptions};
use crate::ranker::{rank, RankingContext};
use crate::resolve::{resolve, GeoTable};

/// Estimated per-call provider costs in hundredths of a cent.
const PLACES_CALL_COST: u64 = 170; // $0.017
const EVENTS_CALL_COST: u64 = 50; // $0.005

/// Fallback radius growth caps: strategies 2–3 never push events past this.
const FALLBACK_EVENTS_RADIUS_CAP: u32 = 50;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub min_acceptable_results: usize,
    pub good_result_count: usize,
    pub min_rating: f32,
    /// Daily caps in hundredths of a cent. 0 = unlimited.
    pub places_daily_budget: u64,
    pub events_daily_budget: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_acceptable_results: 5,
            good_result_count: 15,
            min_rating: 3.5,
            places_daily_budget: 100_000,
            events_daily_budget: 100_000,
        }
    }
}

impl From<&Config> for EngineConfig {
    fn from(config: &Config) -> Self {
        Self {
            min_acceptable_results: config.min_acceptable_results,
            good_result_count: config.good_result_count,
            min_rating: config.min_rating,
            places_daily_budget: config.places_daily_budget,
            events_daily_budget: config.events_daily_budget,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub query: String,
    pub context: UserContext,
    /// Caller radius cap in miles, 1–100.
    pub radius_miles: Option<f64>,
    /// Page size, 1–100, default 20.
    pub limit: Option<usize>,
    pub offset: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchMeta {
    pub intent_kind: IntentKind,
    pub used_providers: Vec<&'static str>,
    pub used_model: bool,
    pub cache_hit: bool,
}

/// One recorded fallback attempt.
#[derive(Debug, Clone, Serialize)]
pub struct FallbackAttempt {
    pub strategy: &'static str,
    pub keyword: Option<String>,
    pub radius: String,
    pub count: usize,
    pub success: bool,
}

#[derive(Debug, Clone)]
pub struct SearchOutcome {
    /// The requested page of the ranked list.
    pub results: Vec<SearchResult>,
    pub total: usize,
    pub offset: usize,
    pub limit: usize,
    pub meta: SearchMeta,
    pub quality: Option<QualityGrade>,
    pub fallback_trace: Vec<FallbackAttempt>,
    pub feedback: UxFeedback,
    pub notes: Vec<String>,
}

type CachedResults = Arc<Vec<SearchResult>>;

pub struct SearchEngine {
    places: Arc<dyn PlacesProvider>,
    events: Arc<dyn EventsProvider>,
    geo: GeoTable,
    classifier: HybridClassifier,
    flags: Arc<FeatureFlags>,
    provider_cache: Arc<TtlCache<CachedResults>>,
    ranked_cache: Arc<TtlCache<CachedResults>>,
    inflight: Arc<InflightMap<CachedResults>>,
    places_breaker: Arc<CircuitBreaker>,
    events_breaker: Arc<CircuitBreaker>,
    places_cost: Arc<CostOptimizer>,
    events_cost: Arc<CostOptimizer>,
    metrics: Arc<SearchMetrics>,
    config: EngineConfig,
}

impl SearchEngine {
    pub fn new(
        places: Arc<dyn PlacesProvider>,
        events: Arc<dyn EventsProvider>,
        geo: GeoTable,
        classifier: HybridClassifier,
        flags: Arc<FeatureFlags>,
        config: EngineConfig,
    ) -> Self {
        Self {
            places,
            events,
            geo,
            classifier,
            flags,
            provider_cache: Arc::new(TtlCache::new()),
            ranked_cache: Arc::new(TtlCache::new()),
            inflight: Arc::new(InflightMap::new()),
            places_breaker: Arc::new(CircuitBreaker::new("places")),
            events_breaker: Arc::new(CircuitBreaker::new("events")),
            places_cost: Arc::new(CostOptimizer::new(
                "places",
                config.places_daily_budget,
                PLACES_CALL_COST,
            )),
            events_cost: Arc::new(CostOptimizer::new(
                "events",
                config.events_daily_budget,
                EVENTS_CALL_COST,
            )),
            metrics: Arc::new(SearchMetrics::new()),
            config,
        }
    }

    pub fn metrics(&self) -> Arc<SearchMetrics> {
        self.metrics.clone()
    }

    pub fn flags(&self) -> Arc<FeatureFlags> {
        self.flags.clone()
    }

    pub fn breakers(&self) -> [&CircuitBreaker; 2] {
        [&self.places_breaker, &self.events_breaker]
    }

    pub fn cost_reports(&self, now: DateTime<Utc>) -> Vec<CostReport> {
        vec![self.places_cost.report(now), self.events_cost.report(now)]
    }

    pub fn model_cost_report(&self, now: DateTime<Utc>) -> citypulse_intent::ModelCostReport {
        self.classifier.cost_report(now)
    }

    pub fn cache_entries(&self) -> usize {
        self.provider_cache.len() + self.ranked_cache.len()
    }

    /// Run one search. Infallible by contract.
    pub async fn search(&self, request: SearchRequest) -> SearchOutcome {
        let started = Instant::now();
        let ctx = sanitize_context(request.context);
        let limit = request.limit.unwrap_or(20).clamp(1, 100);
        let offset = request.offset;
        let radius_cap = request
            .radius_miles
            .filter(|r| r.is_finite())
            .map(|r| r.clamp(1.0, 100.0));

        // A stated distance constraint ("within 2 blocks", "walking
        // distance") tightens the caller's radius cap.
        let radius_cap = if self.flags.is_enabled(Feature::EntityExtraction) {
            let entities = citypulse_intent::extract_entities(&request.query);
            match (radius_cap, entities.distance_miles()) {
                (Some(requested), Some(stated)) => Some(requested.min(stated)),
                (requested, stated) => requested.or(stated),
            }
        } else {
            radius_cap
        };

        let classified = self.classify(&request.query, ctx.now).await;
        if classified.used_model && self.flags.is_enabled(Feature::Metrics) {
            self.metrics.record_model_call();
        }
        let intent = classified.intent.clone();
        debug!(
            kind = %intent.kind,
            confidence = intent.confidence,
            source = classified.source.as_str(),
            "classified query"
        );

        let plan = build_plan(&intent);
        let resolved = resolve(&plan, &intent, &ctx, &self.geo, radius_cap);
        if resolved.is_unresolved() {
            let err = CityPulseError::Resolution(resolved.notes.join("; "));
            info!(error = %err, "returning empty results");
            let outcome = self.empty_outcome(&classified, offset, limit, resolved.notes);
            self.record_request(started.elapsed().as_millis() as u64, false, true);
            return outcome;
        }

        let used_providers = providers_of(&resolved.places, &resolved.events);

        // Ranked-list cache short-circuits all provider work.
        let provider_keys: Vec<String> = resolved
            .places
            .iter()
            .map(places_cache_key)
            .chain(resolved.events.iter().map(events_cache_key))
            .collect();
        let key_refs: Vec<&str> = provider_keys.iter().map(String::as_str).collect();
        let ranked_key = ranked_cache_key(&key_refs, &intent);
        if let Some(cached) = self.ranked_cache.get(&ranked_key) {
            debug!(key = %ranked_key, "ranked cache hit");
            let total = cached.len();
            let page = paginate(&cached, offset, limit);
            let feedback = self.feedback(total, &cached);
            self.record_request(started.elapsed().as_millis() as u64, true, total == 0);
            return SearchOutcome {
                results: page,
                total,
                offset,
                limit,
                meta: SearchMeta {
                    intent_kind: intent.kind,
                    used_providers,
                    used_model: classified.used_model,
                    cache_hit: true,
                },
                quality: None,
                fallback_trace: Vec::new(),
                feedback,
                notes: resolved.notes,
            };
        }

        // Concurrent fan-out; arrival order never affects the final ranking.
        let (places_fetch, events_fetch) = tokio::join!(
            async {
                match &resolved.places {
                    Some(query) => Some(self.fetch_places(query, &intent, ctx.now).await),
                    None => None,
                }
            },
            async {
                match &resolved.events {
                    Some(query) => Some(self.fetch_events(query, &intent, ctx.now).await),
                    None => None,
                }
            }
        );

        let mut any_provider_cache_hit = true;
        let mut candidates: Vec<SearchResult> = Vec::new();
        for fetch in [places_fetch, events_fetch].into_iter().flatten() {
            let (results, hit) = fetch;
            any_provider_cache_hit &= hit;
            candidates.extend(results.iter().cloned());
        }

        annotate_distances(&mut candidates, resolved.center);

        let ranking_ctx = self.ranking_context(&intent, &ctx, resolved.center);
        let quality_options = self.quality_options(&intent);

        let mut pool = self.shape(candidates, &ranking_ctx);

        let mut fallback_trace = vec![FallbackAttempt {
            strategy: "exact",
            keyword: resolved.places.as_ref().and_then(|p| p.keyword.clone()).or_else(|| {
                resolved.events.as_ref().and_then(|e| e.keyword.clone())
            }),
            radius: radius_label(&resolved.places, &resolved.events),
            count: pool.len(),
            success: pool.len() >= self.config.min_acceptable_results,
        }];

        if pool.len() < self.config.min_acceptable_results
            && self.flags.is_enabled(Feature::SmartFallbacks)
        {
            pool = self
                .run_fallbacks(
                    &request.query,
                    &resolved.places,
                    &resolved.events,
                    pool,
                    &intent,
                    &ctx,
                    resolved.center,
                    &ranking_ctx,
                    &mut fallback_trace,
                )
                .await;
        }

        let enhanced = enhance(pool, &quality_options);
        let final_list = enhanced.results;
        let total = final_list.len();

        let feedback = self.feedback(total, &final_list);
        let page = paginate(&final_list, offset, limit);

        self.ranked_cache.insert(
            ranked_key,
            Arc::new(final_list),
            ranked_ttl(&intent.location),
        );

        self.record_request(
            started.elapsed().as_millis() as u64,
            any_provider_cache_hit && !provider_keys.is_empty(),
            total == 0,
        );

        SearchOutcome {
            results: page,
            total,
            offset,
            limit,
            meta: SearchMeta {
                intent_kind: intent.kind,
                used_providers,
                used_model: classified.used_model,
                cache_hit: false,
            },
            quality: Some(enhanced.grade),
            fallback_trace,
            feedback,
            notes: resolved.notes,
        }
    }

    fn record_request(&self, latency_ms: u64, cache_hit: bool, empty: bool) {
        if self.flags.is_enabled(Feature::Metrics) {
            self.metrics.record_request(latency_ms, cache_hit, empty);
        }
    }

    async fn classify(&self, query: &str, now: DateTime<Utc>) -> ClassifiedIntent {
        if self.flags.is_enabled(Feature::SemanticExpansion) {
            self.classifier.classify(query, now).await
        } else {
            ClassifiedIntent {
                intent: classify(query),
                source: ClassifierSource::RuleBased,
                used_model: false,
            }
        }
    }

    /// Dedupe, rank, then drop the per-factor breakdowns: the fallback
    /// ladder only needs the ordered list.
    fn shape(
        &self,
        candidates: Vec<SearchResult>,
        ranking_ctx: &RankingContext,
    ) -> Vec<SearchResult> {
        let deduped = if self.flags.is_enabled(Feature::Deduplication) {
            dedupe(candidates)
        } else {
            candidates
        };
        rank(deduped, ranking_ctx, &self.flags)
            .into_iter()
            .map(|r| r.result)
            .collect()
    }

    fn ranking_context(
        &self,
        intent: &SearchIntent,
        ctx: &UserContext,
        center: GeoPoint,
    ) -> RankingContext {
        let tz: chrono_tz::Tz = ctx.timezone.parse().unwrap_or(chrono_tz::UTC);
        let local = ctx.now.with_timezone(&tz);
        RankingContext {
            intent: intent.clone(),
            user_location: ctx.location.or(Some(center)),
            current_hour: local.hour(),
            is_weekend: matches!(local.weekday(), Weekday::Sat | Weekday::Sun),
            now: ctx.now,
        }
    }

    fn quality_options(&self, intent: &SearchIntent) -> QualityOptions {
        QualityOptions {
            min_rating: self.config.min_rating,
            prefer_open_now: intent.sub.urgency
                == Some(citypulse_common::UrgencyLevel::Immediate),
            min_results: self.config.min_acceptable_results,
            good_results: self.config.good_result_count,
        }
    }

    fn feedback(&self, total: usize, results: &[SearchResult]) -> UxFeedback {
        if self.flags.is_enabled(Feature::UxFeedback) {
            feedback_for(total, results)
        } else {
            UxFeedback::default()
        }
    }

    fn empty_outcome(
        &self,
        classified: &ClassifiedIntent,
        offset: usize,
        limit: usize,
        notes: Vec<String>,
    ) -> SearchOutcome {
        SearchOutcome {
            results: Vec::new(),
            total: 0,
            offset,
            limit,
            meta: SearchMeta {
                intent_kind: classified.intent.kind,
                used_providers: Vec::new(),
                used_model: classified.used_model,
                cache_hit: false,
            },
            quality: None,
            fallback_trace: Vec::new(),
            feedback: self.feedback(0, &[]),
            notes,
        }
    }

    async fn fetch_places(
        &self,
        query: &PlacesQuery,
        intent: &SearchIntent,
        now: DateTime<Utc>,
    ) -> (CachedResults, bool) {
        let key = places_cache_key(query);
        if let Some(hit) = self.provider_cache.get(&key) {
            return (hit, true);
        }
        let ttl = provider_ttl(&intent.location);
        let provider = self.places.clone();
        let breaker = self.places_breaker.clone();
        let cost = self.places_cost.clone();
        let cache = self.provider_cache.clone();
        let metrics = self.metrics.clone();
        let flags = self.flags.clone();
        let owned_query = query.clone();
        let owned_key = key.clone();
        let (future, leader) = self.inflight.join_or_create(&key, move || async move {
            if flags.is_enabled(Feature::CircuitBreaker) && !breaker.allow_call() {
                let err = CityPulseError::CircuitOpen("places".to_string());
                debug!(key = %owned_key, error = %err, "fast-fail");
                return Arc::new(Vec::new());
            }
            if flags.is_enabled(Feature::CostOptimization) && !cost.try_spend(now) {
                let err = CityPulseError::BudgetExceeded("places".to_string());
                debug!(error = %err, "skipping call");
                return Arc::new(Vec::new());
            }
            if flags.is_enabled(Feature::Metrics) {
                metrics.record_provider_call();
            }
            match provider.search_places(&owned_query).await {
                Ok(results) => {
                    breaker.record_success();
                    let value = Arc::new(results);
                    cache.insert(owned_key, value.clone(), ttl);
                    value
                }
                Err(e) => {
                    let err = CityPulseError::ProviderTransport {
                        provider: "places".to_string(),
                        message: e.to_string(),
                    };
                    warn!(error = %err, "degrading to empty");
                    breaker.record_failure();
                    if flags.is_enabled(Feature::Metrics) {
                        metrics.record_provider_failure();
                    }
                    Arc::new(Vec::new())
                }
            }
        });
        let value = future.await;
        if leader {
            self.inflight.finish(&key);
        }
        // A coalesced waiter is a cache hit for observability purposes.
        (value, !leader)
    }

    async fn fetch_events(
        &self,
        query: &EventsQuery,
        intent: &SearchIntent,
        now: DateTime<Utc>,
    ) -> (CachedResults, bool) {
        let key = events_cache_key(query);
        if let Some(hit) = self.provider_cache.get(&key) {
            return (hit, true);
        }
        let ttl = provider_ttl(&intent.location);
        let provider = self.events.clone();
        let breaker = self.events_breaker.clone();
        let cost = self.events_cost.clone();
        let cache = self.provider_cache.clone();
        let metrics = self.metrics.clone();
        let flags = self.flags.clone();
        let owned_query = query.clone();
        let owned_key = key.clone();
        let (future, leader) = self.inflight.join_or_create(&key, move || async move {
            if flags.is_enabled(Feature::CircuitBreaker) && !breaker.allow_call() {
                let err = CityPulseError::CircuitOpen("events".to_string());
                debug!(key = %owned_key, error = %err, "fast-fail");
                return Arc::new(Vec::new());
            }
            if flags.is_enabled(Feature::CostOptimization) && !cost.try_spend(now) {
                let err = CityPulseError::BudgetExceeded("events".to_string());
                debug!(error = %err, "skipping call");
                return Arc::new(Vec::new());
            }
            if flags.is_enabled(Feature::Metrics) {
                metrics.record_provider_call();
            }
            match provider.search_events(&owned_query).await {
                Ok(results) => {
                    breaker.record_success();
                    let value = Arc::new(results);
                    cache.insert(owned_key, value.clone(), ttl);
                    value
                }
                Err(e) => {
                    let err = CityPulseError::ProviderTransport {
                        provider: "events".to_string(),
                        message: e.to_string(),
                    };
                    warn!(error = %err, "degrading to empty");
                    breaker.record_failure();
                    if flags.is_enabled(Feature::Metrics) {
                        metrics.record_provider_failure();
                    }
                    Arc::new(Vec::new())
                }
            }
        });
        let value = future.await;
        if leader {
            self.inflight.finish(&key);
        }
        (value, !leader)
    }

    /// Progressive never-empty ladder. Each rung re-fetches with widened
    /// parameters, merges into the pool, and stops once the floor is met.
    #[allow(clippy::too_many_arguments)]
    async fn run_fallbacks(
        &self,
        raw_query: &str,
        base_places: &Option<PlacesQuery>,
        base_events: &Option<EventsQuery>,
        mut pool: Vec<SearchResult>,
        intent: &SearchIntent,
        ctx: &UserContext,
        center: GeoPoint,
        ranking_ctx: &RankingContext,
        trace: &mut Vec<FallbackAttempt>,
    ) -> Vec<SearchResult> {
        let floor = self.config.min_acceptable_results;

        // 2–3: double, then quadruple the radius.
        for (strategy, factor) in [("radius_x2", 2u32), ("radius_x4", 4u32)] {
            if pool.len() >= floor {
                return pool;
            }
            let places = base_places.as_ref().map(|q| scale_places(q, factor));
            let events = base_events.as_ref().map(|q| scale_events(q, factor));
            pool = self
                .attempt(strategy, &places, &events, pool, intent, ctx, center, ranking_ctx, trace)
                .await;
        }

        // 4: broadened query — modifiers and category tail dropped.
        if pool.len() < floor {
            let places = base_places.as_ref().map(|q| PlacesQuery {
                keyword: None,
                ..q.clone()
            });
            let events = base_events.as_ref().map(|q| EventsQuery {
                keyword: None,
                ..q.clone()
            });
            pool = self
                .attempt("broadened", &places, &events, pool, intent, ctx, center, ranking_ctx, trace)
                .await;
        }

        // 5: related-category expansion of the lead keyword.
        if pool.len() < floor {
            if let Some(lead) = intent.keywords.first() {
                if let Some(related) = related_terms(lead) {
                    for term in related.iter().take(3) {
                        if pool.len() >= floor {
                            break;
                        }
                        let places = base_places.as_ref().map(|q| PlacesQuery {
                            keyword: Some((*term).to_string()),
                            ..q.clone()
                        });
                        let events = base_events.as_ref().map(|q| EventsQuery {
                            keyword: Some((*term).to_string()),
                            ..q.clone()
                        });
                        pool = self
                            .attempt("related_category", &places, &events, pool, intent, ctx, center, ranking_ctx, trace)
                            .await;
                    }
                }
            }
        }

        // 6: model-assisted rephrase, when the model is reachable.
        if pool.len() < floor
            && self.flags.is_enabled(Feature::SemanticExpansion)
            && self.classifier.model_available()
        {
            let reread = self.classifier.classify(raw_query, ctx.now).await;
            if let Some(keyword) = reread
                .intent
                .keywords
                .iter()
                .find(|k| Some(*k) != intent.keywords.first())
            {
                let places = base_places.as_ref().map(|q| PlacesQuery {
                    keyword: Some(keyword.clone()),
                    ..q.clone()
                });
                let events = base_events.as_ref().map(|q| EventsQuery {
                    keyword: Some(keyword.clone()),
                    ..q.clone()
                });
                pool = self
                    .attempt("model_rephrase", &places, &events, pool, intent, ctx, center, ranking_ctx, trace)
                    .await;
            }
        }

        // 7: browse everything at the maximum radius. Guaranteed to return
        // something wherever the providers cover.
        if pool.len() < floor {
            let places = Some(PlacesQuery {
                center,
                radius_meters: PLACES_RADIUS_MAX_METERS,
                max_results: PLACES_MAX_RESULTS,
                types: Vec::new(),
                keyword: None,
            });
            let events = Some(EventsQuery {
                center,
                radius_miles: EVENTS_RADIUS_MAX_MILES,
                max_results: EVENTS_MAX_RESULTS,
                window: None,
                keyword: None,
                category: None,
            });
            pool = self
                .attempt("browse_max_radius", &places, &events, pool, intent, ctx, center, ranking_ctx, trace)
                .await;
        }

        if pool.len() < floor {
            let err = CityPulseError::FallbackExhausted {
                attempts: trace.len(),
            };
            warn!(found = pool.len(), floor, error = %err, "returning best-found list");
        }
        pool
    }

    #[allow(clippy::too_many_arguments)]
    async fn attempt(
        &self,
        strategy: &'static str,
        places: &Option<PlacesQuery>,
        events: &Option<EventsQuery>,
        pool: Vec<SearchResult>,
        intent: &SearchIntent,
        ctx: &UserContext,
        center: GeoPoint,
        ranking_ctx: &RankingContext,
        trace: &mut Vec<FallbackAttempt>,
    ) -> Vec<SearchResult> {
        let (places_fetch, events_fetch) = tokio::join!(
            async {
                match places {
                    Some(query) => Some(self.fetch_places(query, intent, ctx.now).await),
                    None => None,
                }
            },
            async {
                match events {
                    Some(query) => Some(self.fetch_events(query, intent, ctx.now).await),
                    None => None,
                }
            }
        );

        let mut merged = pool;
        for fetch in [places_fetch, events_fetch].into_iter().flatten() {
            let (results, _) = fetch;
            for result in results.iter() {
                if !merged.iter().any(|r| r.core.id == result.core.id) {
                    merged.push(result.clone());
                }
            }
        }
        annotate_distances(&mut merged, center);
        let merged = self.shape(merged, ranking_ctx);

        trace.push(FallbackAttempt {
            strategy,
            keyword: places
                .as_ref()
                .and_then(|p| p.keyword.clone())
                .or_else(|| events.as_ref().and_then(|e| e.keyword.clone())),
            radius: radius_label(places, events),
            count: merged.len(),
            success: merged.len() >= self.config.min_acceptable_results,
        });
        info!(
            strategy,
            count = merged.len(),
            "fallback attempt"
        );
        merged
    }
}

fn scale_places(query: &PlacesQuery, factor: u32) -> PlacesQuery {
    PlacesQuery {
        radius_meters: (query.radius_meters * factor).min(PLACES_RADIUS_MAX_METERS),
        ..query.clone()
    }
}

fn scale_events(query: &EventsQuery, factor: u32) -> EventsQuery {
    EventsQuery {
        radius_miles: (query.radius_miles * factor).min(FALLBACK_EVENTS_RADIUS_CAP),
        ..query.clone()
    }
}

fn providers_of(
    places: &Option<PlacesQuery>,
    events: &Option<EventsQuery>,
) -> Vec<&'static str> {
    let mut used = Vec::new();
    if places.is_some() {
        used.push("places");
    }
    if events.is_some() {
        used.push("events");
    }
    used
}

fn radius_label(places: &Option<PlacesQuery>, events: &Option<EventsQuery>) -> String {
    match (places, events) {
        (Some(p), Some(e)) => format!("{}m/{}mi", p.radius_meters, e.radius_miles),
        (Some(p), None) => format!("{}m", p.radius_meters),
        (None, Some(e)) => format!("{}mi", e.radius_miles),
        (None, None) => "-".to_string(),
    }
}

fn annotate_distances(results: &mut [SearchResult], center: GeoPoint) {
    for result in results {
        result.core.distance_meters = Some(citypulse_common::haversine_meters(
            center,
            result.core.location,
        ));
    }
}

fn paginate(results: &[SearchResult], offset: usize, limit: usize) -> Vec<SearchResult> {
    results.iter().skip(offset).take(limit).cloned().collect()
}

/// Invalid coordinates degrade to "no location" instead of erroring.
fn sanitize_context(mut ctx: UserContext) -> UserContext {
    if let Some(location) = ctx.location {
        if !location.is_valid() || location.is_sentinel() {
            let err = CityPulseError::InvalidInput(format!(
                "unusable coordinates ({}, {})",
                location.lat, location.lng
            ));
            debug!(error = %err, "dropping caller location");
            ctx.location = None;
        }
    }
    ctx
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_drops_bad_coordinates() {
        let ctx = UserContext {
            location: Some(GeoPoint::new(f64::NAN, 12.0)),
            timezone: "America/Chicago".into(),
            now: "2025-01-15T12:00:00Z".parse().unwrap(),
        };
        assert!(sanitize_context(ctx).location.is_none());

        let sentinel = UserContext {
            location: Some(GeoPoint::sentinel()),
            timezone: "America/Chicago".into(),
            now: "2025-01-15T12:00:00Z".parse().unwrap(),
        };
        assert!(sanitize_context(sentinel).location.is_none());
    }

    #[test]
    fn fallback_radius_scaling_respects_caps() {
        let places = PlacesQuery {
            center: GeoPoint::new(37.0, -122.0),
            radius_meters: 30_000,
            max_results: 20,
            types: Vec::new(),
            keyword: None,
        };
        assert_eq!(scale_places(&places, 4).radius_meters, PLACES_RADIUS_MAX_METERS);

        let events = EventsQuery {
            center: GeoPoint::new(37.0, -122.0),
            radius_miles: 20,
            max_results: 20,
            window: None,
            keyword: None,
            category: None,
        };
        assert_eq!(scale_events(&events, 4).radius_miles, FALLBACK_EVENTS_RADIUS_CAP);
    }

    #[test]
    fn pagination_windows_the_list() {
        let results: Vec<SearchResult> = Vec::new();
        assert!(paginate(&results, 0, 20).is_empty());
    }
}
