//! Adaptive multi-factor ranking. Eight factor scores in [0, 1], blended by
//! weights that shift with intent, urgency, mood, and budget, then a small
//! anti-bias pass so mega-chains don't crowd out well-loved small rooms.

use chrono::{DateTime, Utc};

use citypulse_common::taxonomy::{
    matches_micro_category, CHAIN_TOKENS, CORPORATE_TOKENS, INDIE_TOKENS, NEIGHBORHOODS,
};
use citypulse_common::{
    haversine_meters, Feature, FeatureFlags, GeoPoint, IntentKind, Mood, BudgetLevel,
    SearchIntent, SearchResult, UrgencyLevel,
};

const VIBRANCY_RADIUS_METERS: f64 = 200.0;
const VIBRANCY_SATURATION: f64 = 10.0;
const NEIGHBORHOOD_BONUS: f64 = 0.15;
const GEOHASH_PRECISION: usize = 5;

/// Everything the ranker needs to know about the request.
#[derive(Debug, Clone)]
pub struct RankingContext {
    pub intent: SearchIntent,
    pub user_location: Option<GeoPoint>,
    /// Local hour of day, 0–23.
    pub current_hour: u32,
    pub is_weekend: bool,
    pub now: DateTime<Utc>,
}

impl RankingContext {
    fn urgency(&self) -> Option<UrgencyLevel> {
        self.intent.sub.urgency
    }
}

/// Per-factor breakdown carried alongside each ranked result.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FactorScores {
    pub proximity: f64,
    pub rating: f64,
    pub popularity: f64,
    pub novelty: f64,
    pub temporal: f64,
    pub intent_match: f64,
    pub vibrancy: f64,
    pub independence: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Weights {
    pub proximity: f64,
    pub rating: f64,
    pub popularity: f64,
    pub novelty: f64,
    pub temporal: f64,
    pub intent_match: f64,
    pub vibrancy: f64,
    pub independence: f64,
}

pub const BASE_WEIGHTS: Weights = Weights {
    proximity: 0.30,
    rating: 0.15,
    popularity: 0.10,
    novelty: 0.05,
    temporal: 0.15,
    intent_match: 0.20,
    vibrancy: 0.03,
    independence: 0.02,
};

impl Weights {
    fn sum(&self) -> f64 {
        self.proximity
            + self.rating
            + self.popularity
            + self.novelty
            + self.temporal
            + self.intent_match
            + self.vibrancy
            + self.independence
    }

    fn clamp_floor(&mut self) {
        self.proximity = self.proximity.max(0.0);
        self.rating = self.rating.max(0.0);
        self.popularity = self.popularity.max(0.0);
        self.novelty = self.novelty.max(0.0);
        self.temporal = self.temporal.max(0.0);
        self.intent_match = self.intent_match.max(0.0);
        self.vibrancy = self.vibrancy.max(0.0);
        self.independence = self.independence.max(0.0);
    }

    fn normalize(&mut self) {
        self.clamp_floor();
        let sum = self.sum();
        if sum <= 0.0 {
            *self = BASE_WEIGHTS;
            return;
        }
        self.proximity /= sum;
        self.rating /= sum;
        self.popularity /= sum;
        self.novelty /= sum;
        self.temporal /= sum;
        self.intent_match /= sum;
        self.vibrancy /= sum;
        self.independence /= sum;
    }

    fn blend(&self, f: &FactorScores) -> f64 {
        self.proximity * f.proximity
            + self.rating * f.rating
            + self.popularity * f.popularity
            + self.novelty * f.novelty
            + self.temporal * f.temporal
            + self.intent_match * f.intent_match
            + self.vibrancy * f.vibrancy
            + self.independence * f.independence
    }
}

/// Intent/urgency/mood/budget deltas over the base weights, renormalized to
/// sum to one.
pub fn adaptive_weights(intent: &SearchIntent) -> Weights {
    let mut weights = BASE_WEIGHTS;

    if intent.kind == IntentKind::Event {
        weights.temporal += 0.12;
        weights.proximity -= 0.08;
    }
    if intent.sub.urgency == Some(UrgencyLevel::Immediate) {
        weights.temporal += 0.10;
        weights.rating -= 0.05;
    }
    match intent.sub.mood {
        Some(Mood::Romantic) => {
            weights.rating += 0.08;
            weights.popularity -= 0.05;
        }
        Some(Mood::Adventurous) => {
            weights.novelty += 0.12;
            weights.popularity -= 0.07;
            weights.independence += 0.03;
        }
        _ => {}
    }
    if intent.sub.budget == Some(BudgetLevel::Upscale) {
        weights.rating += 0.08;
    }

    weights.normalize();
    weights
}

/// A scored result with its factor breakdown.
#[derive(Debug, Clone)]
pub struct RankedResult {
    pub result: SearchResult,
    pub factors: FactorScores,
}

/// Score and sort candidates, highest first. Each result's score and reason
/// tag are written back into its core.
pub fn rank(
    candidates: Vec<SearchResult>,
    ctx: &RankingContext,
    flags: &FeatureFlags,
) -> Vec<RankedResult> {
    let weights = if flags.is_enabled(Feature::AdaptiveRanking) {
        adaptive_weights(&ctx.intent)
    } else {
        BASE_WEIGHTS
    };

    let locations: Vec<GeoPoint> = candidates.iter().map(|r| r.core.location).collect();

    let mut ranked: Vec<RankedResult> = candidates
        .into_iter()
        .enumerate()
        .map(|(index, mut result)| {
            let factors = FactorScores {
                proximity: proximity_score(result.core.distance_meters),
                rating: rating_score(&result),
                popularity: popularity_score(&result),
                novelty: novelty_score(&result, flags),
                temporal: temporal_score(&result, ctx),
                intent_match: intent_match_score(&result, &ctx.intent),
                vibrancy: vibrancy_score(index, &locations, &result, flags),
                independence: independence_score(&result, flags),
            };
            let mut score = weights.blend(&factors);
            score = anti_bias(score, &result);
            result.core.score = score.max(0.0);
            result.core.reason = Some(reason_tag(&factors, &weights, &result));
            RankedResult { result, factors }
        })
        .collect();

    ranked.sort_by(|a, b| {
        b.result
            .core
            .score
            .partial_cmp(&a.result.core.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    ranked
}

/// Piecewise decay over the haversine distance from the caller.
fn proximity_score(distance_meters: Option<f64>) -> f64 {
    let Some(d) = distance_meters else { return 0.5 };
    match d {
        d if d <= 500.0 => 1.0,
        d if d <= 1_000.0 => 0.85,
        d if d <= 2_000.0 => 0.65,
        d if d <= 5_000.0 => 0.40,
        d if d <= 10_000.0 => 0.20,
        d if d <= 20_000.0 => 0.10,
        _ => 0.05,
    }
}

fn rating_score(result: &SearchResult) -> f64 {
    match result.rating() {
        Some(rating) => f64::from(rating) / 5.0,
        None => 0.5,
    }
}

/// Sigmoid of the review count, centered at 250. Flattens the advantage of
/// five-digit counts.
fn popularity_score(result: &SearchResult) -> f64 {
    match result.review_count() {
        Some(n) => 1.0 / (1.0 + (-0.008 * (f64::from(n) - 250.0)).exp()),
        None => 0.25,
    }
}

/// Additive hidden-gem signal, clamped to 1.
fn novelty_score(result: &SearchResult, flags: &FeatureFlags) -> f64 {
    let rating = result.rating().unwrap_or(0.0);
    let reviews = result.review_count();
    let mut score: f64 = 0.0;
    if let Some(n) = reviews {
        if rating >= 4.5 && n < 50 {
            score += 0.4;
        }
        if rating >= 4.7 && n < 20 {
            score += 0.3;
        }
        if n < 15 {
            score += 0.2;
        }
    }
    if flags.is_enabled(Feature::MicroCategories) && matches_micro_category(&result.core.title) {
        score += 0.15;
    }
    score.min(1.0)
}

fn temporal_score(result: &SearchResult, ctx: &RankingContext) -> f64 {
    let urgency = ctx.urgency();
    match result.starts_at() {
        None => {
            // Places: open-now dominates only under immediate urgency.
            let open = result.open_now();
            if urgency == Some(UrgencyLevel::Immediate) {
                match open {
                    Some(true) => 1.0,
                    Some(false) => 0.05,
                    None => 0.5,
                }
            } else {
                match open {
                    Some(true) => 0.7,
                    _ => 0.5,
                }
            }
        }
        Some(starts) => {
            let hours_to_start = (starts - ctx.now).num_minutes() as f64 / 60.0;
            if hours_to_start < 0.0 {
                // Already started; recent starts may still be worth walking
                // into.
                return if hours_to_start > -3.0 { 0.8 } else { 0.1 };
            }
            match urgency {
                Some(UrgencyLevel::Immediate) => match hours_to_start {
                    h if h < 3.0 => 1.0,
                    h if h < 6.0 => 0.85,
                    h if h < 24.0 => 0.5,
                    _ => 0.2,
                },
                Some(UrgencyLevel::NearFuture) | None => match hours_to_start {
                    h if h < 48.0 => 1.0,
                    h if h < 168.0 => 0.7,
                    _ => 0.4,
                },
                Some(UrgencyLevel::Planning) => {
                    if hours_to_start < 720.0 {
                        0.9
                    } else {
                        0.6
                    }
                }
            }
        }
    }
}

fn intent_match_score(result: &SearchResult, intent: &SearchIntent) -> f64 {
    let mut score: f64 = 0.0;
    if intent.kind == IntentKind::Both {
        score += 0.25;
    } else if result.kind() == intent.kind {
        score += 0.35;
    }
    if intent.categories.contains(&result.core.category) {
        score += 0.25;
    }
    let title = result.core.title.to_lowercase();
    let mut keyword_bonus: f64 = 0.0;
    for keyword in &intent.keywords {
        if title.contains(keyword.as_str()) {
            keyword_bonus += 0.15;
        }
    }
    score += keyword_bonus.min(0.30);
    if intent.vibes.iter().any(|v| title.contains(v.as_str())) {
        score += 0.10;
    }
    score.min(1.0)
}

/// Density of other candidates within 200m, saturating at 10 neighbors,
/// plus a known-neighborhood bonus.
fn vibrancy_score(
    index: usize,
    locations: &[GeoPoint],
    result: &SearchResult,
    flags: &FeatureFlags,
) -> f64 {
    if !flags.is_enabled(Feature::ClusterVibrancy) {
        return 0.0;
    }
    let here = locations[index];
    let neighbors = locations
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != index)
        .filter(|(_, other)| haversine_meters(here, **other) < VIBRANCY_RADIUS_METERS)
        .count();
    let mut score = (neighbors as f64 / VIBRANCY_SATURATION).min(1.0);

    if flags.is_enabled(Feature::NeighborhoodContext) && in_known_neighborhood(result.core.location)
    {
        score = (score + NEIGHBORHOOD_BONUS).min(1.0);
    }
    score
}

fn in_known_neighborhood(location: GeoPoint) -> bool {
    let Ok(hash) = geohash::encode(
        geohash::Coord {
            x: location.lng,
            y: location.lat,
        },
        GEOHASH_PRECISION,
    ) else {
        return false;
    };
    NEIGHBORHOODS
        .iter()
        .flat_map(|n| n.geohash_prefixes.iter())
        .any(|prefix| hash.starts_with(prefix))
}

/// Neutral 0.5, nudged up for independent markers and small review counts,
/// pushed down hard for known chains.
fn independence_score(result: &SearchResult, flags: &FeatureFlags) -> f64 {
    if !flags.is_enabled(Feature::IndependenceBoost) {
        return 0.5;
    }
    let title = result.core.title.to_lowercase();
    let mut score: f64 = 0.5;
    if INDIE_TOKENS.iter().any(|t| title.contains(t)) {
        score += 0.3;
    }
    if flags.is_enabled(Feature::SmallVenueBoost) {
        if let Some(n) = result.review_count() {
            if n < 200 {
                score += 0.2;
            }
        }
    }
    if CHAIN_TOKENS.iter().any(|t| title.contains(t)) {
        score -= 0.6;
    } else if CORPORATE_TOKENS.iter().any(|t| title.contains(t)) {
        score -= 0.2;
    }
    score.clamp(0.0, 1.0)
}

/// Post-pass: damp review-count giants, lift small highly-rated rooms.
fn anti_bias(score: f64, result: &SearchResult) -> f64 {
    let rating = result.rating().unwrap_or(0.0);
    let reviews = result.review_count();
    let mut score = score;
    if matches!(reviews, Some(n) if n > 2000) {
        score *= 0.95;
    }
    if rating >= 4.6 && matches!(reviews, Some(n) if n < 30) {
        score *= 1.15;
    }
    score
}

/// Short factual tag from the dominant weighted factor.
fn reason_tag(factors: &FactorScores, weights: &Weights, result: &SearchResult) -> String {
    let contributions = [
        (weights.proximity * factors.proximity, "close by"),
        (weights.rating * factors.rating, "highly rated"),
        (weights.popularity * factors.popularity, "crowd favorite"),
        (weights.novelty * factors.novelty, "hidden gem"),
        (
            weights.temporal * factors.temporal,
            if result.kind() == IntentKind::Event {
                "starting soon"
            } else {
                "open now"
            },
        ),
        (weights.intent_match * factors.intent_match, "great match"),
        (weights.vibrancy * factors.vibrancy, "lively block"),
        (
            weights.independence * factors.independence,
            "local independent",
        ),
    ];
    contributions
        .iter()
        .max_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(_, tag)| (*tag).to_string())
        .unwrap_or_else(|| "match".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use citypulse_common::{
        Category, EventDetails, PlaceDetails, ResultCore, ResultDetails,
    };
    use citypulse_intent::classify;

    fn ctx(query: &str) -> RankingContext {
        RankingContext {
            intent: classify(query),
            user_location: Some(GeoPoint::new(37.7749, -122.4194)),
            current_hour: 19,
            is_weekend: false,
            now: "2025-01-15T19:00:00Z".parse().unwrap(),
        }
    }

    fn place(id: &str, title: &str, distance: f64) -> SearchResult {
        SearchResult {
            core: ResultCore {
                id: id.into(),
                title: title.into(),
                category: Category::Food,
                location: GeoPoint::new(37.7749, -122.4194),
                photo: None,
                external_url: None,
                distance_meters: Some(distance),
                score: 0.0,
                reason: None,
            },
            details: ResultDetails::Place(PlaceDetails {
                rating: Some(4.2),
                review_count: Some(300),
                price_level: Some(2),
                open_now: Some(true),
                address: None,
            }),
        }
    }

    #[test]
    fn proximity_follows_the_piecewise_table() {
        assert_eq!(proximity_score(Some(300.0)), 1.0);
        assert_eq!(proximity_score(Some(900.0)), 0.85);
        assert_eq!(proximity_score(Some(1_500.0)), 0.65);
        assert_eq!(proximity_score(Some(4_000.0)), 0.40);
        assert_eq!(proximity_score(Some(8_000.0)), 0.20);
        assert_eq!(proximity_score(Some(15_000.0)), 0.10);
        assert_eq!(proximity_score(Some(90_000.0)), 0.05);
        assert_eq!(proximity_score(None), 0.5);
    }

    #[test]
    fn popularity_sigmoid_midpoint_and_tails() {
        let mut result = place("p", "Mid", 100.0);
        if let ResultDetails::Place(d) = &mut result.details {
            d.review_count = Some(250);
        }
        assert!((popularity_score(&result) - 0.5).abs() < 1e-9);

        if let ResultDetails::Place(d) = &mut result.details {
            d.review_count = Some(10_000);
        }
        assert!(popularity_score(&result) > 0.99);

        if let ResultDetails::Place(d) = &mut result.details {
            d.review_count = None;
        }
        assert_eq!(popularity_score(&result), 0.25);
    }

    #[test]
    fn novelty_rewards_small_well_rated_rooms() {
        let flags = FeatureFlags::all_enabled();
        let mut gem = place("g", "Quiet Listening Bar", 100.0);
        if let ResultDetails::Place(d) = &mut gem.details {
            d.rating = Some(4.8);
            d.review_count = Some(12);
        }
        // 0.4 + 0.3 + 0.2 + 0.15 (micro category), clamped to 1.
        assert_eq!(novelty_score(&gem, &flags), 1.0);

        let chain = place("c", "Giant Diner", 100.0);
        assert_eq!(novelty_score(&chain, &flags), 0.0);
    }

    #[test]
    fn adaptive_weights_shift_and_renormalize() {
        let event_intent = classify("concerts this weekend");
        let weights = adaptive_weights(&event_intent);
        assert!(weights.temporal > BASE_WEIGHTS.temporal);
        assert!(weights.proximity < BASE_WEIGHTS.proximity);
        assert!((weights.sum() - 1.0).abs() < 1e-9);

        let romantic = classify("romantic date spots");
        let weights = adaptive_weights(&romantic);
        assert!(weights.rating > BASE_WEIGHTS.rating);
        assert!((weights.sum() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn chains_rank_below_equivalent_independents() {
        let flags = FeatureFlags::all_enabled();
        let ranked = rank(
            vec![
                place("a", "Starbucks Reserve", 400.0),
                place("b", "Ritual Coffee Roasters", 400.0),
            ],
            &ctx("coffee near me"),
            &flags,
        );
        assert_eq!(ranked[0].result.core.id, "b");
    }

    #[test]
    fn anti_bias_damps_giants_and_lifts_small_gems() {
        let mut giant = place("g", "Mega Cafe", 100.0);
        if let ResultDetails::Place(d) = &mut giant.details {
            d.review_count = Some(5000);
        }
        assert!(anti_bias(1.0, &giant) < 1.0);

        let mut gem = place("s", "Tiny Cafe", 100.0);
        if let ResultDetails::Place(d) = &mut gem.details {
            d.rating = Some(4.8);
            d.review_count = Some(12);
        }
        assert!(anti_bias(0.5, &gem) > 0.5);
    }

    #[test]
    fn ranking_is_deterministic_and_total() {
        let flags = FeatureFlags::all_enabled();
        let make = || {
            vec![
                place("a", "Alpha", 300.0),
                place("b", "Beta", 3_000.0),
                place("c", "Gamma", 12_000.0),
            ]
        };
        let first = rank(make(), &ctx("coffee near me"), &flags);
        let second = rank(make(), &ctx("coffee near me"), &flags);
        let order_first: Vec<&str> = first.iter().map(|r| r.result.core.id.as_str()).collect();
        let order_second: Vec<&str> = second.iter().map(|r| r.result.core.id.as_str()).collect();
        assert_eq!(order_first, order_second);
        for window in first.windows(2) {
            assert!(window[0].result.core.score >= window[1].result.core.score);
        }
        for r in &first {
            assert!(r.result.core.score >= 0.0);
            assert!(r.result.core.reason.is_some());
        }
    }

    #[test]
    fn event_temporal_scoring_by_urgency() {
        let make_event = |starts: &str| SearchResult {
            core: ResultCore {
                id: "e".into(),
                title: "Showcase".into(),
                category: Category::Music,
                location: GeoPoint::new(37.7749, -122.4194),
                photo: None,
                external_url: None,
                distance_meters: Some(1_000.0),
                score: 0.0,
                reason: None,
            },
            details: ResultDetails::Event(EventDetails {
                starts_at: Some(starts.parse().unwrap()),
                ..Default::default()
            }),
        };

        // "right now" → immediate urgency.
        let immediate = ctx("concerts right now");
        assert_eq!(temporal_score(&make_event("2025-01-15T20:00:00Z"), &immediate), 1.0);
        assert_eq!(temporal_score(&make_event("2025-01-16T00:00:00Z"), &immediate), 0.85);
        assert_eq!(temporal_score(&make_event("2025-01-16T12:00:00Z"), &immediate), 0.5);
        assert_eq!(temporal_score(&make_event("2025-01-20T12:00:00Z"), &immediate), 0.2);

        // Recently started events still score well.
        assert_eq!(temporal_score(&make_event("2025-01-15T17:30:00Z"), &immediate), 0.8);
        assert_eq!(temporal_score(&make_event("2025-01-15T10:00:00Z"), &immediate), 0.1);

        // Weekend queries plan ahead.
        let planning = ctx("concerts this weekend");
        assert_eq!(temporal_score(&make_event("2025-01-18T20:00:00Z"), &planning), 0.9);
        assert_eq!(temporal_score(&make_event("2025-03-20T20:00:00Z"), &planning), 0.6);
    }

    #[test]
    fn open_now_matters_most_under_immediate_urgency() {
        let immediate = ctx("food right now");
        let mut closed = place("c", "Closed Diner", 400.0);
        if let ResultDetails::Place(d) = &mut closed.details {
            d.open_now = Some(false);
        }
        assert_eq!(temporal_score(&closed, &immediate), 0.05);
        assert_eq!(temporal_score(&place("o", "Open Diner", 400.0), &immediate), 1.0);

        let relaxed = ctx("food this weekend");
        assert_eq!(temporal_score(&closed, &relaxed), 0.5);
        assert_eq!(temporal_score(&place("o", "Open Diner", 400.0), &relaxed), 0.7);
    }

    #[test]
    fn vibrancy_counts_close_neighbors() {
        let flags = FeatureFlags::all_enabled();
        // Three candidates on the same block, one far away.
        let mut results = vec![
            place("a", "A", 100.0),
            place("b", "B", 100.0),
            place("c", "C", 100.0),
            place("d", "D", 100.0),
        ];
        results[1].core.location = GeoPoint::new(37.77495, -122.41945);
        results[2].core.location = GeoPoint::new(37.77500, -122.41950);
        results[3].core.location = GeoPoint::new(37.80, -122.50);

        let locations: Vec<GeoPoint> = results.iter().map(|r| r.core.location).collect();
        let score_a = vibrancy_score(0, &locations, &results[0], &flags);
        let score_d = vibrancy_score(3, &locations, &results[3], &flags);
        assert!(score_a >= 0.2);
        assert!(score_d <= NEIGHBORHOOD_BONUS);
    }

    #[test]
    fn disabled_flags_neutralize_their_factors() {
        let flags = FeatureFlags::all_enabled();
        flags.set(Feature::ClusterVibrancy, false);
        flags.set(Feature::IndependenceBoost, false);
        let result = place("a", "Starbucks", 100.0);
        let locations = vec![result.core.location];
        assert_eq!(vibrancy_score(0, &locations, &result, &flags), 0.0);
        assert_eq!(independence_score(&result, &flags), 0.5);
    }
}
