//! End-to-end pipeline scenarios over in-memory fake providers.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use citypulse_common::{
    haversine_meters, Category, EventDetails, EventsQuery, FeatureFlags, GeoPoint, IntentKind,
    PlaceDetails, PlacesQuery, ResultCore, ResultDetails, SearchResult, UserContext,
    METERS_PER_MILE,
};
use citypulse_engine::{EngineConfig, GeoTable, SearchEngine, SearchRequest};
use citypulse_intent::HybridClassifier;
use citypulse_providers::error::{ProviderError, Result as ProviderResult};
use citypulse_providers::{EventsProvider, PlacesProvider};

fn place(id: &str, title: &str, category: Category, lat: f64, lng: f64, rating: f32) -> SearchResult {
    SearchResult {
        core: ResultCore {
            id: id.into(),
            title: title.into(),
            category,
            location: GeoPoint::new(lat, lng),
            photo: None,
            external_url: Some(format!("https://maps.example/{id}")),
            distance_meters: None,
            score: 0.0,
            reason: None,
        },
        details: ResultDetails::Place(PlaceDetails {
            rating: Some(rating),
            review_count: Some(120),
            price_level: Some(2),
            open_now: Some(true),
            address: None,
        }),
    }
}

fn event(id: &str, title: &str, lat: f64, lng: f64, starts: DateTime<Utc>) -> SearchResult {
    SearchResult {
        core: ResultCore {
            id: id.into(),
            title: title.into(),
            category: Category::Music,
            location: GeoPoint::new(lat, lng),
            photo: None,
            external_url: Some(format!("https://tickets.example/{id}")),
            distance_meters: None,
            score: 0.0,
            reason: None,
        },
        details: ResultDetails::Event(EventDetails {
            starts_at: Some(starts),
            ends_at: None,
            venue: Some("Test Hall".into()),
            price_min: Some(10.0),
            price_max: Some(40.0),
            is_free: Some(false),
        }),
    }
}

/// Radius-aware fake places catalog.
struct FakePlaces {
    catalog: Vec<SearchResult>,
    calls: AtomicU32,
    seen_queries: Mutex<Vec<PlacesQuery>>,
    fail: bool,
}

impl FakePlaces {
    fn new(catalog: Vec<SearchResult>) -> Self {
        Self {
            catalog,
            calls: AtomicU32::new(0),
            seen_queries: Mutex::new(Vec::new()),
            fail: false,
        }
    }

    fn failing() -> Self {
        Self {
            catalog: Vec::new(),
            calls: AtomicU32::new(0),
            seen_queries: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    fn first_query(&self) -> Option<PlacesQuery> {
        self.seen_queries.lock().unwrap().first().cloned()
    }
}

#[async_trait]
impl PlacesProvider for FakePlaces {
    async fn search_places(&self, query: &PlacesQuery) -> ProviderResult<Vec<SearchResult>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen_queries.lock().unwrap().push(query.clone());
        if self.fail {
            return Err(ProviderError::Api {
                status: 502,
                message: "upstream sad".into(),
            });
        }
        Ok(self
            .catalog
            .iter()
            .filter(|r| {
                haversine_meters(query.center, r.core.location) <= f64::from(query.radius_meters)
            })
            .take(query.max_results as usize)
            .cloned()
            .collect())
    }
}

struct FakeEvents {
    catalog: Vec<SearchResult>,
    calls: AtomicU32,
    seen_queries: Mutex<Vec<EventsQuery>>,
}

impl FakeEvents {
    fn new(catalog: Vec<SearchResult>) -> Self {
        Self {
            catalog,
            calls: AtomicU32::new(0),
            seen_queries: Mutex::new(Vec::new()),
        }
    }

    fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    fn last_query(&self) -> Option<EventsQuery> {
        self.seen_queries.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl EventsProvider for FakeEvents {
    async fn search_events(&self, query: &EventsQuery) -> ProviderResult<Vec<SearchResult>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen_queries.lock().unwrap().push(query.clone());
        let radius_meters = f64::from(query.radius_miles) * METERS_PER_MILE;
        Ok(self
            .catalog
            .iter()
            .filter(|r| haversine_meters(query.center, r.core.location) <= radius_meters)
            .take(query.max_results as usize)
            .cloned()
            .collect())
    }
}

fn engine(places: Arc<FakePlaces>, events: Arc<FakeEvents>) -> SearchEngine {
    SearchEngine::new(
        places,
        events,
        GeoTable::builtin(),
        HybridClassifier::new(None),
        Arc::new(FeatureFlags::all_enabled()),
        EngineConfig::default(),
    )
}

fn ctx(timezone: &str, now: &str, location: Option<(f64, f64)>) -> UserContext {
    UserContext {
        location: location.map(|(lat, lng)| GeoPoint::new(lat, lng)),
        timezone: timezone.to_string(),
        now: now.parse().expect("test instant"),
    }
}

fn request(query: &str, context: UserContext) -> SearchRequest {
    SearchRequest {
        query: query.to_string(),
        context,
        radius_miles: None,
        limit: None,
        offset: 0,
    }
}

fn sf_cafes() -> Vec<SearchResult> {
    vec![
        place("c1", "Ritual Coffee Roasters", Category::Food, 37.7764, -122.4241, 4.6),
        place("c2", "Sightglass Coffee", Category::Food, 37.7770, -122.4086, 4.5),
        place("c3", "Four Barrel Coffee", Category::Food, 37.7670, -122.4216, 4.3),
        place("c4", "Blue Bottle Coffee", Category::Food, 37.7763, -122.4233, 4.4),
        place("c5", "Grand Coffee", Category::Food, 37.7625, -122.4190, 4.7),
        place("c6", "Craftsman and Wolves", Category::Food, 37.7609, -122.4214, 4.2),
        place("c7", "Linea Caffe", Category::Food, 37.7599, -122.4204, 4.5),
        place("c8", "Saint Frank Coffee", Category::Food, 37.7980, -122.4220, 4.4),
    ]
}

#[tokio::test]
async fn coffee_near_me_returns_ranked_places() {
    let places = Arc::new(FakePlaces::new(sf_cafes()));
    let events = Arc::new(FakeEvents::new(Vec::new()));
    let engine = engine(places.clone(), events.clone());

    let outcome = engine
        .search(request(
            "coffee near me",
            ctx("America/Los_Angeles", "2025-01-15T19:00:00Z", Some((37.7749, -122.4194))),
        ))
        .await;

    assert_eq!(outcome.meta.intent_kind, IntentKind::Place);
    assert_eq!(outcome.meta.used_providers, vec!["places"]);
    assert!(!outcome.meta.used_model);
    assert!(!outcome.meta.cache_hit);
    assert!(outcome.total >= 5, "got {}", outcome.total);
    assert_eq!(events.call_count(), 0);

    // The top result sits within the 1km high-proximity band.
    let top = &outcome.results[0];
    assert!(top.core.distance_meters.unwrap() <= 1_000.0);
    assert!(top.core.score > 0.0);
    assert!(top.core.reason.is_some());
}

#[tokio::test]
async fn pizza_beer_emoji_tonight_fans_out_to_both_providers() {
    let now = "2025-01-15T19:00:00Z"; // 14:00 in New York
    let midtown = (40.7580, -73.9855);
    let places = Arc::new(FakePlaces::new(vec![
        place("p1", "Joe's Pizza", Category::Food, 40.7546, -73.9870, 4.5),
        place("p2", "Capizzi", Category::Food, 40.7565, -73.9920, 4.6),
        place("p3", "B Side Pizza", Category::Food, 40.7605, -73.9890, 4.4),
        place("b1", "Beer Authority", Category::Nightlife, 40.7570, -73.9910, 4.2),
        place("b2", "The Ginger Man", Category::Nightlife, 40.7510, -73.9780, 4.3),
        place("b3", "Valerie", Category::Nightlife, 40.7560, -73.9830, 4.5),
    ]));
    let events = Arc::new(FakeEvents::new(vec![event(
        "e1",
        "Brewery Pop-Up",
        40.7560,
        -73.9900,
        "2025-01-16T00:00:00Z".parse().unwrap(),
    )]));
    let engine = engine(places.clone(), events.clone());

    let outcome = engine
        .search(request(
            "\u{1F355} \u{1F37A} tonight",
            ctx("America/New_York", now, Some(midtown)),
        ))
        .await;

    assert_eq!(outcome.meta.used_providers, vec!["places", "events"]);

    // Events were queried with tonight's local window.
    let query = events.last_query().expect("events were called");
    let window = query.window.expect("tonight produces a window");
    assert_eq!(window.start.to_rfc3339(), "2025-01-15T19:00:00+00:00");
    assert_eq!(window.end.to_rfc3339(), "2025-01-16T04:59:59+00:00");
    // Time-context-only events stay tight.
    assert!(query.radius_miles <= 15);
    assert!(query.max_results <= 25);
}

#[tokio::test]
async fn live_music_weekend_routes_events_with_weekend_window() {
    // 2025-01-15 is a Wednesday.
    let chicago = (41.8781, -87.6298);
    let saturday_night: DateTime<Utc> = "2025-01-19T02:00:00Z".parse().unwrap();
    let places = Arc::new(FakePlaces::new(Vec::new()));
    let events = Arc::new(FakeEvents::new(vec![
        event("e1", "Blues Revue", 41.8800, -87.6250, saturday_night),
        event("e2", "Warehouse Set", 41.8850, -87.6350, saturday_night),
        event("e3", "String Quartet", 41.8700, -87.6200, saturday_night),
        event("e4", "Vinyl Night", 41.8790, -87.6400, saturday_night),
        event("e5", "Jam Session", 41.8760, -87.6280, saturday_night),
    ]));
    let engine = engine(places.clone(), events.clone());

    let outcome = engine
        .search(request(
            "live music this weekend",
            ctx("America/Chicago", "2025-01-15T18:00:00Z", Some(chicago)),
        ))
        .await;

    assert_eq!(outcome.meta.intent_kind, IntentKind::Event);
    assert_eq!(outcome.meta.used_providers, vec!["events"]);
    assert_eq!(places.call_count(), 0);

    let query = events.last_query().unwrap();
    assert_eq!(query.radius_miles, 25);
    assert!((40..=50).contains(&query.max_results));
    let window = query.window.unwrap();
    assert_eq!(window.start.to_rfc3339(), "2025-01-18T06:00:00+00:00");
    assert_eq!(window.end.to_rfc3339(), "2025-01-20T05:59:59+00:00");
    assert!(outcome.total >= 1);
}

#[tokio::test]
async fn unresolvable_location_returns_empty_without_provider_calls() {
    let places = Arc::new(FakePlaces::new(sf_cafes()));
    let events = Arc::new(FakeEvents::new(Vec::new()));
    let engine = engine(places.clone(), events.clone());

    let outcome = engine
        .search(request(
            "romantic date spots",
            ctx("America/Chicago", "2025-01-15T19:00:00Z", None),
        ))
        .await;

    assert_eq!(outcome.total, 0);
    assert!(outcome.results.is_empty());
    assert!(outcome.notes.iter().any(|n| n.contains("unresolved")));
    assert_eq!(places.call_count(), 0);
    assert_eq!(events.call_count(), 0);
    assert!(outcome.feedback.message.is_some());
}

#[tokio::test]
async fn identical_requests_hit_the_ranked_cache() {
    let brooklyn_places = vec![
        place("j1", "Jazz Standard", Category::Music, 40.6790, -73.9440, 4.6),
        place("j2", "Barbes", Category::Music, 40.6720, -73.9840, 4.7),
        place("j3", "Nublu Annex", Category::Nightlife, 40.6800, -73.9500, 4.3),
        place("j4", "Vinyl Lounge", Category::Nightlife, 40.6770, -73.9420, 4.2),
        place("j5", "Soul Supper Club", Category::Food, 40.6810, -73.9460, 4.5),
    ];
    let events_catalog = vec![event(
        "je1",
        "Brooklyn Jazz Crawl",
        40.6782,
        -73.9442,
        "2025-01-16T01:00:00Z".parse().unwrap(),
    )];
    let places = Arc::new(FakePlaces::new(brooklyn_places));
    let events = Arc::new(FakeEvents::new(events_catalog));
    let engine = engine(places.clone(), events.clone());

    let make_request = || {
        request(
            "jazz brooklyn",
            ctx("America/New_York", "2025-01-15T19:00:00Z", Some((40.6782, -73.9442))),
        )
    };

    let first = engine.search(make_request()).await;
    assert!(!first.meta.cache_hit);
    assert_eq!(first.meta.used_providers, vec!["places", "events"]);
    let calls_after_first = places.call_count() + events.call_count();
    assert!(calls_after_first >= 2);

    let second = engine.search(make_request()).await;
    assert!(second.meta.cache_hit);
    assert_eq!(
        places.call_count() + events.call_count(),
        calls_after_first,
        "cache hit must not touch providers"
    );

    let ids = |outcome: &citypulse_engine::SearchOutcome| {
        outcome
            .results
            .iter()
            .map(|r| r.core.id.clone())
            .collect::<Vec<_>>()
    };
    assert_eq!(ids(&first), ids(&second));
}

#[tokio::test]
async fn fallback_ladder_guarantees_results_from_a_populated_region() {
    // Everything sits ~28km out: invisible at the planned radius, visible
    // at the browse-everything rung.
    let far = vec![
        place("s1", "Ichi Sushi", Category::Food, 37.55, -122.30, 4.6),
        place("s2", "Sushi Yoshizumi", Category::Food, 37.56, -122.32, 4.8),
        place("s3", "Ramen Dojo", Category::Food, 37.56, -122.31, 4.4),
        place("s4", "Izakaya Mai", Category::Food, 37.55, -122.31, 4.3),
        place("s5", "Blue Fin", Category::Food, 37.57, -122.33, 4.1),
        place("s6", "Pearl Oyster Bar", Category::Food, 37.57, -122.30, 4.5),
    ];
    let places = Arc::new(FakePlaces::new(far));
    let events = Arc::new(FakeEvents::new(Vec::new()));
    let engine = engine(places.clone(), events.clone());

    let outcome = engine
        .search(request(
            "sushi near me",
            ctx("America/Los_Angeles", "2025-01-15T19:00:00Z", Some((37.7749, -122.4194))),
        ))
        .await;

    assert!(outcome.total >= 1, "never-empty violated");
    let strategies: Vec<&str> = outcome
        .fallback_trace
        .iter()
        .map(|a| a.strategy)
        .collect();
    assert!(strategies.contains(&"exact"));
    assert!(strategies.contains(&"browse_max_radius"));
    assert!(outcome.fallback_trace.last().unwrap().success);
}

#[tokio::test]
async fn provider_failure_degrades_to_a_valid_outcome() {
    let places = Arc::new(FakePlaces::failing());
    let events = Arc::new(FakeEvents::new(Vec::new()));
    let engine = engine(places.clone(), events.clone());

    let outcome = engine
        .search(request(
            "coffee near me",
            ctx("America/Los_Angeles", "2025-01-15T19:00:00Z", Some((37.7749, -122.4194))),
        ))
        .await;

    // No panic, a valid envelope, and the failures were observed.
    assert_eq!(outcome.total, 0);
    assert!(engine.metrics().snapshot().provider_failures > 0);
    assert!(outcome.feedback.message.is_some());
}

#[tokio::test]
async fn stated_distance_constraints_tighten_the_radius() {
    let places = Arc::new(FakePlaces::new(sf_cafes()));
    let events = Arc::new(FakeEvents::new(Vec::new()));
    let engine = engine(places.clone(), events.clone());

    engine
        .search(request(
            "coffee within 2 blocks",
            ctx("America/Los_Angeles", "2025-01-15T19:00:00Z", Some((37.7749, -122.4194))),
        ))
        .await;

    // 2 blocks = 0.125 miles = ~201 meters, well under the planned 5km.
    let first = places.first_query().expect("places were called");
    assert_eq!(first.radius_meters, 201);
}

#[tokio::test]
async fn pagination_windows_the_ranked_list() {
    let places = Arc::new(FakePlaces::new(sf_cafes()));
    let events = Arc::new(FakeEvents::new(Vec::new()));
    let engine = engine(places, events);

    let mut req = request(
        "coffee near me",
        ctx("America/Los_Angeles", "2025-01-15T19:00:00Z", Some((37.7749, -122.4194))),
    );
    req.limit = Some(2);
    let first_page = engine.search(req.clone()).await;
    assert_eq!(first_page.results.len(), 2);
    assert!(first_page.total > 2);

    let mut second = req.clone();
    second.offset = 2;
    let second_page = engine.search(second).await;
    assert_eq!(second_page.offset, 2);
    assert!(second_page.meta.cache_hit);
    assert_ne!(
        first_page.results[0].core.id,
        second_page.results[0].core.id
    );
}
