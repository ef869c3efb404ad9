//! In-process TTL cache plus the explicit key schema for provider and
//! ranked-list entries. Keys bucket coordinates to 3 decimals (~110m) and
//! radii to coarse steps so nearby requests share entries; the ranked key
//! commutes over its provider keys so fan-out order never splits the cache.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use citypulse_common::taxonomy::is_generic_keyword;
use citypulse_common::{
    bucket_coord, EventsQuery, LocationHint, PlacesQuery, SearchIntent,
};

const PLACES_RADIUS_BUCKET_METERS: u32 = 250;
const EVENTS_RADIUS_BUCKET_MILES: u32 = 5;

const KEYWORD_MIN: usize = 3;
const KEYWORD_MAX: usize = 40;

struct Entry<V> {
    value: V,
    expires_at: Instant,
}

/// Keyed store with per-entry expiry. Values are written once per key per
/// TTL window; an insert after expiry replaces the entry atomically.
pub struct TtlCache<V> {
    entries: Mutex<HashMap<String, Entry<V>>>,
}

impl<V: Clone> TtlCache<V> {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn get(&self, key: &str) -> Option<V> {
        let entries = self.entries.lock().expect("cache lock");
        entries
            .get(key)
            .filter(|entry| entry.expires_at > Instant::now())
            .map(|entry| entry.value.clone())
    }

    pub fn insert(&self, key: String, value: V, ttl: Duration) {
        let mut entries = self.entries.lock().expect("cache lock");
        entries.insert(
            key,
            Entry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
    }

    /// Drop expired entries. Called opportunistically; correctness never
    /// depends on it because `get` checks expiry.
    pub fn purge_expired(&self) {
        let now = Instant::now();
        let mut entries = self.entries.lock().expect("cache lock");
        entries.retain(|_, entry| entry.expires_at > now);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("cache lock").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<V: Clone> Default for TtlCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

// --- TTL policy ---

/// Provider entries: near-me requests move with the caller, city/zip
/// requests are stable.
pub fn provider_ttl(hint: &LocationHint) -> Duration {
    match hint {
        LocationHint::NearMe => Duration::from_secs(45),
        LocationHint::City { .. } | LocationHint::Zip { .. } => Duration::from_secs(90),
        LocationHint::Unknown => Duration::from_secs(60),
    }
}

/// Ranked entries never outlive their provider inputs.
pub fn ranked_ttl(hint: &LocationHint) -> Duration {
    match hint {
        LocationHint::NearMe => Duration::from_secs(30),
        _ => Duration::from_secs(60),
    }
}

// --- Key schema ---

/// A keyword participates in the key only when it is discriminating:
/// within the length window and not in the too-generic banlist.
fn key_keyword(keyword: Option<&str>) -> String {
    match keyword {
        Some(k) => {
            let k = k.trim().to_lowercase();
            let len = k.chars().count();
            if len < KEYWORD_MIN || len > KEYWORD_MAX || is_generic_keyword(&k) {
                "-".to_string()
            } else {
                k.replace(' ', "_")
            }
        }
        None => "-".to_string(),
    }
}

pub fn places_cache_key(query: &PlacesQuery) -> String {
    let mut types: Vec<&str> = query.types.iter().map(|t| t.as_str()).collect();
    types.sort_unstable();
    format!(
        "places:{:.3}:{:.3}:r{}:k{}:t{}",
        bucket_coord(query.center.lat),
        bucket_coord(query.center.lng),
        query.radius_meters / PLACES_RADIUS_BUCKET_METERS,
        key_keyword(query.keyword.as_deref()),
        if types.is_empty() {
            "-".to_string()
        } else {
            types.join("+")
        },
    )
}

pub fn events_cache_key(query: &EventsQuery) -> String {
    let window = match &query.window {
        Some(w) => format!("{}-{}", w.start.timestamp(), w.end.timestamp()),
        None => "-".to_string(),
    };
    let category = query
        .category
        .map(|c| c.as_str().to_string())
        .unwrap_or_else(|| "-".to_string());
    format!(
        "events:{:.3}:{:.3}:r{}:k{}:d{}:c{}",
        bucket_coord(query.center.lat),
        bucket_coord(query.center.lng),
        query.radius_miles / EVENTS_RADIUS_BUCKET_MILES,
        key_keyword(query.keyword.as_deref()),
        window,
        category,
    )
}

/// Composition of the provider keys plus the intent facets that change
/// ranking. Sorting the provider keys makes the composition commutative.
pub fn ranked_cache_key(
    provider_keys: &[&str],
    intent: &SearchIntent,
) -> String {
    let mut keys: Vec<&str> = provider_keys.to_vec();
    keys.sort_unstable();
    let time = intent
        .time
        .map(|t| {
            let day = t
                .weekday
                .map(|w| w.to_string().to_lowercase())
                .unwrap_or_else(|| "-".to_string());
            format!("{}/{day}", t.label)
        })
        .unwrap_or_else(|| "-".to_string());
    let mut categories: Vec<&str> = intent.categories.iter().map(|c| c.as_str()).collect();
    categories.sort_unstable();
    format!(
        "ranked:[{}]:{}:{}:{}",
        keys.join("|"),
        intent.kind,
        time,
        categories.join("+"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use citypulse_common::{Category, DateWindow, GeoPoint, PlaceType};

    fn places_query() -> PlacesQuery {
        PlacesQuery {
            center: GeoPoint::new(37.774929, -122.419416),
            radius_meters: 5_000,
            max_results: 30,
            types: vec![PlaceType::Restaurant, PlaceType::Cafe],
            keyword: Some("coffee".into()),
        }
    }

    #[test]
    fn ttl_cache_expires_entries() {
        let cache: TtlCache<u32> = TtlCache::new();
        cache.insert("k".into(), 7, Duration::from_millis(20));
        assert_eq!(cache.get("k"), Some(7));
        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(cache.get("k"), None);
        cache.purge_expired();
        assert!(cache.is_empty());
    }

    #[test]
    fn insert_replaces_expired_entry() {
        let cache: TtlCache<u32> = TtlCache::new();
        cache.insert("k".into(), 1, Duration::from_millis(10));
        std::thread::sleep(Duration::from_millis(15));
        cache.insert("k".into(), 2, Duration::from_secs(5));
        assert_eq!(cache.get("k"), Some(2));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn nearby_coordinates_share_a_key() {
        let a = places_cache_key(&places_query());
        let mut close = places_query();
        close.center = GeoPoint::new(37.774930, -122.419413);
        assert_eq!(a, places_cache_key(&close));

        let mut far = places_query();
        far.center = GeoPoint::new(37.80, -122.419416);
        assert_ne!(a, places_cache_key(&far));
    }

    #[test]
    fn type_order_does_not_split_the_key() {
        let a = places_cache_key(&places_query());
        let mut reordered = places_query();
        reordered.types = vec![PlaceType::Cafe, PlaceType::Restaurant];
        assert_eq!(a, places_cache_key(&reordered));
    }

    #[test]
    fn generic_and_short_keywords_drop_out_of_the_key() {
        let mut query = places_query();
        query.keyword = Some("spots".into());
        let generic = places_cache_key(&query);
        query.keyword = None;
        assert_eq!(generic, places_cache_key(&query));
        query.keyword = Some("ab".into());
        assert_eq!(generic, places_cache_key(&query));
    }

    #[test]
    fn events_key_carries_window_and_category() {
        let start = "2025-01-18T06:00:00Z".parse().unwrap();
        let end = "2025-01-20T05:59:59Z".parse().unwrap();
        let query = EventsQuery {
            center: GeoPoint::new(41.8781, -87.6298),
            radius_miles: 25,
            max_results: 40,
            window: Some(DateWindow { start, end }),
            keyword: Some("live music".into()),
            category: Some(Category::Music),
        };
        let key = events_cache_key(&query);
        assert!(key.contains(":cmusic"));
        assert!(key.contains("klive_music"));
        assert!(key.contains("r5")); // 25mi / 5mi bucket
    }

    #[test]
    fn ranked_key_commutes_over_provider_keys() {
        let intent = citypulse_intent::classify("jazz tonight");
        let a = ranked_cache_key(&["places:x", "events:y"], &intent);
        let b = ranked_cache_key(&["events:y", "places:x"], &intent);
        assert_eq!(a, b);
    }

    #[test]
    fn ranked_key_separates_intent_kinds() {
        let place = citypulse_intent::classify("coffee near me");
        let event = citypulse_intent::classify("concerts this weekend");
        assert_ne!(
            ranked_cache_key(&["k"], &place),
            ranked_cache_key(&["k"], &event)
        );
    }
}
