//! Closed vocabulary tables: keyword multimaps, micro-categories, related
//! terms, chain tokens, city aliases. Pure data plus lookup helpers — no
//! fuzzy matching here (the normalizer owns that).

use crate::types::Category;

/// Whether a keyword signals a place, an event, or could be either.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeywordKind {
    Place,
    Event,
    Either,
}

/// One canonical keyword with its surface variants.
#[derive(Debug, Clone, Copy)]
pub struct KeywordEntry {
    pub canonical: &'static str,
    pub variants: &'static [&'static str],
    pub category: Category,
    pub kind: KeywordKind,
}

/// The canonical keyword multimap. Matching is whole-word over normalized
/// tokens; variants never overlap across entries.
pub const KEYWORDS: &[KeywordEntry] = &[
    // --- food / places ---
    KeywordEntry { canonical: "coffee", variants: &["coffee", "cafe", "cafes", "espresso", "latte"], category: Category::Food, kind: KeywordKind::Place },
    KeywordEntry { canonical: "pizza", variants: &["pizza", "pizzeria", "slice"], category: Category::Food, kind: KeywordKind::Place },
    KeywordEntry { canonical: "sushi", variants: &["sushi", "omakase"], category: Category::Food, kind: KeywordKind::Place },
    KeywordEntry { canonical: "tacos", variants: &["taco", "tacos", "taqueria"], category: Category::Food, kind: KeywordKind::Place },
    KeywordEntry { canonical: "ramen", variants: &["ramen", "noodles"], category: Category::Food, kind: KeywordKind::Place },
    KeywordEntry { canonical: "burgers", variants: &["burger", "burgers"], category: Category::Food, kind: KeywordKind::Place },
    KeywordEntry { canonical: "restaurant", variants: &["restaurant", "restaurants", "eat", "eats", "food", "dinner", "lunch"], category: Category::Food, kind: KeywordKind::Place },
    KeywordEntry { canonical: "brunch", variants: &["brunch"], category: Category::Food, kind: KeywordKind::Place },
    KeywordEntry { canonical: "dessert", variants: &["dessert", "desserts", "icecream", "gelato", "bakery", "donuts"], category: Category::Food, kind: KeywordKind::Place },
    // --- nightlife / places ---
    KeywordEntry { canonical: "bar", variants: &["bar", "bars", "pub", "pubs", "cocktail", "cocktails", "drinks"], category: Category::Nightlife, kind: KeywordKind::Place },
    KeywordEntry { canonical: "beer", variants: &["beer", "brewery", "breweries", "taproom"], category: Category::Nightlife, kind: KeywordKind::Place },
    KeywordEntry { canonical: "wine", variants: &["wine", "winery"], category: Category::Nightlife, kind: KeywordKind::Place },
    KeywordEntry { canonical: "club", variants: &["club", "clubs", "dancing", "nightclub"], category: Category::Nightlife, kind: KeywordKind::Either },
    KeywordEntry { canonical: "karaoke", variants: &["karaoke"], category: Category::Nightlife, kind: KeywordKind::Either },
    // --- music / events ---
    KeywordEntry { canonical: "concert", variants: &["concert", "concerts", "gig", "gigs"], category: Category::Music, kind: KeywordKind::Event },
    KeywordEntry { canonical: "live music", variants: &["music", "band", "bands", "dj", "djs"], category: Category::Music, kind: KeywordKind::Event },
    KeywordEntry { canonical: "jazz", variants: &["jazz", "blues"], category: Category::Music, kind: KeywordKind::Either },
    KeywordEntry { canonical: "show", variants: &["show", "shows", "performance", "performances"], category: Category::Music, kind: KeywordKind::Event },
    // --- art ---
    KeywordEntry { canonical: "gallery", variants: &["gallery", "galleries", "art", "exhibit", "exhibits", "exhibition"], category: Category::Art, kind: KeywordKind::Either },
    KeywordEntry { canonical: "theater", variants: &["theater", "theatre", "play", "improv", "comedy", "standup"], category: Category::Art, kind: KeywordKind::Event },
    // --- history ---
    KeywordEntry { canonical: "museum", variants: &["museum", "museums", "historic", "history", "landmark", "landmarks"], category: Category::History, kind: KeywordKind::Place },
    // --- fitness ---
    KeywordEntry { canonical: "gym", variants: &["gym", "gyms", "workout", "fitness", "yoga", "pilates", "climbing"], category: Category::Fitness, kind: KeywordKind::Place },
    KeywordEntry { canonical: "run", variants: &["run", "running", "5k"], category: Category::Fitness, kind: KeywordKind::Event },
    // --- outdoor ---
    KeywordEntry { canonical: "park", variants: &["park", "parks", "garden", "gardens"], category: Category::Outdoor, kind: KeywordKind::Place },
    KeywordEntry { canonical: "hike", variants: &["hike", "hikes", "hiking", "trail", "trails", "outdoors"], category: Category::Outdoor, kind: KeywordKind::Either },
    KeywordEntry { canonical: "market", variants: &["market", "markets", "farmers"], category: Category::Outdoor, kind: KeywordKind::Either },
    // --- generic place words ---
    KeywordEntry { canonical: "spot", variants: &["spot", "spots", "place", "places", "venue", "venues"], category: Category::Other, kind: KeywordKind::Place },
    // --- social ---
    KeywordEntry { canonical: "meetup", variants: &["meetup", "meetups", "mixer", "mixers", "networking"], category: Category::Social, kind: KeywordKind::Event },
    KeywordEntry { canonical: "trivia", variants: &["trivia", "quiz"], category: Category::Social, kind: KeywordKind::Either },
    KeywordEntry { canonical: "festival", variants: &["festival", "festivals", "fair", "fest"], category: Category::Social, kind: KeywordKind::Event },
    KeywordEntry { canonical: "party", variants: &["party", "parties"], category: Category::Social, kind: KeywordKind::Event },
];

/// Look up the keyword entry whose variants contain `token`.
pub fn keyword_for_token(token: &str) -> Option<&'static KeywordEntry> {
    KEYWORDS
        .iter()
        .find(|entry| entry.variants.contains(&token))
}

/// Vibe words recognized as mood/atmosphere qualifiers.
pub const VIBE_WORDS: &[&str] = &[
    "chill", "cozy", "fancy", "divey", "romantic", "lively", "trendy", "artsy",
    "quirky", "intimate", "loud", "quiet", "hidden", "aesthetic", "upscale",
    "casual", "rowdy", "cute",
];

pub fn is_vibe_word(token: &str) -> bool {
    VIBE_WORDS.contains(&token)
}

/// Abstract activity phrasing that signals "both" intent without naming a
/// place or event kind.
pub const ACTIVITY_PHRASES: &[&str] = &[
    "things to do",
    "stuff to do",
    "what to do",
    "activities",
    "something fun",
    "whats happening",
    "what's happening",
    "hang out",
    "go out",
];

// --- Micro-categories ---

/// Narrow sub-taxa. Additive only: these affect novelty scoring and
/// faceting, never routing.
pub const MICRO_CATEGORIES: &[(&str, Category)] = &[
    ("rooftop bar", Category::Nightlife),
    ("speakeasy", Category::Nightlife),
    ("tiki bar", Category::Nightlife),
    ("wine bar", Category::Nightlife),
    ("arcade bar", Category::Nightlife),
    ("beer garden", Category::Nightlife),
    ("listening bar", Category::Music),
    ("jazz lounge", Category::Music),
    ("record shop", Category::Music),
    ("open mic", Category::Music),
    ("ramen shop", Category::Food),
    ("izakaya", Category::Food),
    ("food hall", Category::Food),
    ("supper club", Category::Food),
    ("cat cafe", Category::Food),
    ("board game cafe", Category::Social),
    ("night market", Category::Social),
    ("art walk", Category::Art),
    ("poetry slam", Category::Art),
    ("sculpture garden", Category::Art),
    ("climbing gym", Category::Fitness),
    ("run club", Category::Fitness),
    ("botanical garden", Category::Outdoor),
    ("walking tour", Category::History),
];

/// True when a result title names a micro-category.
pub fn matches_micro_category(title: &str) -> bool {
    let lower = title.to_lowercase();
    MICRO_CATEGORIES.iter().any(|(name, _)| lower.contains(name))
}

// --- Related-category expansion (fallback strategy) ---

/// Closed relation map: a specific term widens to its neighbors when the
/// exact query comes up dry.
pub const RELATED_TERMS: &[(&str, &[&str])] = &[
    ("sushi", &["japanese", "asian", "seafood", "restaurant"]),
    ("jazz", &["music", "live music", "lounge", "bar"]),
    ("pizza", &["italian", "restaurant"]),
    ("coffee", &["cafe", "bakery", "tea"]),
    ("tacos", &["mexican", "restaurant"]),
    ("ramen", &["japanese", "noodles", "restaurant"]),
    ("beer", &["brewery", "bar", "pub"]),
    ("wine", &["wine bar", "lounge"]),
    ("comedy", &["show", "theater"]),
    ("hike", &["trail", "park", "outdoors"]),
    ("yoga", &["fitness", "gym", "studio"]),
    ("trivia", &["bar", "pub"]),
];

pub fn related_terms(term: &str) -> Option<&'static [&'static str]> {
    RELATED_TERMS
        .iter()
        .find(|(key, _)| *key == term)
        .map(|(_, related)| *related)
}

// --- Independence scoring tokens ---

/// Known national chains. A title containing one of these is penalized hard.
pub const CHAIN_TOKENS: &[&str] = &["starbucks", "mcdonalds", "subway", "chipotle", "taco bell"];

/// Generic corporate phrasing, penalized lightly.
pub const CORPORATE_TOKENS: &[&str] = &["franchise", "official store", "outlet"];

/// Phrasing that marks a venue as independent.
pub const INDIE_TOKENS: &[&str] = &["local", "indie", "family", "independent"];

// --- City aliases (detection only; resolution uses the geo table) ---

pub const CITY_ALIASES: &[(&str, &str)] = &[
    ("nyc", "new york"),
    ("new york city", "new york"),
    ("manhattan", "new york"),
    ("brooklyn", "brooklyn"),
    ("sf", "san francisco"),
    ("san fran", "san francisco"),
    ("la", "los angeles"),
    ("chicago", "chicago"),
    ("chi town", "chicago"),
    ("philly", "philadelphia"),
    ("nola", "new orleans"),
    ("atl", "atlanta"),
    ("vegas", "las vegas"),
    ("dc", "washington"),
    ("austin", "austin"),
    ("seattle", "seattle"),
    ("portland", "portland"),
    ("denver", "denver"),
    ("miami", "miami"),
    ("boston", "boston"),
];

/// Canonicalize a city mention. Accepts aliases and canonical names.
pub fn canonical_city(name: &str) -> Option<&'static str> {
    let lower = name.trim().to_lowercase();
    CITY_ALIASES
        .iter()
        .find(|(alias, _)| *alias == lower)
        .map(|(_, canonical)| *canonical)
        .or_else(|| {
            CITY_ALIASES
                .iter()
                .find(|(_, canonical)| *canonical == lower)
                .map(|(_, canonical)| *canonical)
        })
}

/// Cities large enough that event searches widen to a 35-mile radius.
pub const MAJOR_CITIES: &[&str] = &[
    "new york", "los angeles", "chicago", "san francisco", "washington",
    "boston", "philadelphia", "atlanta", "miami", "seattle",
];

pub fn is_major_city(name: &str) -> bool {
    MAJOR_CITIES.contains(&name.to_lowercase().as_str())
}

// --- Cache keyword hygiene ---

/// Tokens too generic to discriminate cache entries; keys drop them.
pub const GENERIC_KEYWORD_BANLIST: &[&str] = &[
    "place", "places", "spot", "spots", "thing", "things", "stuff", "fun",
    "good", "best", "cool", "nice", "near", "nearby", "around", "local",
    "tonight", "today", "weekend", "now", "open",
];

pub fn is_generic_keyword(token: &str) -> bool {
    GENERIC_KEYWORD_BANLIST.contains(&token)
}

// --- Neighborhoods (cluster-vibrancy context) ---

/// A named neighborhood with the geohash prefixes that cover it. Results
/// whose coordinates fall under a prefix get a small vibrancy bonus.
#[derive(Debug, Clone, Copy)]
pub struct Neighborhood {
    pub name: &'static str,
    pub geohash_prefixes: &'static [&'static str],
}

pub const NEIGHBORHOODS: &[Neighborhood] = &[
    Neighborhood { name: "Mission District", geohash_prefixes: &["9q8yy"] },
    Neighborhood { name: "North Beach", geohash_prefixes: &["9q8zn"] },
    Neighborhood { name: "Williamsburg", geohash_prefixes: &["dr5rt"] },
    Neighborhood { name: "East Village", geohash_prefixes: &["dr5rs"] },
    Neighborhood { name: "Wicker Park", geohash_prefixes: &["dp3wj"] },
    Neighborhood { name: "French Quarter", geohash_prefixes: &["9vrfm"] },
    Neighborhood { name: "Capitol Hill", geohash_prefixes: &["c23nb"] },
];
