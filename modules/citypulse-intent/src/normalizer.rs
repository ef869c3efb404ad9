//! Query canonicalization: emoji, slang, abbreviations, typos, stopwords.
//!
//! Deterministic and locale-independent. Running the normalizer over its own
//! output is a no-op, which callers rely on for cache stability.

use citypulse_common::taxonomy;

/// Emoji that carry search meaning, mapped to their term.
const EMOJI_TERMS: &[(&str, &str)] = &[
    ("\u{1F355}", "pizza"),      // 🍕
    ("\u{1F37A}", "beer"),       // 🍺
    ("\u{1F37B}", "beer"),       // 🍻
    ("\u{2615}", "coffee"),      // ☕
    ("\u{1F363}", "sushi"),      // 🍣
    ("\u{1F32E}", "tacos"),      // 🌮
    ("\u{1F35C}", "ramen"),      // 🍜
    ("\u{1F377}", "wine"),       // 🍷
    ("\u{1F378}", "cocktails"),  // 🍸
    ("\u{1F3B5}", "music"),      // 🎵
    ("\u{1F3B6}", "music"),      // 🎶
    ("\u{1F3A4}", "karaoke"),    // 🎤
    ("\u{1F3B8}", "concert"),    // 🎸
    ("\u{1F483}", "dancing"),    // 💃
    ("\u{1F57A}", "dancing"),    // 🕺
    ("\u{1F3A8}", "art"),        // 🎨
    ("\u{1F3DB}\u{FE0F}", "museum"), // 🏛️
    ("\u{1F3DB}", "museum"),
    ("\u{1F333}", "park"),       // 🌳
    ("\u{1F3C3}", "running"),    // 🏃
    ("\u{1F9D8}", "yoga"),       // 🧘
    ("\u{1F389}", "party"),      // 🎉
    ("\u{2764}\u{FE0F}", "romantic"), // ❤️
    ("\u{2764}", "romantic"),
    ("\u{1F525}", "lively"),     // 🔥
];

/// Texting abbreviations, whole-word.
const ABBREVIATIONS: &[(&str, &str)] = &[
    ("tn", "tonight"),
    ("tonite", "tonight"),
    ("2nite", "tonight"),
    ("wknd", "weekend"),
    ("tmrw", "tomorrow"),
    ("tmw", "tomorrow"),
    ("rn", "now"),
    ("w", "with"),
    ("fav", "favorite"),
    ("resto", "restaurant"),
];

/// Youth slang, whole-word. Expansion is normalization-only; expanded terms
/// never become provider keywords.
const SLANG: &[(&str, &str)] = &[
    ("lit", "lively"),
    ("fire", "amazing"),
    ("bussin", "delicious"),
    ("vibey", "atmospheric"),
    ("lowkey", "casual"),
    ("highkey", "very"),
    ("bougie", "upscale"),
    ("boujee", "upscale"),
    ("turnt", "lively"),
    ("banger", "party"),
];

/// Common misspellings with a fixed correction.
const TYPOS: &[(&str, &str)] = &[
    ("cofee", "coffee"),
    ("coffe", "coffee"),
    ("resturant", "restaurant"),
    ("resturants", "restaurants"),
    ("restaraunt", "restaurant"),
    ("muesum", "museum"),
    ("musuem", "museum"),
    ("tonght", "tonight"),
    ("tonihgt", "tonight"),
    ("concrt", "concert"),
    ("nightlfe", "nightlife"),
];

/// Dropped during tokenization unless rescued as a temporal or locational
/// marker.
const STOPWORDS: &[&str] = &[
    "a", "an", "the", "i", "im", "me", "my", "we", "us", "you", "to", "for",
    "of", "on", "with", "and", "or", "is", "are", "was", "it", "its", "this",
    "that", "some", "any", "want", "wanna", "need", "find", "show", "give",
    "get", "go", "going", "looking", "lets", "please", "what", "whats",
    "where", "when", "something", "anything", "like", "really", "just", "in",
    "at",
];

/// Temporal markers survive stopword removal.
const TEMPORAL_MARKERS: &[&str] = &[
    "now", "today", "tonight", "tomorrow", "weekend", "monday", "tuesday",
    "wednesday", "thursday", "friday", "saturday", "sunday", "week", "month",
    "later",
];

/// Location markers survive stopword removal.
const LOCATION_MARKERS: &[&str] = &["near", "in", "at", "nearby", "around", "close", "downtown"];

/// Canonical words that close typos snap to when no table entry matches.
const CANONICAL_TERMS: &[&str] = &[
    "coffee", "pizza", "sushi", "tacos", "ramen", "burgers", "brunch",
    "restaurant", "restaurants", "bar", "bars", "beer", "wine", "club",
    "karaoke", "concert", "concerts", "music", "jazz", "show", "gallery",
    "museum", "theater", "gym", "yoga", "park", "hike", "market", "trivia",
    "festival", "party", "food", "nightlife", "art", "history", "fitness",
    "outdoor", "social",
];

/// The canonical reading of one raw query plus applied-transformation
/// metadata.
#[derive(Debug, Clone, Default)]
pub struct NormalizedQuery {
    pub original: String,
    pub normalized: String,
    pub tokens: Vec<String>,
    pub removed_stopwords: Vec<String>,
    /// emoji → substituted term
    pub emoji_terms: Vec<(String, String)>,
    /// slang/abbreviation → expansion
    pub slang_terms: Vec<(String, String)>,
}

/// Canonicalize a raw query. Never fails; empty input yields an empty
/// result.
pub fn normalize(raw: &str) -> NormalizedQuery {
    if raw.trim().is_empty() {
        return NormalizedQuery {
            original: raw.to_string(),
            ..Default::default()
        };
    }

    let mut emoji_terms = Vec::new();
    let mut slang_terms = Vec::new();

    // 1. Emoji substitution before anything strips them.
    let mut text = raw.to_string();
    for (emoji, term) in EMOJI_TERMS {
        if text.contains(emoji) {
            text = text.replace(emoji, &format!(" {term} "));
            emoji_terms.push((emoji.to_string(), term.to_string()));
        }
    }

    // 2. Case, quotes, punctuation (hyphen and apostrophe survive).
    let lowered = text.to_lowercase();
    let mut cleaned = String::with_capacity(lowered.len());
    for c in lowered.chars() {
        match c {
            '\u{2018}' | '\u{2019}' => cleaned.push('\''),
            '\u{201C}' | '\u{201D}' => {}
            c if c.is_alphanumeric() || c == '-' || c == '\'' || c == '$' => cleaned.push(c),
            _ => cleaned.push(' '),
        }
    }

    // 3/4. Whole-word expansion: abbreviations, slang, then the typo table.
    let mut words: Vec<String> = Vec::new();
    for word in cleaned.split_whitespace() {
        let mut replaced = word.to_string();
        if let Some((_, expansion)) = ABBREVIATIONS.iter().find(|(abbr, _)| *abbr == word) {
            slang_terms.push((word.to_string(), expansion.to_string()));
            replaced = expansion.to_string();
        } else if let Some((_, expansion)) = SLANG.iter().find(|(slang, _)| *slang == word) {
            slang_terms.push((word.to_string(), expansion.to_string()));
            replaced = expansion.to_string();
        } else if let Some((_, correct)) = TYPOS.iter().find(|(typo, _)| *typo == word) {
            replaced = correct.to_string();
        }
        // Expansions can be multi-word ("happy hour" style); re-split.
        words.extend(replaced.split_whitespace().map(str::to_string));
    }

    // 5/6. Stopword removal, markers preserved.
    let mut tokens = Vec::new();
    let mut removed = Vec::new();
    for word in words {
        let is_marker = TEMPORAL_MARKERS.contains(&word.as_str())
            || LOCATION_MARKERS.contains(&word.as_str());
        if STOPWORDS.contains(&word.as_str()) && !is_marker {
            removed.push(word);
        } else {
            tokens.push(word);
        }
    }

    // 7. Bounded Levenshtein snap for unknown tokens.
    for token in tokens.iter_mut() {
        if token.chars().count() < 3 || is_known_token(token) {
            continue;
        }
        if let Some(canonical) = nearest_canonical(token) {
            *token = canonical.to_string();
        }
    }

    NormalizedQuery {
        original: raw.to_string(),
        normalized: tokens.join(" "),
        tokens,
        removed_stopwords: removed,
        emoji_terms,
        slang_terms,
    }
}

/// Tokens the pipeline already understands are never typo-snapped.
fn is_known_token(token: &str) -> bool {
    taxonomy::keyword_for_token(token).is_some()
        || taxonomy::is_vibe_word(token)
        || TEMPORAL_MARKERS.contains(&token)
        || LOCATION_MARKERS.contains(&token)
        || CANONICAL_TERMS.contains(&token)
        || token.chars().all(|c| c.is_ascii_digit())
}

/// Nearest canonical term within the edit-distance bound: ≤1 for short
/// tokens, ≤2 from five characters up. Ties resolve to table order.
fn nearest_canonical(token: &str) -> Option<&'static str> {
    let max_distance = if token.chars().count() >= 5 { 2 } else { 1 };
    let mut best: Option<(&'static str, usize)> = None;
    for candidate in CANONICAL_TERMS {
        let distance = strsim::levenshtein(token, candidate);
        if distance == 0 {
            return None;
        }
        if distance <= max_distance && best.map_or(true, |(_, d)| distance < d) {
            best = Some((candidate, distance));
        }
    }
    best.map(|(canonical, _)| canonical)
}
