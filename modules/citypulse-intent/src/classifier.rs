//! Rule-based intent classification. Pure, deterministic, never fails:
//! the worst input still produces a low-confidence browse intent.

use std::sync::LazyLock;

use regex::Regex;

use citypulse_common::taxonomy::{self, KeywordKind, ACTIVITY_PHRASES};
use citypulse_common::{
    BudgetLevel, Category, GroupSize, IntentKind, LocationHint, Mood, SearchIntent, SubIntents,
    TimeContext, TimeLabel, UrgencyLevel,
};

use crate::normalizer;

static ZIP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{5})\b").expect("zip regex"));

static WEEKDAY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:next\s+|this\s+)?(monday|tuesday|wednesday|thursday|friday|saturday|sunday)\b")
        .expect("weekday regex")
});

static NOW_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:right\s+)?now\b").expect("now regex"));

static NIGHT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bnight\b").expect("night regex"));

/// Phrases meaning "wherever I am". Checked against the raw text because
/// stopword removal eats the "me".
const NEAR_ME_PHRASES: &[&str] = &[
    "near me", "nearby", "around me", "close by", "close to me", "around here",
    "walking distance",
];

/// Classify a raw query into a [`SearchIntent`].
pub fn classify(raw: &str) -> SearchIntent {
    let nq = normalizer::normalize(raw);
    if nq.tokens.is_empty() {
        return SearchIntent::browse();
    }

    let normalized = nq.normalized.as_str();
    let raw_lower = raw.to_lowercase();

    let time = detect_time(normalized);
    let location = detect_location(raw, normalized, &nq.tokens);

    // Keyword hits over the token stream. `Either` entries count toward both
    // sides of the kind decision.
    let mut place_hits = 0usize;
    let mut event_hits = 0usize;
    let mut keywords: Vec<String> = Vec::new();
    let mut categories: Vec<Category> = Vec::new();
    for token in &nq.tokens {
        if let Some(entry) = taxonomy::keyword_for_token(token) {
            match entry.kind {
                KeywordKind::Place => place_hits += 1,
                KeywordKind::Event => event_hits += 1,
                KeywordKind::Either => {
                    place_hits += 1;
                    event_hits += 1;
                }
            }
            if !keywords.contains(&entry.canonical.to_string()) {
                keywords.push(entry.canonical.to_string());
            }
            if !categories.contains(&entry.category) {
                categories.push(entry.category);
            }
        }
    }

    let vibes: Vec<String> = nq
        .tokens
        .iter()
        .filter(|t| taxonomy::is_vibe_word(t))
        .cloned()
        .collect();

    let activity_phrased = ACTIVITY_PHRASES
        .iter()
        .any(|phrase| raw_lower.contains(phrase) || normalized.contains(phrase));

    let kind = if place_hits > 0 && event_hits > 0 {
        IntentKind::Both
    } else if place_hits > 0 {
        IntentKind::Place
    } else if event_hits > 0 {
        IntentKind::Event
    } else {
        // No concrete kind signal either way.
        IntentKind::Both
    };

    let sub = detect_sub_intents(&nq.tokens, &vibes, time);

    let confidence = score_confidence(ConfidenceInputs {
        has_keywords: !keywords.is_empty(),
        kind,
        has_time: time.is_some(),
        has_location: !location.is_unknown(),
        has_vibes: !vibes.is_empty(),
        has_concrete_category: categories.iter().any(|c| *c != Category::Other),
        token_count: nq.tokens.len(),
        abstract_only: keywords.is_empty() && activity_phrased,
    });

    SearchIntent {
        kind,
        keywords,
        vibes,
        categories,
        time,
        location,
        confidence,
        sub,
    }
}

struct ConfidenceInputs {
    has_keywords: bool,
    kind: IntentKind,
    has_time: bool,
    has_location: bool,
    has_vibes: bool,
    has_concrete_category: bool,
    token_count: usize,
    abstract_only: bool,
}

/// Additive confidence model, clamped to [0, 1].
fn score_confidence(inputs: ConfidenceInputs) -> f32 {
    let mut confidence: f32 = 0.2;
    if inputs.has_keywords {
        confidence += 0.25;
    }
    if inputs.kind != IntentKind::Both {
        confidence += 0.15;
    }
    if inputs.has_time {
        confidence += 0.15;
    }
    if inputs.has_location {
        confidence += 0.15;
    }
    if inputs.has_vibes {
        confidence += 0.08;
    }
    if inputs.has_concrete_category {
        confidence += 0.07;
    }
    match inputs.token_count {
        1 => confidence -= 0.25,
        2 => confidence -= 0.10,
        _ => {}
    }
    if inputs.abstract_only {
        confidence -= 0.08;
    }
    confidence.clamp(0.0, 1.0)
}

/// Ordered time detection: a named weekday beats tonight beats today beats
/// weekend beats now.
fn detect_time(normalized: &str) -> Option<TimeContext> {
    if let Some(caps) = WEEKDAY_RE.captures(normalized) {
        let weekday = match &caps[1] {
            "monday" => chrono::Weekday::Mon,
            "tuesday" => chrono::Weekday::Tue,
            "wednesday" => chrono::Weekday::Wed,
            "thursday" => chrono::Weekday::Thu,
            "friday" => chrono::Weekday::Fri,
            "saturday" => chrono::Weekday::Sat,
            _ => chrono::Weekday::Sun,
        };
        let mut context = TimeContext::weekday(weekday);
        if NIGHT_RE.is_match(normalized) {
            context = context.at_night();
        }
        return Some(context);
    }
    if normalized.contains("tonight") {
        return Some(TimeContext::label(TimeLabel::Tonight));
    }
    if normalized.contains("today") {
        return Some(TimeContext::label(TimeLabel::Today));
    }
    if normalized.contains("weekend") {
        return Some(TimeContext::label(TimeLabel::Weekend));
    }
    if NOW_RE.is_match(normalized) {
        return Some(TimeContext::label(TimeLabel::Now));
    }
    None
}

/// Priority order: zip, near-me phrasing, city alias, then an `in/at <tail>`
/// capture that rejects keyword tails.
fn detect_location(raw: &str, normalized: &str, tokens: &[String]) -> LocationHint {
    if let Some(caps) = ZIP_RE.captures(raw) {
        return LocationHint::Zip {
            code: caps[1].to_string(),
        };
    }

    let raw_lower = raw.to_lowercase();
    for phrase in NEAR_ME_PHRASES {
        if raw_lower.contains(phrase) || normalized.contains(phrase) {
            return LocationHint::NearMe;
        }
    }
    // A trailing bare "near" (the "me" was stopworded away upstream).
    if normalized.ends_with(" near") || normalized == "near" {
        return LocationHint::NearMe;
    }

    // Longest alias first so "new york city" wins over "new york".
    let mut aliases: Vec<&(&str, &str)> = taxonomy::CITY_ALIASES.iter().collect();
    aliases.sort_by_key(|(alias, _)| std::cmp::Reverse(alias.len()));
    let padded = format!(" {normalized} ");
    for (alias, canonical) in aliases {
        if padded.contains(&format!(" {alias} ")) {
            return LocationHint::City {
                name: (*canonical).to_string(),
            };
        }
    }

    // `in <tail>` / `at <tail>`: accept only tails that are not themselves
    // place/event keywords.
    for (i, token) in tokens.iter().enumerate() {
        if (token == "in" || token == "at") && i + 1 < tokens.len() {
            let tail = &tokens[i + 1];
            if taxonomy::keyword_for_token(tail).is_none() && !taxonomy::is_vibe_word(tail) {
                return LocationHint::City { name: tail.clone() };
            }
        }
    }

    LocationHint::Unknown
}

fn detect_sub_intents(tokens: &[String], vibes: &[String], time: Option<TimeContext>) -> SubIntents {
    let has = |words: &[&str]| tokens.iter().any(|t| words.contains(&t.as_str()));

    let mood = if has(&["romantic", "date"]) {
        Some(Mood::Romantic)
    } else if has(&["adventurous", "adventure", "explore"]) {
        Some(Mood::Adventurous)
    } else if has(&["cozy", "intimate"]) {
        Some(Mood::Cozy)
    } else if has(&["lively", "energetic", "dancing", "party", "rowdy"]) {
        Some(Mood::Energetic)
    } else if has(&["chill", "casual", "quiet", "relaxed"]) {
        Some(Mood::Chill)
    } else {
        None
    };

    let budget = if has(&["free"]) {
        Some(BudgetLevel::Free)
    } else if has(&["cheap", "budget", "affordable", "inexpensive"]) {
        Some(BudgetLevel::Budget)
    } else if has(&["upscale", "fancy", "splurge", "elegant"]) {
        Some(BudgetLevel::Upscale)
    } else {
        None
    };

    let group = if has(&["date", "romantic"]) {
        Some(GroupSize::Date)
    } else if has(&["solo", "alone", "myself"]) {
        Some(GroupSize::Solo)
    } else if has(&["group", "crew", "squad", "everyone", "team"]) {
        Some(GroupSize::LargeGroup)
    } else if has(&["friends", "buddies"]) {
        Some(GroupSize::SmallGroup)
    } else {
        None
    };

    let urgency = time.map(|t| match t.label {
        TimeLabel::Now => UrgencyLevel::Immediate,
        TimeLabel::Tonight | TimeLabel::Today => UrgencyLevel::NearFuture,
        TimeLabel::Weekend | TimeLabel::Specific => UrgencyLevel::Planning,
    });

    SubIntents {
        mood,
        budget,
        group,
        urgency,
    }
}
