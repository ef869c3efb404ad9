//! Deterministic regex entity extraction: dates, times, locations, prices,
//! distances, and social context. Every match carries its raw byte span so
//! callers can strip or highlight the matched text.

use std::sync::LazyLock;

use chrono::Weekday;
use regex::Regex;

use citypulse_common::{BudgetLevel, GroupSize};

/// Byte span of a match in the raw query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DateEntity {
    Tonight,
    Today,
    Tomorrow,
    Weekend,
    ThisWeek,
    ThisMonth,
    NextWeekday(Weekday),
    /// Month/day with optional year, as written.
    Absolute {
        month: u32,
        day: u32,
        year: Option<i32>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamedTime {
    HappyHour,
    AfterWork,
    Brunch,
    LateNight,
    Morning,
    Afternoon,
    Evening,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TimeEntity {
    Named(NamedTime),
    Absolute { hour: u32, minute: u32 },
}

#[derive(Debug, Clone, PartialEq)]
pub enum LocationEntity {
    Proximity,
    Neighborhood(String),
    Zip(String),
    City(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum PriceEntity {
    Free,
    Under(f64),
    /// "$$" style: 1–4 dollar signs.
    Level(u8),
    Range(f64, f64),
}

#[derive(Debug, Clone, PartialEq)]
pub struct DistanceEntity {
    /// Normalized to miles.
    pub miles: f64,
    pub raw_unit: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Match<T> {
    pub value: T,
    pub span: Span,
}

/// Everything the extractor found, grouped by type.
#[derive(Debug, Clone, Default)]
pub struct ExtractedEntities {
    pub dates: Vec<Match<DateEntity>>,
    pub times: Vec<Match<TimeEntity>>,
    pub locations: Vec<Match<LocationEntity>>,
    pub prices: Vec<Match<PriceEntity>>,
    pub distances: Vec<Match<DistanceEntity>>,
    pub social: Vec<Match<GroupSize>>,
}

impl ExtractedEntities {
    /// Any date or time entity present.
    pub fn has_time_sensitivity(&self) -> bool {
        !self.dates.is_empty() || !self.times.is_empty()
    }

    /// Any location entity present.
    pub fn has_location_specificity(&self) -> bool {
        !self.locations.is_empty()
    }

    /// Budget level implied by the strongest price entity.
    pub fn budget_level(&self) -> Option<BudgetLevel> {
        self.prices.iter().map(|m| &m.value).map(|p| match p {
            PriceEntity::Free => BudgetLevel::Free,
            PriceEntity::Under(cap) if *cap <= 20.0 => BudgetLevel::Budget,
            PriceEntity::Under(_) => BudgetLevel::Moderate,
            PriceEntity::Level(1) => BudgetLevel::Budget,
            PriceEntity::Level(2) => BudgetLevel::Moderate,
            PriceEntity::Level(_) => BudgetLevel::Upscale,
            PriceEntity::Range(_, high) if *high <= 25.0 => BudgetLevel::Budget,
            PriceEntity::Range(..) => BudgetLevel::Moderate,
        })
        .next()
    }

    /// The tightest distance constraint in miles, when any matched.
    pub fn distance_miles(&self) -> Option<f64> {
        self.distances
            .iter()
            .map(|m| m.value.miles)
            .min_by(|a, b| a.partial_cmp(b).expect("finite distances"))
    }
}

static NAMED_DATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(tonight|today|tomorrow|weekend|this week|this month)\b").expect("date regex")
});

static NEXT_WEEKDAY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\bnext\s+(monday|tuesday|wednesday|thursday|friday|saturday|sunday)\b")
        .expect("next weekday regex")
});

static ABSOLUTE_DATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{1,2})/(\d{1,2})(?:/(\d{2,4}))?\b").expect("abs date regex"));

static NAMED_TIME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(happy hour|after work|brunch|late night|morning|afternoon|evening)\b")
        .expect("named time regex")
});

static ABSOLUTE_TIME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{1,2})(?::(\d{2}))?\s*(am|pm)\b").expect("abs time regex"));

static PROXIMITY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(near me|nearby|around me|close by|around here)\b").expect("proximity regex")
});

static ZIP_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b(\d{5})\b").expect("zip regex"));

static IN_CITY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bin\s+([a-z][a-z\s]{2,30}?)(?:$|[,.!?])").expect("city regex"));

static FREE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\bfree\b").expect("free regex"));

static UNDER_PRICE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:under|below|less than)\s*\$(\d+(?:\.\d{1,2})?)").expect("under regex")
});

static PRICE_RANGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$?(\d+(?:\.\d{1,2})?)\s*-\s*\$?(\d+(?:\.\d{1,2})?)\b").expect("range regex")
});

static DOLLAR_SIGNS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\${1,4})(?:\s|$)").expect("dollar regex"));

static DISTANCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\bwithin\s+(\d+(?:\.\d+)?)\s*(miles?|mi|km|kilometers?|blocks?)\b")
        .expect("distance regex")
});

static WALKING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bwalking distance\b").expect("walking regex"));

static SOCIAL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(solo|by myself|alone|date night|with my partner|for a date|with friends|group of \d+|big group|whole crew)\b")
        .expect("social regex")
});

const BLOCK_MILES: f64 = 0.0625; // ~1/16 mile per city block
const KM_PER_MILE: f64 = 1.609_344;

/// Run every extractor over the lowercased raw query.
pub fn extract_entities(raw: &str) -> ExtractedEntities {
    let text = raw.to_lowercase();
    let mut out = ExtractedEntities::default();

    for caps in NEXT_WEEKDAY_RE.captures_iter(&text) {
        let whole = caps.get(0).expect("whole match");
        let weekday = parse_weekday(&caps[1]);
        out.dates.push(Match {
            value: DateEntity::NextWeekday(weekday),
            span: span_of(whole),
        });
    }
    for caps in NAMED_DATE_RE.captures_iter(&text) {
        let whole = caps.get(0).expect("whole match");
        let value = match &caps[1] {
            "tonight" => DateEntity::Tonight,
            "today" => DateEntity::Today,
            "tomorrow" => DateEntity::Tomorrow,
            "weekend" => DateEntity::Weekend,
            "this week" => DateEntity::ThisWeek,
            _ => DateEntity::ThisMonth,
        };
        out.dates.push(Match {
            value,
            span: span_of(whole),
        });
    }
    for caps in ABSOLUTE_DATE_RE.captures_iter(&text) {
        let whole = caps.get(0).expect("whole match");
        let month: u32 = caps[1].parse().unwrap_or(0);
        let day: u32 = caps[2].parse().unwrap_or(0);
        if !(1..=12).contains(&month) || !(1..=31).contains(&day) {
            continue;
        }
        let year = caps.get(3).and_then(|y| {
            let parsed: i32 = y.as_str().parse().ok()?;
            Some(if parsed < 100 { parsed + 2000 } else { parsed })
        });
        out.dates.push(Match {
            value: DateEntity::Absolute { month, day, year },
            span: span_of(whole),
        });
    }

    for caps in NAMED_TIME_RE.captures_iter(&text) {
        let whole = caps.get(0).expect("whole match");
        let value = match &caps[1] {
            "happy hour" => NamedTime::HappyHour,
            "after work" => NamedTime::AfterWork,
            "brunch" => NamedTime::Brunch,
            "late night" => NamedTime::LateNight,
            "morning" => NamedTime::Morning,
            "afternoon" => NamedTime::Afternoon,
            _ => NamedTime::Evening,
        };
        out.times.push(Match {
            value: TimeEntity::Named(value),
            span: span_of(whole),
        });
    }
    for caps in ABSOLUTE_TIME_RE.captures_iter(&text) {
        let whole = caps.get(0).expect("whole match");
        let mut hour: u32 = caps[1].parse().unwrap_or(0);
        let minute: u32 = caps
            .get(2)
            .map(|m| m.as_str().parse().unwrap_or(0))
            .unwrap_or(0);
        if hour == 0 || hour > 12 || minute > 59 {
            continue;
        }
        if &caps[3] == "pm" && hour != 12 {
            hour += 12;
        } else if &caps[3] == "am" && hour == 12 {
            hour = 0;
        }
        out.times.push(Match {
            value: TimeEntity::Absolute { hour, minute },
            span: span_of(whole),
        });
    }

    if let Some(m) = PROXIMITY_RE.find(&text) {
        out.locations.push(Match {
            value: LocationEntity::Proximity,
            span: Span {
                start: m.start(),
                end: m.end(),
            },
        });
    }
    for neighborhood in citypulse_common::taxonomy::NEIGHBORHOODS {
        let name = neighborhood.name.to_lowercase();
        if let Some(start) = text.find(&name) {
            out.locations.push(Match {
                value: LocationEntity::Neighborhood(neighborhood.name.to_string()),
                span: Span {
                    start,
                    end: start + name.len(),
                },
            });
        }
    }
    for caps in ZIP_RE.captures_iter(&text) {
        let whole = caps.get(0).expect("whole match");
        out.locations.push(Match {
            value: LocationEntity::Zip(caps[1].to_string()),
            span: span_of(whole),
        });
    }
    for caps in IN_CITY_RE.captures_iter(&text) {
        let whole = caps.get(0).expect("whole match");
        let name = caps[1].trim().to_string();
        if !name.is_empty() {
            out.locations.push(Match {
                value: LocationEntity::City(name),
                span: span_of(whole),
            });
        }
    }

    if let Some(m) = FREE_RE.find(&text) {
        out.prices.push(Match {
            value: PriceEntity::Free,
            span: Span {
                start: m.start(),
                end: m.end(),
            },
        });
    }
    for caps in UNDER_PRICE_RE.captures_iter(&text) {
        let whole = caps.get(0).expect("whole match");
        if let Ok(cap) = caps[1].parse::<f64>() {
            out.prices.push(Match {
                value: PriceEntity::Under(cap),
                span: span_of(whole),
            });
        }
    }
    for caps in PRICE_RANGE_RE.captures_iter(&text) {
        let whole = caps.get(0).expect("whole match");
        let low: f64 = caps[1].parse().unwrap_or(0.0);
        let high: f64 = caps[2].parse().unwrap_or(0.0);
        if low < high {
            out.prices.push(Match {
                value: PriceEntity::Range(low, high),
                span: span_of(whole),
            });
        }
    }
    if out.prices.is_empty() {
        for caps in DOLLAR_SIGNS_RE.captures_iter(&text) {
            let whole = caps.get(0).expect("whole match");
            let level = caps[1].len().min(4) as u8;
            out.prices.push(Match {
                value: PriceEntity::Level(level),
                span: span_of(whole),
            });
        }
    }

    for caps in DISTANCE_RE.captures_iter(&text) {
        let whole = caps.get(0).expect("whole match");
        let amount: f64 = caps[1].parse().unwrap_or(0.0);
        let unit = caps[2].to_string();
        let miles = match unit.as_str() {
            u if u.starts_with("mi") => amount,
            u if u.starts_with("km") || u.starts_with("kilometer") => amount / KM_PER_MILE,
            _ => amount * BLOCK_MILES,
        };
        out.distances.push(Match {
            value: DistanceEntity {
                miles,
                raw_unit: unit,
            },
            span: span_of(whole),
        });
    }
    if let Some(m) = WALKING_RE.find(&text) {
        out.distances.push(Match {
            value: DistanceEntity {
                miles: 0.5,
                raw_unit: "walking".to_string(),
            },
            span: Span {
                start: m.start(),
                end: m.end(),
            },
        });
    }

    for caps in SOCIAL_RE.captures_iter(&text) {
        let whole = caps.get(0).expect("whole match");
        let matched = &caps[1];
        let group = if matched.starts_with("solo")
            || matched.starts_with("by myself")
            || matched.starts_with("alone")
        {
            GroupSize::Solo
        } else if matched.contains("date") || matched.contains("partner") {
            GroupSize::Date
        } else if matched.starts_with("with friends") {
            GroupSize::SmallGroup
        } else {
            GroupSize::LargeGroup
        };
        out.social.push(Match {
            value: group,
            span: span_of(whole),
        });
    }

    out
}

fn span_of(m: regex::Match<'_>) -> Span {
    Span {
        start: m.start(),
        end: m.end(),
    }
}

fn parse_weekday(name: &str) -> Weekday {
    match name {
        "monday" => Weekday::Mon,
        "tuesday" => Weekday::Tue,
        "wednesday" => Weekday::Wed,
        "thursday" => Weekday::Thu,
        "friday" => Weekday::Fri,
        "saturday" => Weekday::Sat,
        _ => Weekday::Sun,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_dates_and_spans() {
        let out = extract_entities("concerts tonight");
        assert_eq!(out.dates.len(), 1);
        assert_eq!(out.dates[0].value, DateEntity::Tonight);
        assert_eq!(out.dates[0].span, Span { start: 9, end: 16 });
    }

    #[test]
    fn next_weekday_is_relative() {
        let out = extract_entities("shows next friday");
        assert_eq!(out.dates[0].value, DateEntity::NextWeekday(Weekday::Fri));
    }

    #[test]
    fn absolute_dates_parse_with_optional_year() {
        let out = extract_entities("game on 3/14 and gala on 12/31/25");
        assert_eq!(
            out.dates[0].value,
            DateEntity::Absolute {
                month: 3,
                day: 14,
                year: None
            }
        );
        assert_eq!(
            out.dates[1].value,
            DateEntity::Absolute {
                month: 12,
                day: 31,
                year: Some(2025)
            }
        );
    }

    #[test]
    fn invalid_calendar_numbers_are_skipped() {
        let out = extract_entities("score was 15/40");
        assert!(out.dates.is_empty());
    }

    #[test]
    fn times_parse_named_and_absolute() {
        let out = extract_entities("happy hour or 7:30 pm");
        assert_eq!(out.times[0].value, TimeEntity::Named(NamedTime::HappyHour));
        assert_eq!(
            out.times[1].value,
            TimeEntity::Absolute {
                hour: 19,
                minute: 30
            }
        );
    }

    #[test]
    fn noon_and_midnight_edges() {
        let out = extract_entities("12 pm and 12 am");
        assert_eq!(
            out.times[0].value,
            TimeEntity::Absolute {
                hour: 12,
                minute: 0
            }
        );
        assert_eq!(
            out.times[1].value,
            TimeEntity::Absolute { hour: 0, minute: 0 }
        );
    }

    #[test]
    fn prices_free_under_and_levels() {
        assert_eq!(
            extract_entities("free jazz").prices[0].value,
            PriceEntity::Free
        );
        assert_eq!(
            extract_entities("dinner under $30").prices[0].value,
            PriceEntity::Under(30.0)
        );
        assert_eq!(
            extract_entities("somewhere $$ ").prices[0].value,
            PriceEntity::Level(2)
        );
        assert_eq!(
            extract_entities("tickets 20-40").prices[0].value,
            PriceEntity::Range(20.0, 40.0)
        );
    }

    #[test]
    fn budget_level_from_prices() {
        assert_eq!(
            extract_entities("free stuff").budget_level(),
            Some(BudgetLevel::Free)
        );
        assert_eq!(
            extract_entities("eats under $15").budget_level(),
            Some(BudgetLevel::Budget)
        );
        assert_eq!(extract_entities("pizza").budget_level(), None);
    }

    #[test]
    fn distances_normalize_to_miles() {
        let out = extract_entities("bars within 2 km");
        assert!((out.distances[0].value.miles - 1.2427).abs() < 0.001);

        let blocks = extract_entities("food within 4 blocks");
        assert!((blocks.distances[0].value.miles - 0.25).abs() < 1e-9);
    }

    #[test]
    fn walking_distance_is_half_a_mile() {
        let out = extract_entities("coffee walking distance");
        assert_eq!(out.distances[0].value.miles, 0.5);
        assert_eq!(out.distance_miles(), Some(0.5));
    }

    #[test]
    fn minimum_distance_wins() {
        let out = extract_entities("within 5 miles but really walking distance");
        assert_eq!(out.distance_miles(), Some(0.5));
    }

    #[test]
    fn social_context_maps_to_group_size() {
        assert_eq!(
            extract_entities("dinner date night").social[0].value,
            GroupSize::Date
        );
        assert_eq!(
            extract_entities("drinks with friends").social[0].value,
            GroupSize::SmallGroup
        );
        assert_eq!(
            extract_entities("karaoke with the whole crew").social[0].value,
            GroupSize::LargeGroup
        );
    }

    #[test]
    fn known_neighborhoods_are_extracted() {
        let out = extract_entities("tacos in the Mission District tonight");
        assert!(out
            .locations
            .iter()
            .any(|m| m.value == LocationEntity::Neighborhood("Mission District".into())));
        assert!(out.has_location_specificity());
    }

    #[test]
    fn helper_flags() {
        let out = extract_entities("jazz tonight near me");
        assert!(out.has_time_sensitivity());
        assert!(out.has_location_specificity());
        let bare = extract_entities("jazz");
        assert!(!bare.has_time_sensitivity());
        assert!(!bare.has_location_specificity());
    }
}
