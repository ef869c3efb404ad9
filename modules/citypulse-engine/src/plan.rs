//! Deterministic provider routing. A pure function of the intent: the same
//! intent always yields the same plan, and something is always selected.

use citypulse_common::taxonomy;
use citypulse_common::{
    Category, EventsParams, IntentKind, LocationHint, PlaceType, PlacesParams, ProviderPlan,
    SearchIntent,
};

const LOW_CONFIDENCE: f32 = 0.4;
const HIGH_CONFIDENCE: f32 = 0.7;
/// Above this the widest result caps apply.
const TOP_CONFIDENCE: f32 = 0.85;

// Browse-mode caps for signal-free queries.
const BROWSE_PLACES_RADIUS: u32 = 3_000;
const BROWSE_EVENTS_RADIUS: u32 = 15;
const BROWSE_MAX: u32 = 25;

// Events enabled only by time context stay tight.
const TIME_ONLY_EVENTS_RADIUS: u32 = 15;
const TIME_ONLY_EVENTS_MAX: u32 = 25;

/// Build the provider plan for a classified intent.
pub fn build_plan(intent: &SearchIntent) -> ProviderPlan {
    let mut reasoning = Vec::new();

    let no_signals = intent.keywords.is_empty()
        && intent.categories.is_empty()
        && intent.vibes.is_empty()
        && intent.time.is_none()
        && intent.location.is_unknown();

    if no_signals {
        reasoning.push("no query signals, browsing both catalogs".to_string());
        return ProviderPlan {
            call_places: true,
            call_events: true,
            places: Some(PlacesParams {
                radius_meters: BROWSE_PLACES_RADIUS,
                max_results: BROWSE_MAX,
                types: Vec::new(),
            }),
            events: Some(EventsParams {
                radius_miles: BROWSE_EVENTS_RADIUS,
                max_results: BROWSE_MAX,
            }),
            reasoning,
        };
    }

    let event_signal = intent.kind == IntentKind::Event
        || intent.has_category(Category::Music)
        || intent
            .keywords
            .iter()
            .any(|k| matches!(k.as_str(), "concert" | "show" | "festival" | "meetup" | "party"));
    let place_signal = intent.kind == IntentKind::Place
        || intent.categories.iter().any(|c| {
            matches!(
                c,
                Category::Food | Category::History | Category::Fitness | Category::Outdoor
            )
        });
    let mixed_or_abstract = intent.has_category(Category::Social)
        || intent.has_category(Category::Nightlife)
        || intent.kind == IntentKind::Both;

    let mut call_places;
    let mut call_events;

    if intent.confidence < LOW_CONFIDENCE {
        if event_signal && !place_signal {
            reasoning.push("low confidence with an event signal, events only".to_string());
            call_places = false;
            call_events = true;
        } else {
            reasoning.push("low confidence, staying with places".to_string());
            call_places = true;
            call_events = false;
        }
    } else if intent.confidence >= HIGH_CONFIDENCE {
        if mixed_or_abstract {
            reasoning.push("high confidence but mixed or social intent, both catalogs".to_string());
            call_places = true;
            call_events = true;
        } else {
            match intent.kind {
                IntentKind::Place => {
                    reasoning.push("high confidence place intent".to_string());
                    call_places = true;
                    call_events = false;
                }
                IntentKind::Event => {
                    reasoning.push("high confidence event intent".to_string());
                    call_places = false;
                    call_events = true;
                }
                IntentKind::Both => {
                    call_places = true;
                    call_events = true;
                }
            }
        }
    } else {
        match intent.kind {
            IntentKind::Event => {
                reasoning.push("medium confidence, event-leaning".to_string());
                call_places = false;
                call_events = true;
            }
            IntentKind::Place => {
                reasoning.push("medium confidence, place-leaning".to_string());
                call_places = true;
                call_events = false;
            }
            IntentKind::Both => {
                reasoning.push("medium confidence, mixed".to_string());
                call_places = true;
                call_events = true;
            }
        }
    }

    // Time context always brings events in; without an explicit event
    // signal the caps stay tight.
    let mut events_from_time_only = false;
    if intent.time.is_some() && !call_events {
        reasoning.push("time context enables events".to_string());
        call_events = true;
        events_from_time_only = !event_signal;
    }

    if !call_places && !call_events {
        reasoning.push("nothing selected, defaulting to places".to_string());
        call_places = true;
    }

    let places = call_places.then(|| {
        let radius_meters = if intent.has_category(Category::Nightlife) {
            2_500
        } else if intent.has_category(Category::Social) {
            3_000
        } else if intent.confidence < LOW_CONFIDENCE {
            4_000
        } else {
            5_000
        };
        let max_results = if intent.confidence < LOW_CONFIDENCE {
            20
        } else if intent.confidence < TOP_CONFIDENCE {
            30
        } else {
            40
        };
        PlacesParams {
            radius_meters,
            max_results,
            types: type_filter(&intent.categories),
        }
    });

    let events = call_events.then(|| {
        let major_city = matches!(
            &intent.location,
            LocationHint::City { name } if taxonomy::is_major_city(name)
        );
        let mut radius_miles = if major_city {
            35
        } else if intent.confidence < LOW_CONFIDENCE {
            15
        } else {
            25
        };
        let mut max_results = if intent.confidence < LOW_CONFIDENCE {
            25
        } else if intent.confidence < TOP_CONFIDENCE {
            40
        } else {
            50
        };
        if events_from_time_only {
            radius_miles = radius_miles.min(TIME_ONLY_EVENTS_RADIUS);
            max_results = max_results.min(TIME_ONLY_EVENTS_MAX);
        }
        EventsParams {
            radius_miles,
            max_results,
        }
    });

    ProviderPlan {
        call_places,
        call_events,
        places,
        events,
        reasoning,
    }
}

/// Category-priority type filter, at most three entries.
fn type_filter(categories: &[Category]) -> Vec<PlaceType> {
    let mut types = Vec::new();
    for category in categories {
        let mapped: &[PlaceType] = match category {
            Category::Food => &[PlaceType::Restaurant, PlaceType::Cafe],
            Category::Nightlife => &[PlaceType::Bar, PlaceType::NightClub],
            Category::Art => &[PlaceType::Museum, PlaceType::ArtGallery],
            Category::History => &[PlaceType::Museum, PlaceType::TouristAttraction],
            Category::Fitness => &[PlaceType::Gym],
            Category::Outdoor => &[PlaceType::Park, PlaceType::TouristAttraction],
            _ => &[],
        };
        for t in mapped {
            if !types.contains(t) {
                types.push(*t);
            }
        }
    }
    types.truncate(3);
    types
}

#[cfg(test)]
mod tests {
    use super::*;
    use citypulse_intent::classify;

    #[test]
    fn empty_query_browses_both_catalogs() {
        let plan = build_plan(&SearchIntent::browse());
        assert!(plan.call_places && plan.call_events);
        let places = plan.places.unwrap();
        assert_eq!(places.radius_meters, 3_000);
        assert_eq!(places.max_results, 25);
        let events = plan.events.unwrap();
        assert_eq!(events.radius_miles, 15);
        assert_eq!(events.max_results, 25);
    }

    #[test]
    fn coffee_near_me_routes_places_only() {
        let intent = classify("coffee near me");
        let plan = build_plan(&intent);
        assert!(plan.call_places);
        assert!(!plan.call_events);
        let places = plan.places.unwrap();
        assert_eq!(places.radius_meters, 5_000);
        assert_eq!(places.max_results, 30);
        assert!(places.types.contains(&PlaceType::Cafe));
    }

    #[test]
    fn time_context_enables_events_with_tight_caps() {
        let intent = classify("\u{1F355} \u{1F37A} tonight");
        let plan = build_plan(&intent);
        assert!(plan.call_places && plan.call_events);
        let events = plan.events.unwrap();
        assert!(events.radius_miles <= 15);
        assert!(events.max_results <= 25);
    }

    #[test]
    fn live_music_weekend_routes_events_only() {
        let intent = classify("live music this weekend");
        let plan = build_plan(&intent);
        assert!(plan.call_events);
        assert!(!plan.call_places);
        let events = plan.events.unwrap();
        assert_eq!(events.radius_miles, 25);
        assert!((40..=50).contains(&events.max_results));
    }

    #[test]
    fn major_city_hint_widens_event_radius() {
        let mut intent = classify("concerts this weekend");
        intent.location = LocationHint::City {
            name: "new york".into(),
        };
        let plan = build_plan(&intent);
        assert_eq!(plan.events.unwrap().radius_miles, 35);
    }

    #[test]
    fn nightlife_tightens_places_radius() {
        let intent = classify("dive bars near me");
        let plan = build_plan(&intent);
        assert_eq!(plan.places.unwrap().radius_meters, 2_500);
    }

    #[test]
    fn plan_is_deterministic() {
        let intent = classify("jazz in brooklyn tonight");
        let a = build_plan(&intent);
        let b = build_plan(&intent);
        assert_eq!(a.call_places, b.call_places);
        assert_eq!(a.call_events, b.call_events);
        assert_eq!(a.places, b.places);
        assert_eq!(a.events, b.events);
    }

    #[test]
    fn something_is_always_selected() {
        for raw in ["", "zzzz", "free stuff", "x", "🙂"] {
            let plan = build_plan(&classify(raw));
            assert!(plan.call_places || plan.call_events, "nothing selected for {raw}");
        }
    }

    #[test]
    fn type_filter_caps_at_three() {
        let types = type_filter(&[
            Category::Food,
            Category::Nightlife,
            Category::Art,
            Category::Outdoor,
        ]);
        assert_eq!(types.len(), 3);
        assert_eq!(types[0], PlaceType::Restaurant);
    }
}
