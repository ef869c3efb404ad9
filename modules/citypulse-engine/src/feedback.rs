//! Zero-result UX helper: a human message plus suggested filter chips
//! sized by how many candidates each filter would match.

use serde::Serialize;

use citypulse_common::SearchResult;

const MAX_CHIPS: usize = 4;
const WALKING_DISTANCE_METERS: f64 = 800.0;

#[derive(Debug, Clone, Serialize)]
pub struct FeedbackChip {
    pub label: &'static str,
    pub matches: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct UxFeedback {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub chips: Vec<FeedbackChip>,
}

/// Build feedback for a response. `candidates` is the widest set seen this
/// request (pre-filter), so chip counts reflect what a relaxed search would
/// surface.
pub fn feedback_for(final_count: usize, candidates: &[SearchResult]) -> UxFeedback {
    let message = if final_count == 0 {
        Some(
            "No results found. Try a broader search, a different time, or another neighborhood."
                .to_string(),
        )
    } else {
        None
    };

    let mut chips = vec![
        FeedbackChip {
            label: "Budget options",
            matches: candidates
                .iter()
                .filter(|r| {
                    r.place().and_then(|p| p.price_level).is_some_and(|p| p <= 2)
                        || r.event().and_then(|e| e.is_free).unwrap_or(false)
                })
                .count(),
        },
        FeedbackChip {
            label: "Walking distance",
            matches: candidates
                .iter()
                .filter(|r| {
                    r.core
                        .distance_meters
                        .is_some_and(|d| d <= WALKING_DISTANCE_METERS)
                })
                .count(),
        },
        FeedbackChip {
            label: "Open now",
            matches: candidates
                .iter()
                .filter(|r| r.open_now() == Some(true))
                .count(),
        },
        FeedbackChip {
            label: "Highly rated (4.5+)",
            matches: candidates
                .iter()
                .filter(|r| r.rating().is_some_and(|rating| rating >= 4.5))
                .count(),
        },
    ];

    chips.retain(|chip| chip.matches > 0);
    chips.sort_by(|a, b| b.matches.cmp(&a.matches));
    chips.truncate(MAX_CHIPS);

    UxFeedback { message, chips }
}

#[cfg(test)]
mod tests {
    use super::*;
    use citypulse_common::{
        Category, GeoPoint, PlaceDetails, ResultCore, ResultDetails,
    };

    fn place(id: &str, price: Option<u8>, open: Option<bool>, rating: Option<f32>, distance: f64) -> SearchResult {
        SearchResult {
            core: ResultCore {
                id: id.into(),
                title: id.into(),
                category: Category::Food,
                location: GeoPoint::new(37.0, -122.0),
                photo: None,
                external_url: None,
                distance_meters: Some(distance),
                score: 0.0,
                reason: None,
            },
            details: ResultDetails::Place(PlaceDetails {
                rating,
                review_count: None,
                price_level: price,
                open_now: open,
                address: None,
            }),
        }
    }

    #[test]
    fn zero_results_carry_a_message_and_sized_chips() {
        let candidates = vec![
            place("a", Some(1), Some(true), Some(4.7), 400.0),
            place("b", Some(3), Some(true), Some(4.2), 2_000.0),
            place("c", Some(2), Some(false), Some(4.6), 600.0),
        ];
        let feedback = feedback_for(0, &candidates);
        assert!(feedback.message.as_deref().unwrap().contains("broader"));
        assert!(feedback.chips.len() <= 4);

        let open_now = feedback
            .chips
            .iter()
            .find(|c| c.label == "Open now")
            .unwrap();
        assert_eq!(open_now.matches, 2);
        let budget = feedback
            .chips
            .iter()
            .find(|c| c.label == "Budget options")
            .unwrap();
        assert_eq!(budget.matches, 2);
    }

    #[test]
    fn non_empty_results_have_no_message() {
        let feedback = feedback_for(7, &[]);
        assert!(feedback.message.is_none());
        assert!(feedback.chips.is_empty());
    }

    #[test]
    fn empty_chips_are_dropped() {
        let candidates = vec![place("a", None, None, None, 5_000.0)];
        let feedback = feedback_for(0, &candidates);
        assert!(feedback.chips.is_empty());
    }
}
