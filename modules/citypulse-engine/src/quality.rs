//! Final list shaping: rating floor, open-now preference, category
//! diversity cap, and an overall quality grade with operator-facing hints.

use serde::Serialize;

use citypulse_common::{Category, SearchResult};

const DIVERSITY_CAP: f64 = 0.30;
const OPEN_NOW_BOOST: f64 = 1.3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityGrade {
    Excellent,
    Good,
    Acceptable,
    Poor,
}

impl QualityGrade {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Excellent => "excellent",
            Self::Good => "good",
            Self::Acceptable => "acceptable",
            Self::Poor => "poor",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionHint {
    ExpandRadius,
    RelaxRatingFilter,
    BroadenQuery,
}

#[derive(Debug, Clone)]
pub struct QualityOptions {
    /// Results rated below this are dropped (unrated results pass).
    pub min_rating: f32,
    pub prefer_open_now: bool,
    /// The fallback ladder's floor; diversity overflow returns when the
    /// list would otherwise fall below it.
    pub min_results: usize,
    pub good_results: usize,
}

impl Default for QualityOptions {
    fn default() -> Self {
        Self {
            min_rating: 3.5,
            prefer_open_now: false,
            min_results: 5,
            good_results: 15,
        }
    }
}

#[derive(Debug, Clone)]
pub struct QualityOutcome {
    pub results: Vec<SearchResult>,
    pub grade: QualityGrade,
    pub hints: Vec<ActionHint>,
}

/// Shape a ranked list. Input must already be sorted by score descending;
/// output stays sorted after boosts.
pub fn enhance(ranked: Vec<SearchResult>, options: &QualityOptions) -> QualityOutcome {
    let mut kept: Vec<SearchResult> = ranked
        .into_iter()
        .filter(|r| match r.rating() {
            Some(rating) => rating >= options.min_rating,
            None => true,
        })
        .collect();

    if options.prefer_open_now {
        for result in &mut kept {
            if result.open_now() == Some(true) {
                result.core.score *= OPEN_NOW_BOOST;
            }
        }
    }

    kept.sort_by(|a, b| {
        b.core
            .score
            .partial_cmp(&a.core.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let (mut kept, deferred) = apply_diversity_cap(kept);

    // Deferred overflow comes back, best rating first, only while the list
    // is short of the floor.
    if kept.len() < options.min_results {
        let mut deferred = deferred;
        deferred.sort_by(|a, b| {
            b.rating()
                .unwrap_or(0.0)
                .partial_cmp(&a.rating().unwrap_or(0.0))
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        for result in deferred {
            if kept.len() >= options.min_results {
                break;
            }
            kept.push(result);
        }
        kept.sort_by(|a, b| {
            b.core
                .score
                .partial_cmp(&a.core.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
    }

    let grade = grade(&kept, options);
    let hints = hints(&kept, grade, options);

    QualityOutcome {
        results: kept,
        grade,
        hints,
    }
}

/// No category may exceed 30% of the list (always allowing one). Overflow
/// moves to the deferred list in score order.
fn apply_diversity_cap(sorted: Vec<SearchResult>) -> (Vec<SearchResult>, Vec<SearchResult>) {
    let total = sorted.len();
    if total == 0 {
        return (sorted, Vec::new());
    }
    let cap = ((total as f64 * DIVERSITY_CAP).floor() as usize).max(1);

    let mut counts: std::collections::HashMap<Category, usize> = std::collections::HashMap::new();
    let mut kept = Vec::with_capacity(total);
    let mut deferred = Vec::new();
    for result in sorted {
        let count = counts.entry(result.core.category).or_insert(0);
        if *count < cap {
            *count += 1;
            kept.push(result);
        } else {
            deferred.push(result);
        }
    }
    (kept, deferred)
}

fn grade(results: &[SearchResult], options: &QualityOptions) -> QualityGrade {
    let rated: Vec<f32> = results.iter().filter_map(|r| r.rating()).collect();
    let avg_rating = if rated.is_empty() {
        0.0
    } else {
        rated.iter().sum::<f32>() / rated.len() as f32
    };
    let count = results.len();

    if count >= options.good_results && avg_rating >= 4.3 {
        QualityGrade::Excellent
    } else if count >= 10 && avg_rating >= 4.0 {
        QualityGrade::Good
    } else if count >= options.min_results {
        QualityGrade::Acceptable
    } else {
        QualityGrade::Poor
    }
}

fn hints(
    results: &[SearchResult],
    grade: QualityGrade,
    options: &QualityOptions,
) -> Vec<ActionHint> {
    let mut hints = Vec::new();
    if matches!(grade, QualityGrade::Poor | QualityGrade::Acceptable) {
        hints.push(ActionHint::ExpandRadius);
    }
    if options.min_rating > 0.0
        && results
            .iter()
            .filter_map(|r| r.rating())
            .any(|r| r < options.min_rating + 0.3)
    {
        hints.push(ActionHint::RelaxRatingFilter);
    }
    if results.len() < options.min_results {
        hints.push(ActionHint::BroadenQuery);
    }
    hints
}

#[cfg(test)]
mod tests {
    use super::*;
    use citypulse_common::{GeoPoint, PlaceDetails, ResultCore, ResultDetails};

    fn place(id: &str, category: Category, rating: f32, score: f64) -> SearchResult {
        SearchResult {
            core: ResultCore {
                id: id.into(),
                title: id.into(),
                category,
                location: GeoPoint::new(37.0, -122.0),
                photo: None,
                external_url: None,
                distance_meters: None,
                score,
                reason: None,
            },
            details: ResultDetails::Place(PlaceDetails {
                rating: Some(rating),
                review_count: Some(100),
                price_level: None,
                open_now: Some(false),
                address: None,
            }),
        }
    }

    #[test]
    fn low_rated_results_are_filtered() {
        let outcome = enhance(
            vec![
                place("good", Category::Food, 4.4, 0.8),
                place("bad", Category::Food, 2.9, 0.9),
            ],
            &QualityOptions::default(),
        );
        assert_eq!(outcome.results.len(), 1);
        assert_eq!(outcome.results[0].core.id, "good");
    }

    #[test]
    fn unrated_results_pass_the_floor() {
        let mut unrated = place("u", Category::Food, 0.0, 0.5);
        if let ResultDetails::Place(d) = &mut unrated.details {
            d.rating = None;
        }
        let outcome = enhance(vec![unrated], &QualityOptions::default());
        assert_eq!(outcome.results.len(), 1);
    }

    #[test]
    fn open_now_boost_reorders() {
        let mut open = place("open", Category::Food, 4.0, 0.5);
        if let ResultDetails::Place(d) = &mut open.details {
            d.open_now = Some(true);
        }
        let closed = place("closed", Category::Food, 4.0, 0.6);
        let options = QualityOptions {
            prefer_open_now: true,
            ..Default::default()
        };
        let outcome = enhance(vec![closed, open], &options);
        assert_eq!(outcome.results[0].core.id, "open");
    }

    #[test]
    fn category_cap_defers_overflow() {
        // Ten food results and four others: food may keep floor(14*0.3)=4.
        let mut input = Vec::new();
        for i in 0..10 {
            input.push(place(&format!("f{i}"), Category::Food, 4.5, 1.0 - i as f64 * 0.01));
        }
        for i in 0..4 {
            input.push(place(&format!("n{i}"), Category::Nightlife, 4.5, 0.5 - i as f64 * 0.01));
        }
        let outcome = enhance(input, &QualityOptions::default());
        let food_count = outcome
            .results
            .iter()
            .filter(|r| r.core.category == Category::Food)
            .count();
        assert_eq!(food_count, 4);
        assert_eq!(outcome.results.len(), 8);
    }

    #[test]
    fn deferred_results_return_when_below_the_floor() {
        // Three food results, nothing else: the cap would keep one, but the
        // floor pulls the rest back.
        let input = vec![
            place("a", Category::Food, 4.5, 0.9),
            place("b", Category::Food, 4.8, 0.8),
            place("c", Category::Food, 4.2, 0.7),
        ];
        let options = QualityOptions {
            min_results: 3,
            ..Default::default()
        };
        let outcome = enhance(input, &options);
        assert_eq!(outcome.results.len(), 3);
    }

    #[test]
    fn grading_and_hints() {
        let strong: Vec<SearchResult> = (0..16)
            .map(|i| {
                place(
                    &format!("s{i}"),
                    Category::ALL[i % 6],
                    4.6,
                    1.0 - i as f64 * 0.01,
                )
            })
            .collect();
        let outcome = enhance(strong, &QualityOptions::default());
        assert_eq!(outcome.grade, QualityGrade::Excellent);

        let sparse = vec![place("one", Category::Food, 4.0, 0.9)];
        let outcome = enhance(sparse, &QualityOptions::default());
        assert_eq!(outcome.grade, QualityGrade::Poor);
        assert!(outcome.hints.contains(&ActionHint::ExpandRadius));
        assert!(outcome.hints.contains(&ActionHint::BroadenQuery));
    }

    #[test]
    fn output_is_sorted_by_score() {
        let outcome = enhance(
            vec![
                place("low", Category::Food, 4.5, 0.2),
                place("high", Category::Nightlife, 4.5, 0.9),
                place("mid", Category::Music, 4.5, 0.5),
            ],
            &QualityOptions::default(),
        );
        let scores: Vec<f64> = outcome.results.iter().map(|r| r.core.score).collect();
        assert!(scores.windows(2).all(|w| w[0] >= w[1]));
    }
}
