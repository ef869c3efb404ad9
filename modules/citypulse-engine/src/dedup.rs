//! Cross-provider duplicate collapse. Pure: clustering depends only on the
//! input list, and running it twice changes nothing.

use citypulse_common::{comparable, haversine_meters, ResultDetails, SearchResult};

const NAME_SIMILARITY_LOOSE: f64 = 0.85;
const NAME_DISTANCE_LOOSE_METERS: f64 = 50.0;
const NAME_SIMILARITY_TIGHT: f64 = 0.95;
const NAME_DISTANCE_TIGHT_METERS: f64 = 10.0;
const ADDRESS_SIMILARITY: f64 = 0.90;
const VENUE_SIMILARITY: f64 = 0.85;

/// Normalized Levenshtein similarity in [0, 1] over comparable forms.
fn similarity(a: &str, b: &str) -> f64 {
    strsim::normalized_levenshtein(&comparable(a), &comparable(b))
}

/// The duplicate test between two results.
fn is_duplicate(a: &SearchResult, b: &SearchResult) -> bool {
    if a.core.id == b.core.id {
        return true;
    }
    if std::mem::discriminant(&a.details) != std::mem::discriminant(&b.details) {
        return false;
    }

    let name_similarity = similarity(&a.core.title, &b.core.title);
    let distance = haversine_meters(a.core.location, b.core.location);
    if name_similarity > NAME_SIMILARITY_LOOSE && distance < NAME_DISTANCE_LOOSE_METERS {
        return true;
    }
    if name_similarity > NAME_SIMILARITY_TIGHT && distance < NAME_DISTANCE_TIGHT_METERS {
        return true;
    }

    if let (Some(addr_a), Some(addr_b)) = (a.address(), b.address()) {
        if similarity(addr_a, addr_b) > ADDRESS_SIMILARITY {
            return true;
        }
    }

    // Events: same venue on the same local date.
    if let (Some(venue_a), Some(venue_b)) = (a.venue(), b.venue()) {
        if similarity(venue_a, venue_b) > VENUE_SIMILARITY {
            let date_a = a.starts_at().map(|d| d.to_rfc3339()[..10].to_string());
            let date_b = b.starts_at().map(|d| d.to_rfc3339()[..10].to_string());
            if date_a.is_some() && date_a == date_b {
                return true;
            }
        }
    }

    false
}

/// How many significant fields a record carries. Drives primary selection
/// within a cluster.
fn source_quality(result: &SearchResult) -> usize {
    let mut populated = 0;
    let core = &result.core;
    populated += usize::from(core.photo.is_some());
    populated += usize::from(core.external_url.is_some());
    match &result.details {
        ResultDetails::Place(p) => {
            populated += usize::from(p.rating.is_some());
            populated += usize::from(p.review_count.is_some());
            populated += usize::from(p.price_level.is_some());
            populated += usize::from(p.open_now.is_some());
            populated += usize::from(p.address.is_some());
        }
        ResultDetails::Event(e) => {
            populated += usize::from(e.starts_at.is_some());
            populated += usize::from(e.ends_at.is_some());
            populated += usize::from(e.venue.is_some());
            populated += usize::from(e.price_min.is_some());
            populated += usize::from(e.price_max.is_some());
            populated += usize::from(e.is_free.is_some());
        }
    }
    populated
}

/// Merge a cluster: the richest member is primary, siblings backfill its
/// missing fields, and the score is the cluster max.
fn merge_cluster(mut cluster: Vec<SearchResult>) -> SearchResult {
    cluster.sort_by(|a, b| source_quality(b).cmp(&source_quality(a)));
    let max_score = cluster
        .iter()
        .map(|r| r.core.score)
        .fold(f64::MIN, f64::max);

    let mut iter = cluster.into_iter();
    let mut primary = iter.next().expect("non-empty cluster");
    for sibling in iter {
        let core = &mut primary.core;
        if core.photo.is_none() {
            core.photo = sibling.core.photo.clone();
        }
        if core.external_url.is_none() {
            core.external_url = sibling.core.external_url.clone();
        }
        if core.distance_meters.is_none() {
            core.distance_meters = sibling.core.distance_meters;
        }
        match (&mut primary.details, &sibling.details) {
            (ResultDetails::Place(p), ResultDetails::Place(s)) => {
                p.rating = p.rating.or(s.rating);
                p.review_count = p.review_count.or(s.review_count);
                p.price_level = p.price_level.or(s.price_level);
                p.open_now = p.open_now.or(s.open_now);
                if p.address.is_none() {
                    p.address = s.address.clone();
                }
            }
            (ResultDetails::Event(e), ResultDetails::Event(s)) => {
                e.starts_at = e.starts_at.or(s.starts_at);
                e.ends_at = e.ends_at.or(s.ends_at);
                if e.venue.is_none() {
                    e.venue = s.venue.clone();
                }
                e.price_min = e.price_min.or(s.price_min);
                e.price_max = e.price_max.or(s.price_max);
                e.is_free = e.is_free.or(s.is_free);
            }
            _ => {}
        }
    }
    primary.core.score = max_score;
    primary
}

/// Collapse duplicates across the combined provider output.
pub fn dedupe(results: Vec<SearchResult>) -> Vec<SearchResult> {
    let mut clusters: Vec<Vec<SearchResult>> = Vec::new();
    for result in results {
        match clusters
            .iter_mut()
            .find(|cluster| cluster.iter().any(|member| is_duplicate(member, &result)))
        {
            Some(cluster) => cluster.push(result),
            None => clusters.push(vec![result]),
        }
    }
    clusters.into_iter().map(merge_cluster).collect()
}
