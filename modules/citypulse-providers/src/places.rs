use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use citypulse_common::{
    Category, GeoPoint, PhotoRef, PlaceDetails, PlacesQuery, ResultCore, ResultDetails,
    SearchResult, PLACES_MAX_RESULTS, PLACES_RADIUS_MAX_METERS, PLACES_RADIUS_MIN_METERS,
};

use crate::error::{ProviderError, Result};
use crate::PlacesProvider;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(8);
const KEYWORD_MIN: usize = 3;
const KEYWORD_MAX: usize = 40;

/// HTTP client for the normalized places gateway.
pub struct HttpPlacesProvider {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HttpPlacesProvider {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .expect("reqwest client"),
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }
}

/// Wire request, already clamped.
#[derive(Debug, Serialize)]
struct PlacesRequest {
    latitude: f64,
    longitude: f64,
    radius_meters: u32,
    max_results: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    place_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    keyword: Option<String>,
}

/// One normalized place row from the gateway.
#[derive(Debug, Deserialize)]
struct NormalizedPlace {
    id: String,
    name: String,
    #[serde(default)]
    category: Option<String>,
    latitude: f64,
    longitude: f64,
    #[serde(default)]
    rating: Option<f32>,
    #[serde(default)]
    review_count: Option<u32>,
    #[serde(default)]
    price_level: Option<u8>,
    #[serde(default)]
    open_now: Option<bool>,
    #[serde(default)]
    address: Option<String>,
    #[serde(default)]
    photo_url: Option<String>,
    #[serde(default)]
    photo_resource: Option<String>,
    #[serde(default)]
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PlacesResponse {
    places: Vec<NormalizedPlace>,
}

impl PlacesRequest {
    fn from_query(query: &PlacesQuery) -> Self {
        Self {
            latitude: query.center.lat,
            longitude: query.center.lng,
            radius_meters: query
                .radius_meters
                .clamp(PLACES_RADIUS_MIN_METERS, PLACES_RADIUS_MAX_METERS),
            max_results: query.max_results.clamp(1, PLACES_MAX_RESULTS),
            place_type: query.types.first().map(|t| t.as_str().to_string()),
            keyword: clamp_keyword(query.keyword.as_deref(), KEYWORD_MIN, KEYWORD_MAX),
        }
    }
}

/// Keywords outside the length window are dropped or truncated rather than
/// rejected — the provider treats them as best-effort hints.
pub(crate) fn clamp_keyword(keyword: Option<&str>, min: usize, max: usize) -> Option<String> {
    let keyword = keyword?.trim();
    if keyword.chars().count() < min {
        return None;
    }
    Some(keyword.chars().take(max).collect())
}

#[async_trait::async_trait]
impl PlacesProvider for HttpPlacesProvider {
    async fn search_places(&self, query: &PlacesQuery) -> Result<Vec<SearchResult>> {
        let request = PlacesRequest::from_query(query);
        debug!(
            radius = request.radius_meters,
            max = request.max_results,
            "places search"
        );

        let url = format!("{}/places/search", self.base_url);
        let resp = self
            .http
            .post(&url)
            .header("x-api-key", &self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ProviderError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let body: PlacesResponse = resp.json().await?;
        Ok(body
            .places
            .into_iter()
            .filter_map(into_result)
            .collect())
    }
}

fn into_result(place: NormalizedPlace) -> Option<SearchResult> {
    let location = GeoPoint::new(place.latitude, place.longitude);
    if !location.is_valid() {
        return None;
    }
    let photo = match (place.photo_url, place.photo_resource) {
        (Some(url), _) => Some(PhotoRef::Url(url)),
        (None, Some(resource)) => Some(PhotoRef::Resource(resource)),
        (None, None) => None,
    };
    Some(SearchResult {
        core: ResultCore {
            id: place.id,
            title: place.name,
            category: place
                .category
                .as_deref()
                .and_then(|c| c.parse().ok())
                .unwrap_or(Category::Other),
            location,
            photo,
            external_url: place.url,
            distance_meters: None,
            score: 0.0,
            reason: None,
        },
        details: ResultDetails::Place(PlaceDetails {
            rating: place.rating,
            review_count: place.review_count,
            price_level: place.price_level.filter(|p| (1..=4).contains(p)),
            open_now: place.open_now,
            address: place.address,
        }),
    })
}
