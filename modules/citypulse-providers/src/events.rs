use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use citypulse_common::{
    Category, EventDetails, EventsQuery, GeoPoint, PhotoRef, ResultCore, ResultDetails,
    SearchResult, EVENTS_MAX_RESULTS, EVENTS_RADIUS_MAX_MILES, EVENTS_RADIUS_MIN_MILES,
};

use crate::error::{ProviderError, Result};
use crate::places::clamp_keyword;
use crate::EventsProvider;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(8);
const KEYWORD_MIN: usize = 3;
const KEYWORD_MAX: usize = 60;

/// HTTP client for the normalized ticketing gateway.
pub struct HttpEventsProvider {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HttpEventsProvider {
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

#[derive(Debug, Serialize)]
struct EventsRequest {
    latitude: f64,
    longitude: f64,
    radius_miles: u32,
    max_results: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    start: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    end: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    keyword: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    classification: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NormalizedEvent {
    id: String,
    name: String,
    #[serde(default)]
    category: Option<String>,
    latitude: f64,
    longitude: f64,
    #[serde(default)]
    starts_at: Option<DateTime<Utc>>,
    #[serde(default)]
    ends_at: Option<DateTime<Utc>>,
    #[serde(default)]
    venue: Option<String>,
    #[serde(default)]
    price_min: Option<f64>,
    #[serde(default)]
    price_max: Option<f64>,
    #[serde(default)]
    is_free: Option<bool>,
    #[serde(default)]
    image_url: Option<String>,
    #[serde(default)]
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EventsResponse {
    events: Vec<NormalizedEvent>,
}

impl EventsRequest {
    fn from_query(query: &EventsQuery) -> Self {
        Self {
            latitude: query.center.lat,
            longitude: query.center.lng,
            radius_miles: query
                .radius_miles
                .clamp(EVENTS_RADIUS_MIN_MILES, EVENTS_RADIUS_MAX_MILES),
            max_results: query.max_results.clamp(1, EVENTS_MAX_RESULTS),
            start: query.window.map(|w| w.start),
            end: query.window.map(|w| w.end),
            keyword: clamp_keyword(query.keyword.as_deref(), KEYWORD_MIN, KEYWORD_MAX),
            classification: query.category.map(|c| c.as_str().to_string()),
        }
    }
}

#[async_trait::async_trait]
impl EventsProvider for HttpEventsProvider {
    async fn search_events(&self, query: &EventsQuery) -> Result<Vec<SearchResult>> {
        let request = EventsRequest::from_query(query);
        debug!(
            radius = request.radius_miles,
            max = request.max_results,
            "events search"
        );

        let url = format!("{}/events/search", self.base_url);
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

        let body: EventsResponse = resp.json().await?;
        Ok(body.events.into_iter().filter_map(into_result).collect())
    }
}

fn into_result(event: NormalizedEvent) -> Option<SearchResult> {
    let location = GeoPoint::new(event.latitude, event.longitude);
    if !location.is_valid() {
        return None;
    }
    Some(SearchResult {
        core: ResultCore {
            id: event.id,
            title: event.name,
            category: event
                .category
                .as_deref()
                .and_then(|c| c.parse().ok())
                .unwrap_or(Category::Other),
            location,
            photo: event.image_url.map(PhotoRef::Url),
            external_url: event.url,
            distance_meters: None,
            score: 0.0,
            reason: None,
        },
        details: ResultDetails::Event(EventDetails {
            starts_at: event.starts_at,
            ends_at: event.ends_at,
            venue: event.venue,
            price_min: event.price_min,
            price_max: event.price_max,
            is_free: event.is_free,
        }),
    })
}
