//! Thin HTTP adapter over the search engine. The search handler never
//! returns an error to the client: malformed bodies and internal failures
//! degrade to an empty, well-formed envelope.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use citypulse_common::{Feature, GeoPoint, IntentKind, SearchResult, UserContext};
use citypulse_engine::{health, SearchOutcome, SearchRequest, UxFeedback};

use crate::AppState;

// --- Request body ---

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchBody {
    #[serde(default)]
    query: String,
    user_context: Option<UserContextBody>,
    radius_miles: Option<f64>,
    limit: Option<usize>,
    offset: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserContextBody {
    timezone: Option<String>,
    now_iso: Option<DateTime<Utc>>,
    current_location: Option<LocationBody>,
}

#[derive(Debug, Deserialize)]
struct LocationBody {
    latitude: f64,
    longitude: f64,
}

// --- Response body ---

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponseBody {
    results: Vec<SearchResult>,
    meta: MetaBody,
    pagination: PaginationBody,
    #[serde(skip_serializing_if = "Option::is_none")]
    feedback: Option<UxFeedback>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MetaBody {
    intent_type: IntentKind,
    used_providers: Vec<&'static str>,
    used_ai: bool,
    cache_hit: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PaginationBody {
    total: usize,
    offset: usize,
    limit: usize,
    has_more: bool,
}

impl SearchResponseBody {
    fn from_outcome(outcome: SearchOutcome) -> Self {
        let has_more = outcome.offset + outcome.results.len() < outcome.total;
        let feedback = if outcome.feedback.message.is_some() || !outcome.feedback.chips.is_empty()
        {
            Some(outcome.feedback)
        } else {
            None
        };
        Self {
            results: outcome.results,
            meta: MetaBody {
                intent_type: outcome.meta.intent_kind,
                used_providers: outcome.meta.used_providers,
                used_ai: outcome.meta.used_model,
                cache_hit: outcome.meta.cache_hit,
            },
            pagination: PaginationBody {
                total: outcome.total,
                offset: outcome.offset,
                limit: outcome.limit,
                has_more,
            },
            feedback,
        }
    }

    fn empty() -> Self {
        Self {
            results: Vec::new(),
            meta: MetaBody {
                intent_type: IntentKind::Both,
                used_providers: Vec::new(),
                used_ai: false,
                cache_hit: false,
            },
            pagination: PaginationBody {
                total: 0,
                offset: 0,
                limit: 20,
                has_more: false,
            },
            feedback: None,
        }
    }
}

// --- Handlers ---

pub async fn search(
    State(state): State<Arc<AppState>>,
    body: Result<Json<SearchBody>, JsonRejection>,
) -> Json<SearchResponseBody> {
    let body = match body {
        Ok(Json(body)) => body,
        Err(rejection) => {
            warn!(error = %rejection, "malformed search body");
            return Json(SearchResponseBody::empty());
        }
    };

    let context = match body.user_context {
        Some(user) => UserContext {
            location: user
                .current_location
                .map(|l| GeoPoint::new(l.latitude, l.longitude)),
            timezone: user.timezone.unwrap_or_else(|| "UTC".to_string()),
            now: user.now_iso.unwrap_or_else(Utc::now),
        },
        None => UserContext {
            location: None,
            timezone: "UTC".to_string(),
            now: Utc::now(),
        },
    };

    let request_id = uuid::Uuid::new_v4();

    let outcome = state
        .engine
        .search(SearchRequest {
            query: body.query,
            context,
            radius_miles: body.radius_miles,
            limit: body.limit,
            offset: body.offset.unwrap_or(0),
        })
        .await;

    tracing::info!(
        %request_id,
        total = outcome.total,
        cache_hit = outcome.meta.cache_hit,
        used_ai = outcome.meta.used_model,
        "search served"
    );
    Json(SearchResponseBody::from_outcome(outcome))
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<health::HealthReport> {
    let [places, events] = state.engine.breakers();
    let report = health::assess(
        &[places, events],
        &state.engine.metrics(),
        state.engine.cache_entries(),
    );
    Json(report)
}

pub async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.engine.metrics().snapshot())
}

pub async fn diagnostics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let now = Utc::now();
    let [places, events] = state.engine.breakers();
    let report = health::assess(
        &[places, events],
        &state.engine.metrics(),
        state.engine.cache_entries(),
    );
    Json(serde_json::json!({
        "health": report,
        "metrics": state.engine.metrics().snapshot(),
        "modelCost": state.engine.model_cost_report(now),
        "providerCosts": state.engine.cost_reports(now),
        "featureFlags": state.engine.flags().snapshot(),
    }))
}

pub async fn get_flags(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(serde_json::json!(state.engine.flags().snapshot()))
}

#[derive(Debug, Deserialize)]
pub struct FlagUpdate {
    name: String,
    enabled: bool,
}

pub async fn set_flag(
    State(state): State<Arc<AppState>>,
    Json(update): Json<FlagUpdate>,
) -> impl IntoResponse {
    match update.name.parse::<Feature>() {
        Ok(feature) => {
            state.engine.flags().set(feature, update.enabled);
            tracing::info!(flag = %feature, enabled = update.enabled, "feature flag updated");
            Json(serde_json::json!(state.engine.flags().snapshot())).into_response()
        }
        Err(_) => (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": format!("unknown flag: {}", update.name) })),
        )
            .into_response(),
    }
}
