use std::sync::Arc;

use anyhow::Result;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use ai_client::Claude;
use citypulse_common::{Config, FeatureFlags};
use citypulse_engine::{EngineConfig, GeoTable, SearchEngine};
use citypulse_intent::HybridClassifier;
use citypulse_providers::{HttpEventsProvider, HttpPlacesProvider};

mod rest;

pub struct AppState {
    pub engine: SearchEngine,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("citypulse=info".parse()?))
        .init();

    let config = Config::from_env();
    config.log_redacted();

    let places = Arc::new(HttpPlacesProvider::new(
        config.places_api_url.clone(),
        config.places_api_key.clone(),
    ));
    let events = Arc::new(HttpEventsProvider::new(
        config.events_api_url.clone(),
        config.events_api_key.clone(),
    ));

    let model = if config.anthropic_api_key.is_empty() {
        None
    } else {
        Some(Claude::new(
            config.anthropic_api_key.clone(),
            config.classifier_model.clone(),
        ))
    };
    let classifier = HybridClassifier::new(model);

    let flags = Arc::new(FeatureFlags::from_env());
    let engine = SearchEngine::new(
        places,
        events,
        GeoTable::builtin(),
        classifier,
        flags,
        EngineConfig::from(&config),
    );

    let state = Arc::new(AppState { engine });

    let app = Router::new()
        .route("/api/search", post(rest::search))
        .route("/health", get(rest::health))
        .route("/metrics", get(rest::metrics))
        .route("/diagnostics", get(rest::diagnostics))
        .route(
            "/diagnostics/flags",
            get(rest::get_flags).put(rest::set_flag),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    let addr = format!("{}:{}", config.web_host, config.web_port);
    tracing::info!(%addr, "citypulse api listening");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
