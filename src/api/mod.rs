//! HTTP surface built on axum.
//!
//! JSON endpoints live under `/api`, the HTML shells at the root, and static
//! assets are served from the configured directory under `/static`.

pub mod envelope;
pub mod handlers;
mod pages;
mod routes;

pub use handlers::AppContext;

use crate::config::AppConfig;
use crate::store::AnalysisStore;
use crate::types::Dataset;
use axum::http::{header, Method};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

/// Same-origin by default; `REPORTS_CORS_ORIGINS` lists extra allowed origins.
fn build_cors_layer() -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);
    match std::env::var("REPORTS_CORS_ORIGINS") {
        Ok(origins) => {
            let allowed: Vec<_> = origins.split(',').filter_map(|o| o.trim().parse().ok()).collect();
            tracing::info!(origins = %origins, "CORS: allowing configured origins");
            layer.allow_origin(allowed)
        }
        Err(_) => layer,
    }
}

/// Build the application context from configuration and a loaded dataset.
pub fn build_context(config: &AppConfig, dataset: Dataset) -> AppContext {
    let store = AnalysisStore::new(config.store_capacity, config.store_ttl);
    AppContext::new(dataset, store, config.upload_dir.clone())
}

/// Create the complete application router.
pub fn create_app(state: AppContext, config: &AppConfig) -> Router {
    Router::new()
        .nest("/api", routes::api_routes(state.clone(), config.max_upload_bytes))
        .merge(routes::page_routes(state))
        .nest_service("/static", ServeDir::new(&config.static_dir))
        .layer(TraceLayer::new_for_http())
        .layer(build_cors_layer())
}
