//! Route table.
//!
//! - /api/* - JSON endpoints over the active dataset and uploaded analyses
//! - /, /upload, /dashboard/custom/:analysis_id - HTML shells

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;

use super::handlers::{self, AppContext};
use super::pages;

/// JSON endpoints, mounted under `/api`.
pub fn api_routes(state: AppContext, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/health", get(handlers::get_health))
        .route("/metrics", get(handlers::get_metrics))
        .route("/category-distribution", get(handlers::get_category_distribution))
        .route("/urgency-distribution", get(handlers::get_urgency_distribution))
        .route("/temporal-trends", get(handlers::get_temporal_trends))
        .route("/priority-cases", get(handlers::get_priority_cases))
        .route("/dashboard-problems", get(handlers::get_dashboard_problems))
        // Filtered views
        .route("/filtered-data", get(handlers::get_filtered_data))
        .route("/filtered-metrics", get(handlers::get_filtered_metrics))
        .route("/filtered-priority-cases", get(handlers::get_filtered_priority_cases))
        .route("/filtered-category-distribution", get(handlers::get_filtered_category_distribution))
        .route("/filtered-urgency-distribution", get(handlers::get_filtered_urgency_distribution))
        .route("/filtered-temporal-trends", get(handlers::get_filtered_temporal_trends))
        // Uploads
        .route(
            "/upload-dataset",
            post(handlers::upload_dataset).layer(DefaultBodyLimit::max(max_upload_bytes)),
        )
        .route("/generate-report", post(handlers::generate_report))
        .route("/custom-metrics/:analysis_id", get(handlers::get_custom_metrics))
        .route("/custom-problems/:analysis_id", get(handlers::get_custom_problems))
        .with_state(state)
}

pub fn page_routes(state: AppContext) -> Router {
    Router::new()
        .route("/", get(pages::dashboard))
        .route("/upload", get(pages::upload_page))
        .route("/dashboard/custom/:analysis_id", get(pages::custom_dashboard))
        .with_state(state)
}
