//! HTML page shells. The charts are drawn client-side from the JSON API.

use super::handlers::AppContext;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};

const DASHBOARD_HTML: &str = include_str!("../../templates/dashboard.html");
const UPLOAD_HTML: &str = include_str!("../../templates/upload.html");
const CUSTOM_DASHBOARD_HTML: &str = include_str!("../../templates/custom_dashboard.html");

const ANALYSIS_ID_PLACEHOLDER: &str = "{{analysis_id}}";

pub async fn dashboard() -> Html<&'static str> {
    Html(DASHBOARD_HTML)
}

pub async fn upload_page() -> Html<&'static str> {
    Html(UPLOAD_HTML)
}

/// Unknown or expired analyses send the browser back to the upload page.
pub async fn custom_dashboard(State(ctx): State<AppContext>, Path(analysis_id): Path<String>) -> Response {
    if !ctx.store.contains(&analysis_id) {
        return (StatusCode::FOUND, [(header::LOCATION, "/upload")]).into_response();
    }
    Html(CUSTOM_DASHBOARD_HTML.replace(ANALYSIS_ID_PLACEHOLDER, &analysis_id)).into_response()
}
