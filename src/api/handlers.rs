//! JSON endpoint handlers.

use super::envelope::ApiResponse;
use crate::error::ApiError;
use crate::filter::{parse_limit, FilterParams};
use crate::pipeline::process_upload;
use crate::problems::analyze_problems;
use crate::reports;
use crate::store::{AnalysisStore, StoredAnalysis};
use crate::types::Dataset;
use crate::upload::UploadError;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Multipart, Path, Query, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppContext {
    /// The active dataset. Loaded once at startup and never mutated.
    pub dataset: Arc<Dataset>,
    pub store: AnalysisStore,
    pub upload_dir: PathBuf,
}

impl AppContext {
    pub fn new(dataset: Dataset, store: AnalysisStore, upload_dir: PathBuf) -> Self {
        Self { dataset: Arc::new(dataset), store, upload_dir }
    }

    fn analysis(&self, analysis_id: &str) -> Result<Arc<StoredAnalysis>, ApiError> {
        self.store
            .get(analysis_id)
            .ok_or_else(|| ApiError::AnalysisNotFound(analysis_id.to_string()))
    }
}

type ApiResult = Result<Response, ApiError>;

#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<String>,
}

fn query<T>(q: Result<Query<T>, QueryRejection>) -> Result<T, ApiError> {
    q.map(|Query(v)| v).map_err(|e| ApiError::BadRequest(e.body_text()))
}

/// Validate the filter parameters and apply them to the active dataset.
fn filtered(ctx: &AppContext, params: &FilterParams) -> Result<Dataset, ApiError> {
    let filter = params.validate()?;
    Ok(filter.apply(&ctx.dataset))
}

// ============================================================================
// Active dataset
// ============================================================================

pub async fn get_metrics(State(ctx): State<AppContext>) -> Response {
    ApiResponse::ok(reports::metrics(&ctx.dataset))
}

pub async fn get_category_distribution(State(ctx): State<AppContext>) -> Response {
    ApiResponse::ok(reports::category_distribution(&ctx.dataset))
}

pub async fn get_urgency_distribution(State(ctx): State<AppContext>) -> Response {
    ApiResponse::ok(reports::urgency_distribution(&ctx.dataset))
}

pub async fn get_temporal_trends(State(ctx): State<AppContext>) -> Response {
    ApiResponse::ok(reports::temporal_trends(&ctx.dataset))
}

pub async fn get_priority_cases(
    State(ctx): State<AppContext>,
    q: Result<Query<LimitQuery>, QueryRejection>,
) -> ApiResult {
    let limit = parse_limit(&query(q)?.limit)?;
    Ok(ApiResponse::ok(reports::priority_cases(&ctx.dataset, limit)))
}

pub async fn get_dashboard_problems(State(ctx): State<AppContext>) -> Response {
    ApiResponse::ok(analyze_problems(&ctx.dataset, Utc::now()))
}

// ============================================================================
// Filtered views
// ============================================================================

pub async fn get_filtered_data(
    State(ctx): State<AppContext>,
    q: Result<Query<FilterParams>, QueryRejection>,
) -> ApiResult {
    let data = filtered(&ctx, &query(q)?)?;
    Ok(ApiResponse::ok(data.records))
}

pub async fn get_filtered_metrics(
    State(ctx): State<AppContext>,
    q: Result<Query<FilterParams>, QueryRejection>,
) -> ApiResult {
    let data = filtered(&ctx, &query(q)?)?;
    Ok(ApiResponse::ok(reports::metrics(&data)))
}

pub async fn get_filtered_priority_cases(
    State(ctx): State<AppContext>,
    q: Result<Query<FilterParams>, QueryRejection>,
) -> ApiResult {
    let params = query(q)?;
    let limit = params.limit()?;
    let data = filtered(&ctx, &params)?;
    Ok(ApiResponse::ok(reports::priority_cases(&data, limit)))
}

pub async fn get_filtered_category_distribution(
    State(ctx): State<AppContext>,
    q: Result<Query<FilterParams>, QueryRejection>,
) -> ApiResult {
    let data = filtered(&ctx, &query(q)?)?;
    Ok(ApiResponse::ok(reports::category_distribution(&data)))
}

pub async fn get_filtered_urgency_distribution(
    State(ctx): State<AppContext>,
    q: Result<Query<FilterParams>, QueryRejection>,
) -> ApiResult {
    let data = filtered(&ctx, &query(q)?)?;
    Ok(ApiResponse::ok(reports::urgency_distribution(&data)))
}

pub async fn get_filtered_temporal_trends(
    State(ctx): State<AppContext>,
    q: Result<Query<FilterParams>, QueryRejection>,
) -> ApiResult {
    let data = filtered(&ctx, &query(q)?)?;
    Ok(ApiResponse::ok(reports::temporal_trends(&data)))
}

// ============================================================================
// Uploads
// ============================================================================

#[derive(Debug, Serialize)]
struct UploadResponse<'a> {
    success: bool,
    analysis_id: &'a str,
    data: &'a crate::analyzer::AnalysisResult,
}

pub async fn upload_dataset(State(ctx): State<AppContext>, mut multipart: Multipart) -> ApiResult {
    let mut upload: Option<(String, Vec<u8>)> = None;
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().unwrap_or_default().to_string();
        let bytes = field.bytes().await?;
        upload = Some((file_name, bytes.to_vec()));
    }
    let (file_name, bytes) = upload.ok_or(UploadError::MissingFile)?;

    let analysis_id = Uuid::new_v4().to_string();
    let upload_dir = ctx.upload_dir.clone();
    let id = analysis_id.clone();
    let stored = tokio::task::spawn_blocking(move || process_upload(&id, &file_name, &bytes, Some(&upload_dir)))
        .await??;

    let stored = ctx.store.insert(stored);
    info!(analysis_id = %analysis_id, stored = ctx.store.len(), "analysis stored");
    let body = UploadResponse { success: true, analysis_id: &analysis_id, data: &stored.result };
    Ok(Json(body).into_response())
}

#[derive(Debug, Deserialize)]
pub struct GenerateReportRequest {
    pub analysis_id: String,
    #[serde(default = "default_report_type")]
    pub report_type: String,
}

fn default_report_type() -> String {
    "full".to_string()
}

#[derive(Debug, Serialize)]
struct GenerateReportResponse {
    success: bool,
    report_id: String,
    analysis_id: String,
    report_type: String,
    dashboard_url: String,
}

pub async fn generate_report(
    State(ctx): State<AppContext>,
    body: Result<Json<GenerateReportRequest>, JsonRejection>,
) -> ApiResult {
    let Json(req) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    ctx.analysis(&req.analysis_id)?;
    let report_id = Uuid::new_v4().to_string();
    info!(analysis_id = %req.analysis_id, %report_id, report_type = %req.report_type, "report requested");
    Ok(Json(GenerateReportResponse {
        success: true,
        report_id,
        dashboard_url: format!("/dashboard/custom/{}", req.analysis_id),
        analysis_id: req.analysis_id,
        report_type: req.report_type,
    })
    .into_response())
}

pub async fn get_custom_metrics(State(ctx): State<AppContext>, Path(analysis_id): Path<String>) -> ApiResult {
    let stored = ctx.analysis(&analysis_id)?;
    Ok(ApiResponse::ok(stored.result.custom_metrics()))
}

pub async fn get_custom_problems(State(ctx): State<AppContext>, Path(analysis_id): Path<String>) -> ApiResult {
    let stored = ctx.analysis(&analysis_id)?;
    Ok(ApiResponse::ok(analyze_problems(&stored.dataset, Utc::now())))
}

// ============================================================================
// Health
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthInfo {
    pub status: &'static str,
    pub records: usize,
    pub stored_analyses: u64,
    pub version: &'static str,
}

pub async fn get_health(State(ctx): State<AppContext>) -> Response {
    ApiResponse::ok(HealthInfo {
        status: "ok",
        records: ctx.dataset.len(),
        stored_analyses: ctx.store.len(),
        version: env!("CARGO_PKG_VERSION"),
    })
}
