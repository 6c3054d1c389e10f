//! HTTP-facing error type. Every handler failure funnels through [`ApiError`]
//! so clients always receive the `{success: false, error}` envelope.

use crate::api::envelope::ApiErrorResponse;
use crate::filter::{DateRangeError, InvalidLimit};
use crate::pipeline::PipelineError;
use crate::upload::UploadError;
use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    DateRange(#[from] DateRangeError),
    #[error(transparent)]
    InvalidLimit(#[from] InvalidLimit),
    #[error(transparent)]
    Upload(#[from] UploadError),
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    #[error("invalid upload: {0}")]
    Multipart(#[from] MultipartError),
    #[error("{0}")]
    BadRequest(String),
    #[error("analysis '{0}' not found")]
    AnalysisNotFound(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::DateRange(_) | ApiError::InvalidLimit(_) | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Upload(UploadError::Io(_)) | ApiError::Pipeline(PipelineError::Upload(UploadError::Io(_))) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ApiError::Upload(_) | ApiError::Pipeline(_) => StatusCode::BAD_REQUEST,
            // Carries 413 when the body limit was hit.
            ApiError::Multipart(e) => e.status(),
            ApiError::AnalysisNotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, "request failed");
        }
        let message = match status {
            StatusCode::PAYLOAD_TOO_LARGE => "the uploaded file exceeds the maximum allowed size".to_string(),
            _ => self.to_string(),
        };
        ApiErrorResponse::with_status(status, message)
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(e: tokio::task::JoinError) -> Self {
        ApiError::Internal(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_status_mapping_and_body() {
        let err = ApiError::from(DateRangeError::YearOutOfRange { field: "fecha_inicio", year: 2019 });
        let resp = err.into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let v: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(v["success"], false);
        assert!(v["error"].as_str().unwrap().contains("2019"));
    }

    #[test]
    fn test_statuses() {
        assert_eq!(ApiError::AnalysisNotFound("x".into()).status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::from(UploadError::Unreadable).status(), StatusCode::BAD_REQUEST);
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
        assert_eq!(ApiError::from(UploadError::Io(io)).status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(ApiError::from(InvalidLimit("abc".into())).status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::Internal("boom".into()).status(), StatusCode::INTERNAL_SERVER_ERROR);
        let pipeline = PipelineError::Upload(UploadError::UnsupportedFormat("txt".into()));
        assert_eq!(ApiError::from(pipeline).status(), StatusCode::BAD_REQUEST);
    }
}
