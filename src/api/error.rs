//! API error types with JSON `{ "error": ... }` bodies.
//!
//! Two families:
//! - Request-shape problems (`UploadError`) → 4xx, the pipeline never ran.
//! - Pipeline failures (`AnalysisError`) → 200 with an error body. Existing
//!   frontends key off the body shape, not the status.

use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::pipeline::AnalysisError;

/// Error response body. Carries no success fields.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

/// The upload itself could not be read.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("No file provided. Send the image in a multipart field named 'file'.")]
    MissingFile,
    #[error("Invalid multipart request: {message}")]
    Multipart { status: StatusCode, message: String },
}

impl From<MultipartError> for UploadError {
    fn from(err: MultipartError) -> Self {
        UploadError::Multipart {
            status: err.status(),
            message: err.body_text(),
        }
    }
}

impl From<MultipartRejection> for UploadError {
    fn from(rejection: MultipartRejection) -> Self {
        UploadError::Multipart {
            status: rejection.status(),
            message: rejection.body_text(),
        }
    }
}

/// Everything an endpoint can fail with.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Upload(#[from] UploadError),
    #[error(transparent)]
    Analysis(#[from] AnalysisError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Upload(UploadError::MissingFile) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Upload(UploadError::Multipart { status, message }) => {
                tracing::warn!(%status, %message, "Rejected upload");
                // Body limit overruns keep their 413; other parse failures are 422
                if *status == StatusCode::PAYLOAD_TOO_LARGE {
                    *status
                } else {
                    StatusCode::UNPROCESSABLE_ENTITY
                }
            }
            ApiError::Analysis(err) => {
                tracing::warn!(kind = err.kind(), error = %err, "Analysis failed");
                StatusCode::OK
            }
        };

        let body = ErrorBody {
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
