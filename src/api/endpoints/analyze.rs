//! `POST /analyze`: classify an uploaded MRI scan and attach a report.

use axum::extract::multipart::{Multipart, MultipartRejection};
use axum::extract::State;
use axum::Json;

use crate::api::error::{ApiError, UploadError};
use crate::api::types::{AnalysisResponse, ApiContext};

/// Multipart field carrying the image.
pub const FILE_FIELD: &str = "file";

/// One scan in, verdict + narrative out.
///
/// Pipeline failures come back as `200 { "error": ... }`; only a missing or
/// unreadable upload is a 4xx.
pub async fn analyze(
    State(ctx): State<ApiContext>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<AnalysisResponse>, ApiError> {
    let mut multipart = multipart.map_err(UploadError::from)?;
    let image_bytes = read_file_field(&mut multipart).await?;

    let analysis = ctx.analyzer.analyze(image_bytes).await?;
    Ok(Json(analysis.into()))
}

/// Read the whole `file` field into memory. Other fields are skipped.
async fn read_file_field(multipart: &mut Multipart) -> Result<Vec<u8>, UploadError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some(FILE_FIELD) {
            let filename = field.file_name().unwrap_or("upload").to_string();
            let bytes = field.bytes().await?;
            tracing::debug!(filename = %filename, size = bytes.len(), "Scan received");
            return Ok(bytes.to_vec());
        }
    }
    Err(UploadError::MissingFile)
}
