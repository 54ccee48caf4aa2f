use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use axum_typed_multipart::{FieldData, TryFromMultipart, TypedMultipart};
use bytes::Bytes;
use serde::Serialize;
use tracing::info;

use crate::{api_state::ApiState, error::ApiError};

const UPLOAD_ACCEPTED: &str = "File uploaded. Processing in background.";

#[derive(Debug, TryFromMultipart)]
pub struct UploadParams {
    #[form_data(limit = "unlimited")]
    pub file: FieldData<Bytes>,
    pub company_id: Option<String>,
    pub period: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub message: &'static str,
    pub company_id: String,
    pub path: String,
}

pub async fn upload_filing(
    State(state): State<ApiState>,
    TypedMultipart(input): TypedMultipart<UploadParams>,
) -> Result<impl IntoResponse, ApiError> {
    let filename = input
        .file
        .metadata
        .file_name
        .clone()
        .unwrap_or_default();

    info!(
        filename = %filename,
        file_bytes = input.file.contents.len(),
        company_hint = input.company_id.as_deref().unwrap_or(""),
        period = input.period.as_deref().unwrap_or(""),
        "Received upload request"
    );

    let receipt = state
        .intake
        .submit(input.file.contents, &filename, input.company_id.as_deref())
        .await?;

    Ok((
        StatusCode::OK,
        Json(UploadResponse {
            message: UPLOAD_ACCEPTED,
            company_id: receipt.entity_id.to_string(),
            path: receipt.location,
        }),
    ))
}
