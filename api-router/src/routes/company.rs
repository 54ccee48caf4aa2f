use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use common::storage::{entity_store::ProcessingStatus, types::EntityId};
use serde::Serialize;

use crate::{api_state::ApiState, error::ApiError};

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: ProcessingStatus,
    pub company_id: String,
}

pub async fn get_status(
    State(state): State<ApiState>,
    Path(company_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let entity_id = EntityId::parse(&company_id)?;
    let status = state.store.status(&entity_id).await?;

    Ok(Json(StatusResponse {
        status,
        company_id: entity_id.to_string(),
    }))
}

pub async fn get_metrics(
    State(state): State<ApiState>,
    Path(company_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let entity_id = EntityId::parse(&company_id)?;
    let metrics = state
        .store
        .get_metrics(&entity_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("No metrics extracted for {entity_id} yet")))?;

    Ok(Json(metrics))
}

pub async fn get_evidence(
    State(state): State<ApiState>,
    Path(company_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let entity_id = EntityId::parse(&company_id)?;
    let csv = state
        .store
        .get_evidence(&entity_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("No verification evidence for {entity_id}")))?;

    let disposition = format!("attachment; filename=\"{entity_id}_verification_evidence.csv\"");
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        csv,
    ))
}

pub async fn create_report(
    State(state): State<ApiState>,
    Path(company_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let entity_id = EntityId::parse(&company_id)?;
    let report = state.analysis.produce_report_for_entity(&entity_id).await?;

    Ok(Json(report))
}
