use axum::{extract::State, response::IntoResponse, Json};
use common::storage::types::EntityId;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{api_state::ApiState, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct AnalysisRequest {
    pub company_id: String,
    pub question: String,
}

#[derive(Debug, Serialize)]
pub struct AnalysisResponse {
    pub analysis: String,
}

pub async fn analyze_company(
    State(state): State<ApiState>,
    Json(request): Json<AnalysisRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let entity_id = EntityId::parse(&request.company_id)?;
    let question = request.question.trim();
    if question.is_empty() {
        return Err(ApiError::ValidationError("Question must not be empty".into()));
    }

    info!(%entity_id, question_chars = question.len(), "Received analysis request");

    let analysis = state.analysis.answer(&entity_id, question).await?;

    Ok(Json(AnalysisResponse { analysis }))
}
