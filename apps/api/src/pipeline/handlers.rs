use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::AppError;
use crate::pipeline::triggers::AutoApplyReport;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct SubmitNowRequest {
    pub user_id: Uuid,
    pub job_id: Uuid,
}

#[derive(Serialize)]
pub struct QueuedResponse {
    pub task_id: Uuid,
}

#[derive(Deserialize)]
pub struct RetryRequest {
    pub user_id: Option<Uuid>,
}

#[derive(Serialize)]
pub struct RetryResponse {
    pub queued: Vec<Uuid>,
}

#[derive(Deserialize)]
pub struct AutoApplyRequest {
    pub user_id: Uuid,
}

/// POST /api/v1/applications/submit
pub async fn handle_submit_now(
    State(state): State<AppState>,
    Json(req): Json<SubmitNowRequest>,
) -> Result<(StatusCode, Json<QueuedResponse>), AppError> {
    let task_id = state.triggers.submit_now(req.user_id, req.job_id).await?;
    Ok((StatusCode::ACCEPTED, Json(QueuedResponse { task_id })))
}

/// POST /api/v1/applications/retry
pub async fn handle_retry_failed(
    State(state): State<AppState>,
    Json(req): Json<RetryRequest>,
) -> Result<Json<RetryResponse>, AppError> {
    let queued = state.triggers.retry_failed(req.user_id).await?;
    Ok(Json(RetryResponse { queued }))
}

/// POST /api/v1/matches/auto-apply
pub async fn handle_auto_apply(
    State(state): State<AppState>,
    Json(req): Json<AutoApplyRequest>,
) -> Result<Json<AutoApplyReport>, AppError> {
    Ok(Json(state.triggers.auto_apply(req.user_id).await?))
}
