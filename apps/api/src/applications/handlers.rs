use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::application::{
    Application, ApplicationStats, ApplicationStatus, NewApplication, ResponseStatus,
};
use crate::routes::UserIdQuery;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct ListQuery {
    pub user_id: Uuid,
    pub status: Option<ApplicationStatus>,
}

#[derive(Deserialize)]
pub struct StatusUpdate {
    pub status: ApplicationStatus,
    pub response_status: Option<ResponseStatus>,
}

#[derive(Deserialize)]
pub struct FailureReport {
    pub error_message: String,
}

/// GET /api/v1/applications
pub async fn handle_list_applications(
    State(state): State<AppState>,
    Query(params): Query<ListQuery>,
) -> Result<Json<Vec<Application>>, AppError> {
    let applications = state
        .registrar
        .list(params.user_id, params.status)
        .await?;
    Ok(Json(applications))
}

/// GET /api/v1/applications/stats
pub async fn handle_stats(
    State(state): State<AppState>,
    Query(params): Query<UserIdQuery>,
) -> Result<Json<ApplicationStats>, AppError> {
    Ok(Json(state.registrar.stats(params.user_id).await?))
}

/// GET /api/v1/applications/retryable
pub async fn handle_retryable(
    State(state): State<AppState>,
    Query(params): Query<UserIdQuery>,
) -> Result<Json<Vec<Application>>, AppError> {
    let ready = state
        .registrar
        .ready_for_retry(Some(params.user_id))
        .await?;
    Ok(Json(ready))
}

/// POST /api/v1/applications
///
/// Registers and charges in one step. 409 if the job was already applied to.
pub async fn handle_register(
    State(state): State<AppState>,
    Json(req): Json<NewApplication>,
) -> Result<(StatusCode, Json<Application>), AppError> {
    let application = state.registrar.register(&req).await?;
    Ok((StatusCode::CREATED, Json(application)))
}

/// GET /api/v1/applications/:id
pub async fn handle_get_application(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Application>, AppError> {
    Ok(Json(state.registrar.find(id).await?))
}

/// PATCH /api/v1/applications/:id/status
pub async fn handle_update_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<StatusUpdate>,
) -> Result<Json<Application>, AppError> {
    let application = state
        .registrar
        .transition(id, req.status, req.response_status)
        .await?;
    Ok(Json(application))
}

/// POST /api/v1/applications/:id/failure
///
/// Reported by the submission channel when a platform bounces an application.
pub async fn handle_record_failure(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<FailureReport>,
) -> Result<Json<Application>, AppError> {
    if req.error_message.trim().is_empty() {
        return Err(AppError::Validation(
            "error_message must not be empty".to_string(),
        ));
    }
    let application = state
        .registrar
        .record_failure(id, req.error_message.trim())
        .await?;
    Ok(Json(application))
}
