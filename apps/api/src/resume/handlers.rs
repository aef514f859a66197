use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::job::JobTarget;
use crate::models::resume::{Resume, ResumeComparison};
use crate::resume::CustomizedResume;
use crate::routes::UserIdQuery;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct CustomizeRequest {
    pub user_id: Uuid,
    pub job_id: Option<Uuid>,
    pub job_title: String,
    pub company_name: String,
    pub job_description: String,
}

/// POST /api/v1/resumes
pub async fn handle_customize(
    State(state): State<AppState>,
    Json(req): Json<CustomizeRequest>,
) -> Result<(StatusCode, Json<CustomizedResume>), AppError> {
    let target = JobTarget {
        job_id: req.job_id,
        title: req.job_title,
        company: req.company_name,
        description: req.job_description,
    };
    let customized = state.customizer.customize(req.user_id, &target).await?;
    Ok((StatusCode::CREATED, Json(customized)))
}

/// GET /api/v1/resumes
pub async fn handle_list_resumes(
    State(state): State<AppState>,
    Query(params): Query<UserIdQuery>,
) -> Result<Json<Vec<Resume>>, AppError> {
    let resumes = state.customizer.list(params.user_id).await?;
    Ok(Json(resumes))
}

/// GET /api/v1/resumes/:id
pub async fn handle_get_resume(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<UserIdQuery>,
) -> Result<Json<Resume>, AppError> {
    let resume = state.customizer.get(params.user_id, id).await?;
    Ok(Json(resume))
}

/// GET /api/v1/resumes/:id/compare/:other_id
pub async fn handle_compare_resumes(
    State(state): State<AppState>,
    Path((id, other_id)): Path<(Uuid, Uuid)>,
    Query(params): Query<UserIdQuery>,
) -> Result<Json<ResumeComparison>, AppError> {
    let comparison = state
        .customizer
        .compare(params.user_id, id, other_id)
        .await?;
    Ok(Json(comparison))
}
