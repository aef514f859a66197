use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::job::{JobMatch, MatchedJob};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct MatchesQuery {
    pub user_id: Uuid,
    pub min_score: Option<i32>,
}

#[derive(Deserialize)]
pub struct TopMatchesQuery {
    pub user_id: Uuid,
    pub limit: Option<i64>,
}

#[derive(Deserialize)]
pub struct UserRequest {
    pub user_id: Uuid,
}

#[derive(Serialize)]
pub struct RefilterResponse {
    pub scored: usize,
}

/// GET /api/v1/matches
pub async fn handle_list_matches(
    State(state): State<AppState>,
    Query(params): Query<MatchesQuery>,
) -> Result<Json<Vec<MatchedJob>>, AppError> {
    let matches = state
        .scorer
        .matched_jobs(params.user_id, params.min_score)
        .await?;
    Ok(Json(matches))
}

/// GET /api/v1/matches/top
pub async fn handle_top_matches(
    State(state): State<AppState>,
    Query(params): Query<TopMatchesQuery>,
) -> Result<Json<Vec<MatchedJob>>, AppError> {
    let matches = state
        .scorer
        .top_matches(params.user_id, params.limit)
        .await?;
    Ok(Json(matches))
}

/// POST /api/v1/matches/refilter
///
/// Scores every job the user has not been matched against yet.
pub async fn handle_refilter(
    State(state): State<AppState>,
    Json(req): Json<UserRequest>,
) -> Result<Json<RefilterResponse>, AppError> {
    let scored = state.scorer.score_all(req.user_id).await?;
    Ok(Json(RefilterResponse {
        scored: scored.len(),
    }))
}

/// POST /api/v1/matches/:job_id/score
///
/// Scores one job; an existing match is returned as stored.
pub async fn handle_score_job(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
    Json(req): Json<UserRequest>,
) -> Result<Json<JobMatch>, AppError> {
    let scored = state.scorer.score_job(req.user_id, job_id).await?;
    Ok(Json(scored))
}
