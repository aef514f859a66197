pub mod health;

use axum::{
    routing::{get, patch, post},
    Router,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::applications::handlers as applications;
use crate::ledger::handlers as credits;
use crate::matching::handlers as matches;
use crate::pipeline::handlers as pipeline;
use crate::resume::handlers as resumes;
use crate::state::AppState;

/// Caller identity. Authentication lives in front of this service.
#[derive(Deserialize)]
pub struct UserIdQuery {
    pub user_id: Uuid,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Credits
        .route("/api/v1/credits", get(credits::handle_get_credits))
        .route("/api/v1/credits/accounts", post(credits::handle_open_account))
        .route("/api/v1/credits/grant", post(credits::handle_grant))
        .route("/api/v1/credits/debit", post(credits::handle_debit))
        // Matches
        .route("/api/v1/matches", get(matches::handle_list_matches))
        .route("/api/v1/matches/top", get(matches::handle_top_matches))
        .route("/api/v1/matches/refilter", post(matches::handle_refilter))
        .route("/api/v1/matches/auto-apply", post(pipeline::handle_auto_apply))
        .route("/api/v1/matches/:job_id/score", post(matches::handle_score_job))
        // Resumes
        .route(
            "/api/v1/resumes",
            get(resumes::handle_list_resumes).post(resumes::handle_customize),
        )
        .route("/api/v1/resumes/:id", get(resumes::handle_get_resume))
        .route(
            "/api/v1/resumes/:id/compare/:other_id",
            get(resumes::handle_compare_resumes),
        )
        // Applications
        .route(
            "/api/v1/applications",
            get(applications::handle_list_applications).post(applications::handle_register),
        )
        .route("/api/v1/applications/stats", get(applications::handle_stats))
        .route(
            "/api/v1/applications/retryable",
            get(applications::handle_retryable),
        )
        .route("/api/v1/applications/submit", post(pipeline::handle_submit_now))
        .route("/api/v1/applications/retry", post(pipeline::handle_retry_failed))
        .route(
            "/api/v1/applications/:id",
            get(applications::handle_get_application),
        )
        .route(
            "/api/v1/applications/:id/status",
            patch(applications::handle_update_status),
        )
        .route(
            "/api/v1/applications/:id/failure",
            post(applications::handle_record_failure),
        )
        .with_state(state)
}
