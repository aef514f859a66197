use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::credit::CreditAccount;
use crate::routes::UserIdQuery;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct OpenAccountRequest {
    pub user_id: Uuid,
}

#[derive(Deserialize)]
pub struct AmountRequest {
    pub user_id: Uuid,
    pub amount: i32,
}

#[derive(Serialize)]
pub struct BalanceResponse {
    pub user_id: Uuid,
    pub balance: i32,
}

/// GET /api/v1/credits
pub async fn handle_get_credits(
    State(state): State<AppState>,
    Query(params): Query<UserIdQuery>,
) -> Result<Json<CreditAccount>, AppError> {
    let account = state.ledger.account(params.user_id).await?;
    Ok(Json(account))
}

/// POST /api/v1/credits/accounts
pub async fn handle_open_account(
    State(state): State<AppState>,
    Json(req): Json<OpenAccountRequest>,
) -> Result<(StatusCode, Json<CreditAccount>), AppError> {
    let account = state.ledger.open_account(req.user_id).await?;
    Ok((StatusCode::CREATED, Json(account)))
}

/// POST /api/v1/credits/grant
///
/// Called by the payment flow once a purchase settles.
pub async fn handle_grant(
    State(state): State<AppState>,
    Json(req): Json<AmountRequest>,
) -> Result<Json<BalanceResponse>, AppError> {
    let balance = state.ledger.credit(req.user_id, req.amount).await?;
    Ok(Json(BalanceResponse {
        user_id: req.user_id,
        balance,
    }))
}

/// POST /api/v1/credits/debit
///
/// Manual charge outside the pipeline. Never overdraws.
pub async fn handle_debit(
    State(state): State<AppState>,
    Json(req): Json<AmountRequest>,
) -> Result<Json<BalanceResponse>, AppError> {
    let balance = state.ledger.debit(req.user_id, req.amount).await?;
    Ok(Json(BalanceResponse {
        user_id: req.user_id,
        balance,
    }))
}
