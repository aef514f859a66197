use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Prepaid usage balance. One row per user; `balance` never goes below zero.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct CreditAccount {
    pub user_id: Uuid,
    pub balance: i32,
    pub total_purchased: i32,
    pub total_used: i32,
    pub updated_at: DateTime<Utc>,
}
