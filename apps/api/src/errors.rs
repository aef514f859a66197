use std::time::Duration;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use sqlx::error::ErrorKind;
use thiserror::Error;
use uuid::Uuid;

use crate::llm_client::LlmError;
use crate::models::application::ApplicationStatus;
use crate::queue::QueueError;

/// Domain error shared by the ledger, scorer, customizer, registrar and workers.
///
/// `is_retryable` is the single place that decides whether the queue may
/// redeliver a task that failed with this error.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("No original resume on file for user {0}")]
    NoOriginalResume(Uuid),

    #[error("No credit account for user {0}")]
    AccountNotFound(Uuid),

    #[error("Insufficient credits: balance {balance}, required {required}")]
    InsufficientCredits { balance: i32, required: i32 },

    #[error("Already applied to job {job_id}")]
    AlreadyApplied { user_id: Uuid, job_id: Uuid },

    #[error("Job {job_id} is already queued for user {user_id}")]
    AlreadyQueued { user_id: Uuid, job_id: Uuid },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Illegal status transition from {from} to {to}")]
    IllegalTransition {
        from: ApplicationStatus,
        to: ApplicationStatus,
    },

    #[error("Application {0} has exhausted its retries")]
    RetriesExhausted(Uuid),

    #[error("Generative service call timed out after {0:?}")]
    Timeout(Duration),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),
}

impl PipelineError {
    /// Transient failures are redelivered by the queue; everything else is
    /// fatal to the task. Constraint violations reported by the database
    /// fail the same way on every attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            PipelineError::Database(sqlx::Error::Database(db)) => {
                matches!(db.kind(), ErrorKind::Other)
            }
            PipelineError::Timeout(_)
            | PipelineError::Llm(_)
            | PipelineError::Database(_)
            | PipelineError::Queue(_) => true,
            _ => false,
        }
    }
}

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Already queued: {0}")]
    AlreadyQueued(String),

    #[error("Payment required: {0}")]
    PaymentRequired(String),

    #[error("Unprocessable entity: {0}")]
    UnprocessableEntity(String),

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<PipelineError> for AppError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::Validation(msg) => AppError::Validation(msg),
            PipelineError::NotFound(msg) => AppError::NotFound(msg),
            PipelineError::AlreadyApplied { .. } => AppError::Conflict(err.to_string()),
            PipelineError::AlreadyQueued { .. } => AppError::AlreadyQueued(err.to_string()),
            PipelineError::InsufficientCredits { .. } => AppError::PaymentRequired(err.to_string()),
            PipelineError::AccountNotFound(_) => AppError::NotFound(err.to_string()),
            PipelineError::NoOriginalResume(_)
            | PipelineError::IllegalTransition { .. }
            | PipelineError::RetriesExhausted(_) => AppError::UnprocessableEntity(err.to_string()),
            PipelineError::Timeout(_) | PipelineError::Queue(_) => {
                AppError::Unavailable(err.to_string())
            }
            PipelineError::Llm(e) => AppError::Llm(e.to_string()),
            PipelineError::Database(e) => AppError::Database(e),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "ALREADY_APPLIED", msg.clone()),
            AppError::AlreadyQueued(msg) => (StatusCode::CONFLICT, "ALREADY_QUEUED", msg.clone()),
            AppError::PaymentRequired(msg) => (
                StatusCode::PAYMENT_REQUIRED,
                "INSUFFICIENT_CREDITS",
                msg.clone(),
            ),
            AppError::UnprocessableEntity(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "UNPROCESSABLE_ENTITY",
                msg.clone(),
            ),
            AppError::Unavailable(msg) => {
                tracing::warn!("Upstream unavailable: {msg}");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "UNAVAILABLE",
                    "A dependent service is temporarily unavailable".to_string(),
                )
            }
            AppError::Database(e) => {
                tracing::error!("Database error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "DATABASE_ERROR",
                    "A database error occurred".to_string(),
                )
            }
            AppError::Llm(msg) => {
                tracing::error!("LLM error: {msg}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "LLM_ERROR",
                    "An AI processing error occurred".to_string(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}
