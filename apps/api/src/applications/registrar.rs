//! Application Registrar: owns application rows and their status machine.
//!
//! `draft → submitted → {pending_review, interview_scheduled} → {approved, rejected}`,
//! with `failed` reachable from every non-terminal state. One row per
//! (user, job), ever; a failed application is retried in place.

use std::sync::Arc;

use chrono::{NaiveTime, Utc};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::PipelineError;
use crate::models::application::{
    Application, ApplicationStats, ApplicationStatus, NewApplication, ResponseStatus,
};
use crate::store::ApplicationStore;

/// Credits consumed by one registered application.
pub const APPLICATION_COST: i32 = 1;
const RETRY_BATCH: i64 = 100;

/// Result of a submission attempt that did not fail.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", content = "application", rename_all = "snake_case")]
pub enum SubmitOutcome {
    /// New row, charged once.
    Submitted(Application),
    /// A failed row moved back to submitted. Not charged again.
    Resubmitted(Application),
    /// The pair already has a live application; nothing changed.
    AlreadyApplied(Option<Application>),
}

#[derive(Clone)]
pub struct ApplicationRegistrar {
    store: Arc<dyn ApplicationStore>,
    max_retries: i32,
}

impl ApplicationRegistrar {
    pub fn new(store: Arc<dyn ApplicationStore>, max_retries: i32) -> Self {
        Self { store, max_retries }
    }

    /// Creates the application as `submitted` and debits `APPLICATION_COST`
    /// in the same transaction. `AlreadyApplied` if the pair has any row;
    /// `InsufficientCredits`/`AccountNotFound` leave nothing behind.
    pub async fn register(&self, new: &NewApplication) -> Result<Application, PipelineError> {
        let application = self.store.register(new, APPLICATION_COST).await?;
        info!(
            application_id = %application.id,
            user_id = %new.user_id,
            job_id = %new.job_id,
            "Application registered"
        );
        Ok(application)
    }

    /// Whether a new submission for the pair may go ahead: no row, a draft,
    /// or a failed application with retries left. A live application fails
    /// with `AlreadyApplied`, an exhausted one with `RetriesExhausted`.
    pub fn ensure_submittable(&self, existing: Option<&Application>) -> Result<(), PipelineError> {
        let Some(existing) = existing else {
            return Ok(());
        };
        match existing.status {
            ApplicationStatus::Draft => Ok(()),
            ApplicationStatus::Failed if existing.is_retry_eligible(self.max_retries) => Ok(()),
            ApplicationStatus::Failed => Err(PipelineError::RetriesExhausted(existing.id)),
            _ => Err(PipelineError::AlreadyApplied {
                user_id: existing.user_id,
                job_id: existing.job_id,
            }),
        }
    }

    /// Idempotent submission used by the workers: registers a new application,
    /// submits (and charges) a draft, resubmits a retry-eligible failed one,
    /// and treats any other existing row as already applied.
    pub async fn submit(&self, new: &NewApplication) -> Result<SubmitOutcome, PipelineError> {
        if let Some(existing) = self.store.find_for_job(new.user_id, new.job_id).await? {
            return self.submit_existing(existing, new.resume_id).await;
        }

        match self.register(new).await {
            Ok(application) => Ok(SubmitOutcome::Submitted(application)),
            Err(PipelineError::AlreadyApplied { user_id, job_id }) => {
                // Lost a race with another worker or a manual submit.
                let existing = self.store.find_for_job(user_id, job_id).await?;
                Ok(SubmitOutcome::AlreadyApplied(existing))
            }
            Err(e) => Err(e),
        }
    }

    async fn submit_existing(
        &self,
        existing: Application,
        resume_id: Uuid,
    ) -> Result<SubmitOutcome, PipelineError> {
        match self.ensure_submittable(Some(&existing)) {
            Ok(()) => {}
            Err(PipelineError::AlreadyApplied { .. }) => {
                return Ok(SubmitOutcome::AlreadyApplied(Some(existing)))
            }
            Err(e) => return Err(e),
        }

        let updated = if existing.status == ApplicationStatus::Draft {
            self.store
                .submit_draft(existing.id, resume_id, APPLICATION_COST)
                .await?
                .map(SubmitOutcome::Submitted)
        } else {
            self.store
                .resubmit(existing.id, resume_id, self.max_retries)
                .await?
                .map(SubmitOutcome::Resubmitted)
        };

        match updated {
            Some(outcome) => {
                info!(application_id = %existing.id, from = %existing.status, "Existing application submitted");
                Ok(outcome)
            }
            None => Ok(SubmitOutcome::AlreadyApplied(
                self.store.find_application(existing.id).await?,
            )),
        }
    }

    /// Marks the application failed and counts the failure. Never touches credits.
    pub async fn record_failure(
        &self,
        application_id: Uuid,
        message: &str,
    ) -> Result<Application, PipelineError> {
        let application = self.store.record_failure(application_id, message).await?;
        warn!(
            %application_id,
            retry_count = application.retry_count,
            max_retries = self.max_retries,
            "Application failure recorded: {message}"
        );
        Ok(application)
    }

    /// Review/response tracking. Drafts and terminal applications never
    /// change here. Failures go through `record_failure` so they are counted,
    /// and submission goes through `register`/`submit` so it is charged.
    pub async fn transition(
        &self,
        application_id: Uuid,
        status: ApplicationStatus,
        response: Option<ResponseStatus>,
    ) -> Result<Application, PipelineError> {
        match status {
            ApplicationStatus::Failed => {
                return Err(PipelineError::Validation(
                    "failures are recorded with an error message, not set directly".to_string(),
                ))
            }
            ApplicationStatus::Draft | ApplicationStatus::Submitted => {
                return Err(PipelineError::Validation(format!(
                    "status '{status}' is reached through submission, not set directly"
                )))
            }
            _ => {}
        }
        let application = self
            .store
            .set_status(application_id, status, response)
            .await?;
        info!(%application_id, %status, "Application status changed");
        Ok(application)
    }

    pub async fn find(&self, application_id: Uuid) -> Result<Application, PipelineError> {
        self.store
            .find_application(application_id)
            .await?
            .ok_or_else(|| PipelineError::NotFound(format!("Application {application_id} not found")))
    }

    pub async fn find_for_job(
        &self,
        user_id: Uuid,
        job_id: Uuid,
    ) -> Result<Option<Application>, PipelineError> {
        self.store.find_for_job(user_id, job_id).await
    }

    /// Failed applications that may still be retried, across all users when
    /// `user_id` is `None`.
    pub async fn ready_for_retry(
        &self,
        user_id: Option<Uuid>,
    ) -> Result<Vec<Application>, PipelineError> {
        self.store
            .ready_for_retry(user_id, self.max_retries, RETRY_BATCH)
            .await
    }

    pub async fn list(
        &self,
        user_id: Uuid,
        status: Option<ApplicationStatus>,
    ) -> Result<Vec<Application>, PipelineError> {
        self.store.list_applications(user_id, status).await
    }

    pub async fn stats(&self, user_id: Uuid) -> Result<ApplicationStats, PipelineError> {
        let counts = self.store.status_counts(user_id).await?;
        Ok(ApplicationStats::from_counts(&counts))
    }

    /// Applications submitted since midnight UTC.
    pub async fn applied_today(&self, user_id: Uuid) -> Result<i64, PipelineError> {
        let midnight = Utc::now().date_naive().and_time(NaiveTime::MIN).and_utc();
        self.store.submitted_since(user_id, midnight).await
    }
}
