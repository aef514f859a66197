//! Persistence seams.
//!
//! Each component depends on the narrow trait it needs, carried as
//! `Arc<dyn ...>`. `PgStore` implements all of them for production; the
//! in-memory `MemoryStore` backs the unit tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::errors::PipelineError;
use crate::models::application::{
    Application, ApplicationStatus, NewApplication, ResponseStatus,
};
use crate::models::credit::CreditAccount;
use crate::models::job::{JobMatch, JobPosting, MatchedJob};
use crate::models::profile::{JobPreferences, Profile};
use crate::models::resume::{NewResume, Resume};

#[cfg(test)]
pub mod memory;
pub mod postgres;

pub use postgres::PgStore;

type StoreResult<T> = Result<T, PipelineError>;

/// Credit balances. `debit` and `credit` are single atomic updates; an
/// over-debit fails and leaves the row untouched.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Creates the zero-balance row if missing and returns the account.
    async fn open_account(&self, user_id: Uuid) -> StoreResult<CreditAccount>;
    async fn account(&self, user_id: Uuid) -> StoreResult<Option<CreditAccount>>;
    async fn debit(&self, user_id: Uuid, amount: i32) -> StoreResult<i32>;
    async fn credit(&self, user_id: Uuid, amount: i32) -> StoreResult<i32>;
}

#[async_trait]
pub trait ApplicationStore: Send + Sync {
    /// Inserts a `submitted` application and debits `charge` in one
    /// transaction. Fails with `AlreadyApplied` when the (user, job) row exists;
    /// on any failure nothing is written.
    async fn register(&self, new: &NewApplication, charge: i32) -> StoreResult<Application>;

    /// Moves a retry-eligible failed application back to `submitted` against
    /// a new resume. Returns `None` when the row is not eligible.
    async fn resubmit(
        &self,
        application_id: Uuid,
        resume_id: Uuid,
        max_retries: i32,
    ) -> StoreResult<Option<Application>>;

    /// Moves a draft to `submitted` and debits `charge` in one transaction.
    /// Returns `None` when the row is no longer a draft; on a failed debit
    /// the draft is left as it was.
    async fn submit_draft(
        &self,
        application_id: Uuid,
        resume_id: Uuid,
        charge: i32,
    ) -> StoreResult<Option<Application>>;

    async fn find_application(&self, application_id: Uuid) -> StoreResult<Option<Application>>;
    async fn find_for_job(&self, user_id: Uuid, job_id: Uuid) -> StoreResult<Option<Application>>;

    /// Sets `failed`, bumps `retry_count` and stamps `last_retry_at`.
    /// Rejected with `IllegalTransition` unless the status accepts updates.
    async fn record_failure(&self, application_id: Uuid, message: &str)
        -> StoreResult<Application>;

    /// Overwrites the status (and the response status when given).
    /// Rejected with `IllegalTransition` unless the status accepts updates.
    async fn set_status(
        &self,
        application_id: Uuid,
        status: ApplicationStatus,
        response: Option<ResponseStatus>,
    ) -> StoreResult<Application>;

    async fn list_applications(
        &self,
        user_id: Uuid,
        status: Option<ApplicationStatus>,
    ) -> StoreResult<Vec<Application>>;

    async fn status_counts(&self, user_id: Uuid) -> StoreResult<Vec<(ApplicationStatus, i64)>>;

    /// Failed applications with `retry_count < max_retries`, oldest failure first.
    async fn ready_for_retry(
        &self,
        user_id: Option<Uuid>,
        max_retries: i32,
        limit: i64,
    ) -> StoreResult<Vec<Application>>;

    /// Applications whose `applied_at` is at or after `since`.
    async fn submitted_since(&self, user_id: Uuid, since: DateTime<Utc>) -> StoreResult<i64>;
}

#[async_trait]
pub trait MatchStore: Send + Sync {
    async fn find_match(&self, user_id: Uuid, job_id: Uuid) -> StoreResult<Option<JobMatch>>;

    /// First write wins: a concurrent or repeated insert returns the stored row.
    async fn insert_match(
        &self,
        user_id: Uuid,
        job_id: Uuid,
        fit_score: i32,
        match_reason: &str,
    ) -> StoreResult<JobMatch>;

    /// Matches with `fit_score >= min_score`, best first.
    async fn matches_above(
        &self,
        user_id: Uuid,
        min_score: i32,
        limit: Option<i64>,
    ) -> StoreResult<Vec<MatchedJob>>;
}

#[async_trait]
pub trait ResumeStore: Send + Sync {
    /// Writes the next version of the (user, target job) lineage and makes it
    /// the only active one.
    async fn insert_resume(&self, new: &NewResume) -> StoreResult<Resume>;
    async fn find_resume(&self, resume_id: Uuid) -> StoreResult<Option<Resume>>;
    async fn list_resumes(&self, user_id: Uuid) -> StoreResult<Vec<Resume>>;
}

/// Read-only view of ingested candidate data.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn profile(&self, user_id: Uuid) -> StoreResult<Option<Profile>>;
    async fn preferences(&self, user_id: Uuid) -> StoreResult<Option<JobPreferences>>;
    async fn auto_apply_users(&self) -> StoreResult<Vec<Uuid>>;
}

/// Read-only view of ingested job postings.
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn job(&self, job_id: Uuid) -> StoreResult<Option<JobPosting>>;
    /// Postings with no match row for this user yet.
    async fn unscored_jobs(&self, user_id: Uuid) -> StoreResult<Vec<JobPosting>>;
}
