use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use super::{
    ApplicationStore, JobStore, LedgerStore, MatchStore, ProfileStore, ResumeStore, StoreResult,
};
use crate::errors::PipelineError;
use crate::models::application::{
    Application, ApplicationStatus, NewApplication, ResponseStatus,
};
use crate::models::credit::CreditAccount;
use crate::models::job::{JobMatch, JobPosting, MatchedJob};
use crate::models::profile::{JobPreferences, JobPreferencesRow, Profile, ProfileRow};
use crate::models::resume::{NewResume, Resume};

const ACCOUNT_COLUMNS: &str = "user_id, balance, total_purchased, total_used, updated_at";

const APPLICATION_COLUMNS: &str = "id, user_id, job_id, resume_id, status, response_status, \
    applied_via, applied_at, error_message, retry_count, last_retry_at, created_at, updated_at";

const MATCH_COLUMNS: &str = "id, user_id, job_id, fit_score, match_reason, created_at";

const RESUME_COLUMNS: &str = "id, user_id, original_text, customized_text, \
    customized_for_job_id, change_summary, version, is_active, created_at";

const JOB_COLUMNS: &str = "id, platform, title, company, location, salary_min, salary_max, \
    description, url, created_at";

/// Postgres-backed implementation of every store trait.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Explains why a guarded application update matched no row.
    async fn guard_failure(&self, application_id: Uuid, to: ApplicationStatus) -> PipelineError {
        match self.find_application(application_id).await {
            Ok(Some(app)) => PipelineError::IllegalTransition {
                from: app.status,
                to,
            },
            Ok(None) => PipelineError::NotFound(format!("Application {application_id} not found")),
            Err(e) => e,
        }
    }
}

/// SQL list of the statuses that refuse review updates and failure reports.
fn frozen_statuses() -> String {
    ApplicationStatus::ALL
        .into_iter()
        .filter(|status| !status.accepts_updates())
        .map(|status| format!("'{status}'"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Conditional decrement: the row lock taken by UPDATE serializes concurrent
/// debits, and the `balance >= amount` predicate keeps the balance non-negative.
async fn debit_on(conn: &mut PgConnection, user_id: Uuid, amount: i32) -> StoreResult<i32> {
    let balance: Option<i32> = sqlx::query_scalar(
        r#"
        UPDATE credits
        SET balance = balance - $2, total_used = total_used + $2, updated_at = NOW()
        WHERE user_id = $1 AND balance >= $2
        RETURNING balance
        "#,
    )
    .bind(user_id)
    .bind(amount)
    .fetch_optional(&mut *conn)
    .await?;

    if let Some(balance) = balance {
        return Ok(balance);
    }

    let current: Option<i32> = sqlx::query_scalar("SELECT balance FROM credits WHERE user_id = $1")
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await?;

    match current {
        Some(balance) => Err(PipelineError::InsufficientCredits {
            balance,
            required: amount,
        }),
        None => Err(PipelineError::AccountNotFound(user_id)),
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Ledger
// ────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl LedgerStore for PgStore {
    async fn open_account(&self, user_id: Uuid) -> StoreResult<CreditAccount> {
        sqlx::query("INSERT INTO credits (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING")
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        self.account(user_id)
            .await?
            .ok_or(PipelineError::AccountNotFound(user_id))
    }

    async fn account(&self, user_id: Uuid) -> StoreResult<Option<CreditAccount>> {
        let account = sqlx::query_as::<_, CreditAccount>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM credits WHERE user_id = $1"
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(account)
    }

    async fn debit(&self, user_id: Uuid, amount: i32) -> StoreResult<i32> {
        let mut conn = self.pool.acquire().await?;
        debit_on(&mut *conn, user_id, amount).await
    }

    async fn credit(&self, user_id: Uuid, amount: i32) -> StoreResult<i32> {
        let balance: Option<i32> = sqlx::query_scalar(
            r#"
            UPDATE credits
            SET balance = balance + $2, total_purchased = total_purchased + $2, updated_at = NOW()
            WHERE user_id = $1
            RETURNING balance
            "#,
        )
        .bind(user_id)
        .bind(amount)
        .fetch_optional(&self.pool)
        .await?;

        balance.ok_or(PipelineError::AccountNotFound(user_id))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Applications
// ────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl ApplicationStore for PgStore {
    async fn register(&self, new: &NewApplication, charge: i32) -> StoreResult<Application> {
        let mut tx = self.pool.begin().await?;

        // The unique (user_id, job_id) constraint makes check-and-insert one step;
        // a concurrent registration waits here and then sees the conflict.
        let inserted = sqlx::query_as::<_, Application>(&format!(
            r#"
            INSERT INTO applications (user_id, job_id, resume_id, status, applied_via, applied_at)
            VALUES ($1, $2, $3, 'submitted', $4, NOW())
            ON CONFLICT (user_id, job_id) DO NOTHING
            RETURNING {APPLICATION_COLUMNS}
            "#
        ))
        .bind(new.user_id)
        .bind(new.job_id)
        .bind(new.resume_id)
        .bind(new.applied_via)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(application) = inserted else {
            return Err(PipelineError::AlreadyApplied {
                user_id: new.user_id,
                job_id: new.job_id,
            });
        };

        if charge > 0 {
            // Dropping `tx` on error rolls the insert back.
            debit_on(&mut *tx, new.user_id, charge).await?;
        }

        tx.commit().await?;
        Ok(application)
    }

    async fn resubmit(
        &self,
        application_id: Uuid,
        resume_id: Uuid,
        max_retries: i32,
    ) -> StoreResult<Option<Application>> {
        let application = sqlx::query_as::<_, Application>(&format!(
            r#"
            UPDATE applications
            SET status = 'submitted', resume_id = $2, error_message = NULL,
                applied_at = NOW(), updated_at = NOW()
            WHERE id = $1 AND status = 'failed' AND retry_count < $3
            RETURNING {APPLICATION_COLUMNS}
            "#
        ))
        .bind(application_id)
        .bind(resume_id)
        .bind(max_retries)
        .fetch_optional(&self.pool)
        .await?;
        Ok(application)
    }

    async fn submit_draft(
        &self,
        application_id: Uuid,
        resume_id: Uuid,
        charge: i32,
    ) -> StoreResult<Option<Application>> {
        let mut tx = self.pool.begin().await?;

        // The row lock makes a concurrent submission of the same draft match nothing.
        let promoted = sqlx::query_as::<_, Application>(&format!(
            r#"
            UPDATE applications
            SET status = 'submitted', resume_id = $2, applied_at = NOW(), updated_at = NOW()
            WHERE id = $1 AND status = 'draft'
            RETURNING {APPLICATION_COLUMNS}
            "#
        ))
        .bind(application_id)
        .bind(resume_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(application) = promoted else {
            return Ok(None);
        };

        if charge > 0 {
            debit_on(&mut *tx, application.user_id, charge).await?;
        }

        tx.commit().await?;
        Ok(Some(application))
    }

    async fn find_application(&self, application_id: Uuid) -> StoreResult<Option<Application>> {
        let application = sqlx::query_as::<_, Application>(&format!(
            "SELECT {APPLICATION_COLUMNS} FROM applications WHERE id = $1"
        ))
        .bind(application_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(application)
    }

    async fn find_for_job(&self, user_id: Uuid, job_id: Uuid) -> StoreResult<Option<Application>> {
        let application = sqlx::query_as::<_, Application>(&format!(
            "SELECT {APPLICATION_COLUMNS} FROM applications WHERE user_id = $1 AND job_id = $2"
        ))
        .bind(user_id)
        .bind(job_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(application)
    }

    async fn record_failure(
        &self,
        application_id: Uuid,
        message: &str,
    ) -> StoreResult<Application> {
        let frozen = frozen_statuses();
        let updated = sqlx::query_as::<_, Application>(&format!(
            r#"
            UPDATE applications
            SET status = 'failed', error_message = $2, retry_count = retry_count + 1,
                last_retry_at = NOW(), updated_at = NOW()
            WHERE id = $1 AND status NOT IN ({frozen})
            RETURNING {APPLICATION_COLUMNS}
            "#
        ))
        .bind(application_id)
        .bind(message)
        .fetch_optional(&self.pool)
        .await?;

        match updated {
            Some(application) => Ok(application),
            None => Err(self
                .guard_failure(application_id, ApplicationStatus::Failed)
                .await),
        }
    }

    async fn set_status(
        &self,
        application_id: Uuid,
        status: ApplicationStatus,
        response: Option<ResponseStatus>,
    ) -> StoreResult<Application> {
        let frozen = frozen_statuses();
        let updated = sqlx::query_as::<_, Application>(&format!(
            r#"
            UPDATE applications
            SET status = $2, response_status = COALESCE($3, response_status), updated_at = NOW()
            WHERE id = $1 AND status NOT IN ({frozen})
            RETURNING {APPLICATION_COLUMNS}
            "#
        ))
        .bind(application_id)
        .bind(status)
        .bind(response)
        .fetch_optional(&self.pool)
        .await?;

        match updated {
            Some(application) => Ok(application),
            None => Err(self.guard_failure(application_id, status).await),
        }
    }

    async fn list_applications(
        &self,
        user_id: Uuid,
        status: Option<ApplicationStatus>,
    ) -> StoreResult<Vec<Application>> {
        let applications = sqlx::query_as::<_, Application>(&format!(
            r#"
            SELECT {APPLICATION_COLUMNS} FROM applications
            WHERE user_id = $1 AND ($2::text IS NULL OR status = $2)
            ORDER BY created_at DESC
            "#
        ))
        .bind(user_id)
        .bind(status)
        .fetch_all(&self.pool)
        .await?;
        Ok(applications)
    }

    async fn status_counts(&self, user_id: Uuid) -> StoreResult<Vec<(ApplicationStatus, i64)>> {
        let counts = sqlx::query_as::<_, (ApplicationStatus, i64)>(
            "SELECT status, COUNT(*) FROM applications WHERE user_id = $1 GROUP BY status",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(counts)
    }

    async fn ready_for_retry(
        &self,
        user_id: Option<Uuid>,
        max_retries: i32,
        limit: i64,
    ) -> StoreResult<Vec<Application>> {
        let applications = sqlx::query_as::<_, Application>(&format!(
            r#"
            SELECT {APPLICATION_COLUMNS} FROM applications
            WHERE status = 'failed' AND retry_count < $1
              AND ($2::uuid IS NULL OR user_id = $2)
            ORDER BY last_retry_at ASC NULLS FIRST
            LIMIT $3
            "#
        ))
        .bind(max_retries)
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(applications)
    }

    async fn submitted_since(&self, user_id: Uuid, since: DateTime<Utc>) -> StoreResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM applications WHERE user_id = $1 AND applied_at >= $2",
        )
        .bind(user_id)
        .bind(since)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Matches
// ────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl MatchStore for PgStore {
    async fn find_match(&self, user_id: Uuid, job_id: Uuid) -> StoreResult<Option<JobMatch>> {
        let found = sqlx::query_as::<_, JobMatch>(&format!(
            "SELECT {MATCH_COLUMNS} FROM job_matches WHERE user_id = $1 AND job_id = $2"
        ))
        .bind(user_id)
        .bind(job_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(found)
    }

    async fn insert_match(
        &self,
        user_id: Uuid,
        job_id: Uuid,
        fit_score: i32,
        match_reason: &str,
    ) -> StoreResult<JobMatch> {
        sqlx::query(
            r#"
            INSERT INTO job_matches (user_id, job_id, fit_score, match_reason)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id, job_id) DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(job_id)
        .bind(fit_score)
        .bind(match_reason)
        .execute(&self.pool)
        .await?;

        self.find_match(user_id, job_id).await?.ok_or_else(|| {
            PipelineError::NotFound(format!("Match for job {job_id} vanished after insert"))
        })
    }

    async fn matches_above(
        &self,
        user_id: Uuid,
        min_score: i32,
        limit: Option<i64>,
    ) -> StoreResult<Vec<MatchedJob>> {
        let matches = sqlx::query_as::<_, MatchedJob>(
            r#"
            SELECT m.job_id, m.fit_score, m.match_reason, j.title, j.company, j.location, j.url
            FROM job_matches m
            JOIN jobs j ON j.id = m.job_id
            WHERE m.user_id = $1 AND m.fit_score >= $2
            ORDER BY m.fit_score DESC, m.created_at ASC
            LIMIT $3
            "#,
        )
        .bind(user_id)
        .bind(min_score)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(matches)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Resumes
// ────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl ResumeStore for PgStore {
    async fn insert_resume(&self, new: &NewResume) -> StoreResult<Resume> {
        let mut tx = self.pool.begin().await?;

        // Serializes writers of one lineage so version numbers stay dense.
        sqlx::query(
            "SELECT pg_advisory_xact_lock(hashtextextended($1::text || ':' || COALESCE($2::text, 'general'), 0))",
        )
        .bind(new.user_id)
        .bind(new.customized_for_job_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            UPDATE resumes SET is_active = FALSE
            WHERE user_id = $1 AND customized_for_job_id IS NOT DISTINCT FROM $2 AND is_active
            "#,
        )
        .bind(new.user_id)
        .bind(new.customized_for_job_id)
        .execute(&mut *tx)
        .await?;

        let resume = sqlx::query_as::<_, Resume>(&format!(
            r#"
            INSERT INTO resumes (user_id, original_text, customized_text, customized_for_job_id,
                                 change_summary, version, is_active)
            SELECT $1, $3, $4, $2, $5, COALESCE(MAX(version), 0) + 1, TRUE
            FROM resumes
            WHERE user_id = $1 AND customized_for_job_id IS NOT DISTINCT FROM $2
            RETURNING {RESUME_COLUMNS}
            "#
        ))
        .bind(new.user_id)
        .bind(new.customized_for_job_id)
        .bind(&new.original_text)
        .bind(&new.customized_text)
        .bind(&new.change_summary)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(resume)
    }

    async fn find_resume(&self, resume_id: Uuid) -> StoreResult<Option<Resume>> {
        let resume = sqlx::query_as::<_, Resume>(&format!(
            "SELECT {RESUME_COLUMNS} FROM resumes WHERE id = $1"
        ))
        .bind(resume_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(resume)
    }

    async fn list_resumes(&self, user_id: Uuid) -> StoreResult<Vec<Resume>> {
        let resumes = sqlx::query_as::<_, Resume>(&format!(
            "SELECT {RESUME_COLUMNS} FROM resumes WHERE user_id = $1 ORDER BY created_at DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(resumes)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Ingested data (read-only)
// ────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl ProfileStore for PgStore {
    async fn profile(&self, user_id: Uuid) -> StoreResult<Option<Profile>> {
        let row = sqlx::query_as::<_, ProfileRow>(
            r#"
            SELECT user_id, skills, experience, target_roles, locations, bio, original_resume
            FROM profiles WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Profile::from))
    }

    async fn preferences(&self, user_id: Uuid) -> StoreResult<Option<JobPreferences>> {
        let row = sqlx::query_as::<_, JobPreferencesRow>(
            r#"
            SELECT user_id, target_roles, locations, salary_min, salary_max,
                   auto_apply_enabled, applications_per_day, min_job_fit_score
            FROM job_preferences WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(JobPreferences::from))
    }

    async fn auto_apply_users(&self) -> StoreResult<Vec<Uuid>> {
        let users: Vec<Uuid> =
            sqlx::query_scalar("SELECT user_id FROM job_preferences WHERE auto_apply_enabled")
                .fetch_all(&self.pool)
                .await?;
        Ok(users)
    }
}

#[async_trait]
impl JobStore for PgStore {
    async fn job(&self, job_id: Uuid) -> StoreResult<Option<JobPosting>> {
        let job = sqlx::query_as::<_, JobPosting>(&format!(
            "SELECT {JOB_COLUMNS} FROM jobs WHERE id = $1"
        ))
        .bind(job_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(job)
    }

    async fn unscored_jobs(&self, user_id: Uuid) -> StoreResult<Vec<JobPosting>> {
        let jobs = sqlx::query_as::<_, JobPosting>(&format!(
            r#"
            SELECT {JOB_COLUMNS} FROM jobs
            WHERE NOT EXISTS (
                SELECT 1 FROM job_matches m WHERE m.job_id = jobs.id AND m.user_id = $1
            )
            ORDER BY created_at DESC
            "#
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(jobs)
    }
}
