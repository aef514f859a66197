use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Lifecycle of an application.
///
/// `draft → submitted → {pending_review, interview_scheduled} → {approved, rejected}`,
/// with `failed` reachable from any non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    Draft,
    Submitted,
    PendingReview,
    InterviewScheduled,
    Approved,
    Rejected,
    Failed,
}

impl ApplicationStatus {
    pub const ALL: [ApplicationStatus; 7] = [
        ApplicationStatus::Draft,
        ApplicationStatus::Submitted,
        ApplicationStatus::PendingReview,
        ApplicationStatus::InterviewScheduled,
        ApplicationStatus::Approved,
        ApplicationStatus::Rejected,
        ApplicationStatus::Failed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ApplicationStatus::Draft => "draft",
            ApplicationStatus::Submitted => "submitted",
            ApplicationStatus::PendingReview => "pending_review",
            ApplicationStatus::InterviewScheduled => "interview_scheduled",
            ApplicationStatus::Approved => "approved",
            ApplicationStatus::Rejected => "rejected",
            ApplicationStatus::Failed => "failed",
        }
    }

    /// Approved and rejected applications never change status again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ApplicationStatus::Approved | ApplicationStatus::Rejected)
    }

    /// Whether review updates and failure reports may touch the row. Drafts
    /// were never charged and only leave through a charged submission.
    pub fn accepts_updates(&self) -> bool {
        !self.is_terminal() && *self != ApplicationStatus::Draft
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ApplicationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ApplicationStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("unknown application status '{s}'"))
    }
}

/// Employer-side response, tracked independently of the pipeline status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ResponseStatus {
    NoResponse,
    Viewed,
    Interviewed,
    Offered,
    Rejected,
}

/// Job board an application was sent through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Linkedin,
    Indeed,
    Ziprecruiter,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct Application {
    pub id: Uuid,
    pub user_id: Uuid,
    pub job_id: Uuid,
    pub resume_id: Uuid,
    pub status: ApplicationStatus,
    pub response_status: ResponseStatus,
    pub applied_via: Option<Platform>,
    pub applied_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub retry_count: i32,
    pub last_retry_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Application {
    /// A failed application may be resubmitted in place while it has recorded
    /// fewer than `max_retries` failures.
    pub fn is_retry_eligible(&self, max_retries: i32) -> bool {
        self.status == ApplicationStatus::Failed && self.retry_count < max_retries
    }
}

/// Input to registration.
#[derive(Debug, Clone, Deserialize)]
pub struct NewApplication {
    pub user_id: Uuid,
    pub job_id: Uuid,
    pub resume_id: Uuid,
    pub applied_via: Option<Platform>,
}

impl NewApplication {
    pub fn new(user_id: Uuid, job_id: Uuid, resume_id: Uuid, applied_via: Option<Platform>) -> Self {
        NewApplication {
            user_id,
            job_id,
            resume_id,
            applied_via,
        }
    }
}

/// Per-status counts for a user's applications.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ApplicationStats {
    pub total: i64,
    pub draft: i64,
    pub submitted: i64,
    /// pending_review + interview_scheduled
    pub pending: i64,
    pub approved: i64,
    pub rejected: i64,
    pub failed: i64,
}

impl ApplicationStats {
    pub fn from_counts(counts: &[(ApplicationStatus, i64)]) -> Self {
        let mut stats = ApplicationStats::default();
        for &(status, count) in counts {
            stats.total += count;
            match status {
                ApplicationStatus::Draft => stats.draft += count,
                ApplicationStatus::Submitted => stats.submitted += count,
                ApplicationStatus::PendingReview | ApplicationStatus::InterviewScheduled => {
                    stats.pending += count
                }
                ApplicationStatus::Approved => stats.approved += count,
                ApplicationStatus::Rejected => stats.rejected += count,
                ApplicationStatus::Failed => stats.failed += count,
            }
        }
        stats
    }
}
