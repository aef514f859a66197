use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A tailored resume. Immutable once written; a new customization is a new row
/// with the next `version` in its (user, target job) lineage.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct Resume {
    pub id: Uuid,
    pub user_id: Uuid,
    pub original_text: String,
    pub customized_text: String,
    pub customized_for_job_id: Option<Uuid>,
    pub change_summary: String,
    pub version: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewResume {
    pub user_id: Uuid,
    pub original_text: String,
    pub customized_text: String,
    pub customized_for_job_id: Option<Uuid>,
    pub change_summary: String,
}

/// Side-by-side view of two resumes.
#[derive(Debug, Clone, Serialize)]
pub struct ResumeComparison {
    pub resume1: ResumeRevision,
    pub resume2: ResumeRevision,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResumeRevision {
    pub id: Uuid,
    pub original_text: String,
    pub customized_text: String,
    pub created_at: DateTime<Utc>,
}

impl From<Resume> for ResumeRevision {
    fn from(resume: Resume) -> Self {
        ResumeRevision {
            id: resume.id,
            original_text: resume.original_text,
            customized_text: resume.customized_text,
            created_at: resume.created_at,
        }
    }
}
