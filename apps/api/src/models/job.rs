use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::errors::PipelineError;
use crate::models::application::Platform;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct JobPosting {
    pub id: Uuid,
    pub platform: Platform,
    pub title: String,
    pub company: String,
    pub location: Option<String>,
    pub salary_min: Option<i32>,
    pub salary_max: Option<i32>,
    pub description: String,
    pub url: String,
    pub created_at: DateTime<Utc>,
}

/// Persisted fit score. Written once per (user, job); never updated.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct JobMatch {
    pub id: Uuid,
    pub user_id: Uuid,
    pub job_id: Uuid,
    pub fit_score: i32,
    pub match_reason: String,
    pub created_at: DateTime<Utc>,
}

/// A match joined with the posting it scored, for listings.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct MatchedJob {
    pub job_id: Uuid,
    pub fit_score: i32,
    pub match_reason: String,
    pub title: String,
    pub company: String,
    pub location: Option<String>,
    pub url: String,
}

/// The job context a resume is tailored against.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobTarget {
    pub job_id: Option<Uuid>,
    pub title: String,
    pub company: String,
    pub description: String,
}

impl JobTarget {
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.description.trim().chars().count() < 10 {
            return Err(PipelineError::Validation(
                "job_description must be at least 10 characters".to_string(),
            ));
        }
        if self.title.trim().chars().count() < 2 {
            return Err(PipelineError::Validation(
                "job_title must be at least 2 characters".to_string(),
            ));
        }
        if self.company.trim().chars().count() < 2 {
            return Err(PipelineError::Validation(
                "company_name must be at least 2 characters".to_string(),
            ));
        }
        Ok(())
    }
}

impl From<&JobPosting> for JobTarget {
    fn from(job: &JobPosting) -> Self {
        JobTarget {
            job_id: Some(job.id),
            title: job.title.clone(),
            company: job.company.clone(),
            description: job.description.clone(),
        }
    }
}
