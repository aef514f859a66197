use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Experience {
    #[serde(default)]
    pub years: Option<u32>,
    #[serde(default)]
    pub roles: Vec<String>,
}

/// Candidate profile as the pipeline reads it. Supplied by ingestion.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Profile {
    pub user_id: Uuid,
    pub skills: Vec<String>,
    pub experience: Experience,
    pub target_roles: Vec<String>,
    pub locations: Vec<String>,
    pub bio: Option<String>,
    pub original_resume: Option<String>,
}

impl Profile {
    /// The stored base resume, if it has any content.
    pub fn base_resume(&self) -> Option<&str> {
        self.original_resume
            .as_deref()
            .map(str::trim)
            .filter(|text| !text.is_empty())
    }
}

/// Storage shape of `profiles`; list and record fields are JSONB columns.
#[derive(Debug, FromRow)]
pub struct ProfileRow {
    pub user_id: Uuid,
    pub skills: Json<Vec<String>>,
    pub experience: Json<Experience>,
    pub target_roles: Json<Vec<String>>,
    pub locations: Json<Vec<String>>,
    pub bio: Option<String>,
    pub original_resume: Option<String>,
}

impl From<ProfileRow> for Profile {
    fn from(row: ProfileRow) -> Self {
        Profile {
            user_id: row.user_id,
            skills: row.skills.0,
            experience: row.experience.0,
            target_roles: row.target_roles.0,
            locations: row.locations.0,
            bio: row.bio,
            original_resume: row.original_resume,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobPreferences {
    pub user_id: Uuid,
    pub target_roles: Vec<String>,
    pub locations: Vec<String>,
    pub salary_min: Option<i32>,
    pub salary_max: Option<i32>,
    pub auto_apply_enabled: bool,
    pub applications_per_day: i32,
    pub min_job_fit_score: i32,
}

#[cfg(test)]
impl JobPreferences {
    pub fn new(user_id: Uuid) -> Self {
        JobPreferences {
            user_id,
            target_roles: Vec::new(),
            locations: Vec::new(),
            salary_min: None,
            salary_max: None,
            auto_apply_enabled: false,
            applications_per_day: 5,
            min_job_fit_score: 70,
        }
    }
}

#[derive(Debug, FromRow)]
pub struct JobPreferencesRow {
    pub user_id: Uuid,
    pub target_roles: Json<Vec<String>>,
    pub locations: Json<Vec<String>>,
    pub salary_min: Option<i32>,
    pub salary_max: Option<i32>,
    pub auto_apply_enabled: bool,
    pub applications_per_day: i32,
    pub min_job_fit_score: i32,
}

impl From<JobPreferencesRow> for JobPreferences {
    fn from(row: JobPreferencesRow) -> Self {
        JobPreferences {
            user_id: row.user_id,
            target_roles: row.target_roles.0,
            locations: row.locations.0,
            salary_min: row.salary_min,
            salary_max: row.salary_max,
            auto_apply_enabled: row.auto_apply_enabled,
            applications_per_day: row.applications_per_day,
            min_job_fit_score: row.min_job_fit_score,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_experience_tolerates_missing_fields() {
        let exp: Experience = serde_json::from_str("{}").unwrap();
        assert_eq!(exp, Experience::default());
        let exp: Experience = serde_json::from_str(r#"{"years": 6}"#).unwrap();
        assert_eq!(exp.years, Some(6));
        assert!(exp.roles.is_empty());
    }

    #[test]
    fn test_blank_base_resume_counts_as_missing() {
        let mut profile = Profile {
            original_resume: Some("   \n".to_string()),
            ..Profile::default()
        };
        assert_eq!(profile.base_resume(), None);
        profile.original_resume = Some("Jane Doe\nEngineer".to_string());
        assert_eq!(profile.base_resume(), Some("Jane Doe\nEngineer"));
    }
}
