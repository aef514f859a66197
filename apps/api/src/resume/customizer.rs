//! Resume Customizer: tailors the stored base resume to one job and persists
//! the result as a new immutable resume version.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::PipelineError;
use crate::llm_client::prompts::TRUTHFULNESS_INSTRUCTION;
use crate::llm_client::{generate_within, LlmError, TextGenerator, TextRequest};
use crate::models::job::JobTarget;
use crate::models::resume::{NewResume, Resume, ResumeComparison};
use crate::resume::prompts::{
    FALLBACK_SUMMARY, RESUME_MAX_TOKENS, RESUME_PROMPT_TEMPLATE, RESUME_SYSTEM,
    SUMMARY_MAX_TOKENS, SUMMARY_PROMPT_TEMPLATE, SUMMARY_SYSTEM,
};
use crate::store::{ProfileStore, ResumeStore};

#[derive(Debug, Clone, Serialize)]
pub struct CustomizedResume {
    pub resume_id: Uuid,
    pub version: i32,
    pub customized_text: String,
    pub summary: String,
}

#[derive(Clone)]
pub struct ResumeCustomizer {
    llm: Arc<dyn TextGenerator>,
    profiles: Arc<dyn ProfileStore>,
    resumes: Arc<dyn ResumeStore>,
    llm_timeout: Duration,
}

impl ResumeCustomizer {
    pub fn new(
        llm: Arc<dyn TextGenerator>,
        profiles: Arc<dyn ProfileStore>,
        resumes: Arc<dyn ResumeStore>,
        llm_timeout: Duration,
    ) -> Self {
        Self {
            llm,
            profiles,
            resumes,
            llm_timeout,
        }
    }

    /// Fails with `NoOriginalResume` before any service call when the user has
    /// no base resume. The tailored body is required; the change summary is
    /// best effort and falls back to a generic sentence.
    pub async fn customize(
        &self,
        user_id: Uuid,
        target: &JobTarget,
    ) -> Result<CustomizedResume, PipelineError> {
        target.validate()?;

        let profile = self.profiles.profile(user_id).await?;
        let original = profile
            .as_ref()
            .and_then(|p| p.base_resume())
            .ok_or(PipelineError::NoOriginalResume(user_id))?
            .to_string();

        let job_context = job_context(target);
        let prompt = RESUME_PROMPT_TEMPLATE
            .replace("{job_context}", &job_context)
            .replace("{original_resume}", &original)
            .replace("{truthfulness}", TRUTHFULNESS_INSTRUCTION);

        let customized_text = generate_within(
            self.llm.as_ref(),
            TextRequest {
                system: RESUME_SYSTEM,
                prompt: &prompt,
                max_tokens: RESUME_MAX_TOKENS,
            },
            self.llm_timeout,
        )
        .await?
        .trim()
        .to_string();

        if customized_text.is_empty() {
            return Err(LlmError::EmptyContent.into());
        }

        let summary = self
            .summarize(&job_context, &original, &customized_text)
            .await;

        let resume = self
            .resumes
            .insert_resume(&NewResume {
                user_id,
                original_text: original,
                customized_text,
                customized_for_job_id: target.job_id,
                change_summary: summary,
            })
            .await?;

        info!(
            %user_id,
            resume_id = %resume.id,
            version = resume.version,
            company = %target.company,
            "Resume customized"
        );

        Ok(CustomizedResume {
            resume_id: resume.id,
            version: resume.version,
            customized_text: resume.customized_text,
            summary: resume.change_summary,
        })
    }

    pub async fn list(&self, user_id: Uuid) -> Result<Vec<Resume>, PipelineError> {
        self.resumes.list_resumes(user_id).await
    }

    /// Resumes are only visible to their owner.
    pub async fn get(&self, user_id: Uuid, resume_id: Uuid) -> Result<Resume, PipelineError> {
        self.resumes
            .find_resume(resume_id)
            .await?
            .filter(|r| r.user_id == user_id)
            .ok_or_else(|| PipelineError::NotFound(format!("Resume {resume_id} not found")))
    }

    pub async fn compare(
        &self,
        user_id: Uuid,
        first: Uuid,
        second: Uuid,
    ) -> Result<ResumeComparison, PipelineError> {
        let (resume1, resume2) =
            tokio::try_join!(self.get(user_id, first), self.get(user_id, second))?;
        Ok(ResumeComparison {
            resume1: resume1.into(),
            resume2: resume2.into(),
        })
    }

    async fn summarize(&self, job_context: &str, original: &str, customized: &str) -> String {
        let prompt = SUMMARY_PROMPT_TEMPLATE
            .replace("{job_context}", job_context)
            .replace("{original_resume}", original)
            .replace("{customized_resume}", customized);

        let result = generate_within(
            self.llm.as_ref(),
            TextRequest {
                system: SUMMARY_SYSTEM,
                prompt: &prompt,
                max_tokens: SUMMARY_MAX_TOKENS,
            },
            self.llm_timeout,
        )
        .await;

        match result {
            Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
            Ok(_) => FALLBACK_SUMMARY.to_string(),
            Err(e) => {
                warn!("Change summary unavailable, using fallback: {e}");
                FALLBACK_SUMMARY.to_string()
            }
        }
    }
}

fn job_context(target: &JobTarget) -> String {
    format!(
        "Job Title: {}\nCompany: {}\n\nJob Description:\n{}",
        target.title, target.company, target.description
    )
}
