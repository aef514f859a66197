//! Task handlers for the two pipeline stages.
//!
//! `generate_resume` tailors a resume and enqueues the matching
//! `submit_application`; `submit_application` registers (or resubmits) the
//! application through the registrar. Both are safe to run more than once
//! for the same (user, job) pair.

pub mod handlers;
pub mod triggers;
pub mod worker;

use std::sync::Arc;

use tracing::error;
use uuid::Uuid;

use crate::applications::{ApplicationRegistrar, SubmitOutcome};
use crate::errors::PipelineError;
use crate::models::application::{ApplicationStatus, NewApplication};
use crate::queue::{Task, TaskKind, TaskQueue};
use crate::resume::ResumeCustomizer;

pub use triggers::Triggers;
pub use worker::{WorkerPool, WorkerSettings};

#[derive(Debug, Clone, PartialEq)]
pub enum TaskOutcome {
    ResumeGenerated { resume_id: Uuid, submission_id: Uuid },
    Submitted { application_id: Uuid },
    Resubmitted { application_id: Uuid },
    /// The pair already has a live application; the task was a no-op.
    AlreadyApplied,
}

#[derive(Clone)]
pub struct Pipeline {
    customizer: ResumeCustomizer,
    registrar: ApplicationRegistrar,
    queue: Arc<dyn TaskQueue>,
}

impl Pipeline {
    pub fn new(
        customizer: ResumeCustomizer,
        registrar: ApplicationRegistrar,
        queue: Arc<dyn TaskQueue>,
    ) -> Self {
        Self {
            customizer,
            registrar,
            queue,
        }
    }

    pub fn queue(&self) -> Arc<dyn TaskQueue> {
        self.queue.clone()
    }

    /// Runs one task. On error the failure is recorded against the pair's
    /// application when it is on the retry path, then the error is returned
    /// for the queue to act on.
    pub async fn handle(&self, task: &Task) -> Result<TaskOutcome, PipelineError> {
        let result = match task.kind {
            TaskKind::GenerateResume => self.generate_resume(task).await,
            TaskKind::SubmitApplication => self.submit_application(task).await,
        };
        if let Err(e) = &result {
            self.record_failure(task, e).await;
        }
        result
    }

    async fn generate_resume(&self, task: &Task) -> Result<TaskOutcome, PipelineError> {
        let existing = self
            .registrar
            .find_for_job(task.user_id, task.job_id)
            .await?;
        match self.registrar.ensure_submittable(existing.as_ref()) {
            Ok(()) => {}
            Err(PipelineError::AlreadyApplied { .. }) => return Ok(TaskOutcome::AlreadyApplied),
            Err(e) => return Err(e),
        }

        let customized = self
            .customizer
            .customize(task.user_id, &task.target())
            .await?;
        let submission_id = self
            .queue
            .enqueue(task.submission_for(customized.resume_id))
            .await?;

        Ok(TaskOutcome::ResumeGenerated {
            resume_id: customized.resume_id,
            submission_id,
        })
    }

    async fn submit_application(&self, task: &Task) -> Result<TaskOutcome, PipelineError> {
        let resume_id = task.resume_id.ok_or_else(|| {
            PipelineError::Validation("submission task carries no resume".to_string())
        })?;
        let new = NewApplication::new(task.user_id, task.job_id, resume_id, None);

        Ok(match self.registrar.submit(&new).await? {
            SubmitOutcome::Submitted(app) => TaskOutcome::Submitted {
                application_id: app.id,
            },
            SubmitOutcome::Resubmitted(app) => TaskOutcome::Resubmitted {
                application_id: app.id,
            },
            SubmitOutcome::AlreadyApplied(_) => TaskOutcome::AlreadyApplied,
        })
    }

    /// Only failed applications accumulate failures here: the rest either do
    /// not exist yet or are live and untouched by the pipeline.
    async fn record_failure(&self, task: &Task, err: &PipelineError) {
        if matches!(
            err,
            PipelineError::AlreadyApplied { .. } | PipelineError::RetriesExhausted(_)
        ) {
            return;
        }

        let existing = match self
            .registrar
            .find_for_job(task.user_id, task.job_id)
            .await
        {
            Ok(existing) => existing,
            Err(e) => {
                error!(user_id = %task.user_id, job_id = %task.job_id, "Could not load application to record failure: {e}");
                return;
            }
        };

        if let Some(application) = existing.filter(|a| a.status == ApplicationStatus::Failed) {
            let message = format!("{}: {err}", task.kind);
            if let Err(e) = self.registrar.record_failure(application.id, &message).await {
                error!(application_id = %application.id, "Could not record failure: {e}");
            }
        }
    }
}
