//! Producers of `generate_resume` tasks: manual submit, retry of failed
//! applications, and the auto-apply scan over preference matches.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::applications::ApplicationRegistrar;
use crate::errors::PipelineError;
use crate::matching::{matches_preferences, MatchScorer};
use crate::queue::{Task, TaskQueue};
use crate::store::{JobStore, ProfileStore};

#[derive(Debug, Default, Clone, Serialize)]
pub struct AutoApplyReport {
    pub user_id: Uuid,
    pub enabled: bool,
    pub scored: usize,
    pub remaining_today: i64,
    pub enqueued: Vec<Uuid>,
}

#[derive(Clone)]
pub struct Triggers {
    scorer: MatchScorer,
    registrar: ApplicationRegistrar,
    queue: Arc<dyn TaskQueue>,
    profiles: Arc<dyn ProfileStore>,
    jobs: Arc<dyn JobStore>,
}

impl Triggers {
    pub fn new(
        scorer: MatchScorer,
        registrar: ApplicationRegistrar,
        queue: Arc<dyn TaskQueue>,
        profiles: Arc<dyn ProfileStore>,
        jobs: Arc<dyn JobStore>,
    ) -> Self {
        Self {
            scorer,
            registrar,
            queue,
            profiles,
            jobs,
        }
    }

    /// Manual "submit now" for one job. Rejected up front when the pair is
    /// already live, out of retries or still in the queue; otherwise returns
    /// the queued task id.
    pub async fn submit_now(&self, user_id: Uuid, job_id: Uuid) -> Result<Uuid, PipelineError> {
        let job = self
            .jobs
            .job(job_id)
            .await?
            .ok_or_else(|| PipelineError::NotFound(format!("Job {job_id} not found")))?;

        let existing = self.registrar.find_for_job(user_id, job_id).await?;
        self.registrar.ensure_submittable(existing.as_ref())?;

        let task_id = self
            .queue
            .enqueue_unique(Task::generate_resume(user_id, &job))
            .await?
            .ok_or(PipelineError::AlreadyQueued { user_id, job_id })?;
        info!(%user_id, %job_id, %task_id, "Manual submission queued");
        Ok(task_id)
    }

    /// Re-enqueues resume generation for every retry-eligible failed
    /// application, for one user or for everyone.
    pub async fn retry_failed(&self, user_id: Option<Uuid>) -> Result<Vec<Uuid>, PipelineError> {
        let ready = self.registrar.ready_for_retry(user_id).await?;
        let mut queued = Vec::with_capacity(ready.len());

        for application in ready {
            let Some(job) = self.jobs.job(application.job_id).await? else {
                warn!(application_id = %application.id, "Job for failed application is gone, skipping retry");
                continue;
            };
            let task = Task::generate_resume(application.user_id, &job);
            if self.queue.enqueue_unique(task).await?.is_some() {
                queued.push(application.id);
            }
        }

        if !queued.is_empty() {
            info!(count = queued.len(), "Failed applications queued for retry");
        }
        Ok(queued)
    }

    /// Scores new jobs for the user, then queues the best preference-passing
    /// matches that are open for submission and not already queued, up to
    /// what is left of today's cap.
    /// Users without auto-apply enabled get an empty report.
    pub async fn auto_apply(&self, user_id: Uuid) -> Result<AutoApplyReport, PipelineError> {
        let mut report = AutoApplyReport {
            user_id,
            ..AutoApplyReport::default()
        };
        let Some(prefs) = self
            .profiles
            .preferences(user_id)
            .await?
            .filter(|p| p.auto_apply_enabled)
        else {
            return Ok(report);
        };
        report.enabled = true;
        report.scored = self.scorer.score_all(user_id).await?.len();

        let applied = self.registrar.applied_today(user_id).await?;
        report.remaining_today = (i64::from(prefs.applications_per_day) - applied).max(0);
        if report.remaining_today == 0 {
            return Ok(report);
        }

        let candidates = self
            .scorer
            .matched_jobs(user_id, Some(prefs.min_job_fit_score))
            .await?;

        for candidate in candidates {
            if report.enqueued.len() as i64 >= report.remaining_today {
                break;
            }
            let Some(job) = self.jobs.job(candidate.job_id).await? else {
                continue;
            };
            if !matches_preferences(Some(&prefs), &job) {
                continue;
            }
            let existing = self.registrar.find_for_job(user_id, job.id).await?;
            if self.registrar.ensure_submittable(existing.as_ref()).is_err() {
                continue;
            }
            let task = Task::generate_resume(user_id, &job);
            if self.queue.enqueue_unique(task).await?.is_some() {
                report.enqueued.push(job.id);
            }
        }

        info!(
            %user_id,
            scored = report.scored,
            enqueued = report.enqueued.len(),
            "Auto-apply scan finished"
        );
        Ok(report)
    }

    /// One scan over every user with auto-apply enabled. A failing user is
    /// logged and skipped.
    pub async fn auto_apply_all(&self) -> Result<usize, PipelineError> {
        let users = self.profiles.auto_apply_users().await?;
        let mut enqueued = 0;
        for user_id in users {
            match self.auto_apply(user_id).await {
                Ok(report) => enqueued += report.enqueued.len(),
                Err(e) => error!(%user_id, "Auto-apply scan failed: {e}"),
            }
        }
        Ok(enqueued)
    }

    /// Periodic auto-apply plus retry of failed applications, until `stop` flips.
    pub fn spawn_scheduler(
        self: Arc<Self>,
        every: Duration,
        mut stop: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            info!(interval_secs = every.as_secs(), "Auto-apply scheduler started");
            loop {
                tokio::select! {
                    _ = stop.changed() => break,
                    _ = ticker.tick() => {
                        if let Err(e) = self.auto_apply_all().await {
                            error!("Auto-apply cycle failed: {e}");
                        }
                        if let Err(e) = self.retry_failed(None).await {
                            error!("Retry cycle failed: {e}");
                        }
                    }
                }
            }
            info!("Auto-apply scheduler stopped");
        })
    }
}
