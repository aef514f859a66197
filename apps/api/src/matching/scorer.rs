//! Match Scorer: one advisory 0–100 fit score per (user, job), produced by the
//! generative service and persisted first-write-wins.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::errors::PipelineError;
use crate::llm_client::{generate_within, TextGenerator, TextRequest};
use crate::matching::prompts::{SCORE_MAX_TOKENS, SCORE_PROMPT_TEMPLATE, SCORE_SYSTEM};
use crate::models::job::{JobMatch, JobPosting, MatchedJob};
use crate::models::profile::Profile;
use crate::store::{JobStore, MatchStore, ProfileStore};

/// Score used when the service's answer cannot be read.
pub const DEFAULT_SCORE: i32 = 50;
pub const UNANALYZED_REASON: &str = "unable to analyze";
const MISSING_REASON: &str = "unable to determine match reason";

/// Threshold for the matched-jobs listing when the caller gives none.
pub const DEFAULT_MIN_SCORE: i32 = 70;
pub const DEFAULT_TOP_LIMIT: i64 = 10;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchScore {
    pub fit_score: i32,
    pub reason: String,
}

impl MatchScore {
    fn unanalyzed() -> Self {
        MatchScore {
            fit_score: DEFAULT_SCORE,
            reason: UNANALYZED_REASON.to_string(),
        }
    }
}

#[derive(Clone)]
pub struct MatchScorer {
    llm: Arc<dyn TextGenerator>,
    profiles: Arc<dyn ProfileStore>,
    matches: Arc<dyn MatchStore>,
    jobs: Arc<dyn JobStore>,
    llm_timeout: Duration,
}

impl MatchScorer {
    pub fn new(
        llm: Arc<dyn TextGenerator>,
        profiles: Arc<dyn ProfileStore>,
        matches: Arc<dyn MatchStore>,
        jobs: Arc<dyn JobStore>,
        llm_timeout: Duration,
    ) -> Self {
        Self {
            llm,
            profiles,
            matches,
            jobs,
            llm_timeout,
        }
    }

    /// Scores one job for one user. An existing match is returned unchanged
    /// without calling the service, so re-running is safe.
    pub async fn score(&self, user_id: Uuid, job: &JobPosting) -> Result<JobMatch, PipelineError> {
        if let Some(existing) = self.matches.find_match(user_id, job.id).await? {
            debug!(%user_id, job_id = %job.id, "Match already scored, skipping");
            return Ok(existing);
        }
        let profile = self.load_profile(user_id).await?;
        self.score_with_profile(&profile, job).await
    }

    /// `score` for a job looked up by id.
    pub async fn score_job(&self, user_id: Uuid, job_id: Uuid) -> Result<JobMatch, PipelineError> {
        let job = self
            .jobs
            .job(job_id)
            .await?
            .ok_or_else(|| PipelineError::NotFound(format!("Job {job_id} not found")))?;
        self.score(user_id, &job).await
    }

    /// Scores every job the user has no match for yet. A job that fails to
    /// score is logged and skipped; it stays unscored for the next run.
    pub async fn score_all(&self, user_id: Uuid) -> Result<Vec<JobMatch>, PipelineError> {
        let profile = self.load_profile(user_id).await?;
        let jobs = self.jobs.unscored_jobs(user_id).await?;
        let total = jobs.len();

        let mut scored = Vec::with_capacity(total);
        for job in &jobs {
            match self.score_with_profile(&profile, job).await {
                Ok(m) => scored.push(m),
                Err(e) => warn!(%user_id, job_id = %job.id, "Skipping job that failed to score: {e}"),
            }
        }

        info!(%user_id, scored = scored.len(), total, "Batch scoring finished");
        Ok(scored)
    }

    /// Matches at or above `min_score` (default 70), best first.
    pub async fn matched_jobs(
        &self,
        user_id: Uuid,
        min_score: Option<i32>,
    ) -> Result<Vec<MatchedJob>, PipelineError> {
        let min_score = min_score.unwrap_or(DEFAULT_MIN_SCORE).clamp(0, 100);
        self.matches.matches_above(user_id, min_score, None).await
    }

    pub async fn top_matches(
        &self,
        user_id: Uuid,
        limit: Option<i64>,
    ) -> Result<Vec<MatchedJob>, PipelineError> {
        let limit = limit.unwrap_or(DEFAULT_TOP_LIMIT).max(1);
        self.matches.matches_above(user_id, 0, Some(limit)).await
    }

    async fn load_profile(&self, user_id: Uuid) -> Result<Profile, PipelineError> {
        self.profiles
            .profile(user_id)
            .await?
            .ok_or_else(|| PipelineError::NotFound(format!("Profile for user {user_id} not found")))
    }

    async fn score_with_profile(
        &self,
        profile: &Profile,
        job: &JobPosting,
    ) -> Result<JobMatch, PipelineError> {
        let prompt = SCORE_PROMPT_TEMPLATE
            .replace("{job_title}", &job.title)
            .replace("{company}", &job.company)
            .replace("{job_description}", &job.description)
            .replace("{profile}", &build_profile_text(profile));

        let raw = generate_within(
            self.llm.as_ref(),
            TextRequest {
                system: SCORE_SYSTEM,
                prompt: &prompt,
                max_tokens: SCORE_MAX_TOKENS,
            },
            self.llm_timeout,
        )
        .await?;

        let score = parse_score_response(&raw);
        debug!(job_id = %job.id, fit_score = score.fit_score, "Job scored");

        self.matches
            .insert_match(profile.user_id, job.id, score.fit_score, &score.reason)
            .await
    }
}

/// Plain-text candidate summary sent alongside the job.
pub fn build_profile_text(profile: &Profile) -> String {
    let or_na = |items: &[String]| {
        if items.is_empty() {
            "N/A".to_string()
        } else {
            items.join(", ")
        }
    };
    let years = profile
        .experience
        .years
        .map_or_else(|| "N/A".to_string(), |y| y.to_string());

    format!(
        "Skills: {}\nExperience: {} years\nPrevious Roles: {}\nPreferred Locations: {}\nBio: {}",
        or_na(&profile.skills),
        years,
        or_na(&profile.experience.roles),
        or_na(&profile.locations),
        profile.bio.as_deref().unwrap_or("N/A"),
    )
}

/// Reads `{score, reason}` out of free-form service output.
///
/// Takes the outermost `{...}` span, accepts a number or numeric string for
/// `score`, truncates and clamps it to 0–100. Anything unreadable yields
/// `DEFAULT_SCORE` with `UNANALYZED_REASON`.
pub fn parse_score_response(raw: &str) -> MatchScore {
    let (Some(start), Some(end)) = (raw.find('{'), raw.rfind('}')) else {
        return MatchScore::unanalyzed();
    };
    if end < start {
        return MatchScore::unanalyzed();
    }
    let Ok(value) = serde_json::from_str::<Value>(&raw[start..=end]) else {
        return MatchScore::unanalyzed();
    };

    let score = match value.get("score") {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    let Some(score) = score.filter(|s| s.is_finite()) else {
        return MatchScore::unanalyzed();
    };

    let reason = value
        .get("reason")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .unwrap_or(MISSING_REASON);

    MatchScore {
        fit_score: score.trunc().clamp(0.0, 100.0) as i32,
        reason: reason.to_string(),
    }
}
