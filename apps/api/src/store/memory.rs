//! In-memory store used by unit tests. One mutex guards every table, so each
//! trait call is atomic the way the Postgres statements are.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{
    ApplicationStore, JobStore, LedgerStore, MatchStore, ProfileStore, ResumeStore, StoreResult,
};
use crate::errors::PipelineError;
use crate::models::application::{
    Application, ApplicationStatus, NewApplication, Platform, ResponseStatus,
};
use crate::models::credit::CreditAccount;
use crate::models::job::{JobMatch, JobPosting, MatchedJob};
use crate::models::profile::{JobPreferences, Profile};
use crate::models::resume::{NewResume, Resume};

#[derive(Default)]
struct Tables {
    accounts: HashMap<Uuid, CreditAccount>,
    applications: Vec<Application>,
    matches: Vec<JobMatch>,
    resumes: Vec<Resume>,
    profiles: HashMap<Uuid, Profile>,
    preferences: HashMap<Uuid, JobPreferences>,
    jobs: Vec<JobPosting>,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> std::sync::MutexGuard<'_, Tables> {
        self.tables.lock().unwrap()
    }

    pub fn seed_account(&self, user_id: Uuid, balance: i32) {
        self.tables().accounts.insert(
            user_id,
            CreditAccount {
                user_id,
                balance,
                total_purchased: balance,
                total_used: 0,
                updated_at: Utc::now(),
            },
        );
    }

    pub fn seed_profile(&self, profile: Profile) {
        self.tables().profiles.insert(profile.user_id, profile);
    }

    pub fn seed_preferences(&self, preferences: JobPreferences) {
        self.tables()
            .preferences
            .insert(preferences.user_id, preferences);
    }

    pub fn seed_job(&self, title: &str, company: &str, location: Option<&str>) -> JobPosting {
        let job = JobPosting {
            id: Uuid::new_v4(),
            platform: Platform::Linkedin,
            title: title.to_string(),
            company: company.to_string(),
            location: location.map(str::to_string),
            salary_min: None,
            salary_max: None,
            description: format!("{title} at {company}. Own services end to end."),
            url: format!("https://jobs.example.com/{}", title.to_lowercase().replace(' ', "-")),
            created_at: Utc::now(),
        };
        self.tables().jobs.push(job.clone());
        job
    }

    pub fn balance(&self, user_id: Uuid) -> Option<i32> {
        self.tables().accounts.get(&user_id).map(|a| a.balance)
    }

    pub fn application_rows(&self, user_id: Uuid, job_id: Uuid) -> usize {
        self.tables()
            .applications
            .iter()
            .filter(|a| a.user_id == user_id && a.job_id == job_id)
            .count()
    }

    pub fn match_count(&self, user_id: Uuid) -> usize {
        self.tables()
            .matches
            .iter()
            .filter(|m| m.user_id == user_id)
            .count()
    }

    /// Inserts an application row directly, bypassing the ledger.
    pub fn seed_application(
        &self,
        user_id: Uuid,
        job_id: Uuid,
        status: ApplicationStatus,
        retry_count: i32,
    ) -> Application {
        let now = Utc::now();
        let application = Application {
            id: Uuid::new_v4(),
            user_id,
            job_id,
            resume_id: Uuid::new_v4(),
            status,
            response_status: ResponseStatus::NoResponse,
            applied_via: None,
            applied_at: (status != ApplicationStatus::Draft).then_some(now),
            error_message: None,
            retry_count,
            last_retry_at: None,
            created_at: now,
            updated_at: now,
        };
        self.tables().applications.push(application.clone());
        application
    }
}

fn debit_in(tables: &mut Tables, user_id: Uuid, amount: i32) -> StoreResult<i32> {
    let account = tables
        .accounts
        .get_mut(&user_id)
        .ok_or(PipelineError::AccountNotFound(user_id))?;
    if account.balance < amount {
        return Err(PipelineError::InsufficientCredits {
            balance: account.balance,
            required: amount,
        });
    }
    account.balance -= amount;
    account.total_used += amount;
    account.updated_at = Utc::now();
    Ok(account.balance)
}

fn mutable_application(
    tables: &mut Tables,
    application_id: Uuid,
    to: ApplicationStatus,
) -> StoreResult<&mut Application> {
    let application = tables
        .applications
        .iter_mut()
        .find(|a| a.id == application_id)
        .ok_or_else(|| PipelineError::NotFound(format!("Application {application_id} not found")))?;
    if !application.status.accepts_updates() {
        return Err(PipelineError::IllegalTransition {
            from: application.status,
            to,
        });
    }
    Ok(application)
}

#[async_trait]
impl LedgerStore for MemoryStore {
    async fn open_account(&self, user_id: Uuid) -> StoreResult<CreditAccount> {
        let mut tables = self.tables();
        let account = tables.accounts.entry(user_id).or_insert_with(|| CreditAccount {
            user_id,
            balance: 0,
            total_purchased: 0,
            total_used: 0,
            updated_at: Utc::now(),
        });
        Ok(account.clone())
    }

    async fn account(&self, user_id: Uuid) -> StoreResult<Option<CreditAccount>> {
        Ok(self.tables().accounts.get(&user_id).cloned())
    }

    async fn debit(&self, user_id: Uuid, amount: i32) -> StoreResult<i32> {
        debit_in(&mut self.tables(), user_id, amount)
    }

    async fn credit(&self, user_id: Uuid, amount: i32) -> StoreResult<i32> {
        let mut tables = self.tables();
        let account = tables
            .accounts
            .get_mut(&user_id)
            .ok_or(PipelineError::AccountNotFound(user_id))?;
        account.balance += amount;
        account.total_purchased += amount;
        account.updated_at = Utc::now();
        Ok(account.balance)
    }
}

#[async_trait]
impl ApplicationStore for MemoryStore {
    async fn register(&self, new: &NewApplication, charge: i32) -> StoreResult<Application> {
        let mut tables = self.tables();
        if tables
            .applications
            .iter()
            .any(|a| a.user_id == new.user_id && a.job_id == new.job_id)
        {
            return Err(PipelineError::AlreadyApplied {
                user_id: new.user_id,
                job_id: new.job_id,
            });
        }
        if charge > 0 {
            debit_in(&mut tables, new.user_id, charge)?;
        }
        let now = Utc::now();
        let application = Application {
            id: Uuid::new_v4(),
            user_id: new.user_id,
            job_id: new.job_id,
            resume_id: new.resume_id,
            status: ApplicationStatus::Submitted,
            response_status: ResponseStatus::NoResponse,
            applied_via: new.applied_via,
            applied_at: Some(now),
            error_message: None,
            retry_count: 0,
            last_retry_at: None,
            created_at: now,
            updated_at: now,
        };
        tables.applications.push(application.clone());
        Ok(application)
    }

    async fn resubmit(
        &self,
        application_id: Uuid,
        resume_id: Uuid,
        max_retries: i32,
    ) -> StoreResult<Option<Application>> {
        let mut tables = self.tables();
        let Some(application) = tables
            .applications
            .iter_mut()
            .find(|a| a.id == application_id && a.is_retry_eligible(max_retries))
        else {
            return Ok(None);
        };
        let now = Utc::now();
        application.status = ApplicationStatus::Submitted;
        application.resume_id = resume_id;
        application.error_message = None;
        application.applied_at = Some(now);
        application.updated_at = now;
        Ok(Some(application.clone()))
    }

    async fn submit_draft(
        &self,
        application_id: Uuid,
        resume_id: Uuid,
        charge: i32,
    ) -> StoreResult<Option<Application>> {
        let mut tables = self.tables();
        let Some(index) = tables
            .applications
            .iter()
            .position(|a| a.id == application_id && a.status == ApplicationStatus::Draft)
        else {
            return Ok(None);
        };
        let user_id = tables.applications[index].user_id;
        if charge > 0 {
            debit_in(&mut tables, user_id, charge)?;
        }
        let now = Utc::now();
        let application = &mut tables.applications[index];
        application.status = ApplicationStatus::Submitted;
        application.resume_id = resume_id;
        application.applied_at = Some(now);
        application.updated_at = now;
        Ok(Some(application.clone()))
    }

    async fn find_application(&self, application_id: Uuid) -> StoreResult<Option<Application>> {
        Ok(self
            .tables()
            .applications
            .iter()
            .find(|a| a.id == application_id)
            .cloned())
    }

    async fn find_for_job(&self, user_id: Uuid, job_id: Uuid) -> StoreResult<Option<Application>> {
        Ok(self
            .tables()
            .applications
            .iter()
            .find(|a| a.user_id == user_id && a.job_id == job_id)
            .cloned())
    }

    async fn record_failure(
        &self,
        application_id: Uuid,
        message: &str,
    ) -> StoreResult<Application> {
        let mut tables = self.tables();
        let application =
            mutable_application(&mut tables, application_id, ApplicationStatus::Failed)?;
        let now = Utc::now();
        application.status = ApplicationStatus::Failed;
        application.error_message = Some(message.to_string());
        application.retry_count += 1;
        application.last_retry_at = Some(now);
        application.updated_at = now;
        Ok(application.clone())
    }

    async fn set_status(
        &self,
        application_id: Uuid,
        status: ApplicationStatus,
        response: Option<ResponseStatus>,
    ) -> StoreResult<Application> {
        let mut tables = self.tables();
        let application = mutable_application(&mut tables, application_id, status)?;
        let now = Utc::now();
        application.status = status;
        if let Some(response) = response {
            application.response_status = response;
        }
        application.updated_at = now;
        Ok(application.clone())
    }

    async fn list_applications(
        &self,
        user_id: Uuid,
        status: Option<ApplicationStatus>,
    ) -> StoreResult<Vec<Application>> {
        let mut applications: Vec<_> = self
            .tables()
            .applications
            .iter()
            .filter(|a| a.user_id == user_id && status.map_or(true, |s| a.status == s))
            .cloned()
            .collect();
        applications.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(applications)
    }

    async fn status_counts(&self, user_id: Uuid) -> StoreResult<Vec<(ApplicationStatus, i64)>> {
        let mut counts: HashMap<ApplicationStatus, i64> = HashMap::new();
        for application in self
            .tables()
            .applications
            .iter()
            .filter(|a| a.user_id == user_id)
        {
            *counts.entry(application.status).or_default() += 1;
        }
        Ok(counts.into_iter().collect())
    }

    async fn ready_for_retry(
        &self,
        user_id: Option<Uuid>,
        max_retries: i32,
        limit: i64,
    ) -> StoreResult<Vec<Application>> {
        let mut ready: Vec<_> = self
            .tables()
            .applications
            .iter()
            .filter(|a| a.is_retry_eligible(max_retries))
            .filter(|a| user_id.map_or(true, |u| a.user_id == u))
            .cloned()
            .collect();
        ready.sort_by_key(|a| a.last_retry_at);
        ready.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(ready)
    }

    async fn submitted_since(&self, user_id: Uuid, since: DateTime<Utc>) -> StoreResult<i64> {
        let count = self
            .tables()
            .applications
            .iter()
            .filter(|a| a.user_id == user_id && a.applied_at.is_some_and(|at| at >= since))
            .count();
        Ok(count as i64)
    }
}

#[async_trait]
impl MatchStore for MemoryStore {
    async fn find_match(&self, user_id: Uuid, job_id: Uuid) -> StoreResult<Option<JobMatch>> {
        Ok(self
            .tables()
            .matches
            .iter()
            .find(|m| m.user_id == user_id && m.job_id == job_id)
            .cloned())
    }

    async fn insert_match(
        &self,
        user_id: Uuid,
        job_id: Uuid,
        fit_score: i32,
        match_reason: &str,
    ) -> StoreResult<JobMatch> {
        let mut tables = self.tables();
        if let Some(existing) = tables
            .matches
            .iter()
            .find(|m| m.user_id == user_id && m.job_id == job_id)
        {
            return Ok(existing.clone());
        }
        let created = JobMatch {
            id: Uuid::new_v4(),
            user_id,
            job_id,
            fit_score,
            match_reason: match_reason.to_string(),
            created_at: Utc::now(),
        };
        tables.matches.push(created.clone());
        Ok(created)
    }

    async fn matches_above(
        &self,
        user_id: Uuid,
        min_score: i32,
        limit: Option<i64>,
    ) -> StoreResult<Vec<MatchedJob>> {
        let tables = self.tables();
        let mut matched: Vec<_> = tables
            .matches
            .iter()
            .filter(|m| m.user_id == user_id && m.fit_score >= min_score)
            .filter_map(|m| {
                let job = tables.jobs.iter().find(|j| j.id == m.job_id)?;
                Some(MatchedJob {
                    job_id: m.job_id,
                    fit_score: m.fit_score,
                    match_reason: m.match_reason.clone(),
                    title: job.title.clone(),
                    company: job.company.clone(),
                    location: job.location.clone(),
                    url: job.url.clone(),
                })
            })
            .collect();
        matched.sort_by(|a, b| b.fit_score.cmp(&a.fit_score));
        if let Some(limit) = limit {
            matched.truncate(usize::try_from(limit).unwrap_or(0));
        }
        Ok(matched)
    }
}

#[async_trait]
impl ResumeStore for MemoryStore {
    async fn insert_resume(&self, new: &NewResume) -> StoreResult<Resume> {
        let mut tables = self.tables();
        let mut latest = 0;
        for resume in tables.resumes.iter_mut().filter(|r| {
            r.user_id == new.user_id && r.customized_for_job_id == new.customized_for_job_id
        }) {
            resume.is_active = false;
            latest = latest.max(resume.version);
        }
        let resume = Resume {
            id: Uuid::new_v4(),
            user_id: new.user_id,
            original_text: new.original_text.clone(),
            customized_text: new.customized_text.clone(),
            customized_for_job_id: new.customized_for_job_id,
            change_summary: new.change_summary.clone(),
            version: latest + 1,
            is_active: true,
            created_at: Utc::now(),
        };
        tables.resumes.push(resume.clone());
        Ok(resume)
    }

    async fn find_resume(&self, resume_id: Uuid) -> StoreResult<Option<Resume>> {
        Ok(self
            .tables()
            .resumes
            .iter()
            .find(|r| r.id == resume_id)
            .cloned())
    }

    async fn list_resumes(&self, user_id: Uuid) -> StoreResult<Vec<Resume>> {
        let mut resumes: Vec<_> = self
            .tables()
            .resumes
            .iter()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        resumes.reverse();
        Ok(resumes)
    }
}

#[async_trait]
impl ProfileStore for MemoryStore {
    async fn profile(&self, user_id: Uuid) -> StoreResult<Option<Profile>> {
        Ok(self.tables().profiles.get(&user_id).cloned())
    }

    async fn preferences(&self, user_id: Uuid) -> StoreResult<Option<JobPreferences>> {
        Ok(self.tables().preferences.get(&user_id).cloned())
    }

    async fn auto_apply_users(&self) -> StoreResult<Vec<Uuid>> {
        Ok(self
            .tables()
            .preferences
            .values()
            .filter(|p| p.auto_apply_enabled)
            .map(|p| p.user_id)
            .collect())
    }
}

#[async_trait]
impl JobStore for MemoryStore {
    async fn job(&self, job_id: Uuid) -> StoreResult<Option<JobPosting>> {
        Ok(self.tables().jobs.iter().find(|j| j.id == job_id).cloned())
    }

    async fn unscored_jobs(&self, user_id: Uuid) -> StoreResult<Vec<JobPosting>> {
        let tables = self.tables();
        Ok(tables
            .jobs
            .iter()
            .filter(|j| {
                !tables
                    .matches
                    .iter()
                    .any(|m| m.user_id == user_id && m.job_id == j.id)
            })
            .cloned()
            .collect())
    }
}
