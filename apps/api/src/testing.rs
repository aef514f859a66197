//! Shared test doubles.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use crate::applications::ApplicationRegistrar;
use crate::ledger::CreditLedger;
use crate::llm_client::{LlmError, TextGenerator, TextRequest};
use crate::matching::prompts::SCORE_SYSTEM;
use crate::matching::MatchScorer;
use crate::models::job::JobPosting;
use crate::models::profile::{Experience, Profile};
use crate::pipeline::{Pipeline, Triggers};
use crate::queue::memory::InMemoryTaskQueue;
use crate::queue::{RetryPolicy, Task};
use crate::resume::prompts::{RESUME_SYSTEM, SUMMARY_SYSTEM};
use crate::resume::ResumeCustomizer;
use crate::state::AppState;
use crate::store::memory::MemoryStore;

#[derive(Debug, Clone)]
pub enum Reply {
    Text(String),
    Fail,
    Hang,
}

/// Scripted generative service keyed by system prompt. One-shot replies
/// queued with `then` are consumed before the standing reply set with `always`.
#[derive(Default)]
pub struct FakeGenerator {
    standing: Mutex<HashMap<String, Reply>>,
    scripted: Mutex<HashMap<String, VecDeque<Reply>>>,
    calls: Mutex<HashMap<String, usize>>,
}

impl FakeGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn always(self, system: &str, reply: Reply) -> Self {
        self.standing
            .lock()
            .unwrap()
            .insert(system.to_string(), reply);
        self
    }

    pub fn then(self, system: &str, reply: Reply) -> Self {
        self.scripted
            .lock()
            .unwrap()
            .entry(system.to_string())
            .or_default()
            .push_back(reply);
        self
    }

    pub fn calls(&self, system: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .get(system)
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl TextGenerator for FakeGenerator {
    async fn generate(&self, request: TextRequest<'_>) -> Result<String, LlmError> {
        *self
            .calls
            .lock()
            .unwrap()
            .entry(request.system.to_string())
            .or_default() += 1;

        let scripted = self
            .scripted
            .lock()
            .unwrap()
            .get_mut(request.system)
            .and_then(VecDeque::pop_front);
        let reply = scripted.or_else(|| self.standing.lock().unwrap().get(request.system).cloned());

        match reply {
            Some(Reply::Text(text)) => Ok(text),
            Some(Reply::Hang) => std::future::pending().await,
            Some(Reply::Fail) | None => Err(LlmError::Api {
                status: 503,
                message: "overloaded".to_string(),
            }),
        }
    }
}

pub fn sample_profile(user_id: Uuid) -> Profile {
    Profile {
        user_id,
        skills: vec!["Rust".into(), "PostgreSQL".into(), "Kubernetes".into()],
        experience: Experience {
            years: Some(6),
            roles: vec!["Backend Engineer".into(), "Platform Engineer".into()],
        },
        target_roles: vec!["Backend Engineer".into()],
        locations: vec!["Berlin".into(), "Remote".into()],
        bio: Some("Builds payment infrastructure.".into()),
        original_resume: Some("Jane Doe\nBackend Engineer at Ledgerly, 2019-2024".into()),
    }
}

/// Every component wired over one `MemoryStore`, one scripted generator and
/// one in-memory queue, with a seeded user (profile, credits) and job.
pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub llm: Arc<FakeGenerator>,
    pub queue: Arc<InMemoryTaskQueue>,
    pub ledger: CreditLedger,
    pub scorer: MatchScorer,
    pub customizer: ResumeCustomizer,
    pub registrar: ApplicationRegistrar,
    pub pipeline: Pipeline,
    pub triggers: Triggers,
    pub user: Uuid,
    pub job: JobPosting,
}

impl Harness {
    pub const MAX_RETRIES: i32 = 3;
    pub const LLM_TIMEOUT: Duration = Duration::from_secs(30);

    pub fn new(balance: i32) -> Self {
        Self::with_llm(balance, |llm| llm)
    }

    /// `script` runs after the default happy-path replies are installed, so
    /// it can override or prepend to them.
    pub fn with_llm(balance: i32, script: impl FnOnce(FakeGenerator) -> FakeGenerator) -> Self {
        let llm = FakeGenerator::new()
            .always(SCORE_SYSTEM, Reply::Text(r#"{"score": 85, "reason": "Solid overlap"}"#.into()))
            .always(RESUME_SYSTEM, Reply::Text("Jane Doe\nRust payments engineer".into()))
            .always(SUMMARY_SYSTEM, Reply::Text("Moved payments work to the top.".into()));
        let llm = Arc::new(script(llm));

        let store = Arc::new(MemoryStore::new());
        let user = Uuid::new_v4();
        store.seed_account(user, balance);
        store.seed_profile(sample_profile(user));
        let job = store.seed_job("Backend Engineer", "Acme", Some("Berlin"));

        let queue = Arc::new(InMemoryTaskQueue::new(RetryPolicy::new(
            Self::MAX_RETRIES as u32,
            Duration::from_secs(1),
        )));

        let ledger = CreditLedger::new(store.clone());
        let scorer = MatchScorer::new(
            llm.clone(),
            store.clone(),
            store.clone(),
            store.clone(),
            Self::LLM_TIMEOUT,
        );
        let customizer =
            ResumeCustomizer::new(llm.clone(), store.clone(), store.clone(), Self::LLM_TIMEOUT);
        let registrar = ApplicationRegistrar::new(store.clone(), Self::MAX_RETRIES);
        let pipeline = Pipeline::new(customizer.clone(), registrar.clone(), queue.clone());
        let triggers = Triggers::new(
            scorer.clone(),
            registrar.clone(),
            queue.clone(),
            store.clone(),
            store.clone(),
        );

        Harness {
            store,
            llm,
            queue,
            ledger,
            scorer,
            customizer,
            registrar,
            pipeline,
            triggers,
            user,
            job,
        }
    }

    pub fn generate_task(&self) -> Task {
        Task::generate_resume(self.user, &self.job)
    }

    pub fn state(&self) -> AppState {
        AppState {
            ledger: self.ledger.clone(),
            scorer: self.scorer.clone(),
            customizer: self.customizer.clone(),
            registrar: self.registrar.clone(),
            triggers: self.triggers.clone(),
        }
    }
}
