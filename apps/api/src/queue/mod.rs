//! Durable task queue for the two pipeline stages.
//!
//! Delivery is at-least-once: a dequeued task stays in a processing set until
//! it is acked, and a nack either schedules a delayed redelivery or moves the
//! task to a dead-letter list. Whether to redeliver is the queue's decision,
//! driven by `RetryPolicy` and the retryability the worker reports.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::models::job::{JobPosting, JobTarget};

#[cfg(test)]
pub mod memory;
pub mod redis_queue;

pub use redis_queue::RedisTaskQueue;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Task codec error: {0}")]
    Codec(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    GenerateResume,
    SubmitApplication,
}

impl TaskKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::GenerateResume => "generate_resume",
            TaskKind::SubmitApplication => "submit_application",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unit of pipeline work for one (user, job) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub kind: TaskKind,
    pub user_id: Uuid,
    pub job_id: Uuid,
    /// Set on submission tasks once the resume exists.
    pub resume_id: Option<Uuid>,
    pub job_description: String,
    pub job_title: String,
    pub company_name: String,
}

impl Task {
    pub fn generate_resume(user_id: Uuid, job: &JobPosting) -> Self {
        Task {
            kind: TaskKind::GenerateResume,
            user_id,
            job_id: job.id,
            resume_id: None,
            job_description: job.description.clone(),
            job_title: job.title.clone(),
            company_name: job.company.clone(),
        }
    }

    /// The follow-up submission for a completed resume generation.
    pub fn submission_for(&self, resume_id: Uuid) -> Self {
        Task {
            kind: TaskKind::SubmitApplication,
            resume_id: Some(resume_id),
            ..self.clone()
        }
    }

    /// Identifies the (user, job) pair for claims.
    pub fn pair_key(&self) -> String {
        format!("{}:{}", self.user_id, self.job_id)
    }

    pub fn target(&self) -> JobTarget {
        JobTarget {
            job_id: Some(self.job_id),
            title: self.job_title.clone(),
            company: self.company_name.clone(),
            description: self.job_description.clone(),
        }
    }
}

/// A task handed to a worker, with its delivery bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Delivery {
    pub id: Uuid,
    pub task: Task,
    /// 1 on first delivery.
    pub attempt: u32,
    pub enqueued_at: DateTime<Utc>,
    /// Backend handle used to ack or nack this exact delivery.
    #[serde(skip)]
    pub receipt: String,
}

impl Delivery {
    pub fn new(task: Task) -> Self {
        Delivery {
            id: Uuid::new_v4(),
            task,
            attempt: 1,
            enqueued_at: Utc::now(),
            receipt: String::new(),
        }
    }

    /// The same task, one attempt later.
    pub fn next_attempt(&self) -> Self {
        Delivery {
            attempt: self.attempt + 1,
            receipt: String::new(),
            ..self.clone()
        }
    }
}

/// What the queue did with a nacked delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Redelivery {
    Scheduled(Duration),
    DeadLettered,
}

/// Redelivery policy with exponential backoff.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_backoff: Duration,
}

impl RetryPolicy {
    const MAX_BACKOFF_SHIFT: u32 = 6;

    pub fn new(max_attempts: u32, base_backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_backoff,
        }
    }

    /// Delay before redelivering after `attempt` failed: base, 2×base, 4×base, ...
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(Self::MAX_BACKOFF_SHIFT);
        self.base_backoff * (1u32 << shift)
    }

    pub fn decide(&self, attempt: u32, retryable: bool) -> Redelivery {
        if retryable && attempt < self.max_attempts {
            Redelivery::Scheduled(self.backoff_for(attempt))
        } else {
            Redelivery::DeadLettered
        }
    }
}

/// Producers that start a pair's pipeline go through `enqueue_unique`, which
/// holds a claim on the (user, job) pair until a worker `release`s it. A
/// scan that runs while the pair is still queued, in flight or waiting for
/// redelivery enqueues nothing.
#[async_trait]
pub trait TaskQueue: Send + Sync {
    async fn enqueue(&self, task: Task) -> Result<Uuid, QueueError>;

    /// Enqueues and claims the task's pair. `None` when the pair is already claimed.
    async fn enqueue_unique(&self, task: Task) -> Result<Option<Uuid>, QueueError>;

    /// Drops the pair's claim once its work has finished or been abandoned.
    async fn release(&self, task: &Task) -> Result<(), QueueError>;

    /// Claims the next ready task of `kind`, if any. Does not block.
    async fn dequeue(&self, kind: TaskKind) -> Result<Option<Delivery>, QueueError>;

    async fn ack(&self, delivery: &Delivery) -> Result<(), QueueError>;

    async fn nack(&self, delivery: &Delivery, retryable: bool) -> Result<Redelivery, QueueError>;
}
