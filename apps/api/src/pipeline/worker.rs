//! Fixed-size worker pools, one per task kind, pulling from the shared queue.
//!
//! The pools are independent so slow resume generation cannot starve
//! submissions. Workers never retry synchronously: a failed task is nacked
//! and the queue's policy decides on redelivery.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::pipeline::{Pipeline, TaskOutcome};
use crate::queue::{Delivery, Redelivery, TaskKind, TaskQueue};

#[derive(Debug, Clone, Copy)]
pub struct WorkerSettings {
    pub resume_workers: usize,
    pub submit_workers: usize,
    /// Sleep between polls of an empty queue.
    pub poll_interval: Duration,
}

pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
    shutdown: watch::Sender<bool>,
}

impl WorkerPool {
    pub fn spawn(pipeline: Arc<Pipeline>, settings: WorkerSettings) -> Self {
        let (shutdown, stop) = watch::channel(false);
        let mut handles = Vec::with_capacity(settings.resume_workers + settings.submit_workers);

        for (kind, count) in [
            (TaskKind::GenerateResume, settings.resume_workers),
            (TaskKind::SubmitApplication, settings.submit_workers),
        ] {
            for worker_id in 0..count {
                handles.push(tokio::spawn(run_worker(
                    worker_id,
                    kind,
                    pipeline.clone(),
                    settings.poll_interval,
                    stop.clone(),
                )));
            }
        }

        info!(
            resume_workers = settings.resume_workers,
            submit_workers = settings.submit_workers,
            "Worker pools started"
        );
        Self { handles, shutdown }
    }

    /// Lets in-flight tasks finish, then waits for every worker to exit.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        for handle in self.handles {
            if let Err(e) = handle.await {
                error!("Worker panicked during shutdown: {e}");
            }
        }
        info!("Worker pools stopped");
    }
}

async fn run_worker(
    worker_id: usize,
    kind: TaskKind,
    pipeline: Arc<Pipeline>,
    poll_interval: Duration,
    mut stop: watch::Receiver<bool>,
) {
    let queue = pipeline.queue();
    while !*stop.borrow() {
        match queue.dequeue(kind).await {
            Ok(Some(delivery)) => {
                process_delivery(&pipeline, queue.as_ref(), delivery).await;
            }
            Ok(None) => idle(poll_interval, &mut stop).await,
            Err(e) => {
                error!(worker_id, %kind, "Dequeue failed: {e}");
                idle(poll_interval, &mut stop).await;
            }
        }
    }
}

async fn idle(poll_interval: Duration, stop: &mut watch::Receiver<bool>) {
    tokio::select! {
        _ = tokio::time::sleep(poll_interval) => {}
        _ = stop.changed() => {}
    }
}

/// Runs one delivery and settles it with the queue. Returns `None` when the
/// delivery was acked, or what the queue did with the nack.
///
/// The pair's claim is dropped once its pipeline ends: after any outcome but
/// a generated resume (whose submission is still queued), or when the task
/// is dead-lettered. A scheduled redelivery keeps the claim.
pub async fn process_delivery(
    pipeline: &Pipeline,
    queue: &dyn TaskQueue,
    delivery: Delivery,
) -> Option<Redelivery> {
    let task = &delivery.task;
    match pipeline.handle(task).await {
        Ok(outcome) => {
            info!(
                task_id = %delivery.id,
                kind = %task.kind,
                attempt = delivery.attempt,
                user_id = %task.user_id,
                job_id = %task.job_id,
                ?outcome,
                "Task completed"
            );
            if let Err(e) = queue.ack(&delivery).await {
                error!(task_id = %delivery.id, "Ack failed, task may be redelivered: {e}");
            }
            if !matches!(outcome, TaskOutcome::ResumeGenerated { .. }) {
                release_claim(queue, &delivery).await;
            }
            None
        }
        Err(err) => {
            let retryable = err.is_retryable();
            match queue.nack(&delivery, retryable).await {
                Ok(decision) => {
                    warn!(
                        task_id = %delivery.id,
                        kind = %task.kind,
                        attempt = delivery.attempt,
                        user_id = %task.user_id,
                        job_id = %task.job_id,
                        retryable,
                        ?decision,
                        "Task failed: {err}"
                    );
                    if decision == Redelivery::DeadLettered {
                        release_claim(queue, &delivery).await;
                    }
                    Some(decision)
                }
                Err(e) => {
                    error!(task_id = %delivery.id, "Nack failed after task error ({err}): {e}");
                    None
                }
            }
        }
    }
}

async fn release_claim(queue: &dyn TaskQueue, delivery: &Delivery) {
    if let Err(e) = queue.release(&delivery.task).await {
        warn!(task_id = %delivery.id, "Could not release pair claim: {e}");
    }
}
