//! In-process queue with the same delivery semantics as `RedisTaskQueue`.
//! Delays use tokio's clock so paused-time tests can step through backoff.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::time::Instant;
use uuid::Uuid;

use super::{Delivery, QueueError, Redelivery, RetryPolicy, Task, TaskKind, TaskQueue};

#[derive(Default)]
struct Lane {
    ready: VecDeque<Delivery>,
    delayed: Vec<(Instant, Delivery)>,
    in_flight: HashMap<Uuid, Delivery>,
    dead: Vec<Delivery>,
}

pub struct InMemoryTaskQueue {
    lanes: Mutex<HashMap<TaskKind, Lane>>,
    claims: Mutex<HashSet<String>>,
    policy: RetryPolicy,
}

impl InMemoryTaskQueue {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            lanes: Mutex::new(HashMap::new()),
            claims: Mutex::new(HashSet::new()),
            policy,
        }
    }

    pub fn is_claimed(&self, task: &Task) -> bool {
        self.claims.lock().unwrap().contains(&task.pair_key())
    }

    fn with_lane<T>(&self, kind: TaskKind, f: impl FnOnce(&mut Lane) -> T) -> T {
        let mut lanes = self.lanes.lock().unwrap();
        f(lanes.entry(kind).or_default())
    }

    pub fn dead_letters(&self, kind: TaskKind) -> Vec<Delivery> {
        self.with_lane(kind, |lane| lane.dead.clone())
    }

    /// Tasks of `kind` that are ready, delayed or in flight.
    pub fn pending(&self, kind: TaskKind) -> usize {
        self.with_lane(kind, |lane| {
            lane.ready.len() + lane.delayed.len() + lane.in_flight.len()
        })
    }

    /// Ready tasks of `kind`, oldest first.
    pub fn ready_tasks(&self, kind: TaskKind) -> Vec<Task> {
        self.with_lane(kind, |lane| {
            lane.ready.iter().map(|d| d.task.clone()).collect()
        })
    }
}

#[async_trait]
impl TaskQueue for InMemoryTaskQueue {
    async fn enqueue(&self, task: Task) -> Result<Uuid, QueueError> {
        let delivery = Delivery::new(task);
        let id = delivery.id;
        self.with_lane(delivery.task.kind, |lane| lane.ready.push_back(delivery));
        Ok(id)
    }

    async fn enqueue_unique(&self, task: Task) -> Result<Option<Uuid>, QueueError> {
        if !self.claims.lock().unwrap().insert(task.pair_key()) {
            return Ok(None);
        }
        self.enqueue(task).await.map(Some)
    }

    async fn release(&self, task: &Task) -> Result<(), QueueError> {
        self.claims.lock().unwrap().remove(&task.pair_key());
        Ok(())
    }

    async fn dequeue(&self, kind: TaskKind) -> Result<Option<Delivery>, QueueError> {
        let now = Instant::now();
        Ok(self.with_lane(kind, |lane| {
            let (due, waiting): (Vec<_>, Vec<_>) =
                lane.delayed.drain(..).partition(|(at, _)| *at <= now);
            lane.delayed = waiting;
            lane.ready.extend(due.into_iter().map(|(_, d)| d));

            let mut delivery = lane.ready.pop_front()?;
            delivery.receipt = delivery.id.to_string();
            lane.in_flight.insert(delivery.id, delivery.clone());
            Some(delivery)
        }))
    }

    async fn ack(&self, delivery: &Delivery) -> Result<(), QueueError> {
        self.with_lane(delivery.task.kind, |lane| {
            lane.in_flight.remove(&delivery.id);
        });
        Ok(())
    }

    async fn nack(&self, delivery: &Delivery, retryable: bool) -> Result<Redelivery, QueueError> {
        let decision = self.policy.decide(delivery.attempt, retryable);
        self.with_lane(delivery.task.kind, |lane| {
            lane.in_flight.remove(&delivery.id);
            match decision {
                Redelivery::Scheduled(delay) => lane
                    .delayed
                    .push((Instant::now() + delay, delivery.next_attempt())),
                Redelivery::DeadLettered => lane.dead.push(delivery.clone()),
            }
        });
        Ok(decision)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn task() -> Task {
        Task {
            kind: TaskKind::SubmitApplication,
            user_id: Uuid::new_v4(),
            job_id: Uuid::new_v4(),
            resume_id: Some(Uuid::new_v4()),
            job_description: "Build APIs".into(),
            job_title: "Engineer".into(),
            company_name: "Acme".into(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_nacked_task_redelivers_after_backoff() {
        let queue = InMemoryTaskQueue::new(RetryPolicy::new(3, Duration::from_secs(2)));
        queue.enqueue(task()).await.unwrap();

        let first = queue.dequeue(TaskKind::SubmitApplication).await.unwrap().unwrap();
        assert_eq!(first.attempt, 1);
        let decision = queue.nack(&first, true).await.unwrap();
        assert_eq!(decision, Redelivery::Scheduled(Duration::from_secs(2)));

        assert!(queue.dequeue(TaskKind::SubmitApplication).await.unwrap().is_none());
        tokio::time::advance(Duration::from_secs(2)).await;

        let second = queue.dequeue(TaskKind::SubmitApplication).await.unwrap().unwrap();
        assert_eq!(second.id, first.id);
        assert_eq!(second.attempt, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_attempts_are_bounded_by_policy() {
        let queue = InMemoryTaskQueue::new(RetryPolicy::new(2, Duration::from_millis(10)));
        queue.enqueue(task()).await.unwrap();

        let first = queue.dequeue(TaskKind::SubmitApplication).await.unwrap().unwrap();
        queue.nack(&first, true).await.unwrap();
        tokio::time::advance(Duration::from_millis(10)).await;

        let second = queue.dequeue(TaskKind::SubmitApplication).await.unwrap().unwrap();
        assert_eq!(
            queue.nack(&second, true).await.unwrap(),
            Redelivery::DeadLettered
        );
        assert_eq!(queue.dead_letters(TaskKind::SubmitApplication).len(), 1);
        assert_eq!(queue.pending(TaskKind::SubmitApplication), 0);
    }

    #[tokio::test]
    async fn test_claimed_pair_is_not_enqueued_twice() {
        let queue = InMemoryTaskQueue::new(RetryPolicy::new(3, Duration::from_secs(1)));
        let task = task();

        assert!(queue.enqueue_unique(task.clone()).await.unwrap().is_some());
        assert!(queue.enqueue_unique(task.clone()).await.unwrap().is_none());
        assert_eq!(queue.pending(TaskKind::SubmitApplication), 1);

        queue.release(&task).await.unwrap();
        assert!(!queue.is_claimed(&task));
        assert!(queue.enqueue_unique(task).await.unwrap().is_some());
        assert_eq!(queue.pending(TaskKind::SubmitApplication), 2);
    }

    #[tokio::test]
    async fn test_kinds_are_independent_lanes() {
        let queue = InMemoryTaskQueue::new(RetryPolicy::new(3, Duration::from_secs(1)));
        queue.enqueue(task()).await.unwrap();
        assert!(queue.dequeue(TaskKind::GenerateResume).await.unwrap().is_none());

        let delivery = queue.dequeue(TaskKind::SubmitApplication).await.unwrap().unwrap();
        queue.ack(&delivery).await.unwrap();
        assert_eq!(queue.pending(TaskKind::SubmitApplication), 0);
    }
}
