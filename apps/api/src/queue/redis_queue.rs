use async_trait::async_trait;
use chrono::Utc;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Script};
use tracing::{info, warn};
use uuid::Uuid;

use super::{Delivery, QueueError, Redelivery, RetryPolicy, Task, TaskKind, TaskQueue};

/// Max delayed entries promoted per dequeue.
const PROMOTE_BATCH: isize = 16;

/// Upper bound on a pair claim whose release was lost.
const CLAIM_TTL_SECS: u64 = 3600;

/// KEYS: delayed zset, ready list. ARGV: now (ms), batch size.
/// Moves due payloads in one step so a crash cannot drop one between the sets.
const PROMOTE_DUE_SCRIPT: &str = r#"
local due = redis.call('ZRANGEBYSCORE', KEYS[1], '-inf', ARGV[1], 'LIMIT', 0, ARGV[2])
for _, payload in ipairs(due) do
    redis.call('ZREM', KEYS[1], payload)
    redis.call('LPUSH', KEYS[2], payload)
end
return #due
"#;

/// KEYS: claim key, ready list. ARGV: delivery id, claim ttl (s), payload.
const ENQUEUE_UNIQUE_SCRIPT: &str = r#"
if redis.call('SET', KEYS[1], ARGV[1], 'NX', 'EX', ARGV[2]) then
    redis.call('LPUSH', KEYS[2], ARGV[3])
    return 1
end
return 0
"#;

/// Reliable Redis queue. Per task kind it keeps four keys:
///
/// - `{prefix}:{kind}:ready`      LIST, producers LPUSH, workers RPOPLPUSH
/// - `{prefix}:{kind}:processing` LIST of claimed, unacked payloads
/// - `{prefix}:{kind}:delayed`    ZSET of payloads scored by due time (ms)
/// - `{prefix}:{kind}:dead`       LIST of dead-lettered payloads
///
/// plus one `{prefix}:claim:{user}:{job}` string per pair in the pipeline.
#[derive(Clone)]
pub struct RedisTaskQueue {
    conn: MultiplexedConnection,
    prefix: String,
    policy: RetryPolicy,
    promote_due: Script,
    enqueue_unique: Script,
}

impl RedisTaskQueue {
    pub async fn connect(
        client: &redis::Client,
        prefix: &str,
        policy: RetryPolicy,
    ) -> Result<Self, QueueError> {
        let conn = client.get_multiplexed_async_connection().await?;
        Ok(Self {
            conn,
            prefix: prefix.to_string(),
            policy,
            promote_due: Script::new(PROMOTE_DUE_SCRIPT),
            enqueue_unique: Script::new(ENQUEUE_UNIQUE_SCRIPT),
        })
    }

    fn key(&self, kind: TaskKind, list: &str) -> String {
        format!("{}:{}:{}", self.prefix, kind, list)
    }

    fn claim_key(&self, task: &Task) -> String {
        format!("{}:claim:{}", self.prefix, task.pair_key())
    }

    /// Moves everything left in the processing lists back to ready.
    /// Run once at startup, before workers start: a claimed payload that
    /// survived a restart was never acked.
    pub async fn requeue_orphans(&self) -> Result<usize, QueueError> {
        let mut conn = self.conn.clone();
        let mut moved = 0;
        for kind in [TaskKind::GenerateResume, TaskKind::SubmitApplication] {
            let processing = self.key(kind, "processing");
            let ready = self.key(kind, "ready");
            loop {
                let payload: Option<String> = conn.rpoplpush(&processing, &ready).await?;
                if payload.is_none() {
                    break;
                }
                moved += 1;
            }
        }
        if moved > 0 {
            info!("Requeued {moved} unacked task(s) from a previous run");
        }
        Ok(moved)
    }

    /// Promotes delayed payloads whose due time has passed.
    async fn promote_due(
        &self,
        conn: &mut MultiplexedConnection,
        kind: TaskKind,
    ) -> Result<usize, QueueError> {
        let promoted: usize = self
            .promote_due
            .key(self.key(kind, "delayed"))
            .key(self.key(kind, "ready"))
            .arg(Utc::now().timestamp_millis())
            .arg(PROMOTE_BATCH)
            .invoke_async(conn)
            .await?;
        Ok(promoted)
    }
}

#[async_trait]
impl TaskQueue for RedisTaskQueue {
    async fn enqueue(&self, task: Task) -> Result<Uuid, QueueError> {
        let delivery = Delivery::new(task);
        let payload = serde_json::to_string(&delivery)?;
        let mut conn = self.conn.clone();
        let _: () = conn
            .lpush(self.key(delivery.task.kind, "ready"), payload)
            .await?;
        Ok(delivery.id)
    }

    async fn enqueue_unique(&self, task: Task) -> Result<Option<Uuid>, QueueError> {
        let delivery = Delivery::new(task);
        let payload = serde_json::to_string(&delivery)?;
        let mut conn = self.conn.clone();
        let claimed: i64 = self
            .enqueue_unique
            .key(self.claim_key(&delivery.task))
            .key(self.key(delivery.task.kind, "ready"))
            .arg(delivery.id.to_string())
            .arg(CLAIM_TTL_SECS)
            .arg(payload)
            .invoke_async(&mut conn)
            .await?;
        Ok((claimed == 1).then_some(delivery.id))
    }

    async fn release(&self, task: &Task) -> Result<(), QueueError> {
        let mut conn = self.conn.clone();
        let _: () = conn.del(self.claim_key(task)).await?;
        Ok(())
    }

    async fn dequeue(&self, kind: TaskKind) -> Result<Option<Delivery>, QueueError> {
        let mut conn = self.conn.clone();
        self.promote_due(&mut conn, kind).await?;

        let processing = self.key(kind, "processing");
        let payload: Option<String> = conn
            .rpoplpush(self.key(kind, "ready"), &processing)
            .await?;
        let Some(payload) = payload else {
            return Ok(None);
        };

        match serde_json::from_str::<Delivery>(&payload) {
            Ok(mut delivery) => {
                delivery.receipt = payload;
                Ok(Some(delivery))
            }
            Err(e) => {
                warn!("Dead-lettering undecodable {kind} payload: {e}");
                redis::pipe()
                    .atomic()
                    .lrem(&processing, 1, &payload)
                    .ignore()
                    .lpush(self.key(kind, "dead"), &payload)
                    .ignore()
                    .query_async::<_, ()>(&mut conn)
                    .await?;
                Err(QueueError::Codec(e))
            }
        }
    }

    async fn ack(&self, delivery: &Delivery) -> Result<(), QueueError> {
        let mut conn = self.conn.clone();
        let _: () = conn
            .lrem(
                self.key(delivery.task.kind, "processing"),
                1,
                &delivery.receipt,
            )
            .await?;
        Ok(())
    }

    async fn nack(&self, delivery: &Delivery, retryable: bool) -> Result<Redelivery, QueueError> {
        let kind = delivery.task.kind;
        let decision = self.policy.decide(delivery.attempt, retryable);
        let mut conn = self.conn.clone();
        let mut pipe = redis::pipe();
        pipe.atomic()
            .lrem(self.key(kind, "processing"), 1, &delivery.receipt)
            .ignore();

        match decision {
            Redelivery::Scheduled(delay) => {
                let payload = serde_json::to_string(&delivery.next_attempt())?;
                let due = Utc::now().timestamp_millis() + delay.as_millis() as i64;
                pipe.zadd(self.key(kind, "delayed"), payload, due).ignore();
            }
            Redelivery::DeadLettered => {
                pipe.lpush(self.key(kind, "dead"), &delivery.receipt)
                    .ignore();
            }
        }

        pipe.query_async::<_, ()>(&mut conn).await?;
        Ok(decision)
    }
}
