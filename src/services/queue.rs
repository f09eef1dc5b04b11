//! Redis-backed scan task queue with at-least-once delivery.
//!
//! Layout: tasks are LPUSHed onto a pending list and BLMOVEd into a
//! processing list on dequeue, with a per-task lease key carrying the
//! visibility timeout. Acknowledgment removes the task from the processing
//! list; the reaper returns leaseless processing entries to the pending
//! list (bumping `attempt_count`) or dead-letters them after attempt
//! exhaustion. The same connection also hosts event dedup keys and the
//! per-item scan locks.

use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Direction};

use crate::errors::AppError;
use crate::models::item::ScanTask;

const PENDING_KEY: &str = "leakgate:tasks:pending";
const PROCESSING_KEY: &str = "leakgate:tasks:processing";
const DEAD_KEY: &str = "leakgate:tasks:dead";
const LEASE_PREFIX: &str = "leakgate:tasks:lease:";
const EVENT_PREFIX: &str = "leakgate:events:";
const LOCK_PREFIX: &str = "leakgate:scan:";

/// A dequeued task plus the exact payload string needed to acknowledge it.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub task: ScanTask,
    raw: String,
}

/// Handle to the shared durable queue. Cheap to clone; all workers share
/// the underlying multiplexed connection.
#[derive(Clone)]
pub struct TaskQueue {
    conn: MultiplexedConnection,
    visibility_timeout_secs: u64,
    max_attempts: u32,
}

impl TaskQueue {
    pub async fn connect(
        redis_url: &str,
        visibility_timeout_secs: u64,
        max_attempts: u32,
    ) -> Result<Self, AppError> {
        let client = redis::Client::open(redis_url)?;
        let conn = client.get_multiplexed_async_connection().await?;
        Ok(Self {
            conn,
            visibility_timeout_secs,
            max_attempts,
        })
    }

    /// Submit a task. Fire-and-forget relative to the scan outcome.
    pub async fn enqueue(&self, task: &ScanTask) -> Result<(), AppError> {
        let payload = serde_json::to_string(task)
            .map_err(|e| AppError::Internal(format!("task serialization failed: {e}")))?;
        let mut conn = self.conn.clone();
        conn.lpush::<_, _, ()>(PENDING_KEY, payload).await?;
        tracing::debug!(task_id = %task.id, "Task enqueued");
        Ok(())
    }

    /// Block up to `timeout_secs` for a task, moving it to the processing
    /// list and opening its visibility lease.
    pub async fn dequeue(&self, timeout_secs: f64) -> Result<Option<Delivery>, AppError> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn
            .blmove(
                PENDING_KEY,
                PROCESSING_KEY,
                Direction::Right,
                Direction::Left,
                timeout_secs,
            )
            .await?;

        let Some(raw) = raw else {
            return Ok(None);
        };

        let task: ScanTask = serde_json::from_str(&raw).map_err(|e| {
            // Stays on the processing list; the reaper dead-letters it.
            tracing::error!(error = %e, "Malformed task payload, leaving for the reaper");
            AppError::Internal(format!("malformed task payload: {e}"))
        })?;

        conn.set_ex::<_, _, ()>(
            format!("{LEASE_PREFIX}{}", task.id),
            1,
            self.visibility_timeout_secs,
        )
        .await?;

        Ok(Some(Delivery { task, raw }))
    }

    /// Acknowledge a fully processed task, removing it from the queue.
    pub async fn ack(&self, delivery: &Delivery) -> Result<(), AppError> {
        let mut conn = self.conn.clone();
        conn.lrem::<_, _, ()>(PROCESSING_KEY, 1, &delivery.raw).await?;
        conn.del::<_, ()>(format!("{LEASE_PREFIX}{}", delivery.task.id))
            .await?;
        Ok(())
    }

    /// Return expired processing entries to the pending list, dead-lettering
    /// tasks that have exhausted their attempts. Run periodically.
    pub async fn reap(&self) -> Result<usize, AppError> {
        let mut conn = self.conn.clone();
        let entries: Vec<String> = conn.lrange(PROCESSING_KEY, 0, -1).await?;
        let mut redelivered = 0usize;

        for raw in entries {
            let Ok(mut task) = serde_json::from_str::<ScanTask>(&raw) else {
                conn.lrem::<_, _, ()>(PROCESSING_KEY, 1, &raw).await?;
                conn.lpush::<_, _, ()>(DEAD_KEY, &raw).await?;
                tracing::error!("Dead-lettered malformed task payload");
                continue;
            };

            let leased: bool = conn
                .exists(format!("{LEASE_PREFIX}{}", task.id))
                .await?;
            if leased {
                continue;
            }

            // Lease expired without an ack: the worker crashed mid-task.
            conn.lrem::<_, _, ()>(PROCESSING_KEY, 1, &raw).await?;
            task.attempt_count += 1;

            if task.attempt_count >= self.max_attempts {
                let payload = serde_json::to_string(&task)
                    .map_err(|e| AppError::Internal(format!("task serialization failed: {e}")))?;
                conn.lpush::<_, _, ()>(DEAD_KEY, payload).await?;
                tracing::error!(
                    task_id = %task.id,
                    attempts = task.attempt_count,
                    "Task exhausted attempts, dead-lettered"
                );
            } else {
                let payload = serde_json::to_string(&task)
                    .map_err(|e| AppError::Internal(format!("task serialization failed: {e}")))?;
                conn.lpush::<_, _, ()>(PENDING_KEY, payload).await?;
                tracing::warn!(
                    task_id = %task.id,
                    attempt = task.attempt_count,
                    "Redelivering task after visibility timeout"
                );
                redelivered += 1;
            }
        }

        Ok(redelivered)
    }

    /// Record an event id, returning false when it was already seen inside
    /// the TTL window (platform redelivery).
    pub async fn dedup_event(&self, event_id: &str, ttl_secs: u64) -> Result<bool, AppError> {
        let mut conn = self.conn.clone();
        let set: Option<String> = redis::cmd("SET")
            .arg(format!("{EVENT_PREFIX}{event_id}"))
            .arg(1)
            .arg("NX")
            .arg("EX")
            .arg(ttl_secs)
            .query_async(&mut conn)
            .await?;
        Ok(set.is_some())
    }

    /// Try to take the per-item scan lock. At most one concurrent scan per
    /// platform message id; the lock expires with the visibility timeout so
    /// a crashed holder cannot wedge the item.
    pub async fn try_lock_item(&self, platform_message_id: &str) -> Result<bool, AppError> {
        let mut conn = self.conn.clone();
        let set: Option<String> = redis::cmd("SET")
            .arg(format!("{LOCK_PREFIX}{platform_message_id}"))
            .arg(1)
            .arg("NX")
            .arg("EX")
            .arg(self.visibility_timeout_secs)
            .query_async(&mut conn)
            .await?;
        Ok(set.is_some())
    }

    pub async fn unlock_item(&self, platform_message_id: &str) -> Result<(), AppError> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(format!("{LOCK_PREFIX}{platform_message_id}"))
            .await?;
        Ok(())
    }
}
