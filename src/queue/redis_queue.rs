use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::debug;

use super::{JobEnvelope, JobQueue};
use crate::errors::{PipelineError, PipelineResult};

/// List-broker transport: RPUSH to enqueue, BRPOP with a bounded timeout
/// to consume.
pub struct RedisQueue {
    manager: ConnectionManager,
    queue_name: String,
}

impl RedisQueue {
    pub async fn connect(url: &str, queue_name: &str) -> PipelineResult<Self> {
        let client = redis::Client::open(url)
            .map_err(|e| PipelineError::Queue(format!("invalid redis url: {e}")))?;
        let manager = ConnectionManager::new(client)
            .await
            .map_err(|e| PipelineError::Queue(format!("redis connect failed: {e}")))?;

        Ok(Self {
            manager,
            queue_name: queue_name.to_string(),
        })
    }
}

#[async_trait]
impl JobQueue for RedisQueue {
    async fn push(&self, job_id: &str) -> PipelineResult<()> {
        let message = JobEnvelope::new(job_id).encode();
        let mut conn = self.manager.clone();

        let _: i64 = conn
            .rpush(&self.queue_name, &message)
            .await
            .map_err(|e| PipelineError::Queue(format!("rpush failed: {e}")))?;

        debug!(queue = %self.queue_name, job_id = %job_id, "pushed job reference");
        Ok(())
    }

    async fn pop(&self, timeout: Duration) -> PipelineResult<Option<JobEnvelope>> {
        let mut conn = self.manager.clone();

        let popped: Option<(String, String)> = conn
            .brpop(&self.queue_name, timeout.as_secs_f64())
            .await
            .map_err(|e| PipelineError::Queue(format!("brpop failed: {e}")))?;

        match popped {
            Some((_, raw)) => Ok(Some(JobEnvelope::decode(&raw)?)),
            None => Ok(None),
        }
    }
}
