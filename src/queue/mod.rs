//! Queue adapter decoupling request admission from execution.
//!
//! Three transports selected once at startup: a Redis list broker
//! (preferred), a REST push endpoint, and a no-op that lets the service
//! boot with no queue configured. The envelope on the wire is minimal;
//! all truth lives in the job store.

mod envelope;
mod noop;
mod redis_queue;
mod rest_queue;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use crate::config::{QueueBackend, Settings};
use crate::errors::PipelineResult;

pub use envelope::JobEnvelope;
pub use noop::NoopQueue;
pub use redis_queue::RedisQueue;
pub use rest_queue::RestQueue;

#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Push one job reference onto the queue.
    async fn push(&self, job_id: &str) -> PipelineResult<()>;

    /// Push a batch of job references. Transports that support batching
    /// override this to send one request for the whole batch.
    async fn push_many(&self, job_ids: &[String]) -> PipelineResult<()> {
        for job_id in job_ids {
            self.push(job_id).await?;
        }
        Ok(())
    }

    /// Blocking pop with a bounded timeout. `None` means the queue was
    /// empty for the duration (or the transport cannot consume).
    async fn pop(&self, timeout: Duration) -> PipelineResult<Option<JobEnvelope>>;
}

/// Build the queue selected by configuration. The choice is static for the
/// process lifetime; precedence is list broker, then REST push, then no-op.
pub async fn connect_queue(settings: &Settings) -> PipelineResult<Arc<dyn JobQueue>> {
    match &settings.queue_backend {
        QueueBackend::Redis { url } => {
            info!(queue = %settings.queue_name, "using redis list broker queue");
            Ok(Arc::new(
                RedisQueue::connect(url, &settings.queue_name).await?,
            ))
        }
        QueueBackend::Rest { url, token } => {
            info!(queue = %settings.queue_name, "using REST push queue");
            Ok(Arc::new(RestQueue::new(
                url.clone(),
                token.clone(),
                settings.queue_name.clone(),
            )))
        }
        QueueBackend::Noop => {
            info!("no queue configured, using no-op queue");
            Ok(Arc::new(NoopQueue))
        }
    }
}
