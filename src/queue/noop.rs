use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use super::{JobEnvelope, JobQueue};
use crate::errors::{PipelineError, PipelineResult};

/// Placeholder transport for unconfigured environments. Pushing is an
/// error; popping always comes back empty so a worker idles harmlessly.
pub struct NoopQueue;

#[async_trait]
impl JobQueue for NoopQueue {
    async fn push(&self, job_id: &str) -> PipelineResult<()> {
        Err(PipelineError::Queue(format!(
            "no queue configured, cannot push job {job_id}"
        )))
    }

    async fn pop(&self, _timeout: Duration) -> PipelineResult<Option<JobEnvelope>> {
        debug!("no-op queue pop");
        Ok(None)
    }
}
