use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, warn};

use super::{JobEnvelope, JobQueue};
use crate::errors::{PipelineError, PipelineResult};

/// REST push transport for deployments without direct broker access.
/// Push-only: the worker must consume through the list broker elsewhere.
pub struct RestQueue {
    client: reqwest::Client,
    url: String,
    token: String,
    queue_name: String,
}

impl RestQueue {
    pub fn new(url: String, token: String, queue_name: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            url,
            token,
            queue_name,
        }
    }

    async fn post(&self, body: &serde_json::Value) -> PipelineResult<(u16, String)> {
        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.token)
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await;

        match response {
            Ok(resp) => {
                let status = resp.status().as_u16();
                let text = resp.text().await.unwrap_or_default();
                Ok((status, text))
            }
            // Transport failures carry no status; callers treat 0 like a
            // command-parse miss and fall back once.
            Err(e) => {
                warn!(error = %e, "REST queue transport error");
                Ok((0, e.to_string()))
            }
        }
    }

    fn looks_like_parse_error(status: u16, body: &str) -> bool {
        if matches!(status, 400 | 422 | 0) {
            return true;
        }
        let lowered = body.to_lowercase();
        lowered.contains("failed to parse") || lowered.contains("parse error")
    }
}

#[async_trait]
impl JobQueue for RestQueue {
    async fn push(&self, job_id: &str) -> PipelineResult<()> {
        self.push_many(std::slice::from_ref(&job_id.to_string()))
            .await
    }

    async fn push_many(&self, job_ids: &[String]) -> PipelineResult<()> {
        let messages: Vec<String> = job_ids
            .iter()
            .map(|id| JobEnvelope::new(id).encode())
            .collect();

        let body = json!({ "queue": self.queue_name, "messages": messages });
        let (status, text) = self.post(&body).await?;

        if status == 401 || status == 403 {
            return Err(PipelineError::Abort(format!(
                "REST queue auth rejected with status {status}"
            )));
        }

        if (200..300).contains(&status) {
            debug!(count = messages.len(), "pushed batch via REST queue");
            return Ok(());
        }

        if Self::looks_like_parse_error(status, &text) {
            // Some endpoints want a raw Redis command rather than the
            // queue/messages shape; retry once in that form.
            let mut command = vec!["RPUSH".to_string(), self.queue_name.clone()];
            command.extend(messages.iter().cloned());
            let retry_body = json!({ "command": command });

            let (retry_status, retry_text) = self.post(&retry_body).await?;
            if retry_status == 401 || retry_status == 403 {
                return Err(PipelineError::Abort(format!(
                    "REST queue auth rejected with status {retry_status}"
                )));
            }
            if (200..300).contains(&retry_status) {
                debug!(count = messages.len(), "pushed batch via REST command form");
                return Ok(());
            }
            return Err(PipelineError::Queue(format!(
                "REST queue push failed after command retry: status {retry_status}, body {retry_text:?}"
            )));
        }

        Err(PipelineError::Queue(format!(
            "REST queue push failed: status {status}, body {text:?}"
        )))
    }

    async fn pop(&self, _timeout: Duration) -> PipelineResult<Option<JobEnvelope>> {
        // The REST surface only supports push.
        Ok(None)
    }
}
