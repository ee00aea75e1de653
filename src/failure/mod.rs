//! Recorder for unrecoverable failures.
//!
//! `failed_jobs` is the single source of truth for post-mortem analysis;
//! the optional webhook is a convenience signal on top, never a
//! dependency.

use chrono::Utc;
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};
use serde_json::Value;
use tracing::{error, info, warn};

use crate::database::entities::failed_jobs;
use crate::errors::{PipelineError, PipelineResult};

/// Where and when a failure happened.
#[derive(Debug, Clone)]
pub struct FailureContext {
    pub job_id: Option<String>,
    pub stage: String,
    pub attempt: u32,
    pub extras: Value,
}

impl FailureContext {
    pub fn new(stage: impl Into<String>) -> Self {
        Self {
            job_id: None,
            stage: stage.into(),
            attempt: 0,
            extras: Value::Null,
        }
    }

    pub fn with_job(mut self, job_id: impl Into<String>) -> Self {
        self.job_id = Some(job_id.into());
        self
    }

    pub fn with_attempt(mut self, attempt: u32) -> Self {
        self.attempt = attempt;
        self
    }

    pub fn with_extras(mut self, extras: Value) -> Self {
        self.extras = extras;
        self
    }
}

#[derive(Clone)]
pub struct FailureRecorder {
    db: DatabaseConnection,
    webhook_url: Option<String>,
    client: reqwest::Client,
}

impl FailureRecorder {
    pub fn new(db: DatabaseConnection, webhook_url: Option<String>) -> Self {
        Self {
            db,
            webhook_url,
            client: reqwest::Client::new(),
        }
    }

    /// Write one failure row and fire the webhook without blocking the
    /// caller. Webhook failures are logged, never propagated.
    pub async fn record_failure(
        &self,
        context: FailureContext,
        err: &PipelineError,
    ) -> PipelineResult<failed_jobs::Model> {
        let message = self.render_message(&context, err);

        let row = failed_jobs::ActiveModel {
            job_id: Set(context.job_id.clone()),
            error_code: Set(err.code().to_string()),
            error_message: Set(message.clone()),
            resolved: Set(false),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&self.db)
        .await?;

        error!(
            job_id = context.job_id.as_deref().unwrap_or("-"),
            stage = %context.stage,
            attempt = context.attempt,
            code = err.code(),
            "recorded permanent failure"
        );

        self.notify(&context, &message);
        Ok(row)
    }

    fn render_message(&self, context: &FailureContext, err: &PipelineError) -> String {
        let mut message = format!(
            "stage={} attempt={}: {}",
            context.stage, context.attempt, err
        );
        if !context.extras.is_null() {
            message.push_str(&format!(" extras={}", context.extras));
        }
        message
    }

    fn notify(&self, context: &FailureContext, message: &str) {
        let Some(url) = self.webhook_url.clone() else {
            return;
        };

        let client = self.client.clone();
        let payload = serde_json::json!({
            "text": format!(
                "generation failure in stage `{}` (job {}): {}",
                context.stage,
                context.job_id.as_deref().unwrap_or("none"),
                message
            )
        });

        tokio::spawn(async move {
            match client.post(&url).json(&payload).send().await {
                Ok(resp) if resp.status().is_success() => {
                    info!("failure notification delivered");
                }
                Ok(resp) => {
                    warn!(status = %resp.status(), "failure notification rejected");
                }
                Err(e) => {
                    warn!(error = %e, "failure notification not delivered");
                }
            }
        });
    }
}

/// Retry policy shared with callers outside the worker loop: retry while
/// the attempt budget allows and the error is a rate limit or a server
/// fault. Deliberate aborts are never retried.
pub fn should_retry(err: &PipelineError, attempt: u32) -> bool {
    if matches!(err, PipelineError::Abort(_)) {
        return false;
    }
    if attempt >= 3 {
        return false;
    }
    matches!(err.status(), Some(status) if status >= 500 || status == 429)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retries_server_faults_within_budget() {
        let err = PipelineError::Provider {
            status: 500,
            message: "down".into(),
        };
        assert!(should_retry(&err, 0));
        assert!(should_retry(&err, 2));
        assert!(!should_retry(&err, 3));
    }

    #[test]
    fn retries_rate_limits() {
        let err = PipelineError::Provider {
            status: 429,
            message: "slow down".into(),
        };
        assert!(should_retry(&err, 1));
    }

    #[test]
    fn never_retries_client_errors_or_aborts() {
        let client_err = PipelineError::Provider {
            status: 404,
            message: "gone".into(),
        };
        assert!(!should_retry(&client_err, 0));
        assert!(!should_retry(&PipelineError::Abort("auth".into()), 0));
    }
}
