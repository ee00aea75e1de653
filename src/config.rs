//! Typed runtime settings resolved from the environment.
//!
//! All recognized variables are read once at startup; required keys are
//! checked there so a misconfigured deployment fails before taking work.

use crate::errors::{PipelineError, PipelineResult};

const DEFAULT_QUEUE_NAME: &str = "generation_jobs";
const DEFAULT_WORKER_CONCURRENCY: usize = 3;
const DEFAULT_POLL_INTERVAL_MS: u64 = 5_000;
const DEFAULT_MAX_RETRIES: u32 = 3;
const DEFAULT_BACKOFF_BASE_MS: u64 = 1_000;
const DEFAULT_RECONCILE_INTERVAL_MS: u64 = 300_000;
const DEFAULT_RECONCILE_STALE_SECS: i64 = 600;

/// Queue transport selected from configuration, fixed for the process
/// lifetime. Precedence: list broker over REST push over no-op.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueBackend {
    Redis { url: String },
    Rest { url: String, token: String },
    Noop,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub openai_api_key: Option<String>,
    pub openai_base_url: Option<String>,
    pub database_url: Option<String>,
    pub queue_backend: QueueBackend,
    pub queue_name: String,
    pub worker_concurrency: usize,
    pub poll_interval_ms: u64,
    pub max_retries: u32,
    pub backoff_base_ms: u64,
    pub reconcile_interval_ms: u64,
    pub reconcile_stale_secs: i64,
    pub image_api_key: Option<String>,
    pub tts_api_key: Option<String>,
    pub upload_dir: String,
    pub slack_webhook: Option<String>,
    pub skip_persistence: bool,
    pub skip_env_validation: bool,
}

impl Settings {
    pub fn from_env() -> Self {
        let queue_backend = match std::env::var("UPSTASH_REDIS_URL").ok() {
            Some(url) if !url.is_empty() => QueueBackend::Redis { url },
            _ => match (
                std::env::var("UPSTASH_REST_URL").ok(),
                std::env::var("UPSTASH_REST_TOKEN").ok(),
            ) {
                (Some(url), Some(token)) if !url.is_empty() && !token.is_empty() => {
                    QueueBackend::Rest { url, token }
                }
                _ => QueueBackend::Noop,
            },
        };

        Self {
            openai_api_key: std::env::var("OPENAI_API_KEY").ok(),
            openai_base_url: std::env::var("OPENAI_BASE_URL").ok(),
            database_url: std::env::var("DATABASE_URL")
                .ok()
                .or_else(|| std::env::var("POSTGRES_URL").ok()),
            queue_backend,
            queue_name: std::env::var("UPSTASH_QUEUE_NAME")
                .unwrap_or_else(|_| DEFAULT_QUEUE_NAME.to_string()),
            worker_concurrency: parse_env("WORKER_CONCURRENCY", DEFAULT_WORKER_CONCURRENCY),
            poll_interval_ms: parse_env("WORKER_POLL_INTERVAL_MS", DEFAULT_POLL_INTERVAL_MS),
            max_retries: parse_env("WORKER_MAX_RETRIES", DEFAULT_MAX_RETRIES),
            backoff_base_ms: parse_env("WORKER_BACKOFF_BASE_MS", DEFAULT_BACKOFF_BASE_MS),
            reconcile_interval_ms: parse_env(
                "WORKER_RECONCILE_INTERVAL_MS",
                DEFAULT_RECONCILE_INTERVAL_MS,
            ),
            reconcile_stale_secs: parse_env(
                "WORKER_RECONCILE_STALE_SECS",
                DEFAULT_RECONCILE_STALE_SECS,
            ),
            image_api_key: std::env::var("IMAGE_API_KEY").ok(),
            tts_api_key: std::env::var("TTS_API_KEY").ok(),
            upload_dir: std::env::var("UPLOAD_DIR").unwrap_or_else(|_| "uploads".to_string()),
            slack_webhook: std::env::var("SLACK_WEBHOOK").ok(),
            skip_persistence: flag_env("SKIP_PERSISTENCE"),
            skip_env_validation: flag_env("SKIP_ENV_VALIDATION"),
        }
    }

    /// Fail startup when required keys are missing. `SKIP_ENV_VALIDATION`
    /// bypasses the check for test harnesses.
    pub fn validate(&self) -> PipelineResult<()> {
        if self.skip_env_validation {
            return Ok(());
        }
        if self.openai_api_key.as_deref().unwrap_or("").is_empty() {
            return Err(PipelineError::Config(
                "OPENAI_API_KEY is required".to_string(),
            ));
        }
        if self.database_url.as_deref().unwrap_or("").is_empty() {
            return Err(PipelineError::Config(
                "DATABASE_URL (or POSTGRES_URL) is required".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn flag_env(name: &str) -> bool {
    matches!(
        std::env::var(name).ok().as_deref(),
        Some("1") | Some("true") | Some("TRUE") | Some("yes")
    )
}
