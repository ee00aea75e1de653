//! Closed error taxonomy for the generation pipeline.
//!
//! Every failure site tags one of these kinds before the error reaches the
//! failure recorder, so post-mortem rows in `failed_jobs` carry a stable
//! error code rather than a free-form message prefix.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Malformed request input. Surfaced synchronously as a 400; never
    /// written to `failed_jobs`.
    #[error("invalid input: {0}")]
    Input(String),

    /// Model output failed schema validation or exhausted all repair
    /// strategies. Transient at the retry layer.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The provider answered with an HTTP error status.
    #[error("provider returned status {status}: {message}")]
    Provider { status: u16, message: String },

    /// Network-level failure before a status was received.
    #[error("transport error: {0}")]
    Transport(String),

    /// Relational store failure.
    #[error("data store error: {0}")]
    Store(#[from] sea_orm::DbErr),

    /// Queue push or pop failure.
    #[error("queue error: {0}")]
    Queue(String),

    /// Routing miss in the worker; terminal for the job.
    #[error("unknown job type: {0}")]
    UnknownJobType(String),

    /// Missing or invalid environment configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Deliberate abort (auth failure, shutdown). Never retried.
    #[error("aborted: {0}")]
    Abort(String),

    /// Media pipeline failure (ffmpeg, upload).
    #[error("media error: {0}")]
    Media(String),
}

impl PipelineError {
    /// HTTP status carried by provider errors, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            PipelineError::Provider { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the retry layer may attempt this error again.
    ///
    /// Provider errors retry on 429 and 5xx only; transport failures and
    /// validation misses retry because the next attempt may comply; all
    /// other kinds terminate immediately.
    pub fn is_retriable(&self) -> bool {
        match self {
            PipelineError::Provider { status, .. } => *status == 429 || *status >= 500,
            PipelineError::Transport(_) => true,
            PipelineError::Validation(_) => true,
            _ => false,
        }
    }

    /// Stable code written to `failed_jobs.error_code`.
    pub fn code(&self) -> &'static str {
        match self {
            PipelineError::Input(_) => "input",
            PipelineError::Validation(_) => "validation",
            PipelineError::Provider { .. } => "provider",
            PipelineError::Transport(_) => "transport",
            PipelineError::Store(_) => "store",
            PipelineError::Queue(_) => "queue",
            PipelineError::UnknownJobType(_) => "unknown_job_type",
            PipelineError::Config(_) => "config",
            PipelineError::Abort(_) => "abort",
            PipelineError::Media(_) => "media",
        }
    }
}

pub type PipelineResult<T> = Result<T, PipelineError>;
