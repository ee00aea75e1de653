use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::errors::{PipelineError, PipelineResult};

/// The wire envelope: a job reference plus the push time in epoch
/// milliseconds, encoded as a single JSON line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobEnvelope {
    pub job_id: String,
    pub timestamp: i64,
}

impl JobEnvelope {
    pub fn new(job_id: &str) -> Self {
        Self {
            job_id: job_id.to_string(),
            timestamp: Utc::now().timestamp_millis(),
        }
    }

    pub fn encode(&self) -> String {
        // Struct has no string fields that can fail to serialize.
        serde_json::to_string(self).unwrap_or_default()
    }

    pub fn decode(raw: &str) -> PipelineResult<Self> {
        serde_json::from_str(raw)
            .map_err(|e| PipelineError::Queue(format!("bad envelope {raw:?}: {e}")))
    }
}
