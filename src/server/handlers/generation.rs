use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::database::entities::generation_jobs::JobType;
use crate::server::app::AppState;

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateStoryScriptRequest {
    #[serde(default)]
    pub story_id: Option<String>,
    #[serde(default)]
    pub theme: Option<String>,
    #[serde(default)]
    pub tone: Option<String>,
    #[serde(default)]
    pub age_range: Option<String>,
    #[serde(default)]
    pub scheduled_at: Option<String>,
    #[serde(default)]
    pub initiated_by: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateStoryScriptResponse {
    pub ok: bool,
    pub story_id: String,
    pub job_ids: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatusResponse {
    pub id: String,
    pub story_id: Option<String>,
    pub job_type: String,
    pub status: String,
    pub retry_count: i32,
    pub result_uri: Option<String>,
    pub failure_reason: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Admit one story-script request: allocate the story id, create the
/// pending job, announce it, and answer synchronously while generation
/// proceeds in the background.
pub async fn create_story_script(
    State(state): State<AppState>,
    Json(request): Json<CreateStoryScriptRequest>,
) -> impl IntoResponse {
    let theme = match request.theme.as_deref().map(str::trim) {
        Some(theme) if !theme.is_empty() => theme.to_string(),
        _ => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "ok": false, "error": "missing theme" })),
            )
                .into_response();
        }
    };

    let story_id = request
        .story_id
        .clone()
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let payload = json!({
        "type": "story_script",
        "storyId": story_id,
        "theme": theme,
        "tone": request.tone,
        "ageRange": request.age_range,
        "scheduledAt": request.scheduled_at,
        "initiatedBy": request.initiated_by,
    });

    let job_id = match state
        .store
        .create_job(None, JobType::StoryScript, payload)
        .await
    {
        Ok(id) => id,
        Err(e) => {
            error!(error = %e, "could not create story_script job");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "ok": false, "error": e.to_string() })),
            )
                .into_response();
        }
    };

    // Announce for immediate pickup; the job row stays pending either
    // way, so a missing queue only delays execution.
    if let Err(e) = state.queue.push(&job_id).await {
        warn!(job_id = %job_id, error = %e, "story_script job not announced on queue");
    }

    info!(story_id = %story_id, job_id = %job_id, "story request admitted");

    Json(CreateStoryScriptResponse {
        ok: true,
        story_id,
        job_ids: vec![job_id],
    })
    .into_response()
}

/// Operator view of one job's progress.
pub async fn get_job_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<JobStatusResponse>, StatusCode> {
    match state.store.get_job(&id).await {
        Ok(Some(job)) => Ok(Json(JobStatusResponse {
            id: job.id,
            story_id: job.story_id,
            job_type: job.job_type,
            status: job.status,
            retry_count: job.retry_count,
            result_uri: job.result_uri,
            failure_reason: job.failure_reason,
            created_at: job.created_at.to_rfc3339(),
            updated_at: job.updated_at.to_rfc3339(),
        })),
        Ok(None) => Err(StatusCode::NOT_FOUND),
        Err(e) => {
            error!(job_id = %id, error = %e, "job status lookup failed");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}
