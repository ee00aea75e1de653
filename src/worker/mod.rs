//! Queue consumer: claims jobs, routes them to stage handlers, and
//! applies the retry/permanence policy.
//!
//! The poll loop is single-threaded and only dispatches; handlers run as
//! spawned tasks up to a process-local concurrency cap. A job id being
//! handled is held in an in-memory set so a duplicate queue message can
//! never re-enter a running handler.

mod reconciler;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Deserialize;
use tokio::sync::{watch, RwLock};
use tracing::{error, info, warn};

use crate::database::entities::generation_jobs;
use crate::database::entities::generation_jobs::JobType;
use crate::database::entities::media_assets::MediaType;
use crate::errors::{PipelineError, PipelineResult};
use crate::failure::{FailureContext, FailureRecorder};
use crate::media::{
    BlobUploader, ImageHandler, ImageRequest, TtsHandler, TtsRequest, VideoComposer, VideoRequest,
};
use crate::orchestrator::{StoryOrchestrator, StoryRequest};
use crate::persistence::PersistenceCoordinator;
use crate::queue::JobQueue;
use crate::store::{JobStore, NewMediaAsset};

pub use reconciler::Reconciler;

const POP_TIMEOUT: Duration = Duration::from_secs(5);
const CAPACITY_WAIT: Duration = Duration::from_millis(100);
const DRAIN_DEADLINE: Duration = Duration::from_secs(30);
const DRAIN_POLL: Duration = Duration::from_millis(200);

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub concurrency: usize,
    pub poll_interval: Duration,
    pub max_retries: u32,
}

/// Stage handlers injected into the worker.
#[derive(Clone)]
pub struct StageHandlers {
    pub orchestrator: Arc<StoryOrchestrator>,
    pub persistence: Arc<PersistenceCoordinator>,
    pub image: Arc<ImageHandler>,
    pub tts: Arc<TtsHandler>,
    pub video: Arc<VideoComposer>,
    pub uploader: BlobUploader,
}

/// Payload shape for `video` jobs.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoJobPayload {
    image_uris: Vec<String>,
    #[serde(default)]
    audio_uri: Option<String>,
    #[serde(default)]
    per_page_durations: Option<Vec<f64>>,
    #[serde(default)]
    format: Option<String>,
    #[serde(default)]
    fps: Option<u32>,
}

#[derive(Clone)]
pub struct Worker {
    store: JobStore,
    queue: Arc<dyn JobQueue>,
    recorder: Arc<FailureRecorder>,
    handlers: StageHandlers,
    config: WorkerConfig,
    running: Arc<RwLock<HashSet<String>>>,
}

impl Worker {
    pub fn new(
        store: JobStore,
        queue: Arc<dyn JobQueue>,
        recorder: Arc<FailureRecorder>,
        handlers: StageHandlers,
        config: WorkerConfig,
    ) -> Self {
        Self {
            store,
            queue,
            recorder,
            handlers,
            config,
            running: Arc::new(RwLock::new(HashSet::new())),
        }
    }

    /// Poll until shutdown flips, then wait a bounded time for in-flight
    /// handlers to finish.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            concurrency = self.config.concurrency,
            max_retries = self.config.max_retries,
            "worker started"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            // Gate on capacity before popping so no message is taken off
            // the queue without a handler slot to run it.
            if self.running.read().await.len() >= self.config.concurrency {
                tokio::time::sleep(CAPACITY_WAIT).await;
                continue;
            }

            let popped = tokio::select! {
                _ = shutdown.changed() => break,
                popped = self.queue.pop(POP_TIMEOUT) => popped,
            };

            match popped {
                Ok(Some(envelope)) => self.dispatch(envelope.job_id).await,
                Ok(None) => {
                    tokio::select! {
                        _ = shutdown.changed() => break,
                        _ = tokio::time::sleep(self.config.poll_interval) => {}
                    }
                }
                Err(e) => {
                    warn!(error = %e, "queue pop failed");
                    tokio::select! {
                        _ = shutdown.changed() => break,
                        _ = tokio::time::sleep(self.config.poll_interval) => {}
                    }
                }
            }
        }

        self.drain().await;
        info!("worker stopped");
    }

    async fn drain(&self) {
        let deadline = Instant::now() + DRAIN_DEADLINE;
        loop {
            let in_flight = self.running.read().await.len();
            if in_flight == 0 {
                return;
            }
            if Instant::now() >= deadline {
                warn!(in_flight, "drain deadline reached, abandoning handlers");
                return;
            }
            tokio::time::sleep(DRAIN_POLL).await;
        }
    }

    /// Spawn a handler for one queue message unless that job id is
    /// already being handled.
    async fn dispatch(&self, job_id: String) {
        {
            let mut running = self.running.write().await;
            if !running.insert(job_id.clone()) {
                info!(job_id = %job_id, "job already in flight, skipping duplicate message");
                return;
            }
        }

        let worker = self.clone();
        tokio::spawn(async move {
            worker.handle(&job_id).await;
            // Deferred finalizer: free the slot whatever the outcome.
            worker.running.write().await.remove(&job_id);
        });
    }

    async fn handle(&self, job_id: &str) {
        let job = match self.store.claim_job(job_id).await {
            Ok(Some(job)) => job,
            Ok(None) => {
                // Another worker claimed it, or the message was stale.
                info!(job_id = %job_id, "claim miss");
                return;
            }
            Err(e) => {
                error!(job_id = %job_id, error = %e, "claim query failed");
                return;
            }
        };

        let payload = match serde_json::from_str::<serde_json::Value>(&job.payload) {
            Ok(value) if value.is_object() => value,
            _ => {
                warn!(job_id = %job_id, "claimed row has malformed payload");
                if let Err(e) = self.store.fail_job(job_id, "invalid_job_row_shape").await {
                    error!(job_id = %job_id, error = %e, "could not mark invalid job failed");
                }
                return;
            }
        };

        let outcome = match JobType::parse(&job.job_type) {
            Some(JobType::StoryScript) => self.handle_story_script(&job, payload).await,
            Some(JobType::Image) => self.handle_image(&job, payload).await,
            Some(JobType::Audio) => self.handle_audio(&job, payload).await,
            Some(JobType::Video) => self.handle_video(&job, payload).await,
            _ => {
                let err = PipelineError::UnknownJobType(job.job_type.clone());
                if let Err(e) = self
                    .store
                    .fail_job(job_id, &format!("unknown job type: {}", job.job_type))
                    .await
                {
                    error!(job_id = %job_id, error = %e, "could not mark unroutable job failed");
                }
                let context = FailureContext::new("routing")
                    .with_job(job_id.to_string())
                    .with_attempt(job.retry_count as u32 + 1);
                if let Err(e) = self.recorder.record_failure(context, &err).await {
                    error!(job_id = %job_id, error = %e, "could not record routing failure");
                }
                return;
            }
        };

        if let Err(err) = outcome {
            self.apply_failure_policy(&job, err).await;
        }
    }

    async fn handle_story_script(
        &self,
        job: &generation_jobs::Model,
        payload: serde_json::Value,
    ) -> PipelineResult<()> {
        let request: StoryRequest = serde_json::from_value(payload)
            .map_err(|e| PipelineError::Validation(format!("story_script payload: {e}")))?;

        let attempt = job.retry_count as u32 + 1;
        let output = self.handlers.orchestrator.run(&request, attempt).await?;

        let media_ids = self
            .handlers
            .persistence
            .persist(
                &request.story_id,
                &request.theme,
                request.age_range.as_deref(),
                &output.story,
                &output.translation,
                &output.vocabulary,
            )
            .await?;

        self.store
            .complete_job(&job.id, &format!("story://{}", request.story_id))
            .await?;

        info!(
            job_id = %job.id,
            story_id = %request.story_id,
            media_jobs = media_ids.len(),
            total_tokens = output.usages.story.total_tokens
                + output.usages.translation.total_tokens
                + output.usages.vocabulary.total_tokens,
            "story pipeline completed"
        );
        Ok(())
    }

    async fn handle_image(
        &self,
        job: &generation_jobs::Model,
        payload: serde_json::Value,
    ) -> PipelineResult<()> {
        let page_number = payload
            .get("pageNumber")
            .and_then(serde_json::Value::as_i64)
            .ok_or_else(|| PipelineError::Validation("image job missing pageNumber".into()))?
            as i32;
        let text_en = payload
            .get("textEn")
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| PipelineError::Validation("image job missing textEn".into()))?;
        let story_id = job
            .story_id
            .clone()
            .ok_or_else(|| PipelineError::Validation("image job has no story".into()))?;

        let output = self
            .handlers
            .image
            .generate(ImageRequest {
                prompt: format!(
                    "Soft, warm children's picture-book illustration of: {text_en}"
                ),
                size: None,
            })
            .await?;

        let page = self.store.find_page(&story_id, page_number).await?;
        let asset = self
            .store
            .insert_asset_if_absent(NewMediaAsset {
                story_id,
                page_id: page.as_ref().map(|p| p.id),
                media_type: MediaType::Image,
                uri: output.uri.clone(),
                format: output.format,
                duration_ms: output.duration_ms,
                metadata: output.metadata,
                generating_job_id: job.id.clone(),
            })
            .await?;

        if let Some(page) = page {
            self.store
                .attach_asset_to_page(page.id, MediaType::Image, asset.id)
                .await?;
        }

        self.store.complete_job(&job.id, &asset.uri).await?;
        Ok(())
    }

    async fn handle_audio(
        &self,
        job: &generation_jobs::Model,
        payload: serde_json::Value,
    ) -> PipelineResult<()> {
        let page_number = payload
            .get("pageNumber")
            .and_then(serde_json::Value::as_i64)
            .ok_or_else(|| PipelineError::Validation("audio job missing pageNumber".into()))?
            as i32;
        let text = payload
            .get("textZh")
            .and_then(serde_json::Value::as_str)
            .filter(|text| !text.is_empty())
            .or_else(|| payload.get("textEn").and_then(serde_json::Value::as_str))
            .ok_or_else(|| PipelineError::Validation("audio job missing text".into()))?;
        let story_id = job
            .story_id
            .clone()
            .ok_or_else(|| PipelineError::Validation("audio job has no story".into()))?;

        let output = self
            .handlers
            .tts
            .generate(TtsRequest {
                text: text.to_string(),
                voice: None,
                format: None,
            })
            .await?;

        let page = self.store.find_page(&story_id, page_number).await?;
        let asset = self
            .store
            .insert_asset_if_absent(NewMediaAsset {
                story_id,
                page_id: page.as_ref().map(|p| p.id),
                media_type: MediaType::Audio,
                uri: output.uri.clone(),
                format: output.format,
                duration_ms: output.duration_ms,
                metadata: output.metadata,
                generating_job_id: job.id.clone(),
            })
            .await?;

        if let Some(page) = page {
            self.store
                .attach_asset_to_page(page.id, MediaType::Audio, asset.id)
                .await?;
        }

        self.store.complete_job(&job.id, &asset.uri).await?;
        Ok(())
    }

    async fn handle_video(
        &self,
        job: &generation_jobs::Model,
        payload: serde_json::Value,
    ) -> PipelineResult<()> {
        let request: VideoJobPayload = serde_json::from_value(payload)
            .map_err(|e| PipelineError::Validation(format!("video payload: {e}")))?;
        let story_id = job
            .story_id
            .clone()
            .ok_or_else(|| PipelineError::Validation("video job has no story".into()))?;

        let path = self
            .handlers
            .video
            .compose(VideoRequest {
                image_uris: request.image_uris,
                audio_uri: request.audio_uri,
                per_page_durations: request.per_page_durations,
                format: request.format,
                fps: request.fps,
            })
            .await?;

        let uri = self.handlers.uploader.upload_file(&path).await?;

        let asset = self
            .store
            .insert_asset_if_absent(NewMediaAsset {
                story_id,
                page_id: None,
                media_type: MediaType::Video,
                uri: uri.clone(),
                format: "mp4".to_string(),
                duration_ms: None,
                metadata: serde_json::json!({}),
                generating_job_id: job.id.clone(),
            })
            .await?;

        self.store.complete_job(&job.id, &asset.uri).await?;
        Ok(())
    }

    /// Count the attempt, then either leave the job visible as a
    /// temporary failure for requeueing, or seal it as permanent and
    /// notify the failure recorder.
    async fn apply_failure_policy(&self, job: &generation_jobs::Model, err: PipelineError) {
        let retry_count = match self.store.increment_retry(&job.id).await {
            Ok(count) => count,
            Err(e) => {
                error!(job_id = %job.id, error = %e, "could not increment retry count");
                self.config.max_retries as i32
            }
        };

        let permanent = !err.is_retriable() || retry_count >= self.config.max_retries as i32;

        if permanent {
            warn!(job_id = %job.id, retry_count, error = %err, "job failed permanently");
            if let Err(e) = self
                .store
                .fail_job(&job.id, &format!("permanent_error:{err}"))
                .await
            {
                error!(job_id = %job.id, error = %e, "could not mark job failed");
            }
            let context = FailureContext::new(job.job_type.clone())
                .with_job(job.id.clone())
                .with_attempt(retry_count as u32);
            if let Err(e) = self.recorder.record_failure(context, &err).await {
                error!(job_id = %job.id, error = %e, "could not record permanent failure");
            }
        } else {
            warn!(job_id = %job.id, retry_count, error = %err, "job failed, retry possible");
            if let Err(e) = self
                .store
                .fail_job(&job.id, &format!("temporary_error:{err}"))
                .await
            {
                error!(job_id = %job.id, error = %e, "could not mark job failed");
            }
        }
    }
}
