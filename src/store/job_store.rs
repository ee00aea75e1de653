use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, TransactionTrait,
};
use tracing::{debug, info};
use uuid::Uuid;

use crate::database::entities::{
    generation_jobs,
    generation_jobs::{JobStatus, JobType},
    media_assets,
    media_assets::MediaType,
    stories,
    stories::StoryStatus,
    story_pages, vocab_entries,
};
use crate::errors::PipelineResult;

/// Failure reasons are kept short enough to scan in an admin listing.
const MAX_FAILURE_REASON_CHARS: usize = 512;

/// Story row as handed to [`JobStore::persist_story_bundle`].
#[derive(Debug, Clone)]
pub struct NewStory {
    pub id: String,
    pub title_en: String,
    pub title_zh: Option<String>,
    pub theme: String,
    pub age_range: Option<String>,
    pub metadata: serde_json::Value,
}

#[derive(Debug, Clone)]
pub struct NewStoryPage {
    pub page_number: i32,
    pub text_en: String,
    pub text_zh: Option<String>,
    pub word_count: i32,
}

#[derive(Debug, Clone)]
pub struct NewVocabEntry {
    pub word: String,
    pub part_of_speech: String,
    pub definition_en: String,
    pub definition_zh: String,
    pub example_sentence: String,
    pub example_translation: String,
    pub cefr_level: Option<String>,
}

/// One pending media job to mint inside the bundle transaction.
#[derive(Debug, Clone)]
pub struct MediaJobSeed {
    pub job_type: JobType,
    pub payload: serde_json::Value,
}

#[derive(Debug, Clone)]
pub struct NewMediaAsset {
    pub story_id: String,
    pub page_id: Option<i32>,
    pub media_type: MediaType,
    pub uri: String,
    pub format: String,
    pub duration_ms: Option<i32>,
    pub metadata: serde_json::Value,
    pub generating_job_id: String,
}

#[derive(Clone)]
pub struct JobStore {
    db: DatabaseConnection,
}

impl JobStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub fn db(&self) -> &DatabaseConnection {
        &self.db
    }

    /// Insert one pending job and return its id.
    pub async fn create_job(
        &self,
        story_id: Option<&str>,
        job_type: JobType,
        payload: serde_json::Value,
    ) -> PipelineResult<String> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        generation_jobs::ActiveModel {
            id: Set(id.clone()),
            story_id: Set(story_id.map(str::to_string)),
            job_type: Set(job_type.into()),
            status: Set(JobStatus::Pending.into()),
            retry_count: Set(0),
            payload: Set(payload.to_string()),
            result_uri: Set(None),
            failure_reason: Set(None),
            started_at: Set(None),
            finished_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&self.db)
        .await?;

        debug!(job_id = %id, job_type = job_type.as_str(), "created pending job");
        Ok(id)
    }

    /// Atomically transition one pending job to processing.
    ///
    /// The claim is a conditional UPDATE filtered on `status = 'pending'`;
    /// the row is handed to exactly one caller even when several workers
    /// race on the same id. Returns `None` when the job does not exist or
    /// is no longer pending.
    pub async fn claim_job(&self, job_id: &str) -> PipelineResult<Option<generation_jobs::Model>> {
        let now = Utc::now();

        let result = generation_jobs::Entity::update_many()
            .col_expr(
                generation_jobs::Column::Status,
                Expr::value(String::from(JobStatus::Processing)),
            )
            .col_expr(generation_jobs::Column::StartedAt, Expr::value(now))
            .col_expr(generation_jobs::Column::UpdatedAt, Expr::value(now))
            .filter(generation_jobs::Column::Id.eq(job_id))
            .filter(generation_jobs::Column::Status.eq(String::from(JobStatus::Pending)))
            .exec(&self.db)
            .await?;

        if result.rows_affected == 0 {
            return Ok(None);
        }

        self.get_job(job_id).await
    }

    pub async fn get_job(&self, job_id: &str) -> PipelineResult<Option<generation_jobs::Model>> {
        Ok(generation_jobs::Entity::find_by_id(job_id)
            .one(&self.db)
            .await?)
    }

    /// Mark a job completed and store its result pointer.
    pub async fn complete_job(&self, job_id: &str, result_uri: &str) -> PipelineResult<()> {
        let now = Utc::now();

        generation_jobs::Entity::update_many()
            .col_expr(
                generation_jobs::Column::Status,
                Expr::value(String::from(JobStatus::Completed)),
            )
            .col_expr(
                generation_jobs::Column::ResultUri,
                Expr::value(result_uri.to_string()),
            )
            .col_expr(generation_jobs::Column::FinishedAt, Expr::value(now))
            .col_expr(generation_jobs::Column::UpdatedAt, Expr::value(now))
            .filter(generation_jobs::Column::Id.eq(job_id))
            .exec(&self.db)
            .await?;

        info!(job_id = %job_id, result_uri = %result_uri, "job completed");
        Ok(())
    }

    /// Mark a job failed with a bounded reason string.
    pub async fn fail_job(&self, job_id: &str, reason: &str) -> PipelineResult<()> {
        let now = Utc::now();
        let truncated: String = reason.chars().take(MAX_FAILURE_REASON_CHARS).collect();

        generation_jobs::Entity::update_many()
            .col_expr(
                generation_jobs::Column::Status,
                Expr::value(String::from(JobStatus::Failed)),
            )
            .col_expr(
                generation_jobs::Column::FailureReason,
                Expr::value(truncated),
            )
            .col_expr(generation_jobs::Column::FinishedAt, Expr::value(now))
            .col_expr(generation_jobs::Column::UpdatedAt, Expr::value(now))
            .filter(generation_jobs::Column::Id.eq(job_id))
            .exec(&self.db)
            .await?;

        Ok(())
    }

    /// Bump the retry counter and return the new value.
    pub async fn increment_retry(&self, job_id: &str) -> PipelineResult<i32> {
        generation_jobs::Entity::update_many()
            .col_expr(
                generation_jobs::Column::RetryCount,
                Expr::col(generation_jobs::Column::RetryCount).add(1),
            )
            .col_expr(
                generation_jobs::Column::UpdatedAt,
                Expr::value(Utc::now()),
            )
            .filter(generation_jobs::Column::Id.eq(job_id))
            .exec(&self.db)
            .await?;

        let job = self.get_job(job_id).await?;
        Ok(job.map(|j| j.retry_count).unwrap_or(0))
    }

    /// Insert a story together with its pages, vocabulary, and one pending
    /// job per media seed, all in a single transaction. Returns the media
    /// job ids in seed order; on any failure nothing is written.
    pub async fn persist_story_bundle(
        &self,
        story: NewStory,
        pages: Vec<NewStoryPage>,
        vocab: Vec<NewVocabEntry>,
        media_seeds: Vec<MediaJobSeed>,
    ) -> PipelineResult<Vec<String>> {
        let now = Utc::now();
        let txn = self.db.begin().await?;

        let story_id = story.id.clone();

        stories::ActiveModel {
            id: Set(story.id),
            title_en: Set(story.title_en),
            title_zh: Set(story.title_zh),
            theme: Set(story.theme),
            status: Set(StoryStatus::Processing.into()),
            age_range: Set(story.age_range),
            metadata: Set(story.metadata.to_string()),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await?;

        for page in pages {
            story_pages::ActiveModel {
                story_id: Set(story_id.clone()),
                page_number: Set(page.page_number),
                text_en: Set(page.text_en),
                text_zh: Set(page.text_zh),
                word_count: Set(page.word_count),
                image_asset_id: Set(None),
                audio_asset_id: Set(None),
                created_at: Set(now),
                ..Default::default()
            }
            .insert(&txn)
            .await?;
        }

        for entry in vocab {
            vocab_entries::ActiveModel {
                story_id: Set(story_id.clone()),
                word: Set(entry.word),
                part_of_speech: Set(entry.part_of_speech),
                definition_en: Set(entry.definition_en),
                definition_zh: Set(entry.definition_zh),
                example_sentence: Set(entry.example_sentence),
                example_translation: Set(entry.example_translation),
                cefr_level: Set(entry.cefr_level),
                created_at: Set(now),
                ..Default::default()
            }
            .insert(&txn)
            .await?;
        }

        let mut job_ids = Vec::with_capacity(media_seeds.len());
        for seed in media_seeds {
            let job_id = Uuid::new_v4().to_string();
            generation_jobs::ActiveModel {
                id: Set(job_id.clone()),
                story_id: Set(Some(story_id.clone())),
                job_type: Set(seed.job_type.into()),
                status: Set(JobStatus::Pending.into()),
                retry_count: Set(0),
                payload: Set(seed.payload.to_string()),
                result_uri: Set(None),
                failure_reason: Set(None),
                started_at: Set(None),
                finished_at: Set(None),
                created_at: Set(now),
                updated_at: Set(now),
            }
            .insert(&txn)
            .await?;
            job_ids.push(job_id);
        }

        txn.commit().await?;

        info!(
            story_id = %story_id,
            media_jobs = job_ids.len(),
            "persisted story bundle"
        );
        Ok(job_ids)
    }

    /// Insert a media asset unless one already exists for the generating
    /// job; either way the surviving row is returned.
    pub async fn insert_asset_if_absent(
        &self,
        asset: NewMediaAsset,
    ) -> PipelineResult<media_assets::Model> {
        if let Some(existing) = self.find_asset_by_job(&asset.generating_job_id).await? {
            debug!(
                generating_job_id = %asset.generating_job_id,
                asset_id = existing.id,
                "asset already present"
            );
            return Ok(existing);
        }

        let inserted = media_assets::ActiveModel {
            story_id: Set(asset.story_id),
            page_id: Set(asset.page_id),
            media_type: Set(asset.media_type.into()),
            uri: Set(asset.uri),
            format: Set(asset.format),
            duration_ms: Set(asset.duration_ms),
            metadata: Set(asset.metadata.to_string()),
            generating_job_id: Set(asset.generating_job_id.clone()),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&self.db)
        .await;

        match inserted {
            Ok(model) => Ok(model),
            // A racing insert can land between the lookup and ours; the
            // unique index on generating_job_id makes the loser re-read.
            Err(err) => match self.find_asset_by_job(&asset.generating_job_id).await? {
                Some(existing) => Ok(existing),
                None => Err(err.into()),
            },
        }
    }

    async fn find_asset_by_job(
        &self,
        generating_job_id: &str,
    ) -> PipelineResult<Option<media_assets::Model>> {
        Ok(media_assets::Entity::find()
            .filter(media_assets::Column::GeneratingJobId.eq(generating_job_id))
            .one(&self.db)
            .await?)
    }

    pub async fn find_page(
        &self,
        story_id: &str,
        page_number: i32,
    ) -> PipelineResult<Option<story_pages::Model>> {
        Ok(story_pages::Entity::find()
            .filter(story_pages::Column::StoryId.eq(story_id))
            .filter(story_pages::Column::PageNumber.eq(page_number))
            .one(&self.db)
            .await?)
    }

    /// Set the page's back-reference to a produced asset. Pages are
    /// immutable after insertion except for these two columns.
    pub async fn attach_asset_to_page(
        &self,
        page_id: i32,
        media_type: MediaType,
        asset_id: i32,
    ) -> PipelineResult<()> {
        let column = match media_type {
            MediaType::Image => story_pages::Column::ImageAssetId,
            MediaType::Audio => story_pages::Column::AudioAssetId,
            MediaType::Video => return Ok(()),
        };

        story_pages::Entity::update_many()
            .col_expr(column, Expr::value(asset_id))
            .filter(story_pages::Column::Id.eq(page_id))
            .exec(&self.db)
            .await?;

        Ok(())
    }

    /// Pending jobs untouched for longer than `older_than_secs`, oldest
    /// first. Feeds the requeue reconciler.
    pub async fn list_stale_pending(
        &self,
        older_than_secs: i64,
        limit: u64,
    ) -> PipelineResult<Vec<generation_jobs::Model>> {
        let cutoff = Utc::now() - chrono::Duration::seconds(older_than_secs);

        Ok(generation_jobs::Entity::find()
            .filter(generation_jobs::Column::Status.eq(String::from(JobStatus::Pending)))
            .filter(generation_jobs::Column::UpdatedAt.lt(cutoff))
            .order_by_asc(generation_jobs::Column::UpdatedAt)
            .limit(limit)
            .all(&self.db)
            .await?)
    }
}
