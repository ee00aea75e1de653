//! Persistence coordinator tests: transactional bundles, enqueueing,
//! the push-failure audit trail, and the dev short-circuit.

mod common;

use std::sync::Arc;

use anyhow::Result;
use sea_orm::EntityTrait;
use serde_json::Value;

use common::{setup_test_db, FailingQueue, MockQueue};
use storyloom::assembler::{
    StoryDraft, StoryPageDraft, TranslationDraft, TranslationPageDraft, VocabEntryDraft,
    VocabularyDraft,
};
use storyloom::database::entities::{failed_jobs, generation_jobs, stories, vocab_entries};
use storyloom::failure::FailureRecorder;
use storyloom::persistence::PersistenceCoordinator;
use storyloom::queue::JobEnvelope;
use storyloom::store::JobStore;

fn story(pages: usize) -> StoryDraft {
    StoryDraft {
        title_en: "The Friendly Cloud".to_string(),
        synopsis_en: "A small cloud learns to share its rain.".to_string(),
        pages: (1..=pages as i32)
            .map(|n| StoryPageDraft {
                page_number: n,
                text_en: format!("On page {n}, the little cloud drifted over the hill."),
                summary_en: format!("Scene {n}."),
            })
            .collect(),
    }
}

fn translation(pages: usize) -> TranslationDraft {
    TranslationDraft {
        title_zh: "友好的云".to_string(),
        synopsis_zh: "一朵小云学会分享雨水。".to_string(),
        pages: (1..=pages as i32)
            .map(|n| TranslationPageDraft {
                page_number: n,
                text_zh: format!("第{n}页。"),
                notes_zh: None,
            })
            .collect(),
    }
}

fn vocabulary(entries: usize) -> VocabularyDraft {
    VocabularyDraft {
        entries: (0..entries)
            .map(|n| VocabEntryDraft {
                word: format!("cloud{n}"),
                part_of_speech: "noun".to_string(),
                definition_en: "a soft shape in the sky".to_string(),
                definition_zh: "天空中柔软的形状".to_string(),
                example_sentence: "The cloud drifted by.".to_string(),
                example_translation: "云飘过。".to_string(),
                cefr_level: Some("A1".to_string()),
            })
            .collect(),
    }
}

#[tokio::test]
async fn test_persist_enqueues_one_message_per_media_job() -> Result<()> {
    let (db, _temp_file) = setup_test_db().await?;
    let queue = Arc::new(MockQueue::new());
    let recorder = Arc::new(FailureRecorder::new(db.clone(), None));
    let coordinator =
        PersistenceCoordinator::new(JobStore::new(db.clone()), queue.clone(), recorder, false);

    // Two pages is a test-only relaxation; counting is what matters here.
    let job_ids = coordinator
        .persist(
            "test-story-1",
            "friendly cloud",
            Some("0-6"),
            &story(2),
            &translation(2),
            &vocabulary(2),
        )
        .await?;

    assert_eq!(job_ids.len(), 4);
    assert_eq!(queue.push_count(), 4);

    // Every queued message is a well-formed envelope for a created job.
    for raw in queue.messages() {
        let envelope = JobEnvelope::decode(&raw)?;
        assert!(job_ids.contains(&envelope.job_id));
        assert!(envelope.timestamp > 0);
    }

    let jobs = generation_jobs::Entity::find().all(&db).await?;
    assert_eq!(jobs.len(), 4);
    let image_jobs = jobs.iter().filter(|j| j.job_type == "image").count();
    let audio_jobs = jobs.iter().filter(|j| j.job_type == "audio").count();
    assert_eq!((image_jobs, audio_jobs), (2, 2));

    Ok(())
}

#[tokio::test]
async fn test_persist_records_metadata_and_canonical_id() -> Result<()> {
    let (db, _temp_file) = setup_test_db().await?;
    let queue = Arc::new(MockQueue::new());
    let recorder = Arc::new(FailureRecorder::new(db.clone(), None));
    let coordinator =
        PersistenceCoordinator::new(JobStore::new(db.clone()), queue, recorder, false);

    coordinator
        .persist(
            "weekly-monday",
            "rainy day",
            None,
            &story(1),
            &translation(1),
            &vocabulary(1),
        )
        .await?;

    let rows = stories::Entity::find().all(&db).await?;
    assert_eq!(rows.len(), 1);
    let row = &rows[0];

    // Non-UUID refs get a minted id; the original survives in metadata.
    assert!(uuid::Uuid::parse_str(&row.id).is_ok());
    let metadata: Value = serde_json::from_str(&row.metadata)?;
    assert_eq!(metadata["originalStoryId"], "weekly-monday");
    assert_eq!(
        metadata["synopsisEn"],
        "A small cloud learns to share its rain."
    );
    assert_eq!(row.title_zh.as_deref(), Some("友好的云"));
    assert_eq!(row.status, "processing");

    let vocab_rows = vocab_entries::Entity::find().all(&db).await?;
    assert_eq!(vocab_rows.len(), 1);

    Ok(())
}

#[tokio::test]
async fn test_push_failure_is_recorded_but_jobs_survive() -> Result<()> {
    let (db, _temp_file) = setup_test_db().await?;
    let recorder = Arc::new(FailureRecorder::new(db.clone(), None));
    let coordinator = PersistenceCoordinator::new(
        JobStore::new(db.clone()),
        Arc::new(FailingQueue),
        recorder,
        false,
    );

    let job_ids = coordinator
        .persist(
            "test-story-2",
            "friendly cloud",
            None,
            &story(1),
            &translation(1),
            &vocabulary(1),
        )
        .await?;

    // The database work is not rolled back by a push failure.
    assert_eq!(job_ids.len(), 2);
    let jobs = generation_jobs::Entity::find().all(&db).await?;
    assert_eq!(jobs.len(), 2);
    assert!(jobs.iter().all(|job| job.status == "pending"));

    let failures = failed_jobs::Entity::find().all(&db).await?;
    assert_eq!(failures.len(), 1);
    assert!(failures[0].error_message.contains("stage=upstash_push"));
    assert!(failures[0].error_message.contains("pushedJobCount"));

    Ok(())
}

#[tokio::test]
async fn test_skip_persistence_returns_synthetic_ids() -> Result<()> {
    let (db, _temp_file) = setup_test_db().await?;
    let queue = Arc::new(MockQueue::new());
    let recorder = Arc::new(FailureRecorder::new(db.clone(), None));
    let coordinator =
        PersistenceCoordinator::new(JobStore::new(db.clone()), queue.clone(), recorder, true);

    let job_ids = coordinator
        .persist(
            "dev-story",
            "any theme",
            None,
            &story(10),
            &translation(10),
            &vocabulary(10),
        )
        .await?;

    // Twenty ids, page order, image before audio, and no side effects.
    assert_eq!(job_ids.len(), 20);
    assert_eq!(job_ids[0], "dev-story-image-1");
    assert_eq!(job_ids[1], "dev-story-audio-1");
    assert_eq!(job_ids[19], "dev-story-audio-10");
    assert_eq!(queue.push_count(), 0);
    assert!(stories::Entity::find().all(&db).await?.is_empty());
    assert!(generation_jobs::Entity::find().all(&db).await?.is_empty());

    Ok(())
}
