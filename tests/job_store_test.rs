//! Job store integrity tests: atomic claims, bundle transactions, and
//! idempotent asset insertion.

use anyhow::Result;
use sea_orm::{Database, DatabaseConnection, EntityTrait};
use serde_json::json;
use tempfile::NamedTempFile;

use storyloom::database::entities::generation_jobs::JobType;
use storyloom::database::entities::media_assets::MediaType;
use storyloom::database::entities::{generation_jobs, media_assets, stories, story_pages};
use storyloom::database::setup_database;
use storyloom::store::{JobStore, MediaJobSeed, NewMediaAsset, NewStory, NewStoryPage, NewVocabEntry};

async fn setup_test_db() -> Result<(DatabaseConnection, NamedTempFile)> {
    let temp_file = NamedTempFile::new()?;
    let db_url = format!("sqlite://{}?mode=rwc", temp_file.path().display());

    let db = Database::connect(&db_url).await?;
    setup_database(&db).await?;

    Ok((db, temp_file))
}

fn new_story(id: &str) -> NewStory {
    NewStory {
        id: id.to_string(),
        title_en: "The Quiet Owl".to_string(),
        title_zh: Some("安静的猫头鹰".to_string()),
        theme: "bedtime".to_string(),
        age_range: Some("0-6".to_string()),
        metadata: json!({ "synopsisEn": "An owl listens to the night." }),
    }
}

fn pages(count: i32) -> Vec<NewStoryPage> {
    (1..=count)
        .map(|n| NewStoryPage {
            page_number: n,
            text_en: format!("Page {n} of the owl's night."),
            text_zh: Some(format!("第{n}页。")),
            word_count: 6,
        })
        .collect()
}

fn vocab(count: usize) -> Vec<NewVocabEntry> {
    (0..count)
        .map(|n| NewVocabEntry {
            word: format!("word{n}"),
            part_of_speech: "noun".to_string(),
            definition_en: "a thing".to_string(),
            definition_zh: "一个东西".to_string(),
            example_sentence: "A thing sits here.".to_string(),
            example_translation: "一个东西在这里。".to_string(),
            cefr_level: Some("A1".to_string()),
        })
        .collect()
}

fn media_seeds(pages: i32) -> Vec<MediaJobSeed> {
    (1..=pages)
        .flat_map(|n| {
            vec![
                MediaJobSeed {
                    job_type: JobType::Image,
                    payload: json!({ "pageNumber": n, "textEn": format!("Page {n}") }),
                },
                MediaJobSeed {
                    job_type: JobType::Audio,
                    payload: json!({ "pageNumber": n, "textEn": format!("Page {n}"), "textZh": null }),
                },
            ]
        })
        .collect()
}

#[tokio::test]
async fn test_create_claim_complete_lifecycle() -> Result<()> {
    let (db, _temp_file) = setup_test_db().await?;
    let store = JobStore::new(db);

    let job_id = store
        .create_job(None, JobType::StoryScript, json!({ "theme": "owls" }))
        .await?;

    let claimed = store.claim_job(&job_id).await?.expect("claim should win");
    assert_eq!(claimed.status, "processing");
    assert!(claimed.started_at.is_some());

    store.complete_job(&job_id, "story://abc").await?;
    let done = store.get_job(&job_id).await?.unwrap();
    assert_eq!(done.status, "completed");
    assert_eq!(done.result_uri.as_deref(), Some("story://abc"));
    assert!(done.finished_at.is_some());

    Ok(())
}

#[tokio::test]
async fn test_claim_is_exclusive() -> Result<()> {
    let (db, _temp_file) = setup_test_db().await?;
    let store_a = JobStore::new(db.clone());
    let store_b = JobStore::new(db);

    let job_id = store_a
        .create_job(None, JobType::StoryScript, json!({}))
        .await?;

    // Two workers race on the same pending job.
    let (first, second) = tokio::join!(store_a.claim_job(&job_id), store_b.claim_job(&job_id));
    let wins = [first?, second?];
    let winners = wins.iter().filter(|claim| claim.is_some()).count();
    assert_eq!(winners, 1, "exactly one claim must observe the row");

    Ok(())
}

#[tokio::test]
async fn test_claim_misses_are_nil() -> Result<()> {
    let (db, _temp_file) = setup_test_db().await?;
    let store = JobStore::new(db);

    assert!(store.claim_job("missing-job").await?.is_none());

    let job_id = store.create_job(None, JobType::Image, json!({})).await?;
    store.claim_job(&job_id).await?.unwrap();
    // A second claim on a processing job is a miss, not an error.
    assert!(store.claim_job(&job_id).await?.is_none());

    Ok(())
}

#[tokio::test]
async fn test_fail_job_truncates_reason() -> Result<()> {
    let (db, _temp_file) = setup_test_db().await?;
    let store = JobStore::new(db);

    let job_id = store.create_job(None, JobType::Audio, json!({})).await?;
    let long_reason = "x".repeat(2000);
    store.fail_job(&job_id, &long_reason).await?;

    let job = store.get_job(&job_id).await?.unwrap();
    assert_eq!(job.status, "failed");
    assert_eq!(job.failure_reason.unwrap().chars().count(), 512);

    Ok(())
}

#[tokio::test]
async fn test_increment_retry_is_monotonic() -> Result<()> {
    let (db, _temp_file) = setup_test_db().await?;
    let store = JobStore::new(db);

    let job_id = store.create_job(None, JobType::Video, json!({})).await?;
    assert_eq!(store.increment_retry(&job_id).await?, 1);
    assert_eq!(store.increment_retry(&job_id).await?, 2);
    assert_eq!(store.increment_retry(&job_id).await?, 3);

    Ok(())
}

#[tokio::test]
async fn test_persist_story_bundle_creates_all_rows() -> Result<()> {
    let (db, _temp_file) = setup_test_db().await?;
    let store = JobStore::new(db.clone());

    let story_id = "f8a3f7de-8d52-4f09-9a1b-0af6f1f7a001";
    let job_ids = store
        .persist_story_bundle(new_story(story_id), pages(10), vocab(10), media_seeds(10))
        .await?;

    assert_eq!(job_ids.len(), 20);

    let story = stories::Entity::find_by_id(story_id).one(&db).await?.unwrap();
    assert_eq!(story.status, "processing");

    let stored_pages = story_pages::Entity::find().all(&db).await?;
    assert_eq!(stored_pages.len(), 10);
    let mut numbers: Vec<i32> = stored_pages.iter().map(|p| p.page_number).collect();
    numbers.sort_unstable();
    assert_eq!(numbers, (1..=10).collect::<Vec<_>>());

    let jobs = generation_jobs::Entity::find().all(&db).await?;
    assert_eq!(jobs.len(), 20);
    assert!(jobs.iter().all(|job| job.status == "pending"));
    assert!(jobs.iter().all(|job| job.story_id.as_deref() == Some(story_id)));

    Ok(())
}

#[tokio::test]
async fn test_persist_story_bundle_rolls_back_atomically() -> Result<()> {
    let (db, _temp_file) = setup_test_db().await?;
    let store = JobStore::new(db.clone());

    let story_id = "f8a3f7de-8d52-4f09-9a1b-0af6f1f7a002";
    // Duplicate page numbers violate the unique index mid-transaction.
    let mut bad_pages = pages(10);
    bad_pages[5].page_number = 1;

    let result = store
        .persist_story_bundle(new_story(story_id), bad_pages, vocab(10), media_seeds(10))
        .await;
    assert!(result.is_err());

    // Nothing from the bundle survives the rollback.
    assert!(stories::Entity::find_by_id(story_id).one(&db).await?.is_none());
    assert!(story_pages::Entity::find().all(&db).await?.is_empty());
    assert!(generation_jobs::Entity::find().all(&db).await?.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_insert_asset_if_absent_is_idempotent() -> Result<()> {
    let (db, _temp_file) = setup_test_db().await?;
    let store = JobStore::new(db.clone());

    let story_id = "f8a3f7de-8d52-4f09-9a1b-0af6f1f7a003";
    store
        .persist_story_bundle(new_story(story_id), pages(1), vocab(1), vec![])
        .await?;
    let job_id = store
        .create_job(Some(story_id), JobType::Image, json!({}))
        .await?;

    let asset = NewMediaAsset {
        story_id: story_id.to_string(),
        page_id: None,
        media_type: MediaType::Image,
        uri: "https://example.test/a.png".to_string(),
        format: "png".to_string(),
        duration_ms: None,
        metadata: json!({}),
        generating_job_id: job_id.clone(),
    };

    let first = store.insert_asset_if_absent(asset.clone()).await?;
    let second = store.insert_asset_if_absent(asset).await?;

    assert_eq!(first.id, second.id);
    assert_eq!(media_assets::Entity::find().all(&db).await?.len(), 1);

    Ok(())
}

#[tokio::test]
async fn test_stale_pending_scan_ignores_fresh_jobs() -> Result<()> {
    let (db, _temp_file) = setup_test_db().await?;
    let store = JobStore::new(db);

    store.create_job(None, JobType::Image, json!({})).await?;

    // A job created just now is not stale at any reasonable threshold.
    let stale = store.list_stale_pending(60, 10).await?;
    assert!(stale.is_empty());

    // With a negative threshold everything pending qualifies.
    let stale = store.list_stale_pending(-60, 10).await?;
    assert_eq!(stale.len(), 1);

    Ok(())
}
