//! Text pipeline tests against a scripted AI transport.

mod common;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use sea_orm::EntityTrait;

use common::{
    chat_response, happy_text_pipeline, server_error, setup_test_db, story_payload,
    translation_payload, vocabulary_payload, ScriptedTransport,
};
use storyloom::database::entities::failed_jobs;
use storyloom::failure::FailureRecorder;
use storyloom::genai::ChatClient;
use storyloom::orchestrator::{StoryOrchestrator, StoryRequest};

fn request() -> StoryRequest {
    StoryRequest {
        story_id: "test-story-1".to_string(),
        theme: "friendly cloud".to_string(),
        tone: Some("warm".to_string()),
        age_range: Some("0-6".to_string()),
    }
}

fn orchestrator(
    transport: Arc<ScriptedTransport>,
    db: sea_orm::DatabaseConnection,
) -> StoryOrchestrator {
    let chat = Arc::new(
        ChatClient::with_transport(transport).with_backoff_base(Duration::from_millis(1)),
    );
    let recorder = Arc::new(FailureRecorder::new(db, None));
    StoryOrchestrator::new(chat, recorder)
}

#[tokio::test]
async fn test_full_text_pipeline() -> Result<()> {
    let (db, _temp_file) = setup_test_db().await?;
    let transport = Arc::new(ScriptedTransport::new(happy_text_pipeline()));

    let output = orchestrator(transport.clone(), db)
        .run(&request(), 1)
        .await?;

    assert_eq!(output.story.pages.len(), 10);
    assert_eq!(output.translation.pages.len(), 10);
    assert_eq!(output.vocabulary.entries.len(), 10);

    assert!(output.usages.story.total_tokens > 0);
    assert!(output.usages.translation.total_tokens > 0);
    assert!(output.usages.vocabulary.total_tokens > 0);

    assert_eq!(transport.call_count(), 3);
    Ok(())
}

#[tokio::test]
async fn test_transient_500s_are_retried_to_success() -> Result<()> {
    let (db, _temp_file) = setup_test_db().await?;

    // Two 500s on the story stage, then all three stages succeed.
    let transport = Arc::new(ScriptedTransport::new(vec![
        Err(server_error(500)),
        Err(server_error(500)),
        Ok(chat_response(&story_payload(10), 900)),
        Ok(chat_response(&translation_payload(10), 700)),
        Ok(chat_response(&vocabulary_payload(10), 500)),
    ]));

    let output = orchestrator(transport.clone(), db.clone())
        .run(&request(), 1)
        .await?;

    assert_eq!(output.story.pages.len(), 10);
    assert_eq!(transport.call_count(), 5);

    // Recovered failures leave no audit rows.
    assert!(failed_jobs::Entity::find().all(&db).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_story_with_wrong_page_count_fails_validation() -> Result<()> {
    let (db, _temp_file) = setup_test_db().await?;
    let transport = Arc::new(ScriptedTransport::new(vec![Ok(chat_response(
        &story_payload(9),
        400,
    ))]));

    let err = orchestrator(transport, db.clone())
        .run(&request(), 1)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "validation");

    // The stage failure is surfaced to the recorder before re-raising.
    let rows = failed_jobs::Entity::find().all(&db).await?;
    assert_eq!(rows.len(), 1);
    assert!(rows[0].error_message.contains("stage=story"));
    Ok(())
}

#[tokio::test]
async fn test_vocabulary_count_mismatch_fails_validation() -> Result<()> {
    let (db, _temp_file) = setup_test_db().await?;
    let transport = Arc::new(ScriptedTransport::new(vec![
        Ok(chat_response(&story_payload(10), 900)),
        Ok(chat_response(&translation_payload(10), 700)),
        Ok(chat_response(&vocabulary_payload(7), 300)),
    ]));

    let err = orchestrator(transport, db.clone())
        .run(&request(), 2)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "validation");

    let rows = failed_jobs::Entity::find().all(&db).await?;
    assert_eq!(rows.len(), 1);
    assert!(rows[0].error_message.contains("stage=vocabulary"));
    assert!(rows[0].error_message.contains("attempt=2"));
    Ok(())
}

#[tokio::test]
async fn test_permanent_provider_error_aborts_pipeline() -> Result<()> {
    let (db, _temp_file) = setup_test_db().await?;
    let transport = Arc::new(ScriptedTransport::new(vec![Err(server_error(400))]));

    let err = orchestrator(transport.clone(), db)
        .run(&request(), 1)
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(400));
    // 4xx other than 429 never retries in the adapter.
    assert_eq!(transport.call_count(), 1);
    Ok(())
}

#[tokio::test]
async fn test_fenced_output_is_assembled() -> Result<()> {
    let (db, _temp_file) = setup_test_db().await?;
    let fenced = format!("```json\n{}\n```", story_payload(10));
    let transport = Arc::new(ScriptedTransport::new(vec![
        Ok(chat_response(&fenced, 900)),
        Ok(chat_response(&translation_payload(10), 700)),
        Ok(chat_response(&vocabulary_payload(10), 500)),
    ]));

    let output = orchestrator(transport, db).run(&request(), 1).await?;
    assert_eq!(output.story.pages.len(), 10);
    Ok(())
}
