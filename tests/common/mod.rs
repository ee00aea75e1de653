//! Shared fixtures for integration tests: scripted chat transports,
//! in-memory queues, and canned stage payloads.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use sea_orm::{Database, DatabaseConnection};
use serde_json::{json, Value};
use tempfile::NamedTempFile;

use storyloom::database::setup_database;
use storyloom::errors::{PipelineError, PipelineResult};
use storyloom::genai::{ChatCompletionResponse, ChatRequest, ChatTransport};
use storyloom::queue::{JobEnvelope, JobQueue};

pub async fn setup_test_db() -> Result<(DatabaseConnection, NamedTempFile)> {
    let temp_file = NamedTempFile::new()?;
    let db_url = format!("sqlite://{}?mode=rwc", temp_file.path().display());

    let db = Database::connect(&db_url).await?;
    setup_database(&db).await?;

    Ok((db, temp_file))
}

/// Chat transport that replays a scripted sequence of results.
pub struct ScriptedTransport {
    responses: Mutex<VecDeque<PipelineResult<ChatCompletionResponse>>>,
    pub calls: AtomicU32,
}

impl ScriptedTransport {
    pub fn new(responses: Vec<PipelineResult<ChatCompletionResponse>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            calls: AtomicU32::new(0),
        }
    }

    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChatTransport for ScriptedTransport {
    async fn execute(&self, _request: &ChatRequest) -> PipelineResult<ChatCompletionResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(PipelineError::Transport("script exhausted".to_string())))
    }
}

/// Build a provider response whose first choice carries `content`.
pub fn chat_response(content: &str, total_tokens: u32) -> ChatCompletionResponse {
    serde_json::from_value(json!({
        "choices": [{ "message": { "content": content } }],
        "usage": {
            "prompt_tokens": total_tokens / 2,
            "completion_tokens": total_tokens - total_tokens / 2,
            "total_tokens": total_tokens,
        }
    }))
    .expect("canned response shape")
}

pub fn server_error(status: u16) -> PipelineError {
    PipelineError::Provider {
        status,
        message: "provider unavailable".to_string(),
    }
}

/// FIFO queue shared between test producer and worker, with push counting.
pub struct MockQueue {
    items: Mutex<VecDeque<String>>,
    pub pushes: AtomicU32,
}

impl MockQueue {
    pub fn new() -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
            pushes: AtomicU32::new(0),
        }
    }

    pub fn push_count(&self) -> u32 {
        self.pushes.load(Ordering::SeqCst)
    }

    pub fn messages(&self) -> Vec<String> {
        self.items.lock().unwrap().iter().cloned().collect()
    }
}

#[async_trait]
impl JobQueue for MockQueue {
    async fn push(&self, job_id: &str) -> PipelineResult<()> {
        self.pushes.fetch_add(1, Ordering::SeqCst);
        self.items
            .lock()
            .unwrap()
            .push_back(JobEnvelope::new(job_id).encode());
        Ok(())
    }

    async fn pop(&self, _timeout: Duration) -> PipelineResult<Option<JobEnvelope>> {
        let raw = self.items.lock().unwrap().pop_front();
        match raw {
            Some(raw) => Ok(Some(JobEnvelope::decode(&raw)?)),
            None => Ok(None),
        }
    }
}

/// Queue whose pushes always fail; pop stays empty.
pub struct FailingQueue;

#[async_trait]
impl JobQueue for FailingQueue {
    async fn push(&self, _job_id: &str) -> PipelineResult<()> {
        Err(PipelineError::Queue("broker unreachable".to_string()))
    }

    async fn pop(&self, _timeout: Duration) -> PipelineResult<Option<JobEnvelope>> {
        Ok(None)
    }
}

/// A valid ten-page story payload in the wire (snake_case) shape.
pub fn story_payload(pages: usize) -> String {
    json!({
        "title_en": "The Friendly Cloud",
        "synopsis_en": "A small cloud learns to share its rain.",
        "pages": (1..=pages).map(|n| json!({
            "page_number": n,
            "text_en": format!("On page {n}, the little cloud drifted over the hill."),
            "summary_en": format!("The cloud above scene {n}."),
        })).collect::<Vec<_>>(),
    })
    .to_string()
}

pub fn translation_payload(pages: usize) -> String {
    json!({
        "title_zh": "友好的云",
        "synopsis_zh": "一朵小云学会分享雨水。",
        "pages": (1..=pages).map(|n| json!({
            "page_number": n,
            "text_zh": format!("第{n}页，小云飘过山丘。"),
            "notes_zh": "",
        })).collect::<Vec<_>>(),
    })
    .to_string()
}

pub fn vocabulary_payload(entries: usize) -> String {
    json!({
        "entries": (0..entries).map(|n| json!({
            "word": format!("cloud{n}"),
            "part_of_speech": "noun",
            "definition_en": "a soft white shape in the sky",
            "definition_zh": "天空中柔软的白色形状",
            "example_sentence": "The cloud drifted by.",
            "example_translation": "云飘过。",
            "cefr_level": "A1",
        })).collect::<Vec<_>>(),
    })
    .to_string()
}

/// Wrap the three text stages as a scripted transport in call order.
pub fn happy_text_pipeline() -> Vec<PipelineResult<ChatCompletionResponse>> {
    vec![
        Ok(chat_response(&story_payload(10), 900)),
        Ok(chat_response(&translation_payload(10), 700)),
        Ok(chat_response(&vocabulary_payload(10), 500)),
    ]
}
