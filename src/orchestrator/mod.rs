//! Sequencer for the three text stages of a story request.
//!
//! Script, then translation, then vocabulary; each stage's tokens are
//! collected and every stage failure is surfaced to the failure recorder
//! before being re-raised for the worker's retry policy. The orchestrator
//! never touches the database; all writes belong to the persistence
//! coordinator.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::assembler::{
    assemble_story, assemble_translation, assemble_vocabulary, StoryDraft, TranslationDraft,
    VocabularyDraft,
};
use crate::errors::PipelineResult;
use crate::failure::{FailureContext, FailureRecorder};
use crate::genai::{ChatClient, ChatParams, TokenUsage};
use crate::prompts;

const STORY_TEMPERATURE: f32 = 0.8;
const TRANSLATION_TEMPERATURE: f32 = 0.2;
const VOCABULARY_TEMPERATURE: f32 = 0.2;

/// Inbound request payload for a `story_script` job.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoryRequest {
    pub story_id: String,
    pub theme: String,
    #[serde(default)]
    pub tone: Option<String>,
    #[serde(default)]
    pub age_range: Option<String>,
}

/// Token usage per text stage.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct StageUsages {
    pub story: TokenUsage,
    pub translation: TokenUsage,
    pub vocabulary: TokenUsage,
}

#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub story: StoryDraft,
    pub translation: TranslationDraft,
    pub vocabulary: VocabularyDraft,
    pub usages: StageUsages,
}

pub struct StoryOrchestrator {
    chat: Arc<ChatClient>,
    recorder: Arc<FailureRecorder>,
}

impl StoryOrchestrator {
    pub fn new(chat: Arc<ChatClient>, recorder: Arc<FailureRecorder>) -> Self {
        Self { chat, recorder }
    }

    /// Run the full text pipeline. `attempt` is the worker's attempt
    /// counter, carried into failure context for post-mortems.
    pub async fn run(&self, request: &StoryRequest, attempt: u32) -> PipelineResult<PipelineOutput> {
        let mut usages = StageUsages::default();

        info!(story_id = %request.story_id, theme = %request.theme, "starting text pipeline");

        let story = {
            let messages = prompts::story_prompt(
                &request.theme,
                request.tone.as_deref(),
                request.age_range.as_deref(),
            );
            let outcome = self
                .stage_guard(request, attempt, "story", async {
                    self.chat
                        .create_chat_completion(ChatParams {
                            messages,
                            temperature: STORY_TEMPERATURE,
                            max_tokens: None,
                        })
                        .await
                })
                .await?;
            usages.story = outcome.usage;
            self.stage_guard(request, attempt, "story", async {
                assemble_story(&outcome.data)
            })
            .await?
        };

        let translation = {
            let messages = prompts::translation_prompt(&story);
            let outcome = self
                .stage_guard(request, attempt, "translation", async {
                    self.chat
                        .create_chat_completion(ChatParams {
                            messages,
                            temperature: TRANSLATION_TEMPERATURE,
                            max_tokens: None,
                        })
                        .await
                })
                .await?;
            usages.translation = outcome.usage;
            self.stage_guard(request, attempt, "translation", async {
                assemble_translation(&outcome.data)
            })
            .await?
        };

        let vocabulary = {
            let messages = prompts::vocabulary_prompt(&story, &translation);
            let outcome = self
                .stage_guard(request, attempt, "vocabulary", async {
                    self.chat
                        .create_chat_completion(ChatParams {
                            messages,
                            temperature: VOCABULARY_TEMPERATURE,
                            max_tokens: None,
                        })
                        .await
                })
                .await?;
            usages.vocabulary = outcome.usage;
            self.stage_guard(request, attempt, "vocabulary", async {
                assemble_vocabulary(&outcome.data)
            })
            .await?
        };

        info!(
            story_id = %request.story_id,
            story_tokens = usages.story.total_tokens,
            translation_tokens = usages.translation.total_tokens,
            vocabulary_tokens = usages.vocabulary.total_tokens,
            "text pipeline finished"
        );

        Ok(PipelineOutput {
            story,
            translation,
            vocabulary,
            usages,
        })
    }

    /// Record a stage failure with its context, then re-raise unchanged so
    /// the worker's retry policy decides what happens next.
    async fn stage_guard<T>(
        &self,
        request: &StoryRequest,
        attempt: u32,
        stage: &str,
        fut: impl std::future::Future<Output = PipelineResult<T>>,
    ) -> PipelineResult<T> {
        match fut.await {
            Ok(value) => Ok(value),
            Err(err) => {
                let context = FailureContext::new(stage)
                    .with_attempt(attempt)
                    .with_extras(serde_json::json!({ "storyId": request.story_id }));
                if let Err(record_err) = self.recorder.record_failure(context, &err).await {
                    warn!(error = %record_err, "could not record stage failure");
                }
                Err(err)
            }
        }
    }
}
