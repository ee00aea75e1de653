//! Single writer for story results.
//!
//! One transaction commits the story, its pages, its vocabulary, and the
//! pending media jobs; only after the commit are job references pushed to
//! the queue. A push failure is recorded but never rolls back database
//! work, since persisted pending jobs can be re-enqueued later.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use crate::assembler::{StoryDraft, TranslationDraft, VocabularyDraft};
use crate::database::entities::generation_jobs::JobType;
use crate::errors::PipelineResult;
use crate::failure::{FailureContext, FailureRecorder};
use crate::queue::JobQueue;
use crate::store::{JobStore, MediaJobSeed, NewStory, NewStoryPage, NewVocabEntry};

pub struct PersistenceCoordinator {
    store: JobStore,
    queue: Arc<dyn JobQueue>,
    recorder: Arc<FailureRecorder>,
    skip_persistence: bool,
}

impl PersistenceCoordinator {
    pub fn new(
        store: JobStore,
        queue: Arc<dyn JobQueue>,
        recorder: Arc<FailureRecorder>,
        skip_persistence: bool,
    ) -> Self {
        Self {
            store,
            queue,
            recorder,
            skip_persistence,
        }
    }

    /// Commit one story's text results and mint its media jobs. Returns
    /// the created media job ids in page order, image before audio.
    pub async fn persist(
        &self,
        story_ref: &str,
        theme: &str,
        age_range: Option<&str>,
        story: &StoryDraft,
        translation: &TranslationDraft,
        vocab: &VocabularyDraft,
    ) -> PipelineResult<Vec<String>> {
        if self.skip_persistence {
            let synthetic = synthetic_job_ids(story_ref, story);
            info!(
                story_ref = %story_ref,
                count = synthetic.len(),
                "persistence skipped, returning synthetic job ids"
            );
            return Ok(synthetic);
        }

        let (story_id, original_ref) = canonical_story_id(story_ref);

        let mut metadata = serde_json::json!({
            "synopsisEn": story.synopsis_en,
            "synopsisZh": translation.synopsis_zh,
        });
        if let Some(original) = original_ref {
            metadata["originalStoryId"] = serde_json::Value::String(original);
        }

        let title_zh = if translation.title_zh.trim().is_empty() {
            Some(story.title_en.clone())
        } else {
            Some(translation.title_zh.clone())
        };

        let new_story = NewStory {
            id: story_id.clone(),
            title_en: story.title_en.clone(),
            title_zh,
            theme: theme.to_string(),
            age_range: age_range.map(str::to_string),
            metadata,
        };

        let translated_by_number: HashMap<i32, &str> = translation
            .pages
            .iter()
            .map(|page| (page.page_number, page.text_zh.as_str()))
            .collect();

        let mut pages = Vec::with_capacity(story.pages.len());
        let mut media_seeds = Vec::with_capacity(story.pages.len() * 2);

        for page in &story.pages {
            let text_zh = translated_by_number
                .get(&page.page_number)
                .map(|text| text.to_string());

            pages.push(NewStoryPage {
                page_number: page.page_number,
                text_en: page.text_en.clone(),
                text_zh: text_zh.clone(),
                word_count: page.text_en.split_whitespace().count() as i32,
            });

            media_seeds.push(MediaJobSeed {
                job_type: JobType::Image,
                payload: serde_json::json!({
                    "pageNumber": page.page_number,
                    "textEn": page.text_en,
                }),
            });
            media_seeds.push(MediaJobSeed {
                job_type: JobType::Audio,
                payload: serde_json::json!({
                    "pageNumber": page.page_number,
                    "textEn": page.text_en,
                    "textZh": text_zh,
                }),
            });
        }

        let vocab_rows: Vec<NewVocabEntry> = vocab
            .entries
            .iter()
            .map(|entry| NewVocabEntry {
                word: entry.word.clone(),
                part_of_speech: entry.part_of_speech.clone(),
                definition_en: entry.definition_en.clone(),
                definition_zh: entry.definition_zh.clone(),
                example_sentence: entry.example_sentence.clone(),
                example_translation: entry.example_translation.clone(),
                cefr_level: entry.cefr_level.clone(),
            })
            .collect();

        let job_ids = match self
            .store
            .persist_story_bundle(new_story, pages, vocab_rows, media_seeds)
            .await
        {
            Ok(ids) => ids,
            Err(err) => {
                let context = FailureContext::new("persistence")
                    .with_extras(serde_json::json!({ "storyId": story_id }));
                if let Err(record_err) = self.recorder.record_failure(context, &err).await {
                    warn!(error = %record_err, "could not record persistence failure");
                }
                return Err(err);
            }
        };

        // The bundle is committed; a push failure leaves jobs pending for
        // an operator or the reconciler to re-enqueue.
        if let Err(err) = self.queue.push_many(&job_ids).await {
            let context = FailureContext::new("upstash_push").with_extras(serde_json::json!({
                "storyId": story_id,
                "pushedJobCount": job_ids.len(),
            }));
            if let Err(record_err) = self.recorder.record_failure(context, &err).await {
                warn!(error = %record_err, "could not record push failure");
            }
        }

        Ok(job_ids)
    }
}

/// Use the caller's ref when it is a UUID; otherwise mint one and report
/// the original alongside so it can be stored in metadata.
fn canonical_story_id(story_ref: &str) -> (String, Option<String>) {
    match Uuid::parse_str(story_ref) {
        Ok(parsed) => (parsed.to_string(), None),
        Err(_) => (
            Uuid::new_v4().to_string(),
            Some(story_ref.to_string()),
        ),
    }
}

/// Deterministic ids for the development short-circuit: page order, image
/// before audio.
fn synthetic_job_ids(story_ref: &str, story: &StoryDraft) -> Vec<String> {
    let mut ids = Vec::with_capacity(story.pages.len() * 2);
    for page in &story.pages {
        ids.push(format!("{story_ref}-image-{}", page.page_number));
        ids.push(format!("{story_ref}-audio-{}", page.page_number));
    }
    ids
}
