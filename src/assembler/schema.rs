//! Strict stage validation over decoded payloads.
//!
//! The canonical internal records are camelCase; the snake_case keys the
//! prompts mandate are accepted here, at the boundary, and never leak
//! further in.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::decode::decode_payload;
use crate::errors::{PipelineError, PipelineResult};

/// Pages per story; fixed by the product format.
pub const PAGES_PER_STORY: usize = 10;
/// Vocabulary entries per story.
pub const VOCAB_PER_STORY: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoryDraft {
    #[serde(alias = "title_en")]
    pub title_en: String,
    #[serde(alias = "synopsis_en")]
    pub synopsis_en: String,
    pub pages: Vec<StoryPageDraft>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoryPageDraft {
    #[serde(alias = "page_number")]
    pub page_number: i32,
    #[serde(alias = "text_en")]
    pub text_en: String,
    #[serde(default, alias = "summary_en")]
    pub summary_en: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslationDraft {
    #[serde(alias = "title_zh")]
    pub title_zh: String,
    #[serde(default, alias = "synopsis_zh")]
    pub synopsis_zh: String,
    pub pages: Vec<TranslationPageDraft>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslationPageDraft {
    #[serde(alias = "page_number")]
    pub page_number: i32,
    #[serde(alias = "text_zh")]
    pub text_zh: String,
    #[serde(default, alias = "notes_zh")]
    pub notes_zh: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VocabularyDraft {
    pub entries: Vec<VocabEntryDraft>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VocabEntryDraft {
    pub word: String,
    #[serde(alias = "part_of_speech")]
    pub part_of_speech: String,
    #[serde(alias = "definition_en")]
    pub definition_en: String,
    #[serde(alias = "definition_zh")]
    pub definition_zh: String,
    #[serde(alias = "example_sentence")]
    pub example_sentence: String,
    #[serde(alias = "example_translation")]
    pub example_translation: String,
    #[serde(default, alias = "cefr_level")]
    pub cefr_level: Option<String>,
}

/// Reject the prompt's declared escape hatch before shape checks.
fn reject_error_payload(value: &Value) -> PipelineResult<()> {
    if let Some(err) = value.get("error").and_then(Value::as_str) {
        return Err(PipelineError::Validation(format!(
            "model declined to produce output: {err}"
        )));
    }
    Ok(())
}

/// Assemble and validate the story stage payload.
pub fn assemble_story(data: &Value) -> PipelineResult<StoryDraft> {
    let value = decode_payload(data)?;
    reject_error_payload(&value)?;

    let draft: StoryDraft = serde_json::from_value(value)
        .map_err(|e| PipelineError::Validation(format!("story payload shape: {e}")))?;

    if draft.pages.len() != PAGES_PER_STORY {
        return Err(PipelineError::Validation(format!(
            "story must have exactly {PAGES_PER_STORY} pages, got {}",
            draft.pages.len()
        )));
    }

    let mut seen = [false; PAGES_PER_STORY];
    for page in &draft.pages {
        let number = page.page_number;
        if !(1..=PAGES_PER_STORY as i32).contains(&number) {
            return Err(PipelineError::Validation(format!(
                "page_number {number} outside 1..={PAGES_PER_STORY}"
            )));
        }
        let slot = &mut seen[(number - 1) as usize];
        if *slot {
            return Err(PipelineError::Validation(format!(
                "duplicate page_number {number}"
            )));
        }
        *slot = true;
    }

    Ok(draft)
}

/// Assemble and validate the translation stage payload. Length is not
/// enforced here, but every provided page must carry text.
pub fn assemble_translation(data: &Value) -> PipelineResult<TranslationDraft> {
    let value = decode_payload(data)?;
    reject_error_payload(&value)?;

    let draft: TranslationDraft = serde_json::from_value(value)
        .map_err(|e| PipelineError::Validation(format!("translation payload shape: {e}")))?;

    for page in &draft.pages {
        if page.text_zh.trim().is_empty() {
            return Err(PipelineError::Validation(format!(
                "empty text_zh for page {}",
                page.page_number
            )));
        }
    }

    Ok(draft)
}

/// Assemble and validate the vocabulary stage payload.
pub fn assemble_vocabulary(data: &Value) -> PipelineResult<VocabularyDraft> {
    let value = decode_payload(data)?;
    reject_error_payload(&value)?;

    let draft: VocabularyDraft = serde_json::from_value(value)
        .map_err(|e| PipelineError::Validation(format!("vocabulary payload shape: {e}")))?;

    if draft.entries.len() != VOCAB_PER_STORY {
        return Err(PipelineError::Validation(format!(
            "vocabulary must have exactly {VOCAB_PER_STORY} entries, got {}",
            draft.entries.len()
        )));
    }

    Ok(draft)
}
