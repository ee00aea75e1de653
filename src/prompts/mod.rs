//! Stage-specific prompt builders.
//!
//! Each builder returns an ordered {system, user} message pair. System
//! prompts pin the output to exactly one single-line JSON object with the
//! stage's exact keys, and keep content age-appropriate for ages 0 to 6.

use crate::assembler::{StoryDraft, TranslationDraft};
use crate::genai::ChatMessage;

const JSON_RULES: &str = "Output exactly one JSON object and nothing else. \
The object must be valid, parseable JSON on a single line with newlines escaped as \\n. \
Do not wrap the object in Markdown fences or add commentary. \
If you cannot comply, output {\"error\":\"unable_to_produce_json\"} and nothing else.";

const CONTENT_RULES: &str = "The content is for children aged 0 to 6: warm, simple, \
age-appropriate, never violent, frightening, or adult.";

/// Prompt for the English story script stage.
pub fn story_prompt(theme: &str, tone: Option<&str>, age_range: Option<&str>) -> Vec<ChatMessage> {
    let system = format!(
        "You are a children's picture-book author writing a ten-page bedtime story. \
{CONTENT_RULES} {JSON_RULES} \
The JSON object must have exactly these keys: \
\"title_en\" (string), \"synopsis_en\" (string), and \"pages\" (array of exactly 10 objects, \
each with \"page_number\" (integer 1 to 10), \"text_en\" (2-3 short sentences), and \
\"summary_en\" (one sentence describing the scene for an illustrator))."
    );

    let mut user = format!("Write a ten-page story about: {theme}.");
    if let Some(tone) = tone {
        user.push_str(&format!(" The tone should be {tone}."));
    }
    if let Some(age_range) = age_range {
        user.push_str(&format!(" The audience is children aged {age_range}."));
    }

    vec![ChatMessage::system(system), ChatMessage::user(user)]
}

/// Prompt for the Chinese translation stage, keyed to the source pages.
pub fn translation_prompt(story: &StoryDraft) -> Vec<ChatMessage> {
    let system = format!(
        "You are a professional translator localizing a children's story into \
Simplified Chinese for ages 0 to 6. Keep the translation natural and simple. {JSON_RULES} \
The JSON object must have exactly these keys: \
\"title_zh\" (string), \"synopsis_zh\" (string), and \"pages\" (array with one entry per \
source page, each with \"page_number\" (matching the source page), \"text_zh\" (the \
translation), and \"notes_zh\" (a short translation note, may be an empty string))."
    );

    let source = serde_json::json!({
        "title_en": story.title_en,
        "synopsis_en": story.synopsis_en,
        "pages": story.pages.iter().map(|p| serde_json::json!({
            "page_number": p.page_number,
            "text_en": p.text_en,
        })).collect::<Vec<_>>(),
    });

    let user = format!("Translate this story:\n{source}");

    vec![ChatMessage::system(system), ChatMessage::user(user)]
}

/// Prompt for the vocabulary extraction stage, fed by the translation.
pub fn vocabulary_prompt(story: &StoryDraft, translation: &TranslationDraft) -> Vec<ChatMessage> {
    let system = format!(
        "You are a language teacher picking vocabulary from a bilingual children's story. \
Choose words a young learner should practice. {JSON_RULES} \
The JSON object must have exactly this key: \"entries\" (array of exactly 10 objects, each \
with \"word\" (the English headword), \"part_of_speech\", \"definition_en\", \
\"definition_zh\", \"example_sentence\" (English, from or inspired by the story), \
\"example_translation\" (its Chinese translation), and \"cefr_level\" \
(one of A1, A2, B1, B2, C1, C2))."
    );

    let pages: Vec<serde_json::Value> = story
        .pages
        .iter()
        .zip(translation.pages.iter())
        .map(|(en, zh)| {
            serde_json::json!({
                "page_number": en.page_number,
                "text_en": en.text_en,
                "text_zh": zh.text_zh,
            })
        })
        .collect();

    let user = format!(
        "Extract exactly 10 vocabulary entries from this story:\n{}",
        serde_json::json!({ "pages": pages })
    );

    vec![ChatMessage::system(system), ChatMessage::user(user)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembler::{StoryPageDraft, TranslationPageDraft};

    fn draft() -> StoryDraft {
        StoryDraft {
            title_en: "The Friendly Cloud".into(),
            synopsis_en: "A cloud makes friends.".into(),
            pages: vec![StoryPageDraft {
                page_number: 1,
                text_en: "A little cloud floated by.".into(),
                summary_en: "A cloud over a meadow.".into(),
            }],
        }
    }

    #[test]
    fn story_prompt_is_system_then_user() {
        let messages = story_prompt("a friendly dragon", Some("warm"), Some("0-6"));
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, "system");
        assert_eq!(messages[1].role, "user");
        assert!(messages[0].content.contains("unable_to_produce_json"));
        assert!(messages[0].content.contains("title_en"));
        assert!(messages[1].content.contains("a friendly dragon"));
        assert!(messages[1].content.contains("warm"));
    }

    #[test]
    fn translation_prompt_carries_source_pages() {
        let messages = translation_prompt(&draft());
        assert!(messages[0].content.contains("title_zh"));
        assert!(messages[1].content.contains("A little cloud floated by."));
    }

    #[test]
    fn vocabulary_prompt_pairs_both_languages() {
        let translation = TranslationDraft {
            title_zh: "友好的云".into(),
            synopsis_zh: "云交朋友。".into(),
            pages: vec![TranslationPageDraft {
                page_number: 1,
                text_zh: "一朵小云飘过。".into(),
                notes_zh: None,
            }],
        };
        let messages = vocabulary_prompt(&draft(), &translation);
        assert!(messages[0].content.contains("cefr_level"));
        assert!(messages[1].content.contains("一朵小云飘过。"));
    }
}
