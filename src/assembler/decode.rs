//! Tolerant JSON decoder for model output.
//!
//! The repair set is deliberately explicit and closed: strip Markdown
//! fences, scan for a balanced object starting at the first `{` (dropping
//! trailing commas), and as a last resort wrap a top-level array as
//! `{"entries": [...]}`. Anything beyond that is a validation failure.

use serde_json::Value;

use crate::errors::{PipelineError, PipelineResult};

/// Normalize a raw adapter payload into a structured JSON value.
pub fn decode_payload(data: &Value) -> PipelineResult<Value> {
    if !data.is_string() {
        return Ok(wrap_if_array(data.clone()));
    }

    let raw = data.as_str().unwrap_or_default();
    let stripped = strip_fences(raw);

    if let Ok(value) = serde_json::from_str::<Value>(stripped) {
        return Ok(wrap_if_array(value));
    }

    if let Some(value) = scan_balanced_object(stripped) {
        return Ok(value);
    }

    if let Some(value) = wrap_top_level_array(stripped) {
        return Ok(value);
    }

    Err(PipelineError::Validation(format!(
        "payload is not decodable JSON: {:?}",
        stripped.chars().take(120).collect::<String>()
    )))
}

/// A bare top-level array is the entries shape without its wrapper.
fn wrap_if_array(value: Value) -> Value {
    if value.is_array() {
        serde_json::json!({ "entries": value })
    } else {
        value
    }
}

/// Drop a leading ``` or ```json fence line and its closing fence.
fn strip_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };

    // Skip an optional language tag up to the first newline.
    let body = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => rest,
    };

    body.trim_end()
        .strip_suffix("```")
        .map(str::trim)
        .unwrap_or_else(|| body.trim())
}

/// All positions where a `{` opened at `start` closes with depth zero,
/// ignoring braces inside string literals.
fn balanced_spans(text: &str, open: char, close: char) -> Vec<(usize, usize)> {
    let start = match text.find(open) {
        Some(idx) => idx,
        None => return Vec::new(),
    };

    let mut spans = Vec::new();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (idx, ch) in text.char_indices().skip_while(|(i, _)| *i < start) {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }

        if ch == '"' {
            in_string = true;
        } else if ch == open {
            depth += 1;
        } else if ch == close {
            depth = depth.saturating_sub(1);
            if depth == 0 {
                spans.push((start, idx + ch.len_utf8()));
            }
        }
    }

    spans
}

/// Remove commas that directly precede a closing brace or bracket,
/// preserving string contents.
fn strip_trailing_commas(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escaped = false;

    for ch in text.chars() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            out.push(ch);
            continue;
        }

        match ch {
            '"' => {
                in_string = true;
                out.push(ch);
            }
            '}' | ']' => {
                // Drop a dangling comma (plus whitespace) before the closer.
                while out
                    .trim_end()
                    .ends_with(',')
                {
                    let trimmed_len = out.trim_end().len();
                    out.truncate(trimmed_len - 1);
                }
                out.push(ch);
            }
            _ => out.push(ch),
        }
    }

    out
}

/// Try each balanced `{…}` candidate, longest first, with the trailing
/// comma fix applied; accept the first successful parse.
fn scan_balanced_object(text: &str) -> Option<Value> {
    let mut spans = balanced_spans(text, '{', '}');
    spans.reverse();

    for (start, end) in spans {
        let candidate = strip_trailing_commas(&text[start..end]);
        if let Ok(value) = serde_json::from_str::<Value>(&candidate) {
            return Some(value);
        }
    }

    None
}

/// Absorb models that emit only the entries array: parse a top-level
/// `[…]` substring and wrap it in an object.
fn wrap_top_level_array(text: &str) -> Option<Value> {
    let mut spans = balanced_spans(text, '[', ']');
    spans.reverse();

    for (start, end) in spans {
        let candidate = strip_trailing_commas(&text[start..end]);
        if let Ok(value) = serde_json::from_str::<Value>(&candidate) {
            return Some(serde_json::json!({ "entries": value }));
        }
    }

    None
}
