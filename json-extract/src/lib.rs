//! Recovers a JSON object from free-form model output.
//!
//! Models wrap JSON in markdown fences, prefix it with prose, or trail it with
//! commentary. [`extract_object`] tries progressively looser strategies and
//! returns the first candidate that parses as an object.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::debug;

pub type JsonObject = Map<String, Value>;

/// Extracts the first parseable JSON object from `text`.
///
/// Strategies, in order:
/// 1. the whole text with markdown fences removed;
/// 2. the greedy span from the first `{` to the last `}`;
/// 3. each brace-balanced span, scanning left to right, ignoring braces inside strings.
pub fn extract_object(text: &str) -> Option<JsonObject> {
    let cleaned = strip_fences(text);
    let trimmed = cleaned.trim();

    if let Some(object) = parse_object(trimmed) {
        return Some(object);
    }

    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) {
        if start < end {
            if let Some(object) = trimmed.get(start..=end).and_then(parse_object) {
                return Some(object);
            }
        }
    }

    let found = balanced_spans(trimmed).find_map(parse_object);
    if found.is_none() {
        debug!(chars = text.len(), "no JSON object found in model output");
    }
    found
}

/// [`extract_object`] with an empty object as the failure sentinel.
pub fn object_or_empty(text: &str) -> JsonObject {
    extract_object(text).unwrap_or_default()
}

/// Extracts an object and deserializes it into `T`.
pub fn parse_as<T: DeserializeOwned>(text: &str) -> Option<T> {
    let object = extract_object(text)?;
    match serde_json::from_value(Value::Object(object)) {
        Ok(value) => Some(value),
        Err(err) => {
            debug!(error = %err, "extracted object did not match expected shape");
            None
        }
    }
}

fn parse_object(candidate: &str) -> Option<JsonObject> {
    match serde_json::from_str::<Value>(candidate) {
        Ok(Value::Object(object)) => Some(object),
        _ => None,
    }
}

/// Drops ```` ``` ```` fence lines (with or without a language tag), keeping their contents.
fn strip_fences(text: &str) -> String {
    if !text.contains("```") {
        return text.to_owned();
    }

    text.lines()
        .map(|line| {
            let trimmed = line.trim_start();
            if let Some(rest) = trimmed.strip_prefix("```") {
                // inline fence around the whole payload: ```json {...}```
                rest.trim_start_matches(|c: char| c.is_ascii_alphabetic())
                    .trim_end_matches("```")
            } else {
                line.trim_end_matches("```")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Yields every top-level `{...}` span whose braces balance outside of string literals.
fn balanced_spans(text: &str) -> impl Iterator<Item = &str> {
    let mut spans = Vec::new();
    let mut depth = 0_usize;
    let mut start = None;
    let mut in_string = false;
    let mut escaped = false;

    for (idx, c) in text.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match c {
            '"' if depth > 0 => in_string = true,
            '{' => {
                if depth == 0 {
                    start = Some(idx);
                }
                depth = depth.saturating_add(1);
            }
            '}' if depth > 0 => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    if let Some(span) = start.take().and_then(|s| text.get(s..=idx)) {
                        spans.push(span);
                    }
                }
            }
            _ => {}
        }
    }

    spans.into_iter()
}
