//! JSON extraction from free-form model output.
//!
//! Planner and script-writing backends answer with JSON that is often wrapped
//! in prose or markdown fences. Extraction tries, in order:
//! 1. The whole trimmed text
//! 2. A ```` ```json ```` fenced block
//! 3. Any other fenced block
//! 4. The first balanced object or array found anywhere in the text
//!
//! # Example
//!
//! ```
//! use reelforge::utils::json_extraction::extract_json;
//!
//! let reply = "Here are the scenes:\n```json\n[{\"text\": \"Intro\"}]\n```";
//! let value = extract_json(reply).unwrap();
//! assert!(value.is_array());
//! ```

use regex::Regex;
use serde_json::Value;
use thiserror::Error;

/// Error type for JSON extraction failures.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum JsonExtractionError {
    #[error("JSON appears truncated: {unclosed} unclosed delimiters. Partial: {partial_preview}...")]
    Truncated {
        partial_preview: String,
        unclosed: usize,
    },
    #[error("No JSON content found in response. Content starts with: '{content_preview}'")]
    NotFound { content_preview: String },
}

const PREVIEW_CHARS: usize = 80;

fn preview(content: &str) -> String {
    content.chars().take(PREVIEW_CHARS).collect()
}

/// Extracts and parses the first JSON value found in `content`.
pub fn extract_json(content: &str) -> Result<Value, JsonExtractionError> {
    let trimmed = content.trim();

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return Ok(value);
    }

    let candidates = [
        extract_fenced_block(trimmed, true),
        extract_fenced_block(trimmed, false),
        extract_balanced(trimmed),
    ];
    for candidate in candidates.into_iter().flatten() {
        if let Ok(value) = serde_json::from_str::<Value>(&candidate) {
            return Ok(value);
        }
    }

    let unclosed = count_unclosed(trimmed);
    if unclosed > 0 {
        let start = trimmed.find(['{', '[']).unwrap_or(0);
        return Err(JsonExtractionError::Truncated {
            partial_preview: preview(&trimmed[start..]),
            unclosed,
        });
    }

    Err(JsonExtractionError::NotFound {
        content_preview: preview(trimmed),
    })
}

/// Returns the body of the first fenced code block. With `json_only` set,
/// only blocks tagged `json` qualify.
pub fn extract_fenced_block(content: &str, json_only: bool) -> Option<String> {
    let pattern = if json_only {
        r"```json\s*\n?([\s\S]*?)\n?```"
    } else {
        r"```(?:\w+)?\s*\n?([\s\S]*?)\n?```"
    };
    let re = Regex::new(pattern).ok()?;
    let body = re.captures(content)?.get(1)?.as_str().trim();
    if body.is_empty() {
        return None;
    }
    extract_balanced(body).or_else(|| Some(body.to_string()))
}

/// Returns the first balanced `{...}` or `[...]` span in `content`.
pub fn extract_balanced(content: &str) -> Option<String> {
    let start = content.find(['{', '['])?;
    let end = find_matching_delimiter(&content[start..])?;
    Some(content[start..=start + end].to_string())
}

/// Finds the byte offset of the delimiter closing the one at position 0.
///
/// String literals (with escapes) are skipped so braces inside them do not count.
pub fn find_matching_delimiter(content: &str) -> Option<usize> {
    let (open, close) = match content.chars().next()? {
        '{' => ('{', '}'),
        '[' => ('[', ']'),
        _ => return None,
    };

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in content.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            c if c == open && !in_string => depth += 1,
            c if c == close && !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }

    None
}

/// Counts delimiters opened but never closed, ignoring string contents.
fn count_unclosed(content: &str) -> usize {
    let mut stack: Vec<char> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for c in content.chars() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            '{' | '[' if !in_string => stack.push(c),
            '}' if !in_string && stack.last() == Some(&'{') => {
                stack.pop();
            }
            ']' if !in_string && stack.last() == Some(&'[') => {
                stack.pop();
            }
            _ => {}
        }
    }

    stack.len()
}
