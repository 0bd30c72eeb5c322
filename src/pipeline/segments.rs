//! Segment count math and normalization of script payloads.
//!
//! The planner proposes a target duration and a segment count; both are
//! advisory. The duration is clamped into the job's bounds and the count is
//! recomputed from it. Script payloads come back in whatever shape the model
//! chose and are normalized into an ordered list of [`SegmentContent`].

use serde_json::{Map, Value};

use crate::error::ProviderError;
use crate::jobs::{Plan, SegmentContent};
use crate::utils::json_extraction::extract_json;

/// Object keys that wrap the segment list.
const WRAPPER_KEYS: [&str; 5] = ["segments", "items", "data", "results", "scenes"];

const TEXT_KEYS: [&str; 5] = ["text", "narration", "commentary", "script", "content"];

const PROMPT_KEYS: [&str; 5] = ["imagePrompt", "image_prompt", "visual", "prompt", "image"];

/// `clamp(round(target / seconds_per_segment), 1, max_segments)`.
pub fn segment_count(target_seconds: f64, seconds_per_segment: f64, max_segments: u32) -> u32 {
    let max_segments = max_segments.max(1);
    if !(target_seconds.is_finite() && seconds_per_segment > 0.0) {
        return 1;
    }
    let raw = (target_seconds / seconds_per_segment).round();
    if raw < 1.0 {
        1
    } else if raw >= max_segments as f64 {
        max_segments
    } else {
        raw as u32
    }
}

/// Clamps the proposed duration into `[min, max]` and overrides the
/// proposed segment count with the computed one.
pub fn reconcile_plan(
    mut plan: Plan,
    min_seconds: u32,
    max_seconds: u32,
    seconds_per_segment: f64,
    max_segments: u32,
) -> Plan {
    let (lo, hi) = (min_seconds as f64, max_seconds.max(min_seconds) as f64);
    let target = if plan.target_duration_seconds.is_finite() {
        plan.target_duration_seconds.clamp(lo, hi)
    } else {
        hi
    };
    plan.target_duration_seconds = target;
    plan.segment_count = segment_count(target, seconds_per_segment, max_segments);
    plan
}

/// Normalizes a raw script payload into exactly `expected` segments.
///
/// Accepted shapes: an array, an object wrapping the array under one of the
/// known keys, an object keyed by numbers (`{"1": .., "2": ..}`), or a
/// string containing any of these (fenced code blocks included). Elements
/// may be objects or plain strings.
pub fn normalize_segments(
    payload: Value,
    expected: u32,
) -> Result<Vec<SegmentContent>, ProviderError> {
    let items = unwrap_items(payload, 0)?;

    let segments = items
        .into_iter()
        .enumerate()
        .map(|(i, item)| to_segment(i as u32, item))
        .collect::<Result<Vec<_>, _>>()?;

    if segments.len() != expected as usize {
        return Err(ProviderError::Malformed(format!(
            "expected {} segments, got {}",
            expected,
            segments.len()
        )));
    }

    Ok(segments)
}

const MAX_UNWRAP_DEPTH: usize = 4;

fn unwrap_items(payload: Value, depth: usize) -> Result<Vec<Value>, ProviderError> {
    if depth > MAX_UNWRAP_DEPTH {
        return Err(ProviderError::Malformed(
            "segment payload is nested too deeply".to_string(),
        ));
    }

    match payload {
        Value::Array(items) => Ok(items),
        Value::String(text) => {
            let parsed = extract_json(&text)
                .map_err(|e| ProviderError::Malformed(format!("segment payload: {}", e)))?;
            unwrap_items(parsed, depth + 1)
        }
        Value::Object(mut map) => {
            if let Some(key) = WRAPPER_KEYS.iter().find(|k| map.contains_key(**k)) {
                let inner = map.remove(*key).unwrap_or(Value::Null);
                return unwrap_items(inner, depth + 1);
            }
            numbered_values(map).ok_or_else(|| {
                ProviderError::Malformed(
                    "segment payload object has no segment list".to_string(),
                )
            })
        }
        other => Err(ProviderError::Malformed(format!(
            "unexpected segment payload type: {}",
            type_name(&other)
        ))),
    }
}

/// `{"1": a, "2": b}` or `{"0": a, ...}` to `[a, b, ...]` in numeric order.
fn numbered_values(map: Map<String, Value>) -> Option<Vec<Value>> {
    if map.is_empty() {
        return None;
    }
    let mut numbered = map
        .into_iter()
        .map(|(k, v)| k.trim().parse::<u64>().ok().map(|n| (n, v)))
        .collect::<Option<Vec<_>>>()?;
    numbered.sort_by_key(|(n, _)| *n);
    Some(numbered.into_iter().map(|(_, v)| v).collect())
}

fn to_segment(index: u32, item: Value) -> Result<SegmentContent, ProviderError> {
    match item {
        Value::String(text) if !text.trim().is_empty() => Ok(SegmentContent {
            index,
            image_prompt: text.trim().to_string(),
            text: text.trim().to_string(),
        }),
        Value::Object(map) => {
            let text = first_string(&map, &TEXT_KEYS).ok_or_else(|| {
                ProviderError::Malformed(format!("segment {} has no text", index))
            })?;
            let image_prompt = first_string(&map, &PROMPT_KEYS).unwrap_or_else(|| text.clone());
            Ok(SegmentContent {
                index,
                text,
                image_prompt,
            })
        }
        other => Err(ProviderError::Malformed(format!(
            "segment {} is {}",
            index,
            type_name(&other)
        ))),
    }
}

fn first_string(map: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|k| map.get(*k))
        .filter_map(Value::as_str)
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "an empty string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
