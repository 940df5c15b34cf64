use serde_json::{Map, Value};
use tracing::debug;

use crate::error::Result;

/// Minimum length of a generic `image` string before it is taken as an
/// inline visualization. Shorter strings are usually ids, URLs or labels.
pub const MIN_INLINE_IMAGE_LEN: usize = 500;

/// Keys that may hold large encoded pixel data and are never descended
/// into while looking for detections.
const DETECTION_SKIP_KEYS: [&str; 2] = ["visualization", "image"];

/// Keys skipped during the generic visualization descent; they were
/// already inspected at the current node.
const VISUALIZATION_SKIP_KEYS: [&str; 3] = ["visualization", "image", "predictions"];

/// Fields whose presence on the first element marks an array as a list of
/// detection records.
const DETECTION_MARKERS: [&str; 4] = ["x", "confidence", "box_2d", "box"];

/// Parse a raw response body into an order-preserving JSON tree.
pub fn parse_response(body: &str) -> Result<Value> {
    let tree: Value = serde_json::from_str(body)?;
    debug!("Parsed detection response ({} bytes)", body.len());
    Ok(tree)
}

/// Find the detection-record sequence inside an arbitrary response tree.
///
/// Returns `None` when nothing matches or when the search runs into an
/// `error` marker. The returned slice borrows from `tree` and keeps the
/// backend's ordering.
pub fn extract_detections(tree: &Value) -> Option<&[Value]> {
    match tree {
        Value::Array(items) => detections_in_array(items),
        Value::Object(map) => detections_in_object(map),
        _ => None,
    }
}

/// [`extract_detections`], with "not found" collapsed to an empty slice.
pub fn detections_or_empty(tree: &Value) -> &[Value] {
    extract_detections(tree).unwrap_or(&[])
}

fn detections_in_array(items: &[Value]) -> Option<&[Value]> {
    if let Some(Value::Object(first)) = items.first() {
        if DETECTION_MARKERS.iter().any(|key| first.contains_key(*key)) {
            return Some(items);
        }
    }

    items.iter().find_map(extract_detections)
}

fn detections_in_object(map: &Map<String, Value>) -> Option<&[Value]> {
    if has_error_marker(map) {
        return None;
    }

    if let Some(output) = first_output(map) {
        return extract_detections(output);
    }

    if let Some(Value::Array(predictions)) = map.get("predictions") {
        return Some(predictions.as_slice());
    }
    if let Some(Value::Array(detections)) = map.get("detections") {
        return Some(detections.as_slice());
    }
    // `results` is a wrapper, not the list itself: the answer is whatever
    // the nested search yields, including nothing.
    if let Some(results @ Value::Array(_)) = map.get("results") {
        return extract_detections(results);
    }

    map.iter()
        .filter(|(key, _)| !DETECTION_SKIP_KEYS.contains(&key.as_str()))
        .find_map(|(_, value)| extract_detections(value))
}

/// Find an inline visualization image using [`MIN_INLINE_IMAGE_LEN`].
pub fn extract_visualization(tree: &Value) -> Option<&str> {
    extract_visualization_with(tree, MIN_INLINE_IMAGE_LEN)
}

/// Find an inline visualization image.
///
/// `visualization` fields are trusted at any length; a generic `image`
/// string must be longer than `min_image_len` characters.
pub fn extract_visualization_with(tree: &Value, min_image_len: usize) -> Option<&str> {
    match tree {
        Value::Array(items) => items
            .iter()
            .find_map(|item| extract_visualization_with(item, min_image_len)),
        Value::Object(map) => visualization_in_object(map, min_image_len),
        _ => None,
    }
}

fn visualization_in_object(map: &Map<String, Value>, min_image_len: usize) -> Option<&str> {
    match map.get("visualization") {
        Some(Value::String(payload)) if !payload.is_empty() => return Some(payload.as_str()),
        Some(Value::Object(wrapper)) => {
            if let Some(Value::String(payload)) = wrapper.get("value") {
                if !payload.is_empty() {
                    return Some(payload.as_str());
                }
            }
        }
        _ => {}
    }

    if let Some(Value::String(image)) = map.get("image") {
        if image.chars().count() > min_image_len {
            return Some(image.as_str());
        }
    }

    if let Some(output) = first_output(map) {
        return extract_visualization_with(output, min_image_len);
    }

    map.iter()
        .filter(|(key, _)| !VISUALIZATION_SKIP_KEYS.contains(&key.as_str()))
        .find_map(|(_, value)| extract_visualization_with(value, min_image_len))
}

/// Top-level error reported by the backend or the proxy in front of it.
///
/// Proxies in front of detection providers report failures as
/// `{"detail": ...}`; providers themselves use `{"error": ...}`.
pub fn backend_error(tree: &Value) -> Option<&Value> {
    let map = tree.as_object()?;
    map.get("error")
        .filter(|value| is_truthy(value))
        .or_else(|| map.get("detail").filter(|value| is_truthy(value)))
}

fn first_output(map: &Map<String, Value>) -> Option<&Value> {
    map.get("outputs")?.as_array()?.first()
}

fn has_error_marker(map: &Map<String, Value>) -> bool {
    map.get("error").is_some_and(is_truthy)
}

/// `null`, `false`, `0` and `""` carry no signal; everything else does.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        Value::String(text) => !text.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
