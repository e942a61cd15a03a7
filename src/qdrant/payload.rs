//! Conversions between [`EntryPayload`] and Qdrant point payloads.

use serde_json::{Map, Value, json};

use super::filters::CORPUS_TAG_FIELD;
use crate::store::EntryPayload;

/// Payload object stored alongside each vector.
pub(crate) fn build_payload(payload: &EntryPayload) -> Value {
    json!({
        "text": payload.text,
        "file_name": payload.file_name,
        "corpus_tag": payload.corpus_tag,
        "ordinal": payload.ordinal,
    })
}

/// Decode a stored payload; `None` when a required field is missing or mistyped.
pub(crate) fn parse_payload(payload: Map<String, Value>) -> Option<EntryPayload> {
    serde_json::from_value(Value::Object(payload)).ok()
}

/// Corpus tag recorded in a (possibly partial) payload.
pub(crate) fn corpus_tag_of(payload: &Map<String, Value>) -> Option<String> {
    payload
        .get(CORPUS_TAG_FIELD)
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Render a Qdrant point id (UUID string or unsigned integer) as text.
pub(crate) fn stringify_point_id(id: Value) -> String {
    match id {
        Value::String(text) => text,
        Value::Number(number) => number.to_string(),
        Value::Object(map) => map
            .get("uuid")
            .map(|value| match value {
                Value::String(uuid) => uuid.clone(),
                other => other.to_string(),
            })
            .unwrap_or_else(|| Value::Object(map).to_string()),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Inverse of [`stringify_point_id`] for ids sent back to Qdrant.
pub(crate) fn point_id_value(id: &str) -> Value {
    id.parse::<u64>()
        .map(Value::from)
        .unwrap_or_else(|_| Value::String(id.to_string()))
}
