//! Defensive decoding of the backend's result envelope.
//!
//! The backend wraps the final artifact in several observed shapes. Each
//! shape is modeled as an explicit [`ResultPayload`] variant with its own
//! decode branch, ordered first-match-wins. Decoding never fails: parse
//! errors degrade to a text or placeholder artifact plus a warning the
//! caller can log.

use serde_json::Value;
use workflow_tracker_sdk::CompiledArtifact;

/// The observed encodings of a result envelope.
#[derive(Debug, Clone, PartialEq)]
pub enum ResultPayload {
    /// An object directly usable as the artifact.
    Direct(Value),
    /// An object nested one level under `full_result`.
    WrappedObject(Value),
    /// JSON text under `full_result`.
    WrappedJson(String),
    /// JSON text under a generic `data` field.
    DataJson(String),
    /// Plain text used verbatim as a fallback summary.
    PlainText(String),
    /// Nothing recognizable.
    Unknown(Value),
}

/// Classify a raw envelope into one of the known encodings.
pub fn classify(raw: &Value) -> ResultPayload {
    if let Some(text) = raw.as_str() {
        return ResultPayload::PlainText(text.to_string());
    }
    if raw.is_object() {
        if looks_like_artifact(raw) {
            return ResultPayload::Direct(raw.clone());
        }
        if let Some(inner) = raw.get("full_result") {
            if inner.is_object() {
                return ResultPayload::WrappedObject(inner.clone());
            }
            if let Some(text) = inner.as_str() {
                return ResultPayload::WrappedJson(text.to_string());
            }
        }
        if let Some(text) = raw.get("data").and_then(Value::as_str) {
            return ResultPayload::DataJson(text.to_string());
        }
    }
    ResultPayload::Unknown(raw.clone())
}

/// Outcome of a decode: always an artifact, plus an optional warning when
/// a branch degraded.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedResult {
    pub artifact: CompiledArtifact,
    pub warning: Option<String>,
}

impl DecodedResult {
    fn ok(artifact: CompiledArtifact) -> Self {
        Self {
            artifact,
            warning: None,
        }
    }

    fn degraded(artifact: CompiledArtifact, warning: impl Into<String>) -> Self {
        Self {
            artifact,
            warning: Some(warning.into()),
        }
    }
}

/// Decode a result envelope into the canonical artifact.
pub fn decode(raw: &Value) -> DecodedResult {
    match classify(raw) {
        ResultPayload::Direct(value) | ResultPayload::WrappedObject(value) => {
            match artifact_from_value(&value) {
                Some(artifact) => DecodedResult::ok(artifact),
                None => DecodedResult::degraded(
                    CompiledArtifact::placeholder(),
                    "result object is missing a usable `content` field",
                ),
            }
        }
        ResultPayload::WrappedJson(text) | ResultPayload::DataJson(text) => {
            match serde_json::from_str::<Value>(&text) {
                Ok(inner) => match artifact_from_value(&inner) {
                    Some(artifact) => DecodedResult::ok(artifact),
                    None => DecodedResult::degraded(
                        CompiledArtifact::from_text(text),
                        "nested result JSON has no usable artifact shape; kept text verbatim",
                    ),
                },
                Err(err) => DecodedResult::degraded(
                    CompiledArtifact::from_text(text),
                    format!("nested result is not valid JSON ({err}); kept text verbatim"),
                ),
            }
        }
        ResultPayload::PlainText(text) => DecodedResult::ok(CompiledArtifact::from_text(text)),
        ResultPayload::Unknown(_) => DecodedResult::degraded(
            CompiledArtifact::placeholder(),
            "unrecognized result payload shape",
        ),
    }
}

fn looks_like_artifact(value: &Value) -> bool {
    value.get("content").map_or(false, Value::is_string)
}

fn artifact_from_value(value: &Value) -> Option<CompiledArtifact> {
    if !looks_like_artifact(value) {
        return None;
    }
    serde_json::from_value(value.clone()).ok()
}
