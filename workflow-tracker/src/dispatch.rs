//! Classification of raw channel messages into typed workflow events.
//!
//! Classification is pure and total: every raw message maps to exactly one
//! event kind or to [`Unrecognized`]. The discriminator is the explicit
//! `type` field; payload content is never inspected to infer a kind.

use serde::Deserialize;
use serde_json::Value;
use workflow_tracker_sdk::WorkflowEvent;

/// A message that did not match any known event kind.
///
/// The caller logs and discards these; they never crash the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct Unrecognized {
    /// The `type` discriminator the message carried, if any.
    pub kind: Option<String>,
    pub reason: String,
}

/// Classify one raw message from either channel.
pub fn classify(raw: &Value) -> Result<WorkflowEvent, Unrecognized> {
    WorkflowEvent::deserialize(raw).map_err(|err| Unrecognized {
        kind: raw
            .get("type")
            .and_then(Value::as_str)
            .map(str::to_string),
        reason: err.to_string(),
    })
}
