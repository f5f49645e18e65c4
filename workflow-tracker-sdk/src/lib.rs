//! Wire contract shared between the workflow tracker engine and any
//! progress backend implementation.
//!
//! A backend delivers incremental [`WorkflowEvent`]s over a push channel
//! (a broadcast subscription) and full [`WorkflowSnapshot`]s over a poll
//! endpoint. The tracker reconciles the two; this crate only defines the
//! shapes both sides agree on.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

// Re-export async trait for convenience
pub use async_trait::async_trait;

/// Status of a single pipeline agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Skipped,
}

impl AgentStatus {
    /// Terminal statuses admit no further transition.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Skipped)
    }

    /// Ordering rank used for forward-only merges: a status may only ever
    /// be replaced by one of strictly higher rank.
    pub fn rank(&self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::Running => 1,
            Self::Completed | Self::Failed | Self::Skipped => 2,
        }
    }
}

/// Overall status of a tracked workflow.
///
/// `AwaitingReview` means the artifact is ready but pending human
/// approval: terminal for channel orchestration, not for user action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    Running,
    AwaitingReview,
    Completed,
    Failed,
}

impl WorkflowStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }

    /// Forward-only ordering rank, as for [`AgentStatus::rank`].
    pub fn rank(&self) -> u8 {
        match self {
            Self::Running => 0,
            Self::AwaitingReview | Self::Completed | Self::Failed => 1,
        }
    }
}

/// Events delivered over the push channel.
///
/// The `type` field is the only discriminator; classification never
/// inspects payload content. Unknown kinds fail deserialization and are
/// dropped by the tracker's dispatcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkflowEvent {
    /// Push subscription handshake succeeded.
    Connected,
    /// An agent left the pending state.
    AgentStarted {
        agent: String,
        #[serde(default)]
        message: String,
    },
    /// Incremental progress for a running agent.
    AgentProgress {
        agent: String,
        percent: u8,
        #[serde(default)]
        message: String,
    },
    /// An agent surfaced a search hit.
    AgentSearch {
        agent: String,
        title: String,
        #[serde(default)]
        snippet: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        url: Option<String>,
    },
    /// An agent surfaced an analysis finding.
    AgentAnalysis {
        agent: String,
        title: String,
        #[serde(default)]
        body: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        metadata: Option<BTreeMap<String, Value>>,
    },
    /// An agent surfaced generated content.
    AgentGeneration {
        agent: String,
        title: String,
        #[serde(default)]
        body: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        percent: Option<u8>,
    },
    /// An agent finished successfully.
    AgentCompleted {
        agent: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        result: Option<Value>,
    },
    /// An agent failed.
    AgentFailed { agent: String, error: String },
    /// The backend declared the whole workflow done.
    WorkflowCompleted {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        result: Option<Value>,
        #[serde(default)]
        awaiting_review: bool,
    },
    /// The backend declared the whole workflow failed.
    WorkflowError { error: String },
}

impl WorkflowEvent {
    /// The agent this event concerns, if any.
    pub fn agent(&self) -> Option<&str> {
        match self {
            Self::AgentStarted { agent, .. }
            | Self::AgentProgress { agent, .. }
            | Self::AgentSearch { agent, .. }
            | Self::AgentAnalysis { agent, .. }
            | Self::AgentGeneration { agent, .. }
            | Self::AgentCompleted { agent, .. }
            | Self::AgentFailed { agent, .. } => Some(agent),
            _ => None,
        }
    }

    /// Workflow-level terminal events end the tracking session.
    pub fn is_workflow_terminal(&self) -> bool {
        matches!(self, Self::WorkflowCompleted { .. } | Self::WorkflowError { .. })
    }

    /// Progress-class events are subject to rate limiting; everything
    /// else is state-defining and never throttled.
    pub fn is_progress(&self) -> bool {
        matches!(self, Self::AgentProgress { .. })
    }

    /// Content events carry work output for the transcript and never
    /// touch tracked state.
    pub fn is_content(&self) -> bool {
        matches!(
            self,
            Self::AgentSearch { .. } | Self::AgentAnalysis { .. } | Self::AgentGeneration { .. }
        )
    }
}

/// Per-agent slice of a poll snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSnapshot {
    pub name: String,
    pub status: AgentStatus,
    #[serde(default)]
    pub progress_percent: u8,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
}

/// Latest known full state of a workflow, as returned by the poll
/// endpoint (and the drafts-listing fallback).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowSnapshot {
    pub workflow_id: String,
    pub status: WorkflowStatus,
    #[serde(default)]
    pub progress_percent: u8,
    #[serde(default)]
    pub agents: Vec<AgentSnapshot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Local>>,
}

/// Canonical decoded artifact produced by a completed workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledArtifact {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub summary: String,
    /// Required on the wire: an object without `content` is not treated
    /// as a directly-usable artifact.
    pub content: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, Value>,
}

impl CompiledArtifact {
    /// Artifact built from bare text (fallback decode path).
    pub fn from_text(text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            title: String::new(),
            summary: text.clone(),
            content: text,
            metadata: BTreeMap::new(),
        }
    }

    /// Safe default substituted when a result payload cannot be decoded.
    pub fn placeholder() -> Self {
        Self {
            title: String::new(),
            summary: "result payload could not be decoded".to_string(),
            content: String::new(),
            metadata: BTreeMap::new(),
        }
    }
}

/// Errors a backend implementation may surface to the tracker.
///
/// The tracker never propagates these past its own boundary; they degrade
/// to channel-state flags and log entries.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("failed to decode backend payload: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("workflow `{workflow_id}` not found")]
    UnknownWorkflow { workflow_id: String },
}

/// Result type for backend operations.
pub type BackendResult<T> = Result<T, BackendError>;

/// A conforming progress backend: one push-subscribe endpoint and two
/// pull endpoints, all keyed by workflow id.
#[async_trait]
pub trait ProgressBackend: Send + Sync {
    /// Subscribe to the live event stream for a workflow.
    ///
    /// Messages arrive as raw JSON; the tracker classifies them. The
    /// stream carries no historical replay, which is why the poll
    /// endpoint exists.
    async fn subscribe(
        &self,
        workflow_id: &str,
    ) -> BackendResult<tokio::sync::broadcast::Receiver<Value>>;

    /// Fetch the latest known snapshot, or `None` if the backend has no
    /// progress history for this id yet.
    async fn poll_snapshot(&self, workflow_id: &str) -> BackendResult<Option<WorkflowSnapshot>>;

    /// Drafts-listing fallback for cold resume: the most recent draft or
    /// result for this id, expressed as a snapshot so it can enter the
    /// tracker through the same reducer path.
    async fn latest_draft(&self, workflow_id: &str) -> BackendResult<Option<WorkflowSnapshot>>;
}
