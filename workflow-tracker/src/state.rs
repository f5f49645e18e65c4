//! Canonical client-side state for a tracked workflow.
//!
//! Only the reducer mutates [`WorkflowState`]; channel handlers hand their
//! messages to the tracker, which funnels everything through it.

use chrono::{DateTime, Local};
use serde_json::Value;
use workflow_tracker_sdk::{AgentStatus, CompiledArtifact, WorkflowStatus};

use crate::manifest::PipelineManifest;

/// Tracked state of a single pipeline agent.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentState {
    pub name: String,
    pub status: AgentStatus,
    /// 0-100, non-decreasing while running; forced to 100 on completion,
    /// frozen at the last known value on failure.
    pub progress_percent: u8,
    pub message: String,
    /// Payload attached on completion, as delivered by the backend.
    pub result: Option<Value>,
}

impl AgentState {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: AgentStatus::Pending,
            progress_percent: 0,
            message: String::new(),
            result: None,
        }
    }
}

/// Whether a single event may move an agent from `from` to `to`.
///
/// The table is pending -> running -> {completed, failed}, with skipped
/// reachable only from pending. Bulk paths (workflow-terminal
/// force-complete, snapshot fast-forward) are sanctioned separately by the
/// reducer and do not go through this check.
pub fn event_transition_allowed(from: AgentStatus, to: AgentStatus) -> bool {
    use AgentStatus::*;
    matches!(
        (from, to),
        (Pending, Running) | (Pending, Skipped) | (Running, Completed) | (Running, Failed)
    )
}

/// One per tracked workflow id; the single source of truth for display.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowState {
    pub workflow_id: String,
    /// Declared pipeline order; keys fixed at construction.
    pub agents: Vec<AgentState>,
    pub overall_status: WorkflowStatus,
    /// Authoritative backend-reported figure, not derived from the
    /// per-agent percentages.
    pub overall_progress_percent: u8,
    /// Set exactly once, on the transition into completed/awaiting-review.
    pub final_result: Option<CompiledArtifact>,
}

impl WorkflowState {
    /// Fresh state with every manifest agent pending.
    pub fn new(workflow_id: impl Into<String>, manifest: &PipelineManifest) -> Self {
        Self {
            workflow_id: workflow_id.into(),
            agents: manifest.agent_names().map(AgentState::new).collect(),
            overall_status: WorkflowStatus::Running,
            overall_progress_percent: 0,
            final_result: None,
        }
    }

    pub fn agent(&self, name: &str) -> Option<&AgentState> {
        self.agents.iter().find(|a| a.name == name)
    }

    pub(crate) fn agent_mut(&mut self, name: &str) -> Option<&mut AgentState> {
        self.agents.iter_mut().find(|a| a.name == name)
    }

    pub fn is_terminal(&self) -> bool {
        self.overall_status.is_terminal()
    }
}

/// Which delivery channel most recently produced data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    Push,
    Poll,
}

/// Connectivity view exposed to the presentation layer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChannelState {
    pub push_connected: bool,
    pub poll_active: bool,
    pub last_push_at: Option<DateTime<Local>>,
    pub last_poll_at: Option<DateTime<Local>>,
}

impl ChannelState {
    /// The channel that delivered most recently, if either has.
    pub fn fresh_source(&self) -> Option<ChannelKind> {
        match (self.last_push_at, self.last_poll_at) {
            (None, None) => None,
            (Some(_), None) => Some(ChannelKind::Push),
            (None, Some(_)) => Some(ChannelKind::Poll),
            (Some(push), Some(poll)) => {
                if poll > push {
                    Some(ChannelKind::Poll)
                } else {
                    Some(ChannelKind::Push)
                }
            }
        }
    }
}
