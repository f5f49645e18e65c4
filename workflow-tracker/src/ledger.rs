//! At-most-once bookkeeping for event side effects and poll snapshots.
//!
//! An owned ledger object passed through the pipeline, not ambient
//! mutable state: the tracker consults it before reducing, which keeps
//! the dedup rules testable in isolation.

use std::collections::HashSet;
use workflow_tracker_sdk::{WorkflowEvent, WorkflowSnapshot};

/// Tracks which deliveries and which terminal results have already been
/// applied for the workflows this tracker instance has seen.
#[derive(Debug, Default)]
pub struct DedupLedger {
    /// Workflow ids whose terminal result side effects already fired.
    workflow_terminals: HashSet<String>,
    /// (workflow id, agent name) pairs whose terminal event was applied.
    agent_terminals: HashSet<(String, String)>,
    /// Structural fingerprint of the last applied poll snapshot.
    last_snapshot: Option<String>,
}

impl DedupLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether this event may still trigger its side effects.
    ///
    /// Duplicate terminal deliveries may be logged by the caller, but must
    /// not re-fire one-shot effects (artifact decode, completion
    /// callback).
    pub fn should_apply(&self, workflow_id: &str, event: &WorkflowEvent) -> bool {
        match event {
            WorkflowEvent::AgentCompleted { agent, .. }
            | WorkflowEvent::AgentFailed { agent, .. } => !self
                .agent_terminals
                .contains(&(workflow_id.to_string(), agent.clone())),
            WorkflowEvent::WorkflowCompleted { .. } | WorkflowEvent::WorkflowError { .. } => {
                !self.workflow_terminals.contains(workflow_id)
            }
            _ => true,
        }
    }

    /// Record that an event's side effects have fired.
    pub fn mark_applied(&mut self, workflow_id: &str, event: &WorkflowEvent) {
        match event {
            WorkflowEvent::AgentCompleted { agent, .. }
            | WorkflowEvent::AgentFailed { agent, .. } => {
                self.agent_terminals
                    .insert((workflow_id.to_string(), agent.clone()));
            }
            WorkflowEvent::WorkflowCompleted { .. } | WorkflowEvent::WorkflowError { .. } => {
                self.mark_terminal_result(workflow_id);
            }
            _ => {}
        }
    }

    /// Record a terminal result regardless of which channel delivered it.
    pub fn mark_terminal_result(&mut self, workflow_id: &str) {
        self.workflow_terminals.insert(workflow_id.to_string());
    }

    pub fn has_terminal_result(&self, workflow_id: &str) -> bool {
        self.workflow_terminals.contains(workflow_id)
    }

    /// Whether this snapshot is structurally identical to the last one
    /// applied. A duplicate produces no reducer call and no log entries.
    pub fn snapshot_is_duplicate(&self, snapshot: &WorkflowSnapshot) -> bool {
        self.last_snapshot.as_deref() == Some(fingerprint(snapshot).as_str())
    }

    pub fn remember_snapshot(&mut self, snapshot: &WorkflowSnapshot) {
        self.last_snapshot = Some(fingerprint(snapshot));
    }
}

/// Canonical serialization of a snapshot, ignoring `updated_at`: a backend
/// refreshing only the timestamp is still reporting the same state.
fn fingerprint(snapshot: &WorkflowSnapshot) -> String {
    let mut probe = snapshot.clone();
    probe.updated_at = None;
    serde_json::to_string(&probe).unwrap_or_default()
}
