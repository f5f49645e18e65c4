//! The state machine core: the single authority that mutates
//! [`WorkflowState`].
//!
//! Both functions here are pure: they take the current state and a vetted
//! input and return a [`Reduction`]. `changed = false` tells the caller
//! the input was a no-op under the invariants, so every downstream stage
//! (transcript, re-render, callbacks) can be skipped.
//!
//! Monotonicity is enforced centrally: statuses and percentages only move
//! forward, and an input proposing an illegal transition is dropped with a
//! note, never applied and never raised as an error.

use serde_json::Value;
use workflow_tracker_sdk::{
    AgentSnapshot, AgentStatus, WorkflowEvent, WorkflowSnapshot, WorkflowStatus,
};

use crate::decoder;
use crate::state::{event_transition_allowed, AgentState, WorkflowState};

/// Outcome of applying one event or snapshot.
#[derive(Debug, Clone)]
pub struct Reduction {
    pub state: WorkflowState,
    pub changed: bool,
    pub notes: Vec<ReducerNote>,
}

/// Side observations produced while reducing, for the caller to log.
#[derive(Debug, Clone, PartialEq)]
pub enum ReducerNote {
    /// An input proposed an illegal or stale update and was dropped.
    Dropped {
        agent: Option<String>,
        reason: String,
    },
    /// The final artifact decode degraded to a fallback.
    DecodeWarning { reason: String },
}

fn unchanged(state: &WorkflowState) -> Reduction {
    Reduction {
        state: state.clone(),
        changed: false,
        notes: Vec::new(),
    }
}

fn dropped(agent: Option<&str>, reason: impl Into<String>) -> ReducerNote {
    ReducerNote::Dropped {
        agent: agent.map(str::to_string),
        reason: reason.into(),
    }
}

/// Apply one classified event.
pub fn apply_event(state: &WorkflowState, event: &WorkflowEvent) -> Reduction {
    // A terminal workflow is frozen; late events are no-ops.
    if state.is_terminal() {
        return unchanged(state);
    }

    let mut next = state.clone();
    let mut notes = Vec::new();

    let changed = match event {
        WorkflowEvent::Connected => false,
        WorkflowEvent::AgentStarted { agent, message } => {
            start_agent(&mut next, agent, message, &mut notes)
        }
        WorkflowEvent::AgentProgress {
            agent,
            percent,
            message,
        } => progress_agent(&mut next, agent, *percent, message, &mut notes),
        WorkflowEvent::AgentSearch { .. }
        | WorkflowEvent::AgentAnalysis { .. }
        | WorkflowEvent::AgentGeneration { .. } => false,
        WorkflowEvent::AgentCompleted {
            agent,
            message,
            result,
        } => finish_agent(
            &mut next,
            agent,
            AgentStatus::Completed,
            message.as_deref(),
            result.as_ref(),
            &mut notes,
        ),
        WorkflowEvent::AgentFailed { agent, error } => finish_agent(
            &mut next,
            agent,
            AgentStatus::Failed,
            Some(error),
            None,
            &mut notes,
        ),
        WorkflowEvent::WorkflowCompleted {
            result,
            awaiting_review,
        } => {
            finish_workflow(&mut next, result.as_ref(), *awaiting_review, &mut notes);
            true
        }
        WorkflowEvent::WorkflowError { .. } => {
            next.overall_status = WorkflowStatus::Failed;
            true
        }
    };

    Reduction {
        state: if changed { next } else { state.clone() },
        changed,
        notes,
    }
}

fn start_agent(
    state: &mut WorkflowState,
    agent: &str,
    message: &str,
    notes: &mut Vec<ReducerNote>,
) -> bool {
    let Some(entry) = state.agent_mut(agent) else {
        notes.push(dropped(Some(agent), "event names an unknown agent"));
        return false;
    };
    match entry.status {
        AgentStatus::Pending => {
            entry.status = AgentStatus::Running;
            if !message.is_empty() {
                entry.message = message.to_string();
            }
            true
        }
        // Duplicate start: already where the event wants us.
        AgentStatus::Running => false,
        status => {
            notes.push(dropped(
                Some(agent),
                format!("start event for agent already {status:?}"),
            ));
            false
        }
    }
}

fn progress_agent(
    state: &mut WorkflowState,
    agent: &str,
    percent: u8,
    message: &str,
    notes: &mut Vec<ReducerNote>,
) -> bool {
    let Some(entry) = state.agent_mut(agent) else {
        notes.push(dropped(Some(agent), "event names an unknown agent"));
        return false;
    };
    if entry.status != AgentStatus::Running {
        notes.push(dropped(
            Some(agent),
            format!("progress event for agent in {:?}", entry.status),
        ));
        return false;
    }
    let percent = percent.min(100);
    if percent < entry.progress_percent {
        notes.push(dropped(
            Some(agent),
            format!(
                "progress regression {}% -> {}%",
                entry.progress_percent, percent
            ),
        ));
        return false;
    }
    let mut changed = false;
    if percent > entry.progress_percent {
        entry.progress_percent = percent;
        changed = true;
    }
    if !message.is_empty() && message != entry.message {
        entry.message = message.to_string();
        changed = true;
    }
    changed
}

fn finish_agent(
    state: &mut WorkflowState,
    agent: &str,
    terminal: AgentStatus,
    message: Option<&str>,
    result: Option<&Value>,
    notes: &mut Vec<ReducerNote>,
) -> bool {
    let Some(entry) = state.agent_mut(agent) else {
        notes.push(dropped(Some(agent), "event names an unknown agent"));
        return false;
    };
    if entry.status == terminal {
        // Duplicate terminal delivery.
        return false;
    }
    if !event_transition_allowed(entry.status, terminal) {
        notes.push(dropped(
            Some(agent),
            format!("illegal transition {:?} -> {terminal:?}", entry.status),
        ));
        return false;
    }
    entry.status = terminal;
    if terminal == AgentStatus::Completed {
        entry.progress_percent = 100;
        entry.result = result.cloned();
    }
    if let Some(message) = message {
        if !message.is_empty() {
            entry.message = message.to_string();
        }
    }
    true
}

/// Terminal completion path, shared by the explicit event and a
/// terminal-shaped snapshot. Only non-terminal agents are force-completed;
/// failed and skipped agents keep their statuses.
fn finish_workflow(
    state: &mut WorkflowState,
    result: Option<&Value>,
    awaiting_review: bool,
    notes: &mut Vec<ReducerNote>,
) {
    state.overall_status = if awaiting_review {
        WorkflowStatus::AwaitingReview
    } else {
        WorkflowStatus::Completed
    };
    state.overall_progress_percent = 100;
    for agent in &mut state.agents {
        if !agent.status.is_terminal() {
            agent.status = AgentStatus::Completed;
            agent.progress_percent = 100;
        }
    }
    if state.final_result.is_none() {
        let decoded = match result {
            Some(value) => decoder::decode(value),
            None => decoder::DecodedResult {
                artifact: workflow_tracker_sdk::CompiledArtifact::placeholder(),
                warning: None,
            },
        };
        if let Some(warning) = decoded.warning {
            notes.push(ReducerNote::DecodeWarning { reason: warning });
        }
        state.final_result = Some(decoded.artifact);
    }
}

/// Merge one polled snapshot.
///
/// The merge is asymmetric and per-field: a value strictly behind the
/// in-memory state is discarded while values that are not behind from the
/// same snapshot are still accepted. Poll and push are independent,
/// unsynchronized sources, so a partially stale snapshot is normal.
pub fn apply_snapshot(state: &WorkflowState, snapshot: &WorkflowSnapshot) -> Reduction {
    if state.is_terminal() {
        return unchanged(state);
    }
    if snapshot.workflow_id != state.workflow_id {
        let mut reduction = unchanged(state);
        reduction.notes.push(dropped(
            None,
            format!(
                "snapshot for workflow `{}` delivered to tracker of `{}`",
                snapshot.workflow_id, state.workflow_id
            ),
        ));
        return reduction;
    }

    let mut next = state.clone();
    let mut notes = Vec::new();
    let mut changed = false;

    for agent_snap in &snapshot.agents {
        match next.agent_mut(&agent_snap.name) {
            Some(entry) => changed |= merge_agent(entry, agent_snap, &mut notes),
            None => notes.push(dropped(
                Some(&agent_snap.name),
                "snapshot names an unknown agent",
            )),
        }
    }

    // Clamp before comparing: an out-of-range figure must not look ahead
    // of an already-saturated 100.
    let snap_percent = snapshot.progress_percent.min(100);
    if snap_percent > next.overall_progress_percent {
        next.overall_progress_percent = snap_percent;
        changed = true;
    }

    if snapshot.status.rank() > next.overall_status.rank() {
        match snapshot.status {
            WorkflowStatus::Completed | WorkflowStatus::AwaitingReview => {
                finish_workflow(
                    &mut next,
                    snapshot.result.as_ref(),
                    snapshot.status == WorkflowStatus::AwaitingReview,
                    &mut notes,
                );
            }
            WorkflowStatus::Failed => {
                next.overall_status = WorkflowStatus::Failed;
            }
            WorkflowStatus::Running => unreachable!("running has the lowest rank"),
        }
        changed = true;
    }

    Reduction {
        state: if changed { next } else { state.clone() },
        changed,
        notes,
    }
}

fn merge_agent(
    entry: &mut AgentState,
    snap: &AgentSnapshot,
    notes: &mut Vec<ReducerNote>,
) -> bool {
    let mut changed = false;
    let local_rank = entry.status.rank();
    let snap_rank = snap.status.rank();
    let snap_percent = snap.progress_percent.min(100);

    if snap_rank > local_rank {
        // Fast-forward: the snapshot is a full authoritative state, so a
        // missed intermediate transition is filled in, not rejected.
        entry.status = snap.status;
        match snap.status {
            AgentStatus::Completed => {
                entry.progress_percent = 100;
                if snap.result.is_some() {
                    entry.result = snap.result.clone();
                }
            }
            _ => {
                if snap_percent > entry.progress_percent {
                    entry.progress_percent = snap_percent;
                }
            }
        }
        changed = true;
    } else if snap_rank == local_rank {
        if entry.status != snap.status {
            // Both terminal but disagreeing: the decision already applied
            // locally wins.
            notes.push(dropped(
                Some(&entry.name),
                format!(
                    "snapshot reports {:?} but agent already {:?}",
                    snap.status, entry.status
                ),
            ));
            return false;
        }
        if snap_percent > entry.progress_percent && !entry.status.is_terminal() {
            entry.progress_percent = snap_percent;
            changed = true;
        }
        if entry.result.is_none() && snap.result.is_some() {
            entry.result = snap.result.clone();
            changed = true;
        }
    } else {
        // Snapshot is behind for this agent; its status/percent fields are
        // stale, discard them without touching the rest of the snapshot.
        return false;
    }

    if !snap.message.is_empty() && snap.message != entry.message {
        entry.message = snap.message.clone();
        changed = true;
    }
    changed
}
