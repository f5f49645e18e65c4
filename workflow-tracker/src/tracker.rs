//! Per-workflow facade over the synchronization pipeline.
//!
//! One [`WorkflowTracker`] owns everything for a single workflow id: the
//! canonical state, the dedup ledger, the progress gate, the transcript and
//! the channel connectivity view. Channel handlers call in with raw
//! messages; the tracker runs the full vet-reduce-record pipeline and fires
//! the terminal callback at most once.

use std::time::Instant;

use serde_json::Value;
use tracing::{debug, warn};
use workflow_tracker_sdk::{
    CompiledArtifact, WorkflowEvent, WorkflowSnapshot, WorkflowStatus,
};

use crate::config::TrackerConfig;
use crate::dispatch;
use crate::ledger::DedupLedger;
use crate::rate_limit::ProgressGate;
use crate::reducer::{self, ReducerNote};
use crate::state::{ChannelState, WorkflowState};
use crate::work_log::{LogEntry, LogLevel, WorkItem, WorkLog};

/// What the workflow ended as, handed to the terminal callback exactly
/// once.
#[derive(Debug, Clone, PartialEq)]
pub struct TerminalOutcome {
    pub workflow_id: String,
    pub status: WorkflowStatus,
    /// Present on completed/awaiting-review, absent on failure.
    pub artifact: Option<CompiledArtifact>,
}

type TerminalCallback = Box<dyn FnOnce(TerminalOutcome) + Send>;

pub struct WorkflowTracker {
    state: WorkflowState,
    ledger: DedupLedger,
    gate: ProgressGate,
    log: WorkLog,
    channels: ChannelState,
    on_terminal: Option<TerminalCallback>,
}

impl WorkflowTracker {
    pub fn new(workflow_id: impl Into<String>, config: &TrackerConfig) -> Self {
        Self {
            state: WorkflowState::new(workflow_id, &config.manifest()),
            ledger: DedupLedger::new(),
            gate: ProgressGate::new(config.progress_quantum()),
            log: WorkLog::new(),
            channels: ChannelState::default(),
            on_terminal: None,
        }
    }

    /// Register the one-shot callback fired on the terminal transition.
    pub fn with_on_terminal(
        mut self,
        callback: impl FnOnce(TerminalOutcome) + Send + 'static,
    ) -> Self {
        self.on_terminal = Some(Box::new(callback));
        self
    }

    pub fn state(&self) -> &WorkflowState {
        &self.state
    }

    pub fn channel_state(&self) -> &ChannelState {
        &self.channels
    }

    pub fn work_items(&self) -> &[WorkItem] {
        self.log.items()
    }

    pub fn log_entries(&self) -> &[LogEntry] {
        self.log.entries()
    }

    pub fn final_artifact(&self) -> Option<&CompiledArtifact> {
        self.state.final_result.as_ref()
    }

    pub fn is_done(&self) -> bool {
        self.state.is_terminal()
    }

    /// Entry point for one raw push frame.
    pub fn handle_push_raw(&mut self, raw: &Value) {
        self.channels.last_push_at = Some(chrono::Local::now());
        match dispatch::classify(raw) {
            Ok(event) => self.apply_event(&event, Instant::now()),
            Err(unrecognized) => {
                warn!(
                    workflow_id = %self.state.workflow_id,
                    kind = unrecognized.kind.as_deref().unwrap_or("<missing>"),
                    reason = %unrecognized.reason,
                    "discarding unrecognized push message"
                );
                self.log.log(
                    LogLevel::Warning,
                    None,
                    match unrecognized.kind {
                        Some(kind) => format!("ignored unrecognized event `{kind}`"),
                        None => "ignored message without an event type".to_string(),
                    },
                );
            }
        }
    }

    /// Apply one classified event at the given instant.
    ///
    /// The instant is explicit so the rate-limit quantum is testable
    /// without sleeping.
    pub fn apply_event(&mut self, event: &WorkflowEvent, now: Instant) {
        // Duplicate terminal deliveries are still logged even after the
        // workflow froze, so the check runs before the terminal gate.
        if !self.ledger.should_apply(&self.state.workflow_id, event) {
            self.log.log(
                LogLevel::Info,
                event.agent(),
                "duplicate terminal delivery ignored",
            );
            return;
        }

        if self.state.is_terminal() {
            debug!(
                workflow_id = %self.state.workflow_id,
                "workflow already terminal, dropping late event"
            );
            return;
        }

        if let WorkflowEvent::AgentProgress { percent, .. } = event {
            // Flood drops are silent: no transcript entry, no state touch.
            if !self.gate.admit(*percent, now) {
                return;
            }
        }

        let reduction = reducer::apply_event(&self.state, event);
        self.log_notes(&reduction.notes);

        if reduction.changed {
            self.state = reduction.state;
        }
        if reduction.changed || event.is_content() || matches!(event, WorkflowEvent::Connected) {
            self.log.record_event(event);
        }

        // Commit before marking, so the terminal-result check still sees
        // the pre-event ledger.
        self.commit_if_terminal(false);
        if reduction.changed {
            self.ledger.mark_applied(&self.state.workflow_id, event);
        }
    }

    /// Merge one poll response.
    pub fn handle_poll_snapshot(&mut self, snapshot: &WorkflowSnapshot) {
        self.channels.last_poll_at = Some(chrono::Local::now());
        if self.state.is_terminal() {
            debug!(
                workflow_id = %self.state.workflow_id,
                "workflow already terminal, dropping poll snapshot"
            );
            return;
        }
        if self.ledger.snapshot_is_duplicate(snapshot) {
            debug!(
                workflow_id = %self.state.workflow_id,
                "poll snapshot unchanged since last merge"
            );
            return;
        }

        let reduction = reducer::apply_snapshot(&self.state, snapshot);
        self.log_notes(&reduction.notes);

        if snapshot.workflow_id == self.state.workflow_id {
            self.ledger.remember_snapshot(snapshot);
        }
        if reduction.changed {
            self.state = reduction.state;
        }

        self.commit_if_terminal(true);
    }

    /// One-shot terminal side effects, shared by both channels.
    ///
    /// `announce` adds the transcript entry for transitions that arrive via
    /// snapshot; the event path already records its own entry.
    fn commit_if_terminal(&mut self, announce: bool) {
        if !self.state.is_terminal() {
            return;
        }
        if self.ledger.has_terminal_result(&self.state.workflow_id) {
            return;
        }
        self.ledger.mark_terminal_result(&self.state.workflow_id);

        let status = self.state.overall_status;
        if announce {
            match status {
                WorkflowStatus::Failed => {
                    self.log.log(LogLevel::Error, None, "workflow failed");
                }
                WorkflowStatus::AwaitingReview => {
                    self.log
                        .log(LogLevel::Success, None, "workflow completed, awaiting review");
                }
                _ => self.log.log(LogLevel::Success, None, "workflow completed"),
            }
        }

        if let Some(callback) = self.on_terminal.take() {
            callback(TerminalOutcome {
                workflow_id: self.state.workflow_id.clone(),
                status,
                artifact: self.state.final_result.clone(),
            });
        }
    }

    fn log_notes(&mut self, notes: &[ReducerNote]) {
        for note in notes {
            match note {
                ReducerNote::Dropped { agent, reason } => {
                    warn!(
                        workflow_id = %self.state.workflow_id,
                        agent = agent.as_deref().unwrap_or("-"),
                        "{reason}"
                    );
                    self.log.log(LogLevel::Warning, agent.as_deref(), reason.clone());
                }
                ReducerNote::DecodeWarning { reason } => {
                    warn!(workflow_id = %self.state.workflow_id, "{reason}");
                    self.log.log(
                        LogLevel::Warning,
                        None,
                        format!("result decode degraded: {reason}"),
                    );
                }
            }
        }
    }

    // Channel lifecycle notifications from the orchestrator.

    pub fn mark_push_connected(&mut self) {
        self.channels.push_connected = true;
        self.log
            .log(LogLevel::Info, None, "push channel connected");
    }

    /// `reason` is present for unexpected drops and absent on clean
    /// shutdown; only the former is surfaced in the transcript.
    pub fn mark_push_disconnected(&mut self, reason: Option<&str>) {
        self.channels.push_connected = false;
        if let Some(reason) = reason {
            warn!(workflow_id = %self.state.workflow_id, "push channel lost: {reason}");
            self.log.log(
                LogLevel::Warning,
                None,
                format!("push channel lost: {reason}"),
            );
        }
    }

    pub fn mark_poll_started(&mut self) {
        self.channels.poll_active = true;
    }

    pub fn mark_poll_stopped(&mut self) {
        self.channels.poll_active = false;
    }

    /// A failed or timed-out poll request. The loop keeps going; the next
    /// tick may succeed.
    pub fn note_poll_failure(&mut self, reason: &str) {
        warn!(workflow_id = %self.state.workflow_id, "poll request failed: {reason}");
        self.log
            .log(LogLevel::Warning, None, format!("poll failed: {reason}"));
    }
}

impl std::fmt::Debug for WorkflowTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowTracker")
            .field("state", &self.state)
            .field("channels", &self.channels)
            .field("has_on_terminal", &self.on_terminal.is_some())
            .finish()
    }
}
