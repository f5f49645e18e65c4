//! Append-only transcript of work items and operational log entries.
//!
//! Pure observability: ordering is insertion order, nothing is mutated or
//! evicted, and nothing elsewhere consults this log for correctness.

use chrono::{DateTime, Local};
use serde_json::Value;
use std::collections::BTreeMap;
use workflow_tracker_sdk::WorkflowEvent;

/// Category of a work item, for display grouping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkItemKind {
    Search,
    Analysis,
    Generation,
    Processing,
    Compilation,
}

/// One immutable unit of agent output surfaced to the user.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkItem {
    pub kind: WorkItemKind,
    pub title: String,
    pub body: String,
    pub source_url: Option<String>,
    pub metadata: Option<BTreeMap<String, Value>>,
    pub produced_at: DateTime<Local>,
    /// Sub-progress for display, when the producing event carried one.
    pub progress_percent: Option<u8>,
}

/// Severity of an operational log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Success,
    Error,
    Warning,
}

/// One line of the operational log.
#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    pub level: LogLevel,
    pub text: String,
    pub agent: Option<String>,
    pub produced_at: DateTime<Local>,
}

/// The session transcript. Append-only, unbounded for the session.
#[derive(Debug, Default)]
pub struct WorkLog {
    items: Vec<WorkItem>,
    entries: Vec<LogEntry>,
}

impl WorkLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(&self) -> &[WorkItem] {
        &self.items
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    /// Append an operational log entry.
    pub fn log(&mut self, level: LogLevel, agent: Option<&str>, text: impl Into<String>) {
        self.entries.push(LogEntry {
            level,
            text: text.into(),
            agent: agent.map(str::to_string),
            produced_at: Local::now(),
        });
    }

    /// Append the human-readable rendering of an accepted event.
    pub fn record_event(&mut self, event: &WorkflowEvent) {
        match event {
            WorkflowEvent::Connected => {
                self.log(LogLevel::Info, None, "push channel connected");
            }
            WorkflowEvent::AgentStarted { agent, message } => {
                let text = if message.is_empty() {
                    "started".to_string()
                } else {
                    format!("started: {message}")
                };
                self.log(LogLevel::Info, Some(agent), text);
            }
            WorkflowEvent::AgentProgress {
                agent,
                percent,
                message,
            } => {
                let text = if message.is_empty() {
                    format!("{percent}%")
                } else {
                    format!("{percent}%: {message}")
                };
                self.log(LogLevel::Info, Some(agent), text);
            }
            WorkflowEvent::AgentSearch {
                title,
                snippet,
                url,
                ..
            } => {
                self.push_item(WorkItem {
                    kind: WorkItemKind::Search,
                    title: title.clone(),
                    body: snippet.clone(),
                    source_url: url.clone(),
                    metadata: None,
                    produced_at: Local::now(),
                    progress_percent: None,
                });
            }
            WorkflowEvent::AgentAnalysis {
                title,
                body,
                metadata,
                ..
            } => {
                self.push_item(WorkItem {
                    kind: WorkItemKind::Analysis,
                    title: title.clone(),
                    body: body.clone(),
                    source_url: None,
                    metadata: metadata.clone(),
                    produced_at: Local::now(),
                    progress_percent: None,
                });
            }
            WorkflowEvent::AgentGeneration {
                title,
                body,
                percent,
                ..
            } => {
                self.push_item(WorkItem {
                    kind: WorkItemKind::Generation,
                    title: title.clone(),
                    body: body.clone(),
                    source_url: None,
                    metadata: None,
                    produced_at: Local::now(),
                    progress_percent: *percent,
                });
            }
            WorkflowEvent::AgentCompleted {
                agent,
                message,
                result,
            } => {
                self.log(
                    LogLevel::Success,
                    Some(agent),
                    message.clone().unwrap_or_else(|| "completed".to_string()),
                );
                if result.is_some() {
                    self.push_item(WorkItem {
                        kind: WorkItemKind::Processing,
                        title: format!("{agent} finished"),
                        body: message.clone().unwrap_or_default(),
                        source_url: None,
                        metadata: None,
                        produced_at: Local::now(),
                        progress_percent: Some(100),
                    });
                }
            }
            WorkflowEvent::AgentFailed { agent, error } => {
                self.log(LogLevel::Error, Some(agent), format!("failed: {error}"));
            }
            WorkflowEvent::WorkflowCompleted { awaiting_review, .. } => {
                let text = if *awaiting_review {
                    "workflow completed, awaiting review"
                } else {
                    "workflow completed"
                };
                self.log(LogLevel::Success, None, text);
                self.push_item(WorkItem {
                    kind: WorkItemKind::Compilation,
                    title: "final artifact compiled".to_string(),
                    body: String::new(),
                    source_url: None,
                    metadata: None,
                    produced_at: Local::now(),
                    progress_percent: Some(100),
                });
            }
            WorkflowEvent::WorkflowError { error } => {
                self.log(LogLevel::Error, None, format!("workflow failed: {error}"));
            }
        }
    }

    fn push_item(&mut self, item: WorkItem) {
        self.items.push(item);
    }
}
