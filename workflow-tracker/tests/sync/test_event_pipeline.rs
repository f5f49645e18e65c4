//! Push-channel pipeline: raw frames in, consistent state and transcript
//! out.

use std::sync::{Arc, Mutex};

use serde_json::json;
use workflow_tracker::sdk::{AgentStatus, WorkflowStatus};
use workflow_tracker::work_log::{LogLevel, WorkItemKind};
use workflow_tracker::{TrackerConfig, WorkflowTracker};

use super::common::*;

#[test]
fn test_full_run_over_push_channel() {
    let outcomes = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&outcomes);
    let mut tracker = WorkflowTracker::new("wf-1", &TrackerConfig::default())
        .with_on_terminal(move |outcome| sink.lock().unwrap().push(outcome));

    tracker.handle_push_raw(&json!({ "type": "connected" }));
    tracker.handle_push_raw(&started("research"));
    tracker.handle_push_raw(&progress("research", 40));
    tracker.handle_push_raw(&search("research", "Primary source", "https://example.com/1"));
    tracker.handle_push_raw(&completed("research"));
    tracker.handle_push_raw(&started("writer"));
    tracker.handle_push_raw(&workflow_completed(json!({
        "full_result": { "title": "Report", "content": "full text" }
    })));

    let state = tracker.state();
    assert_eq!(state.overall_status, WorkflowStatus::Completed);
    assert_eq!(state.overall_progress_percent, 100);
    assert_eq!(
        state.agent("research").unwrap().status,
        AgentStatus::Completed
    );
    // Force-completed by the workflow-level terminal.
    assert_eq!(state.agent("writer").unwrap().status, AgentStatus::Completed);
    assert_eq!(state.agent("editor").unwrap().status, AgentStatus::Completed);

    let artifact = tracker.final_artifact().unwrap();
    assert_eq!(artifact.title, "Report");
    assert_eq!(artifact.content, "full text");

    let items = tracker.work_items();
    assert!(items.iter().any(|i| i.kind == WorkItemKind::Search
        && i.source_url.as_deref() == Some("https://example.com/1")));
    assert!(items.iter().any(|i| i.kind == WorkItemKind::Compilation));

    let outcomes = outcomes.lock().unwrap();
    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].workflow_id, "wf-1");
    assert_eq!(outcomes[0].status, WorkflowStatus::Completed);
}

#[test]
fn test_out_of_order_terminal_is_dropped_with_warning() {
    let mut tracker = tracker();
    tracker.handle_push_raw(&completed("research"));

    assert_eq!(
        tracker.state().agent("research").unwrap().status,
        AgentStatus::Pending
    );
    assert_eq!(tracker.log_entries().len(), 1);
    assert_eq!(tracker.log_entries()[0].level, LogLevel::Warning);
}

#[test]
fn test_unrecognized_frames_do_not_disrupt_the_run() {
    let mut tracker = tracker();
    tracker.handle_push_raw(&started("research"));
    tracker.handle_push_raw(&json!({ "type": "heartbeat" }));
    tracker.handle_push_raw(&json!(["not", "an", "object"]));
    tracker.handle_push_raw(&progress("research", 30));

    assert_eq!(
        tracker.state().agent("research").unwrap().progress_percent,
        30
    );
    let warnings = tracker
        .log_entries()
        .iter()
        .filter(|e| e.level == LogLevel::Warning)
        .count();
    assert_eq!(warnings, 2);
}

#[test]
fn test_duplicate_workflow_terminal_fires_once() {
    let outcomes = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&outcomes);
    let mut tracker = WorkflowTracker::new("wf-1", &TrackerConfig::default())
        .with_on_terminal(move |outcome| sink.lock().unwrap().push(outcome));

    let frame = workflow_completed(json!({ "content": "done" }));
    tracker.handle_push_raw(&frame);
    tracker.handle_push_raw(&frame);

    assert_eq!(outcomes.lock().unwrap().len(), 1);
    // Exactly one compilation item despite the duplicate delivery.
    let compilations = tracker
        .work_items()
        .iter()
        .filter(|i| i.kind == WorkItemKind::Compilation)
        .count();
    assert_eq!(compilations, 1);
}

#[test]
fn test_failure_path_freezes_progress() {
    let mut tracker = tracker();
    tracker.handle_push_raw(&started("research"));
    tracker.handle_push_raw(&progress("research", 55));
    tracker.handle_push_raw(&json!({
        "type": "agent_failed", "agent": "research", "error": "rate limited upstream"
    }));
    tracker.handle_push_raw(&json!({ "type": "workflow_error", "error": "pipeline aborted" }));

    let agent = tracker.state().agent("research").unwrap();
    assert_eq!(agent.status, AgentStatus::Failed);
    // Failure keeps the last known progress figure.
    assert_eq!(agent.progress_percent, 55);
    assert_eq!(tracker.state().overall_status, WorkflowStatus::Failed);
    assert!(tracker.final_artifact().is_none());
    assert!(tracker
        .log_entries()
        .iter()
        .any(|e| e.level == LogLevel::Error && e.text.contains("pipeline aborted")));
}
