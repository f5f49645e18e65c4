//! Push/poll reconciliation: two unsynchronized sources, one
//! forward-only view.

use std::sync::{Arc, Mutex};

use serde_json::json;
use workflow_tracker::sdk::{AgentStatus, WorkflowStatus};
use workflow_tracker::work_log::LogLevel;
use workflow_tracker::{TrackerConfig, WorkflowTracker};

use super::common::*;

#[test]
fn test_snapshot_fills_missed_push_frames() {
    let mut tracker = tracker();
    // Nothing arrived over push; the snapshot carries the whole picture.
    let snapshot = running_snapshot(
        50,
        json!([
            { "name": "research", "status": "completed", "progress_percent": 100 },
            { "name": "analysis", "status": "running", "progress_percent": 35 },
        ]),
    );
    tracker.handle_poll_snapshot(&snapshot);

    let state = tracker.state();
    assert_eq!(
        state.agent("research").unwrap().status,
        AgentStatus::Completed
    );
    assert_eq!(state.agent("analysis").unwrap().progress_percent, 35);
    assert_eq!(state.overall_progress_percent, 50);
    assert_eq!(state.overall_status, WorkflowStatus::Running);
}

#[test]
fn test_stale_snapshot_fields_never_regress_push_state() {
    let mut tracker = tracker();
    tracker.handle_push_raw(&started("research"));
    tracker.handle_push_raw(&completed("research"));

    let stale = running_snapshot(
        20,
        json!([
            { "name": "research", "status": "running", "progress_percent": 80 },
        ]),
    );
    tracker.handle_poll_snapshot(&stale);

    let agent = tracker.state().agent("research").unwrap();
    assert_eq!(agent.status, AgentStatus::Completed);
    assert_eq!(agent.progress_percent, 100);
    // Overall percent was 0 locally, so the snapshot figure is accepted.
    assert_eq!(tracker.state().overall_progress_percent, 20);
}

#[test]
fn test_identical_snapshots_merge_once() {
    let mut tracker = tracker();
    let snapshot = running_snapshot(
        40,
        json!([{ "name": "research", "status": "running", "progress_percent": 40 }]),
    );

    tracker.handle_poll_snapshot(&snapshot);
    let entries = tracker.log_entries().len();
    let state = tracker.state().clone();

    // Same content, refreshed timestamp.
    let mut refreshed = snapshot.clone();
    refreshed.updated_at = Some(chrono::Local::now());
    tracker.handle_poll_snapshot(&refreshed);
    tracker.handle_poll_snapshot(&refreshed);

    assert_eq!(tracker.state(), &state);
    assert_eq!(tracker.log_entries().len(), entries);
}

#[test]
fn test_terminal_via_poll_then_duplicate_push() {
    let outcomes = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&outcomes);
    let mut tracker = WorkflowTracker::new("wf-1", &TrackerConfig::default())
        .with_on_terminal(move |outcome| sink.lock().unwrap().push(outcome));

    tracker.handle_poll_snapshot(&completed_snapshot(json!({ "content": "polled" })));
    assert!(tracker.is_done());
    assert_eq!(tracker.final_artifact().unwrap().content, "polled");

    // The push channel delivers its own terminal afterwards.
    tracker.handle_push_raw(&workflow_completed(json!({ "content": "pushed" })));

    // First terminal wins: artifact untouched, callback fired once.
    assert_eq!(tracker.final_artifact().unwrap().content, "polled");
    assert_eq!(outcomes.lock().unwrap().len(), 1);
}

#[test]
fn test_snapshot_for_another_workflow_is_rejected() {
    let mut tracker = tracker();
    let mut foreign = completed_snapshot(json!({ "content": "wrong" }));
    foreign.workflow_id = "wf-2".to_string();
    tracker.handle_poll_snapshot(&foreign);

    assert!(!tracker.is_done());
    assert!(tracker
        .log_entries()
        .iter()
        .any(|e| e.level == LogLevel::Warning && e.text.contains("wf-2")));
}

#[test]
fn test_interleaved_channels_converge() {
    let mut tracker = tracker();

    tracker.handle_push_raw(&started("research"));
    tracker.handle_push_raw(&progress("research", 30));
    tracker.handle_poll_snapshot(&running_snapshot(
        25,
        json!([
            { "name": "research", "status": "running", "progress_percent": 45 },
            { "name": "analysis", "status": "running", "progress_percent": 10 },
        ]),
    ));
    tracker.handle_push_raw(&completed("research"));

    let state = tracker.state();
    // Poll advanced research past the last push figure, then push
    // finished it.
    assert_eq!(
        state.agent("research").unwrap().status,
        AgentStatus::Completed
    );
    // Poll alone started analysis; push never mentioned it.
    assert_eq!(state.agent("analysis").unwrap().status, AgentStatus::Running);
    assert_eq!(state.agent("analysis").unwrap().progress_percent, 10);
}
