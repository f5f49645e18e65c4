//! Shared fixtures: a scriptable in-memory backend and event builders.

use std::collections::VecDeque;
use std::sync::Mutex;

use serde_json::{json, Value};
use tokio::sync::broadcast;
use workflow_tracker::sdk::{
    async_trait, BackendError, BackendResult, ProgressBackend, WorkflowSnapshot,
};
use workflow_tracker::{TrackerConfig, WorkflowTracker};

/// In-memory backend driven by the test body: push frames go out over a
/// broadcast channel, poll responses are consumed from a queue.
pub struct MockBackend {
    pub events: broadcast::Sender<Value>,
    snapshots: Mutex<VecDeque<BackendResult<Option<WorkflowSnapshot>>>>,
    draft: Mutex<Option<WorkflowSnapshot>>,
    fail_subscribe: bool,
}

impl MockBackend {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            events,
            snapshots: Mutex::new(VecDeque::new()),
            draft: Mutex::new(None),
            fail_subscribe: false,
        }
    }

    pub fn with_subscribe_failure() -> Self {
        let mut backend = Self::new();
        backend.fail_subscribe = true;
        backend
    }

    pub fn queue_snapshot(&self, response: BackendResult<Option<WorkflowSnapshot>>) {
        self.snapshots.lock().unwrap().push_back(response);
    }

    pub fn set_draft(&self, snapshot: WorkflowSnapshot) {
        *self.draft.lock().unwrap() = Some(snapshot);
    }
}

#[async_trait]
impl ProgressBackend for MockBackend {
    async fn subscribe(&self, _workflow_id: &str) -> BackendResult<broadcast::Receiver<Value>> {
        if self.fail_subscribe {
            return Err(BackendError::Transport("subscribe refused".to_string()));
        }
        Ok(self.events.subscribe())
    }

    async fn poll_snapshot(&self, _workflow_id: &str) -> BackendResult<Option<WorkflowSnapshot>> {
        self.snapshots
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(None))
    }

    async fn latest_draft(&self, _workflow_id: &str) -> BackendResult<Option<WorkflowSnapshot>> {
        Ok(self.draft.lock().unwrap().clone())
    }
}

pub fn tracker() -> WorkflowTracker {
    WorkflowTracker::new("wf-1", &TrackerConfig::default())
}

// Raw push frames, as the backend would emit them.

pub fn started(agent: &str) -> Value {
    json!({ "type": "agent_started", "agent": agent })
}

pub fn progress(agent: &str, percent: u8) -> Value {
    json!({ "type": "agent_progress", "agent": agent, "percent": percent })
}

pub fn search(agent: &str, title: &str, url: &str) -> Value {
    json!({ "type": "agent_search", "agent": agent, "title": title, "url": url })
}

pub fn completed(agent: &str) -> Value {
    json!({ "type": "agent_completed", "agent": agent })
}

pub fn workflow_completed(result: Value) -> Value {
    json!({ "type": "workflow_completed", "result": result })
}

pub fn running_snapshot(percent: u8, agents: Value) -> WorkflowSnapshot {
    serde_json::from_value(json!({
        "workflow_id": "wf-1",
        "status": "running",
        "progress_percent": percent,
        "agents": agents,
    }))
    .unwrap()
}

pub fn completed_snapshot(result: Value) -> WorkflowSnapshot {
    serde_json::from_value(json!({
        "workflow_id": "wf-1",
        "status": "completed",
        "progress_percent": 100,
        "agents": [],
        "result": result,
    }))
    .unwrap()
}
