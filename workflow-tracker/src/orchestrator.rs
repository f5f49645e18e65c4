//! Lifecycle owner for the two delivery channels of one workflow.
//!
//! The orchestrator opens the push subscription and the poll loop as
//! background tokio tasks, feeds everything they deliver into the shared
//! [`WorkflowTracker`], and tears both down on terminal state or on an
//! explicit [`ChannelOrchestrator::stop`]. Channels never talk to each
//! other; the tracker is the only rendezvous point.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::broadcast;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use workflow_tracker_sdk::ProgressBackend;

use crate::config::TrackerConfig;
use crate::tracker::WorkflowTracker;

pub struct ChannelOrchestrator {
    workflow_id: String,
    backend: Arc<dyn ProgressBackend>,
    tracker: Arc<Mutex<WorkflowTracker>>,
    poll_interval: Duration,
    poll_timeout: Duration,
    stopped: Arc<AtomicBool>,
    push_task: Option<JoinHandle<()>>,
    poll_task: Option<JoinHandle<()>>,
}

impl ChannelOrchestrator {
    pub fn new(
        workflow_id: impl Into<String>,
        backend: Arc<dyn ProgressBackend>,
        tracker: WorkflowTracker,
        config: &TrackerConfig,
    ) -> Self {
        Self {
            workflow_id: workflow_id.into(),
            backend,
            tracker: Arc::new(Mutex::new(tracker)),
            poll_interval: config.poll_interval(),
            poll_timeout: config.poll_timeout(),
            stopped: Arc::new(AtomicBool::new(false)),
            push_task: None,
            poll_task: None,
        }
    }

    /// Shared handle to the tracker, for the presentation layer.
    pub fn tracker(&self) -> Arc<Mutex<WorkflowTracker>> {
        Arc::clone(&self.tracker)
    }

    /// Open the push subscription and start draining it.
    ///
    /// At most one subscription is live per orchestrator: calling `open`
    /// while one is running is a no-op, so re-entrant mounts cannot
    /// double-deliver frames. Once the previous loop has exited, `open`
    /// subscribes again (reconnection is caller-initiated).
    ///
    /// Subscription failure is not fatal: the poll loop still runs, the
    /// push channel just stays marked disconnected until `open` is called
    /// again.
    pub async fn open(&mut self) {
        if self.push_task.as_ref().map_or(false, |t| !t.is_finished()) {
            debug!(workflow_id = %self.workflow_id, "push subscription already live");
            return;
        }
        let receiver = match self.backend.subscribe(&self.workflow_id).await {
            Ok(receiver) => receiver,
            Err(err) => {
                self.tracker
                    .lock()
                    .await
                    .mark_push_disconnected(Some(&err.to_string()));
                return;
            }
        };
        self.tracker.lock().await.mark_push_connected();

        let tracker = Arc::clone(&self.tracker);
        let stopped = Arc::clone(&self.stopped);
        let workflow_id = self.workflow_id.clone();
        let handle = tokio::spawn(async move {
            push_loop(receiver, tracker, stopped, workflow_id).await;
        });
        self.push_task = Some(handle);
    }

    /// Start the periodic poll loop. A no-op while one is already running.
    pub async fn start_polling(&mut self) {
        if self.poll_task.as_ref().map_or(false, |t| !t.is_finished()) {
            debug!(workflow_id = %self.workflow_id, "poll loop already running");
            return;
        }
        self.tracker.lock().await.mark_poll_started();

        let backend = Arc::clone(&self.backend);
        let tracker = Arc::clone(&self.tracker);
        let stopped = Arc::clone(&self.stopped);
        let workflow_id = self.workflow_id.clone();
        let interval = self.poll_interval;
        let timeout = self.poll_timeout;
        let handle = tokio::spawn(async move {
            poll_loop(backend, tracker, stopped, workflow_id, interval, timeout).await;
        });
        self.poll_task = Some(handle);
    }

    /// Tear down both channels. Safe to call any number of times; only the
    /// first call does anything.
    pub async fn stop(&mut self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(task) = self.push_task.take() {
            task.abort();
        }
        if let Some(task) = self.poll_task.take() {
            task.abort();
        }
        let mut tracker = self.tracker.lock().await;
        tracker.mark_push_disconnected(None);
        tracker.mark_poll_stopped();
    }
}

async fn push_loop(
    mut receiver: broadcast::Receiver<Value>,
    tracker: Arc<Mutex<WorkflowTracker>>,
    stopped: Arc<AtomicBool>,
    workflow_id: String,
) {
    loop {
        match receiver.recv().await {
            Ok(raw) => {
                if stopped.load(Ordering::SeqCst) {
                    break;
                }
                let mut guard = tracker.lock().await;
                guard.handle_push_raw(&raw);
                if guard.is_done() {
                    guard.mark_push_disconnected(None);
                    break;
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                // Dropped frames are recoverable; the poll loop fills gaps.
                warn!(workflow_id = %workflow_id, skipped, "push receiver lagged");
            }
            Err(broadcast::error::RecvError::Closed) => {
                if !stopped.load(Ordering::SeqCst) {
                    tracker
                        .lock()
                        .await
                        .mark_push_disconnected(Some("event stream closed"));
                }
                break;
            }
        }
    }
    debug!(workflow_id = %workflow_id, "push loop exited");
}

async fn poll_loop(
    backend: Arc<dyn ProgressBackend>,
    tracker: Arc<Mutex<WorkflowTracker>>,
    stopped: Arc<AtomicBool>,
    workflow_id: String,
    interval: Duration,
    timeout: Duration,
) {
    // The drafts-listing fallback is consulted at most once per session,
    // for cold resume before the backend has progress history.
    let mut draft_checked = false;
    // Consecutive failures back the interval off, capped at 8x; any
    // successful response resets it.
    let max_delay = interval * 8;
    let mut delay = interval;

    loop {
        if stopped.load(Ordering::SeqCst) {
            break;
        }
        {
            let mut guard = tracker.lock().await;
            if guard.is_done() {
                guard.mark_poll_stopped();
                break;
            }
        }

        let response =
            tokio::time::timeout(timeout, backend.poll_snapshot(&workflow_id)).await;
        // A response that raced with stop() must not mutate the tracker.
        if stopped.load(Ordering::SeqCst) {
            break;
        }

        match response {
            Ok(Ok(Some(snapshot))) => {
                delay = interval;
                let mut guard = tracker.lock().await;
                guard.handle_poll_snapshot(&snapshot);
                if guard.is_done() {
                    guard.mark_poll_stopped();
                    break;
                }
            }
            Ok(Ok(None)) => {
                delay = interval;
                if !draft_checked {
                    draft_checked = true;
                    resume_from_draft(&backend, &tracker, &stopped, &workflow_id, timeout).await;
                }
            }
            Ok(Err(err)) => {
                tracker.lock().await.note_poll_failure(&err.to_string());
                delay = (delay * 2).min(max_delay);
            }
            Err(_) => {
                tracker.lock().await.note_poll_failure("request timed out");
                delay = (delay * 2).min(max_delay);
            }
        }

        tokio::time::sleep(delay).await;
    }
    debug!(workflow_id = %workflow_id, "poll loop exited");
}

async fn resume_from_draft(
    backend: &Arc<dyn ProgressBackend>,
    tracker: &Arc<Mutex<WorkflowTracker>>,
    stopped: &Arc<AtomicBool>,
    workflow_id: &str,
    timeout: Duration,
) {
    match tokio::time::timeout(timeout, backend.latest_draft(workflow_id)).await {
        Ok(Ok(Some(snapshot))) => {
            if stopped.load(Ordering::SeqCst) {
                return;
            }
            tracker.lock().await.handle_poll_snapshot(&snapshot);
        }
        Ok(Ok(None)) => {
            debug!(workflow_id = %workflow_id, "no draft available for resume");
        }
        Ok(Err(err)) => {
            tracker.lock().await.note_poll_failure(&err.to_string());
        }
        Err(_) => {
            tracker
                .lock()
                .await
                .note_poll_failure("draft request timed out");
        }
    }
}
