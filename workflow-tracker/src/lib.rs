//! Client-side synchronization engine for multi-agent workflow progress.
//!
//! A tracked workflow is a backend pipeline of named agents producing a
//! compiled artifact. The backend reports progress over two unsynchronized
//! channels: a live push stream and a periodic poll snapshot. This crate
//! reconciles both into one consistent view that never visibly regresses.
//!
//! Data flow: the [`orchestrator::ChannelOrchestrator`] owns both channels
//! and hands every raw message to the [`dispatch`] classifier; the
//! [`ledger::DedupLedger`] vetoes duplicate deliveries; progress-class
//! events pass the [`rate_limit::ProgressGate`]; the [`reducer`] applies
//! the event to the canonical [`state::WorkflowState`]; the
//! [`work_log::WorkLog`] appends a human-readable rendering; the
//! [`decoder`] normalizes the final artifact exactly once, on the terminal
//! transition.

pub mod config;
pub mod decoder;
pub mod dispatch;
pub mod ledger;
pub mod logging;
pub mod manifest;
pub mod orchestrator;
pub mod rate_limit;
pub mod reducer;
pub mod state;
pub mod tracker;
pub mod work_log;

pub use workflow_tracker_sdk as sdk;

pub use config::TrackerConfig;
pub use manifest::PipelineManifest;
pub use orchestrator::ChannelOrchestrator;
pub use tracker::{TerminalOutcome, WorkflowTracker};
