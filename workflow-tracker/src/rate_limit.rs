//! Flood control for progress-class events.

use std::time::{Duration, Instant};

/// Leaky-bucket-of-one gate over `agent_progress` events.
///
/// One quantum of silence is required between accepted progress events;
/// this is not a sliding window. State-defining events never pass through
/// here, and a terminal 100% progress report is always admitted because
/// dropping it would lose the value forever.
#[derive(Debug)]
pub struct ProgressGate {
    quantum: Duration,
    last_accepted: Option<Instant>,
}

impl ProgressGate {
    pub fn new(quantum: Duration) -> Self {
        Self {
            quantum,
            last_accepted: None,
        }
    }

    /// Whether a progress event arriving at `now` passes the gate.
    ///
    /// The clock is passed in so the policy is testable without waiting.
    pub fn admit(&mut self, percent: u8, now: Instant) -> bool {
        if percent >= 100 {
            self.last_accepted = Some(now);
            return true;
        }
        if let Some(prev) = self.last_accepted {
            if now.duration_since(prev) < self.quantum {
                return false;
            }
        }
        self.last_accepted = Some(now);
        true
    }
}
