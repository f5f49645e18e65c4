//! Development-time tracing for debugging the tracker.
//!
//! Diagnostics emitted through `tracing` are distinct from the
//! user-visible transcript kept by [`crate::work_log::WorkLog`]: the
//! transcript is a product surface, this is `RUST_LOG`-gated stderr
//! output for developers.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize the tracing subscriber.
///
/// Reads `RUST_LOG`, defaulting to `warn`. Compact format on stderr.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
