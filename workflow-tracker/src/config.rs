//! Tracker configuration.

use crate::manifest::PipelineManifest;
use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::time::Duration;

/// Tunables for one tracking session.
///
/// All intervals are milliseconds; the observed production values are the
/// defaults (poll every 3 s, progress quantum 2 s). There is deliberately
/// no retry/backoff knob: a dropped push subscription stays down until the
/// caller reopens it.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub poll_interval_ms: u64,
    /// Per-request poll timeout; defaults to one poll interval.
    pub poll_timeout_ms: Option<u64>,
    pub progress_quantum_ms: u64,
    /// Pipeline override; the default six-agent pipeline when absent.
    pub manifest: Option<PipelineManifest>,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 3000,
            poll_timeout_ms: None,
            progress_quantum_ms: 2000,
            manifest: None,
        }
    }
}

impl TrackerConfig {
    /// Parse a config from YAML and validate it.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Self =
            serde_yaml::from_str(yaml).context("failed to parse tracker config YAML")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_ms == 0 {
            bail!("poll_interval_ms must be non-zero");
        }
        if self.poll_timeout_ms == Some(0) {
            bail!("poll_timeout_ms must be non-zero when set");
        }
        if let Some(manifest) = &self.manifest {
            manifest.validate()?;
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms.unwrap_or(self.poll_interval_ms))
    }

    pub fn progress_quantum(&self) -> Duration {
        Duration::from_millis(self.progress_quantum_ms)
    }

    pub fn manifest(&self) -> PipelineManifest {
        self.manifest.clone().unwrap_or_default()
    }
}
