//! Static declaration of the agent pipeline.
//!
//! The manifest fixes the set of agent names a workflow is allowed to
//! report on; the tracker initializes its per-agent state from it and
//! drops events naming agents outside it.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

/// One named stage of the backend pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSpec {
    pub name: String,
    /// Display label; falls back to the name when empty.
    #[serde(default)]
    pub label: String,
}

impl AgentSpec {
    pub fn new(name: &str, label: &str) -> Self {
        Self {
            name: name.to_string(),
            label: label.to_string(),
        }
    }
}

/// Ordered pipeline declaration. Order is significant for display only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineManifest {
    pub agents: Vec<AgentSpec>,
}

impl Default for PipelineManifest {
    fn default() -> Self {
        Self {
            agents: vec![
                AgentSpec::new("research", "Research"),
                AgentSpec::new("analysis", "Analysis"),
                AgentSpec::new("outline", "Outline"),
                AgentSpec::new("writer", "Writer"),
                AgentSpec::new("editor", "Editor"),
                AgentSpec::new("compiler", "Compiler"),
            ],
        }
    }
}

impl PipelineManifest {
    /// Parse a manifest from YAML and validate it.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let manifest: Self =
            serde_yaml::from_str(yaml).context("failed to parse pipeline manifest YAML")?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// A manifest must declare at least one agent, with unique non-empty
    /// names.
    pub fn validate(&self) -> Result<()> {
        if self.agents.is_empty() {
            bail!("pipeline manifest declares no agents");
        }
        let mut seen = std::collections::HashSet::new();
        for agent in &self.agents {
            if agent.name.trim().is_empty() {
                bail!("pipeline manifest contains an agent with an empty name");
            }
            if !seen.insert(agent.name.as_str()) {
                bail!("duplicate agent name `{}` in pipeline manifest", agent.name);
            }
        }
        Ok(())
    }

    pub fn agent_names(&self) -> impl Iterator<Item = &str> {
        self.agents.iter().map(|a| a.name.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.agents.iter().any(|a| a.name == name)
    }
}
