use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use super::errors::{OrchestratorError, Result};

/// What the engine does once a node fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnFailure {
    /// Skip the failed node's descendants; independent branches keep running.
    #[default]
    Continue,
    /// Dispatch nothing new. Every node still pending is skipped, nodes
    /// already running finish.
    Stop,
}

/// When declared parent names are resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParentResolution {
    /// Parents must be registered before their children.
    #[default]
    Eager,
    /// Forward references are allowed and resolved when the graph is built.
    Deferred,
}

/// Configuration for orchestrator runs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Maximum number of node operations in flight at once (None = unbounded)
    pub max_parallel_nodes: Option<usize>,
    /// Default per-node deadline in milliseconds
    pub node_timeout_ms: Option<u64>,
    /// Deadline for a whole run in milliseconds
    pub run_timeout_ms: Option<u64>,
    /// What to do when a node fails
    pub on_failure: OnFailure,
    /// When parent references are checked
    pub parent_resolution: ParentResolution,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_parallel_nodes: None,
            node_timeout_ms: None,
            run_timeout_ms: None,
            on_failure: OnFailure::Continue,
            parent_resolution: ParentResolution::Eager,
        }
    }
}

impl OrchestratorConfig {
    /// Create a new builder for OrchestratorConfig
    pub fn builder() -> OrchestratorConfigBuilder {
        OrchestratorConfigBuilder::new()
    }

    /// Validates configuration values
    pub fn validate(&self) -> Result<()> {
        if self.max_parallel_nodes == Some(0) {
            return Err(OrchestratorError::configuration(
                "max_parallel_nodes must be greater than 0",
            ));
        }
        if self.node_timeout_ms == Some(0) {
            return Err(OrchestratorError::configuration(
                "node_timeout_ms must be greater than 0",
            ));
        }
        if self.run_timeout_ms == Some(0) {
            return Err(OrchestratorError::configuration(
                "run_timeout_ms must be greater than 0",
            ));
        }
        Ok(())
    }

    pub fn node_timeout(&self) -> Option<Duration> {
        self.node_timeout_ms.map(Duration::from_millis)
    }

    pub fn run_timeout(&self) -> Option<Duration> {
        self.run_timeout_ms.map(Duration::from_millis)
    }

    /// Parse and validate a YAML document. Missing keys take their defaults.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|e| OrchestratorError::io(path, e))?;
        Self::from_yaml_str(&yaml)
    }
}

/// Builder for OrchestratorConfig
#[derive(Debug, Default)]
pub struct OrchestratorConfigBuilder {
    config: OrchestratorConfig,
}

impl OrchestratorConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_parallel_nodes(mut self, limit: usize) -> Self {
        self.config.max_parallel_nodes = Some(limit);
        self
    }

    pub fn node_timeout(mut self, timeout: Duration) -> Self {
        self.config.node_timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    pub fn run_timeout(mut self, timeout: Duration) -> Self {
        self.config.run_timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    pub fn on_failure(mut self, policy: OnFailure) -> Self {
        self.config.on_failure = policy;
        self
    }

    pub fn parent_resolution(mut self, policy: ParentResolution) -> Self {
        self.config.parent_resolution = policy;
        self
    }

    /// Build and validate the configuration
    pub fn build(self) -> Result<OrchestratorConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
