use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Problems with the registered node set. Always reported before any node
/// operation runs; a run that hits one of these never starts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphValidationError {
    /// The parent relation contains a cycle. `nodes` lists every node on the
    /// offending strongly-connected component, sorted by name.
    #[error("Cycle detected between nodes: {}", nodes.join(" -> "))]
    CycleDetected { nodes: Vec<String> },

    /// A node names a parent that is not registered.
    #[error("Node '{node}' depends on unknown parent '{parent}'")]
    UnresolvedParent { node: String, parent: String },

    /// Two nodes were registered under the same name.
    #[error("Node '{name}' is already registered")]
    DuplicateNode { name: String },
}

impl GraphValidationError {
    pub fn cycle<I, S>(nodes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut nodes: Vec<String> = nodes.into_iter().map(Into::into).collect();
        nodes.sort();
        nodes.dedup();
        Self::CycleDetected { nodes }
    }

    pub fn unresolved<N: Into<String>, P: Into<String>>(node: N, parent: P) -> Self {
        Self::UnresolvedParent {
            node: node.into(),
            parent: parent.into(),
        }
    }

    pub fn duplicate<S: Into<String>>(name: S) -> Self {
        Self::DuplicateNode { name: name.into() }
    }
}

/// Why a single node ended `Failed`. Recorded on the node, never raised out
/// of the run.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum NodeExecutionError {
    /// The operation completed but reported a non-success state.
    #[error("node reported failure: {reason}")]
    Returned { reason: String },

    /// The operation returned an error.
    #[error("node raised an error: {message}")]
    Errored { message: String },

    /// The operation panicked. The panic is contained to the node.
    #[error("node panicked: {message}")]
    Panicked { message: String },

    /// The node's deadline expired before the operation finished.
    #[error("node timed out after {limit_ms}ms")]
    TimedOut { limit_ms: u64 },

    /// The run was cancelled while the node was in flight.
    #[error("node was cancelled")]
    Cancelled,
}

/// Crate-level error type.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("Graph validation failed: {0}")]
    Validation(#[from] GraphValidationError),

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("YAML parsing failed: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("IO operation failed on {path:?}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to build async runtime: {0}")]
    Runtime(#[source] std::io::Error),

    #[error("run_sync cannot be called from inside an async runtime; use run().await")]
    NestedRuntime,
}

impl OrchestratorError {
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn io<P: Into<PathBuf>>(path: P, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            Self::Validation(GraphValidationError::CycleDetected { .. }) => "cycle",
            Self::Validation(GraphValidationError::UnresolvedParent { .. }) => "unresolved_parent",
            Self::Validation(GraphValidationError::DuplicateNode { .. }) => "duplicate_node",
            Self::Configuration { .. } => "configuration",
            Self::Serialization(_) => "serialization",
            Self::Yaml(_) => "yaml",
            Self::Io { .. } => "io",
            Self::Runtime(_) | Self::NestedRuntime => "runtime",
        }
    }

    /// Returns the validation error if this is one.
    pub fn as_validation(&self) -> Option<&GraphValidationError> {
        match self {
            Self::Validation(err) => Some(err),
            _ => None,
        }
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, OrchestratorError>;
