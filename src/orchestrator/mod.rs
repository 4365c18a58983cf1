//! Node registration and run entry points.

mod executor;
pub mod ready_queue;
pub mod report;
pub mod scheduler;

pub use ready_queue::ReadyQueue;
pub use report::{CancelReason, NodeRecord, RunOutcome, RunResult};
pub use scheduler::Scheduler;

use std::collections::HashMap;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::context::OrchestratorContext;
use crate::core::config::{OrchestratorConfig, ParentResolution};
use crate::core::errors::{GraphValidationError, OrchestratorError, Result};
use crate::graph::DependencyGraph;
use crate::node::Node;

/// Owns a set of nodes and runs them against a caller-supplied context.
///
/// Registration takes `&mut self`; runs take `&self`, so the same
/// orchestrator can run any number of times, each run starting from a
/// clean per-node state.
pub struct Orchestrator<S = (), D = ()> {
    config: OrchestratorConfig,
    nodes: Vec<Node<S, D>>,
    node_indices: HashMap<String, usize>,
}

impl<S, D> Default for Orchestrator<S, D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S, D> Orchestrator<S, D> {
    pub fn new() -> Self {
        Self {
            config: OrchestratorConfig::default(),
            nodes: Vec::new(),
            node_indices: HashMap::new(),
        }
    }

    /// Create an orchestrator with a validated configuration.
    pub fn with_config(config: OrchestratorConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            ..Self::new()
        })
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Register a node.
    ///
    /// Names must be unique. Under [`ParentResolution::Eager`] every parent
    /// must already be registered; under [`ParentResolution::Deferred`]
    /// parents are resolved when the graph is validated. A rejected node
    /// leaves the orchestrator unchanged.
    pub fn add_node(&mut self, node: Node<S, D>) -> Result<()> {
        if self.node_indices.contains_key(node.name()) {
            return Err(GraphValidationError::duplicate(node.name()).into());
        }

        if self.config.parent_resolution == ParentResolution::Eager {
            for parent in node.parents() {
                if parent == node.name() {
                    return Err(GraphValidationError::cycle([parent.as_str()]).into());
                }
                if !self.node_indices.contains_key(parent) {
                    return Err(GraphValidationError::unresolved(node.name(), parent.as_str()).into());
                }
            }
        }

        debug!(
            node = node.name(),
            parents = ?node.parents(),
            "Registered node"
        );
        self.node_indices
            .insert(node.name().to_string(), self.nodes.len());
        self.nodes.push(node);
        Ok(())
    }

    /// Register nodes in order, stopping at the first rejection. Nodes
    /// registered before the failure stay registered.
    pub fn add_nodes<I>(&mut self, nodes: I) -> Result<()>
    where
        I: IntoIterator<Item = Node<S, D>>,
    {
        nodes.into_iter().try_for_each(|node| self.add_node(node))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.node_indices.contains_key(name)
    }

    pub fn node(&self, name: &str) -> Option<&Node<S, D>> {
        self.node_indices.get(name).map(|&index| &self.nodes[index])
    }

    /// Registered node names, in registration order.
    pub fn node_names(&self) -> Vec<&str> {
        self.nodes.iter().map(Node::name).collect()
    }

    /// Resolve every parent reference and check the graph is acyclic.
    pub fn validate(&self) -> Result<DependencyGraph> {
        DependencyGraph::build(
            self.nodes
                .iter()
                .map(|node| (node.name(), node.parents().iter())),
        )
        .map_err(|err| {
            warn!(error = %err, "Graph validation failed");
            OrchestratorError::from(err)
        })
    }

    /// Run every node once against `ctx`.
    ///
    /// Returns `Err` only if the graph is invalid, in which case no node
    /// operation was invoked. Node failures are reported in the
    /// [`RunResult`].
    pub async fn run(&self, ctx: &OrchestratorContext<S, D>) -> Result<RunResult> {
        self.run_with_cancel(ctx, CancellationToken::new()).await
    }

    /// Like [`run`](Self::run), stopping early once `cancel` fires.
    ///
    /// In-flight operations are dropped and recorded as cancelled; nodes that
    /// never started are skipped.
    pub async fn run_with_cancel(
        &self,
        ctx: &OrchestratorContext<S, D>,
        cancel: CancellationToken,
    ) -> Result<RunResult> {
        let graph = self.validate()?;
        Ok(executor::execute_graph(&self.nodes, &graph, ctx, &self.config, &cancel).await)
    }

    /// Blocking wrapper around [`run`](Self::run) on a private
    /// current-thread runtime.
    ///
    /// Fails with [`OrchestratorError::NestedRuntime`] when called from
    /// inside a tokio runtime.
    pub fn run_sync(&self, ctx: &OrchestratorContext<S, D>) -> Result<RunResult> {
        if tokio::runtime::Handle::try_current().is_ok() {
            return Err(OrchestratorError::NestedRuntime);
        }
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(OrchestratorError::Runtime)?;
        runtime.block_on(self.run(ctx))
    }
}

impl<S, D> std::fmt::Debug for Orchestrator<S, D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("config", &self.config)
            .field("nodes", &self.node_names())
            .finish()
    }
}
