//! Nodes: named units of work with declared parents.

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::context::OrchestratorContext;

/// Outcome reported by a node operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum NodeState {
    Success,
    Error { reason: String },
}

impl NodeState {
    pub fn success() -> Self {
        Self::Success
    }

    pub fn error<S: Into<String>>(reason: S) -> Self {
        Self::Error {
            reason: reason.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Success => None,
            Self::Error { reason } => Some(reason),
        }
    }
}

/// Lifecycle of a node within one run.
///
/// `Pending -> Running -> Success | Failed`, or `Pending -> Skipped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeStatus {
    Pending,
    Running,
    Success,
    Failed,
    Skipped,
}

impl NodeStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Failed | Self::Skipped)
    }
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        };
        f.write_str(label)
    }
}

/// The work a node performs.
///
/// Returning `Ok(NodeState::Success)` marks the node successful; any other
/// state, an `Err`, or a panic marks it failed and skips its descendants.
#[async_trait]
pub trait NodeAction<S, D>: Send + Sync {
    async fn execute(&self, ctx: &OrchestratorContext<S, D>) -> anyhow::Result<NodeState>;
}

/// Future returned by closure-bodied nodes.
pub type NodeFuture<'a> = BoxFuture<'a, anyhow::Result<NodeState>>;

/// Adapter running a closure as a [`NodeAction`].
pub struct FnAction<F> {
    func: F,
}

impl<F> FnAction<F> {
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

#[async_trait]
impl<S, D, F> NodeAction<S, D> for FnAction<F>
where
    S: Sync,
    D: Sync,
    F: for<'a> Fn(&'a OrchestratorContext<S, D>) -> NodeFuture<'a> + Send + Sync,
{
    async fn execute(&self, ctx: &OrchestratorContext<S, D>) -> anyhow::Result<NodeState> {
        (self.func)(ctx).await
    }
}

/// A named node, its parents and its action.
pub struct Node<S = (), D = ()> {
    name: String,
    parents: Vec<String>,
    timeout: Option<Duration>,
    action: Arc<dyn NodeAction<S, D>>,
}

impl<S, D> Node<S, D> {
    pub fn new<A>(name: impl Into<String>, action: A) -> Self
    where
        A: NodeAction<S, D> + 'static,
    {
        Self::from_arc(name, Arc::new(action))
    }

    pub fn from_arc(name: impl Into<String>, action: Arc<dyn NodeAction<S, D>>) -> Self {
        Self {
            name: name.into(),
            parents: Vec::new(),
            timeout: None,
            action,
        }
    }

    /// Build a node from a closure returning a boxed future.
    ///
    /// The closure's argument type comes from `S` and `D`, which passing the
    /// node to [`Orchestrator::add_node`](crate::Orchestrator::add_node) does
    /// not pin down. Name them with a turbofish, `Node::<S, D>::from_fn`,
    /// whenever the closure touches the context:
    ///
    /// ```rust
    /// use std::sync::atomic::{AtomicU32, Ordering};
    /// use tidydag::{Node, NodeState};
    ///
    /// let node = Node::<AtomicU32, ()>::from_fn("count", |ctx| {
    ///     Box::pin(async move {
    ///         ctx.state.fetch_add(1, Ordering::SeqCst);
    ///         Ok(NodeState::Success)
    ///     })
    /// });
    /// assert!(node.is_root());
    /// ```
    pub fn from_fn<F>(name: impl Into<String>, func: F) -> Self
    where
        S: Sync,
        D: Sync,
        F: for<'a> Fn(&'a OrchestratorContext<S, D>) -> NodeFuture<'a> + Send + Sync + 'static,
    {
        Self::from_arc(name, Arc::new(FnAction::new(func)))
    }

    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        let parent = parent.into();
        if !self.parents.contains(&parent) {
            self.parents.push(parent);
        }
        self
    }

    pub fn with_parents<I, P>(self, parents: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<String>,
    {
        parents
            .into_iter()
            .fold(self, |node, parent| node.with_parent(parent))
    }

    /// Deadline for this node's operation; overrides the configured default.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parents(&self) -> &[String] {
        &self.parents
    }

    pub fn is_root(&self) -> bool {
        self.parents.is_empty()
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn action(&self) -> &Arc<dyn NodeAction<S, D>> {
        &self.action
    }
}

impl<S, D> fmt::Debug for Node<S, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("name", &self.name)
            .field("parents", &self.parents)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}
