//! In-process orchestration of async operations arranged as a DAG.
//!
//! Register named [`Node`]s that declare their parents, then run them all
//! against a shared [`OrchestratorContext`]. A node starts once every parent
//! has succeeded, independent branches run concurrently, and a failure skips
//! the failed node's descendants.
//!
//! ```rust,no_run
//! use std::sync::atomic::{AtomicU32, Ordering};
//! use tidydag::{Node, NodeState, Orchestrator, OrchestratorContext};
//!
//! # async fn demo() -> tidydag::Result<()> {
//! let mut orchestrator = Orchestrator::<AtomicU32, ()>::new();
//! orchestrator.add_node(Node::<AtomicU32, ()>::from_fn("load", |ctx| {
//!     Box::pin(async move {
//!         ctx.state.fetch_add(1, Ordering::SeqCst);
//!         Ok(NodeState::Success)
//!     })
//! }))?;
//! orchestrator.add_node(
//!     Node::<AtomicU32, ()>::from_fn("report", |ctx| {
//!         Box::pin(async move {
//!             ctx.state.fetch_add(10, Ordering::SeqCst);
//!             Ok(NodeState::Success)
//!         })
//!     })
//!     .with_parent("load"),
//! )?;
//!
//! let ctx = OrchestratorContext::with_state(AtomicU32::new(0));
//! let result = orchestrator.run(&ctx).await?;
//! assert!(result.is_success());
//! assert_eq!(ctx.state.load(Ordering::SeqCst), 11);
//! # Ok(())
//! # }
//! ```

pub mod core;

pub mod context;
pub mod graph;
pub mod logging;
pub mod node;
pub mod orchestrator;

pub use context::{Blackboard, OrchestratorContext};
pub use crate::core::config::{OnFailure, OrchestratorConfig, OrchestratorConfigBuilder, ParentResolution};
pub use crate::core::errors::{GraphValidationError, NodeExecutionError, OrchestratorError, Result};
pub use graph::DependencyGraph;
pub use logging::init_logging;
pub use node::{FnAction, Node, NodeAction, NodeFuture, NodeState, NodeStatus};
pub use orchestrator::{CancelReason, NodeRecord, Orchestrator, RunOutcome, RunResult};

pub use async_trait::async_trait;
pub use tokio_util::sync::CancellationToken;
