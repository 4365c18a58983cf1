use chrono::Utc;
use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use std::any::Any;
use std::future;
use std::panic::AssertUnwindSafe;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::report::{CancelReason, RunResult};
use super::scheduler::Scheduler;
use crate::context::OrchestratorContext;
use crate::core::config::{OnFailure, OrchestratorConfig};
use crate::core::errors::NodeExecutionError;
use crate::graph::DependencyGraph;
use crate::node::{Node, NodeState};

/// Drive one run of a validated graph to quiescence.
///
/// All node futures are polled from the calling task, so they may borrow
/// `ctx` directly. Ready nodes are dispatched as soon as their last parent
/// succeeds, bounded by `max_parallel_nodes`.
pub(crate) async fn execute_graph<S, D>(
    nodes: &[Node<S, D>],
    graph: &DependencyGraph,
    ctx: &OrchestratorContext<S, D>,
    config: &OrchestratorConfig,
    cancel: &CancellationToken,
) -> RunResult {
    let run_id = Uuid::new_v4();
    let started_at = Utc::now();
    let limit = config.max_parallel_nodes.unwrap_or(usize::MAX);

    let mut scheduler = Scheduler::new(graph);
    let mut in_flight = FuturesUnordered::new();
    let mut halted = false;
    let mut cancelled = None;

    let deadline = async {
        match config.run_timeout() {
            Some(limit) => sleep(limit).await,
            None => future::pending::<()>().await,
        }
    };
    tokio::pin!(deadline);

    info!(%run_id, nodes = graph.len(), "Starting run");

    loop {
        if cancel.is_cancelled() {
            cancelled = Some(CancelReason::Requested);
            break;
        }

        if !halted {
            while in_flight.len() < limit {
                let Some(index) = scheduler.next_ready() else {
                    break;
                };
                let node = &nodes[index];
                let node_timeout = node.timeout().or_else(|| config.node_timeout());
                debug!(%run_id, node = node.name(), "Dispatching node");
                in_flight.push(dispatch(index, node, ctx, node_timeout));
            }
        }

        if in_flight.is_empty() {
            break;
        }

        tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                cancelled = Some(CancelReason::Requested);
                break;
            }
            _ = &mut deadline => {
                cancelled = Some(CancelReason::DeadlineExceeded);
                break;
            }
            Some((index, outcome)) = in_flight.next() => {
                let name = graph.name(index);
                let failed = outcome.is_err();
                let skipped = scheduler.complete(index, outcome);

                let record = scheduler.record(index);
                match &record.error {
                    None => debug!(
                        %run_id,
                        node = name,
                        status = %record.status,
                        elapsed_ms = record.elapsed_ms,
                        "Node finished"
                    ),
                    Some(err) => warn!(
                        %run_id,
                        node = name,
                        status = %record.status,
                        elapsed_ms = record.elapsed_ms,
                        error = %err,
                        "Node failed"
                    ),
                }
                for skipped_index in skipped {
                    debug!(%run_id, node = graph.name(skipped_index), "Skipping node");
                }

                if failed && config.on_failure == OnFailure::Stop && !halted {
                    halted = true;
                    let skipped = scheduler.skip_pending();
                    info!(
                        %run_id,
                        node = name,
                        skipped = skipped.len(),
                        "Stopping dispatch after node failure"
                    );
                }
            }
        }
    }

    if let Some(reason) = cancelled {
        drop(in_flight);
        let interrupted = scheduler.cancel_running();
        let skipped = scheduler.skip_pending();
        warn!(
            %run_id,
            ?reason,
            interrupted = interrupted.len(),
            skipped = skipped.len(),
            "Run cancelled"
        );
    }
    debug_assert!(scheduler.is_quiescent());

    let result = scheduler.into_result(run_id, started_at, cancelled);
    info!(
        %run_id,
        success = result.is_success(),
        completed = result.completion_order.len(),
        failed = result.failed().len(),
        skipped = result.skipped().len(),
        "Run finished"
    );
    result
}

/// Run one node operation, converting every way it can end into a
/// per-node outcome.
async fn dispatch<'a, S, D>(
    index: usize,
    node: &'a Node<S, D>,
    ctx: &'a OrchestratorContext<S, D>,
    limit: Option<Duration>,
) -> (usize, Result<(), NodeExecutionError>) {
    let operation = AssertUnwindSafe(node.action().execute(ctx)).catch_unwind();

    let finished = match limit {
        Some(limit) => match timeout(limit, operation).await {
            Ok(finished) => finished,
            Err(_) => {
                return (
                    index,
                    Err(NodeExecutionError::TimedOut {
                        limit_ms: limit.as_millis() as u64,
                    }),
                )
            }
        },
        None => operation.await,
    };

    let outcome = match finished {
        Ok(Ok(NodeState::Success)) => Ok(()),
        Ok(Ok(state)) => Err(NodeExecutionError::Returned {
            reason: state.reason().unwrap_or("node did not succeed").to_string(),
        }),
        Ok(Err(err)) => Err(NodeExecutionError::Errored {
            message: format!("{err:#}"),
        }),
        Err(panic) => Err(NodeExecutionError::Panicked {
            message: panic_message(panic.as_ref()),
        }),
    };
    (index, outcome)
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
