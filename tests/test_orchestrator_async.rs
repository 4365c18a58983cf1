use async_trait::async_trait;
use pretty_assertions::assert_eq;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::{sleep, Instant};

use tidydag::{
    CancelReason, CancellationToken, Node, NodeAction, NodeExecutionError, NodeState, NodeStatus,
    Orchestrator, OrchestratorConfig, OrchestratorContext, RunOutcome,
};

/// Shared state for the timing tests.
#[derive(Default)]
struct Timeline {
    flow: Mutex<Vec<String>>,
    active: AtomicUsize,
    peak: AtomicUsize,
}

/// Sleeps for `wait`, then records its name.
struct Sleeper {
    name: &'static str,
    wait: Duration,
}

fn sleeper(name: &'static str, wait_ms: u64) -> Node<Timeline, ()> {
    Node::new(
        name,
        Sleeper {
            name,
            wait: Duration::from_millis(wait_ms),
        },
    )
}

#[async_trait]
impl NodeAction<Timeline, ()> for Sleeper {
    async fn execute(&self, ctx: &OrchestratorContext<Timeline>) -> anyhow::Result<NodeState> {
        let now_active = ctx.state.active.fetch_add(1, Ordering::SeqCst) + 1;
        ctx.state.peak.fetch_max(now_active, Ordering::SeqCst);

        sleep(self.wait).await;

        ctx.state.active.fetch_sub(1, Ordering::SeqCst);
        ctx.state.flow.lock().unwrap().push(self.name.to_string());
        Ok(NodeState::Success)
    }
}

fn flow(ctx: &OrchestratorContext<Timeline>) -> Vec<String> {
    ctx.state.flow.lock().unwrap().clone()
}

/// Completion order follows the sleeps once dependencies allow it.
#[tokio::test(start_paused = true)]
async fn test_orchestrator_order() {
    let mut orchestrator = Orchestrator::new();
    orchestrator
        .add_nodes([
            sleeper("a", 100),
            sleeper("b", 200).with_parent("a"),
            sleeper("c", 300).with_parent("a"),
            sleeper("d", 100).with_parents(["b", "c"]),
        ])
        .unwrap();

    let ctx = OrchestratorContext::with_state(Timeline::default());
    let result = orchestrator.run(&ctx).await.unwrap();

    assert!(result.is_success());
    assert_eq!(flow(&ctx), vec!["a", "b", "c", "d"]);
    assert_eq!(result.completion_order, vec!["a", "b", "c", "d"]);
    assert_eq!(result.last_node(), Some("d"));
}

/// Independent roots overlap instead of running back to back.
#[tokio::test(start_paused = true)]
async fn test_siblings_run_concurrently() {
    let mut orchestrator = Orchestrator::new();
    orchestrator
        .add_nodes([sleeper("a", 100), sleeper("b", 100), sleeper("c", 100)])
        .unwrap();

    let ctx = OrchestratorContext::with_state(Timeline::default());
    let start = Instant::now();
    let result = orchestrator.run(&ctx).await.unwrap();

    assert!(result.is_success());
    assert!(start.elapsed() < Duration::from_millis(150));
    assert_eq!(ctx.state.peak.load(Ordering::SeqCst), 3);
}

/// A child starts as soon as its own parents finish, not when a whole layer
/// does.
#[tokio::test(start_paused = true)]
async fn test_child_does_not_wait_for_unrelated_nodes() {
    let mut orchestrator = Orchestrator::new();
    orchestrator
        .add_nodes([
            sleeper("fast", 10),
            sleeper("slow", 500),
            sleeper("after_fast", 10).with_parent("fast"),
        ])
        .unwrap();

    let ctx = OrchestratorContext::with_state(Timeline::default());
    let result = orchestrator.run(&ctx).await.unwrap();

    assert_eq!(result.completion_order, vec!["fast", "after_fast", "slow"]);
}

/// `max_parallel_nodes` bounds how many operations are in flight.
#[tokio::test(start_paused = true)]
async fn test_max_parallel_nodes() {
    let config = OrchestratorConfig::builder()
        .max_parallel_nodes(2)
        .build()
        .unwrap();
    let mut orchestrator = Orchestrator::with_config(config).unwrap();
    orchestrator
        .add_nodes((0..6).map(|i| {
            let name: &'static str = ["n0", "n1", "n2", "n3", "n4", "n5"][i];
            sleeper(name, 50)
        }))
        .unwrap();

    let ctx = OrchestratorContext::with_state(Timeline::default());
    let start = Instant::now();
    let result = orchestrator.run(&ctx).await.unwrap();

    assert!(result.is_success());
    assert_eq!(ctx.state.peak.load(Ordering::SeqCst), 2);
    assert!(start.elapsed() >= Duration::from_millis(150));
}

/// A node over its deadline fails and its descendants are skipped.
#[tokio::test(start_paused = true)]
async fn test_node_timeout() {
    let config = OrchestratorConfig::builder()
        .node_timeout(Duration::from_millis(500))
        .build()
        .unwrap();
    let mut orchestrator = Orchestrator::with_config(config).unwrap();
    orchestrator
        .add_nodes([
            sleeper("stuck", 10_000).with_timeout(Duration::from_millis(100)),
            sleeper("after_stuck", 10).with_parent("stuck"),
            sleeper("slowish", 1_000),
            sleeper("quick", 10),
        ])
        .unwrap();

    let ctx = OrchestratorContext::with_state(Timeline::default());
    let result = orchestrator.run(&ctx).await.unwrap();

    assert_eq!(
        result.record("stuck").and_then(|r| r.error.clone()),
        Some(NodeExecutionError::TimedOut { limit_ms: 100 })
    );
    assert_eq!(
        result.record("slowish").and_then(|r| r.error.clone()),
        Some(NodeExecutionError::TimedOut { limit_ms: 500 })
    );
    assert_eq!(result.status("after_stuck"), Some(NodeStatus::Skipped));
    assert_eq!(result.status("quick"), Some(NodeStatus::Success));
    assert_eq!(flow(&ctx), vec!["quick"]);
}

/// Cancelling mid-run drops in-flight nodes and skips the rest.
#[tokio::test(start_paused = true)]
async fn test_cancellation() {
    let mut orchestrator = Orchestrator::new();
    orchestrator
        .add_nodes([
            sleeper("quick", 10),
            sleeper("long", 10_000),
            sleeper("after_long", 10).with_parent("long"),
        ])
        .unwrap();

    let ctx = OrchestratorContext::with_state(Timeline::default());
    let token = CancellationToken::new();
    let (result, _) = tokio::join!(orchestrator.run_with_cancel(&ctx, token.clone()), async {
        sleep(Duration::from_millis(100)).await;
        token.cancel();
    });
    let result = result.unwrap();

    assert_eq!(
        result.outcome,
        RunOutcome::Cancelled {
            reason: CancelReason::Requested,
            failed: vec!["long".to_string()],
            skipped: vec!["after_long".to_string()],
        }
    );
    assert_eq!(
        result.record("long").and_then(|r| r.error.clone()),
        Some(NodeExecutionError::Cancelled)
    );
    assert_eq!(result.status("quick"), Some(NodeStatus::Success));
    assert_eq!(flow(&ctx), vec!["quick"]);
}

/// A token cancelled up front means no node runs at all.
#[tokio::test(start_paused = true)]
async fn test_cancelled_before_start() {
    let mut orchestrator = Orchestrator::new();
    orchestrator
        .add_nodes([sleeper("a", 10), sleeper("b", 10).with_parent("a")])
        .unwrap();

    let token = CancellationToken::new();
    token.cancel();
    let ctx = OrchestratorContext::with_state(Timeline::default());
    let result = orchestrator.run_with_cancel(&ctx, token).await.unwrap();

    assert!(result.is_cancelled());
    assert_eq!(result.skipped(), vec!["a", "b"]);
    assert!(flow(&ctx).is_empty());
}

/// The run deadline cancels whatever is still going.
#[tokio::test(start_paused = true)]
async fn test_run_deadline() {
    let config = OrchestratorConfig::builder()
        .run_timeout(Duration::from_millis(200))
        .build()
        .unwrap();
    let mut orchestrator = Orchestrator::with_config(config).unwrap();
    orchestrator
        .add_nodes([
            sleeper("a", 50),
            sleeper("b", 1_000).with_parent("a"),
            sleeper("c", 50).with_parent("b"),
        ])
        .unwrap();

    let ctx = OrchestratorContext::with_state(Timeline::default());
    let start = Instant::now();
    let result = orchestrator.run(&ctx).await.unwrap();

    assert!(start.elapsed() < Duration::from_millis(300));
    assert_eq!(
        result.outcome,
        RunOutcome::Cancelled {
            reason: CancelReason::DeadlineExceeded,
            failed: vec!["b".to_string()],
            skipped: vec!["c".to_string()],
        }
    );
    assert_eq!(flow(&ctx), vec!["a"]);
}

/// Node records carry timing information.
#[tokio::test(start_paused = true)]
async fn test_node_records_timing() {
    let mut orchestrator = Orchestrator::new();
    orchestrator
        .add_nodes([sleeper("a", 120), sleeper("b", 10).with_parent("a")])
        .unwrap();

    let ctx = OrchestratorContext::with_state(Timeline::default());
    let result = orchestrator.run(&ctx).await.unwrap();

    let a = result.record("a").unwrap();
    assert!(a.elapsed_ms.unwrap() >= 120);
    assert!(a.started_at.is_some());
    assert!(a.finished_at >= a.started_at);
    assert!(result.finished_at >= result.started_at);
}
