use chrono::Utc;
use tokio::time::Instant;
use tracing::debug;
use uuid::Uuid;

use super::ready_queue::ReadyQueue;
use super::report::{CancelReason, NodeRecord, RunResult};
use crate::core::errors::NodeExecutionError;
use crate::graph::DependencyGraph;
use crate::node::NodeStatus;

/// Live state of a single run.
///
/// Tracks every node's status and the number of parents that have not yet
/// succeeded. A node enters the ready queue when that count reaches zero,
/// and leaves `Pending` exactly once.
pub struct Scheduler<'g> {
    graph: &'g DependencyGraph,
    statuses: Vec<NodeStatus>,
    /// Parents of each node that have not yet succeeded.
    unmet: Vec<usize>,
    ready: ReadyQueue,
    records: Vec<NodeRecord>,
    started: Vec<Option<Instant>>,
    completion_order: Vec<usize>,
    running: usize,
}

impl<'g> Scheduler<'g> {
    /// Create the run state, with every root queued in registration order.
    pub fn new(graph: &'g DependencyGraph) -> Self {
        let len = graph.len();
        let mut ready = ReadyQueue::new(len);
        for root in graph.roots() {
            ready.push(root);
        }
        Self {
            graph,
            statuses: vec![NodeStatus::Pending; len],
            unmet: (0..len).map(|index| graph.parent_count(index)).collect(),
            ready,
            records: (0..len)
                .map(|index| NodeRecord::pending(graph.name(index)))
                .collect(),
            started: vec![None; len],
            completion_order: Vec::new(),
            running: 0,
        }
    }

    /// Take the next ready node and mark it `Running`.
    pub fn next_ready(&mut self) -> Option<usize> {
        while let Some(index) = self.ready.pop() {
            if self.statuses[index] != NodeStatus::Pending {
                continue;
            }
            self.statuses[index] = NodeStatus::Running;
            self.records[index].status = NodeStatus::Running;
            self.records[index].started_at = Some(Utc::now());
            self.started[index] = Some(Instant::now());
            self.running += 1;
            return Some(index);
        }
        None
    }

    /// Record the outcome of a running node.
    ///
    /// On success, children whose parents have all succeeded are queued. On
    /// failure, every pending descendant is skipped; the skipped indices are
    /// returned.
    pub fn complete(&mut self, index: usize, outcome: Result<(), NodeExecutionError>) -> Vec<usize> {
        if self.statuses[index] != NodeStatus::Running {
            debug!(
                node = self.graph.name(index),
                status = %self.statuses[index],
                "Ignoring completion for node that is not running"
            );
            return Vec::new();
        }
        self.running -= 1;
        self.completion_order.push(index);
        self.finish_record(index);

        match outcome {
            Ok(()) => {
                self.set_status(index, NodeStatus::Success);
                for &child in self.graph.children(index) {
                    self.unmet[child] -= 1;
                    if self.unmet[child] == 0 && self.statuses[child] == NodeStatus::Pending {
                        self.ready.push(child);
                    }
                }
                Vec::new()
            }
            Err(err) => {
                self.set_status(index, NodeStatus::Failed);
                self.records[index].error = Some(err);
                self.skip_descendants(index)
            }
        }
    }

    /// Skip every pending strict descendant of `index`.
    pub fn skip_descendants(&mut self, index: usize) -> Vec<usize> {
        let skipped: Vec<usize> = self
            .graph
            .descendants(index)
            .into_iter()
            .filter(|&descendant| self.statuses[descendant] == NodeStatus::Pending)
            .collect();
        for &descendant in &skipped {
            self.set_status(descendant, NodeStatus::Skipped);
        }
        skipped
    }

    /// Skip every node still pending, queued or not.
    pub fn skip_pending(&mut self) -> Vec<usize> {
        self.ready.drain();
        let skipped: Vec<usize> = (0..self.statuses.len())
            .filter(|&index| self.statuses[index] == NodeStatus::Pending)
            .collect();
        for &index in &skipped {
            self.set_status(index, NodeStatus::Skipped);
        }
        skipped
    }

    /// Fail every running node with `NodeExecutionError::Cancelled`.
    pub fn cancel_running(&mut self) -> Vec<usize> {
        let cancelled: Vec<usize> = (0..self.statuses.len())
            .filter(|&index| self.statuses[index] == NodeStatus::Running)
            .collect();
        for &index in &cancelled {
            self.finish_record(index);
            self.set_status(index, NodeStatus::Failed);
            self.records[index].error = Some(NodeExecutionError::Cancelled);
        }
        self.running = 0;
        cancelled
    }

    pub fn record(&self, index: usize) -> &NodeRecord {
        &self.records[index]
    }

    pub fn status(&self, index: usize) -> NodeStatus {
        self.statuses[index]
    }

    pub fn running(&self) -> usize {
        self.running
    }

    pub fn has_ready(&self) -> bool {
        !self.ready.is_empty()
    }

    /// True once every node has reached a terminal status.
    pub fn is_quiescent(&self) -> bool {
        self.statuses.iter().all(NodeStatus::is_terminal)
    }

    pub fn into_result(
        self,
        run_id: Uuid,
        started_at: chrono::DateTime<Utc>,
        cancelled: Option<CancelReason>,
    ) -> RunResult {
        let completion_order = self
            .completion_order
            .iter()
            .map(|&index| self.graph.name(index).to_string())
            .collect();
        RunResult::assemble(run_id, self.records, completion_order, started_at, cancelled)
    }

    fn set_status(&mut self, index: usize, status: NodeStatus) {
        self.statuses[index] = status;
        self.records[index].status = status;
    }

    fn finish_record(&mut self, index: usize) {
        let record = &mut self.records[index];
        record.finished_at = Some(Utc::now());
        record.elapsed_ms = self.started[index].map(|start| start.elapsed().as_millis() as u64);
    }
}
