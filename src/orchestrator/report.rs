use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::core::errors::NodeExecutionError;
use crate::node::NodeStatus;

/// Why a run stopped before reaching quiescence on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CancelReason {
    /// The caller's cancellation token fired.
    Requested,
    /// The configured run deadline expired.
    DeadlineExceeded,
}

/// Aggregate outcome of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunOutcome {
    /// Every node succeeded.
    Success,
    /// At least one node failed; `skipped` never ran.
    Failed {
        failed: Vec<String>,
        skipped: Vec<String>,
    },
    /// The run was cancelled; nodes in flight are listed as failed.
    Cancelled {
        reason: CancelReason,
        failed: Vec<String>,
        skipped: Vec<String>,
    },
}

/// Final state of a single node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub name: String,
    pub status: NodeStatus,
    pub error: Option<NodeExecutionError>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub elapsed_ms: Option<u64>,
}

impl NodeRecord {
    pub(crate) fn pending(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: NodeStatus::Pending,
            error: None,
            started_at: None,
            finished_at: None,
            elapsed_ms: None,
        }
    }
}

/// Result of one orchestrator run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    pub run_id: Uuid,
    pub outcome: RunOutcome,
    /// One record per node, in registration order.
    pub nodes: Vec<NodeRecord>,
    /// Names of executed nodes in the order they finished.
    pub completion_order: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunResult {
    pub(crate) fn assemble(
        run_id: Uuid,
        nodes: Vec<NodeRecord>,
        completion_order: Vec<String>,
        started_at: DateTime<Utc>,
        cancelled: Option<CancelReason>,
    ) -> Self {
        let names_with = |status: NodeStatus| -> Vec<String> {
            nodes
                .iter()
                .filter(|record| record.status == status)
                .map(|record| record.name.clone())
                .collect()
        };
        let failed = names_with(NodeStatus::Failed);
        let skipped = names_with(NodeStatus::Skipped);

        let outcome = match cancelled {
            Some(reason) => RunOutcome::Cancelled {
                reason,
                failed,
                skipped,
            },
            None if failed.is_empty() && skipped.is_empty() => RunOutcome::Success,
            None => RunOutcome::Failed { failed, skipped },
        };

        Self {
            run_id,
            outcome,
            nodes,
            completion_order,
            started_at,
            finished_at: Utc::now(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, RunOutcome::Success)
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.outcome, RunOutcome::Cancelled { .. })
    }

    pub fn record(&self, name: &str) -> Option<&NodeRecord> {
        self.nodes.iter().find(|record| record.name == name)
    }

    pub fn status(&self, name: &str) -> Option<NodeStatus> {
        self.record(name).map(|record| record.status)
    }

    /// `(name, status)` for every node, in registration order.
    pub fn statuses(&self) -> Vec<(&str, NodeStatus)> {
        self.nodes
            .iter()
            .map(|record| (record.name.as_str(), record.status))
            .collect()
    }

    pub fn succeeded(&self) -> Vec<&str> {
        self.names_with(NodeStatus::Success)
    }

    pub fn failed(&self) -> Vec<&str> {
        self.names_with(NodeStatus::Failed)
    }

    pub fn skipped(&self) -> Vec<&str> {
        self.names_with(NodeStatus::Skipped)
    }

    /// The last node to finish executing.
    pub fn last_node(&self) -> Option<&str> {
        self.completion_order.last().map(String::as_str)
    }

    /// Node errors joined one per line, or `None` if nothing failed.
    pub fn reason(&self) -> Option<String> {
        let messages: Vec<String> = self
            .nodes
            .iter()
            .filter_map(|record| {
                record
                    .error
                    .as_ref()
                    .map(|err| format!("{}: {}", record.name, err))
            })
            .collect();
        if messages.is_empty() {
            None
        } else {
            Some(messages.join("\n"))
        }
    }

    fn names_with(&self, status: NodeStatus) -> Vec<&str> {
        self.nodes
            .iter()
            .filter(|record| record.status == status)
            .map(|record| record.name.as_str())
            .collect()
    }
}

impl fmt::Display for RunResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.outcome {
            RunOutcome::Success => {
                write!(f, "run {} succeeded ({} nodes)", self.run_id, self.nodes.len())
            }
            RunOutcome::Failed { failed, skipped } => write!(
                f,
                "run {} failed; failed: [{}]; skipped: [{}]",
                self.run_id,
                failed.join(", "),
                skipped.join(", ")
            ),
            RunOutcome::Cancelled {
                reason,
                failed,
                skipped,
            } => write!(
                f,
                "run {} cancelled ({:?}); failed: [{}]; skipped: [{}]",
                self.run_id,
                reason,
                failed.join(", "),
                skipped.join(", ")
            ),
        }
    }
}
