use async_trait::async_trait;
use proptest::prelude::*;
use std::collections::{BTreeSet, HashMap};
use std::sync::Mutex;

use tidydag::{
    DependencyGraph, GraphValidationError, Node, NodeAction, NodeState, NodeStatus, Orchestrator,
    OrchestratorConfig, OrchestratorContext, ParentResolution,
};

/// Records its index each time it runs; fails if told to.
struct Tracker {
    index: usize,
    fail: bool,
}

#[async_trait]
impl NodeAction<Mutex<Vec<usize>>, ()> for Tracker {
    async fn execute(
        &self,
        ctx: &OrchestratorContext<Mutex<Vec<usize>>>,
    ) -> anyhow::Result<NodeState> {
        ctx.state.lock().unwrap().push(self.index);
        tokio::task::yield_now().await;
        if self.fail {
            Ok(NodeState::error("tracked failure"))
        } else {
            Ok(NodeState::Success)
        }
    }
}

/// A random DAG as parent lists: node `i` may only depend on nodes `< i`.
fn dag_strategy() -> impl Strategy<Value = Vec<Vec<usize>>> {
    (1usize..12).prop_flat_map(|n| {
        proptest::collection::vec(proptest::collection::vec(any::<bool>(), n), n).prop_map(
            move |matrix| {
                (0..n)
                    .map(|i| (0..i).filter(|&j| matrix[i][j]).collect())
                    .collect()
            },
        )
    })
}

fn name(index: usize) -> String {
    format!("n{index}")
}

/// Register in reverse so every parent reference is a forward reference.
fn orchestrator_for(
    parents: &[Vec<usize>],
    failing: Option<usize>,
) -> Orchestrator<Mutex<Vec<usize>>, ()> {
    let config = OrchestratorConfig::builder()
        .parent_resolution(ParentResolution::Deferred)
        .build()
        .unwrap();
    let mut orchestrator = Orchestrator::with_config(config).unwrap();
    for (index, node_parents) in parents.iter().enumerate().rev() {
        let tracker = Tracker {
            index,
            fail: failing == Some(index),
        };
        let node =
            Node::new(name(index), tracker).with_parents(node_parents.iter().map(|&p| name(p)));
        orchestrator.add_node(node).unwrap();
    }
    orchestrator
}

fn descendants(parents: &[Vec<usize>], root: usize) -> BTreeSet<usize> {
    let mut found = BTreeSet::new();
    let mut changed = true;
    while changed {
        changed = false;
        for (child, node_parents) in parents.iter().enumerate() {
            let reached = node_parents
                .iter()
                .any(|p| *p == root || found.contains(p));
            if reached && found.insert(child) {
                changed = true;
            }
        }
    }
    found
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn every_node_runs_once_after_its_parents(parents in dag_strategy()) {
        let orchestrator = orchestrator_for(&parents, None);
        let ctx = OrchestratorContext::with_state(Mutex::new(Vec::new()));
        let result = orchestrator.run_sync(&ctx).unwrap();

        prop_assert!(result.is_success());
        let flow = ctx.state.lock().unwrap().clone();
        prop_assert_eq!(flow.len(), parents.len());

        let at: HashMap<usize, usize> = flow.iter().enumerate().map(|(i, &n)| (n, i)).collect();
        prop_assert_eq!(at.len(), parents.len());
        for (child, node_parents) in parents.iter().enumerate() {
            for parent in node_parents {
                prop_assert!(at[parent] < at[&child]);
            }
        }
    }

    #[test]
    fn failure_skips_exactly_the_descendants(
        parents in dag_strategy(),
        pick in any::<prop::sample::Index>(),
    ) {
        let failing = pick.index(parents.len());
        let orchestrator = orchestrator_for(&parents, Some(failing));
        let ctx = OrchestratorContext::with_state(Mutex::new(Vec::new()));
        let result = orchestrator.run_sync(&ctx).unwrap();

        let below = descendants(&parents, failing);
        let ran: BTreeSet<usize> = ctx.state.lock().unwrap().iter().copied().collect();

        for index in 0..parents.len() {
            let status = result.status(&name(index)).unwrap();
            if index == failing {
                prop_assert_eq!(status, NodeStatus::Failed);
            } else if below.contains(&index) {
                prop_assert_eq!(status, NodeStatus::Skipped);
                prop_assert!(!ran.contains(&index));
            } else {
                prop_assert_eq!(status, NodeStatus::Success);
            }
        }
    }

    #[test]
    fn layers_place_children_below_parents(parents in dag_strategy()) {
        let named: Vec<(String, Vec<String>)> = parents
            .iter()
            .enumerate()
            .map(|(i, ps)| (name(i), ps.iter().map(|&p| name(p)).collect()))
            .collect();
        let graph = DependencyGraph::build(named.iter().map(|(n, ps)| (n.as_str(), ps))).unwrap();

        let depth: HashMap<&str, usize> = graph
            .layers()
            .into_iter()
            .enumerate()
            .flat_map(|(depth, layer)| layer.into_iter().map(move |n| (n, depth)))
            .collect();
        prop_assert_eq!(depth.len(), parents.len());
        for (n, ps) in &named {
            for p in ps {
                prop_assert!(depth[p.as_str()] < depth[n.as_str()]);
            }
        }
    }

    #[test]
    fn cycles_are_rejected_before_any_node_runs(
        parents in dag_strategy(),
        ring in 1usize..6,
    ) {
        let mut orchestrator = orchestrator_for(&parents, None);
        let ring_names: Vec<String> = (0..ring).map(|i| format!("r{i}")).collect();
        for i in 0..ring {
            let tracker = Tracker { index: 1_000 + i, fail: false };
            let node = Node::new(ring_names[i].clone(), tracker)
                .with_parent(ring_names[(i + 1) % ring].clone());
            orchestrator.add_node(node).unwrap();
        }

        let ctx = OrchestratorContext::with_state(Mutex::new(Vec::new()));
        let err = orchestrator.run_sync(&ctx).unwrap_err();

        let expected = GraphValidationError::cycle(ring_names);
        prop_assert_eq!(err.as_validation(), Some(&expected));
        prop_assert!(ctx.state.lock().unwrap().is_empty());
    }
}
