//! Branch resolver
//!
//! At every fan-out one child is chosen as active by a [`BranchPolicy`];
//! every other child's whole subtree is marked inactive, whatever markers
//! it carries.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

use super::{Diagnostics, Node, NodeIx};

/// Strategy choosing the active child at a fan-out.
pub trait BranchPolicy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Pick the active child among `children` (at least two, in file order).
    /// Returns the chosen child's id.
    fn choose_active<'a>(&self, children: &[&'a Node]) -> Option<&'a str>;
}

/// Explicit marker first, then the latest child in file order.
#[derive(Debug, Clone, Copy, Default)]
pub struct LatestWins;

/// Explicit marker first, otherwise keep the original (earliest) child.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkerOnly;

/// Explicit marker first, then the greatest timestamp; ties go to position.
#[derive(Debug, Clone, Copy, Default)]
pub struct LatestTimestamp;

fn latest_marked<'a>(children: &[&'a Node]) -> Option<&'a Node> {
    children
        .iter()
        .copied()
        .filter(|n| n.record.active_marker)
        .max_by_key(|n| n.position())
}

impl BranchPolicy for LatestWins {
    fn name(&self) -> &'static str {
        "latest"
    }

    fn choose_active<'a>(&self, children: &[&'a Node]) -> Option<&'a str> {
        latest_marked(children)
            .or_else(|| children.iter().copied().max_by_key(|n| n.position()))
            .map(Node::id)
    }
}

impl BranchPolicy for MarkerOnly {
    fn name(&self) -> &'static str {
        "marker-only"
    }

    fn choose_active<'a>(&self, children: &[&'a Node]) -> Option<&'a str> {
        latest_marked(children)
            .or_else(|| children.iter().copied().min_by_key(|n| n.position()))
            .map(Node::id)
    }
}

impl BranchPolicy for LatestTimestamp {
    fn name(&self) -> &'static str {
        "timestamp"
    }

    fn choose_active<'a>(&self, children: &[&'a Node]) -> Option<&'a str> {
        latest_marked(children)
            .or_else(|| {
                children
                    .iter()
                    .copied()
                    .max_by_key(|n| (n.record.timestamp, n.position()))
            })
            .map(Node::id)
    }
}

/// Config-level selector for the built-in policies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BranchPolicyKind {
    #[default]
    Latest,
    MarkerOnly,
    Timestamp,
}

impl BranchPolicyKind {
    pub fn build(self) -> Arc<dyn BranchPolicy> {
        match self {
            BranchPolicyKind::Latest => Arc::new(LatestWins),
            BranchPolicyKind::MarkerOnly => Arc::new(MarkerOnly),
            BranchPolicyKind::Timestamp => Arc::new(LatestTimestamp),
        }
    }
}

/// One iterative depth-first pass from every root.
pub(crate) fn resolve(
    nodes: &mut [Node],
    roots: &[NodeIx],
    policy: &dyn BranchPolicy,
    diagnostics: &mut Diagnostics,
) {
    let mut visited = vec![false; nodes.len()];
    let mut stack: Vec<(NodeIx, bool)> = Vec::with_capacity(roots.len());

    for &root in roots.iter().rev() {
        nodes[root.0].is_selected = true;
        stack.push((root, true));
    }

    while let Some((ix, active)) = stack.pop() {
        if visited[ix.0] {
            continue;
        }
        visited[ix.0] = true;
        nodes[ix.0].is_active = active;

        let children = nodes[ix.0].children.clone();
        let winner = if children.len() > 1 {
            let candidates: Vec<&Node> = children.iter().map(|c| &nodes[c.0]).collect();
            let marked = candidates.iter().filter(|n| n.record.active_marker).count();
            if marked > 1 {
                warn!(
                    "Fan-out at {} has {} children marked active",
                    nodes[ix.0].id(),
                    marked
                );
                diagnostics
                    .conflicting_markers
                    .push(nodes[ix.0].id().to_string());
            }
            let chosen = policy
                .choose_active(&candidates)
                .and_then(|id| children.iter().copied().find(|c| nodes[c.0].id() == id));
            chosen.or_else(|| children.last().copied())
        } else {
            children.first().copied()
        };

        for &child in children.iter().rev() {
            let selected = Some(child) == winner;
            nodes[child.0].is_selected = selected;
            stack.push((child, active && selected));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::testing::rec;
    use crate::graph::{DelegationRules, Graph, GraphBuilder};
    use crate::record::{Record, RecordKind::*};

    fn build_with(records: Vec<Record>, policy: &dyn BranchPolicy) -> Graph {
        let mut builder = GraphBuilder::new();
        for record in records {
            builder.push(record);
        }
        builder.finish(policy, &DelegationRules::default())
    }

    fn fan_out() -> Vec<Record> {
        vec![
            rec("a", None, Human, 1),
            rec("b", Some("a"), Assistant, 2),
            rec("c", Some("a"), Assistant, 3),
            rec("b1", Some("b"), Human, 4),
            rec("b2", Some("b"), Human, 5),
            rec("c1", Some("c"), Human, 6),
        ]
    }

    #[test]
    fn test_latest_child_wins() {
        let graph = Graph::from_records(fan_out());

        assert!(graph.node("c").unwrap().is_active);
        assert!(graph.node("c1").unwrap().is_active);
        assert!(!graph.node("b").unwrap().is_active);
        assert!(!graph.node("b1").unwrap().is_active);
        assert!(!graph.node("b2").unwrap().is_active);
    }

    #[test]
    fn test_loser_markers_are_overridden() {
        let mut records = fan_out();
        records[3].active_marker = true; // b1, inside the losing subtree
        let graph = Graph::from_records(records);

        assert!(!graph.node("b1").unwrap().is_active);
        assert!(graph.node("b1").unwrap().is_selected);
        assert!(!graph.node("b2").unwrap().is_selected);
    }

    #[test]
    fn test_marker_beats_position() {
        let mut records = fan_out();
        records[1].active_marker = true; // b
        let graph = Graph::from_records(records);

        assert!(graph.node("b").unwrap().is_active);
        assert!(!graph.node("c").unwrap().is_active);
        assert!(graph.node("b2").unwrap().is_active);
        assert!(!graph.node("b1").unwrap().is_active);
    }

    #[test]
    fn test_conflicting_markers_are_reported() {
        let mut records = fan_out();
        records[1].active_marker = true;
        records[2].active_marker = true;
        let graph = Graph::from_records(records);

        assert_eq!(graph.diagnostics().conflicting_markers, vec!["a".to_string()]);
        assert!(graph.node("c").unwrap().is_active);
        assert!(!graph.node("b").unwrap().is_active);
    }

    #[test]
    fn test_marker_only_keeps_original_branch() {
        let graph = build_with(fan_out(), &MarkerOnly);
        assert!(graph.node("b").unwrap().is_active);
        assert!(graph.node("b1").unwrap().is_active);
        assert!(!graph.node("c").unwrap().is_active);
    }

    #[test]
    fn test_timestamp_policy() {
        let mut records = fan_out();
        records[1].timestamp = 99_000; // b is newer than c
        let graph = build_with(records, &LatestTimestamp);
        assert!(graph.node("b").unwrap().is_active);
        assert!(!graph.node("c").unwrap().is_active);
    }

    #[test]
    fn test_exactly_one_selected_per_fan_out() {
        let graph = Graph::from_records(fan_out());
        for node in graph.nodes() {
            if node.children.len() > 1 {
                let selected = node
                    .children
                    .iter()
                    .filter(|&&c| graph.get(c).is_selected)
                    .count();
                assert_eq!(selected, 1, "fan-out at {}", node.id());
            }
        }
    }

    #[test]
    fn test_policy_kind_parsing() {
        let kind: BranchPolicyKind = serde_yaml::from_str("marker-only").unwrap();
        assert_eq!(kind, BranchPolicyKind::MarkerOnly);
        assert_eq!(kind.build().name(), "marker-only");
    }
}
