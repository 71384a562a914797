//! Read-only queries over a finished graph
//!
//! Every query borrows the graph immutably, so any number of them can run
//! concurrently against a shared `Arc<Graph>`. Traversals keep visited sets
//! and are iterative, so they terminate on any input.

mod stats;
mod tools;

pub use stats::Statistics;
pub use tools::{ToolSample, ToolUsage, DEFAULT_SAMPLE_LIMIT};

use serde::Serialize;
use std::collections::VecDeque;

use crate::error::QueryError;
use crate::graph::{Compaction, Graph, NodeIx};
use crate::record::RecordKind;

/// Chain of active nodes from a start node down to its deepest active leaf
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActivePath {
    pub root: String,
    pub ids: Vec<String>,
}

impl ActivePath {
    pub fn leaf(&self) -> Option<&str> {
        self.ids.last().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// One delegated sub-conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Sidechain {
    /// Node whose invocation spawned the sidechain; `None` for parentless roots
    pub delegation: Option<String>,
    pub root: String,
    pub agent: String,
    /// Deepest `sidechain_depth` among the members
    pub max_depth: u32,
    /// Members in breadth-first order, starting at the root
    pub ids: Vec<String>,
}

impl Graph {
    /// Follow active children from `root_id` until none remain.
    pub fn active_path(&self, root_id: &str) -> Result<ActivePath, QueryError> {
        let start = self
            .ix(root_id)
            .ok_or_else(|| QueryError::UnknownNode(root_id.to_string()))?;
        Ok(self.active_path_from(start))
    }

    fn active_path_from(&self, start: NodeIx) -> ActivePath {
        let mut visited = vec![false; self.nodes.len()];
        let mut ids = vec![];
        let mut current = Some(start);

        while let Some(ix) = current {
            if visited[ix.0] {
                break;
            }
            visited[ix.0] = true;
            let node = self.get(ix);
            ids.push(node.id().to_string());
            current = node
                .children
                .iter()
                .copied()
                .filter(|&c| self.get(c).is_active)
                .max_by_key(|&c| self.get(c).position());
        }

        ActivePath {
            root: self.get(start).id().to_string(),
            ids,
        }
    }

    /// Active path of every root, in root order
    pub fn active_paths(&self) -> Vec<ActivePath> {
        self.roots
            .iter()
            .map(|&root| self.active_path_from(root))
            .collect()
    }

    /// The "current" conversation: the root whose active leaf comes last in
    /// file order. `None` for an empty graph.
    pub fn current_path(&self) -> Option<ActivePath> {
        self.active_paths().into_iter().max_by_key(|path| {
            path.leaf()
                .and_then(|id| self.node(id))
                .map(|n| n.position())
                .unwrap_or(0)
        })
    }

    /// Sidechains spawned from `delegation_id`, in file order.
    pub fn get_sidechain(&self, delegation_id: &str) -> Result<Vec<Sidechain>, QueryError> {
        let node = self
            .node(delegation_id)
            .ok_or_else(|| QueryError::UnknownNode(delegation_id.to_string()))?;

        let sidechains: Vec<Sidechain> = node
            .children
            .iter()
            .copied()
            .filter(|&c| self.get(c).is_sidechain() && !node.is_sidechain())
            .map(|root| self.collect_sidechain(root))
            .collect();

        if sidechains.is_empty() {
            return Err(QueryError::NotADelegation(delegation_id.to_string()));
        }
        Ok(sidechains)
    }

    /// Every sidechain in the graph, in file order of their roots
    pub fn sidechains(&self) -> Vec<Sidechain> {
        self.sidechain_roots
            .iter()
            .map(|&root| self.collect_sidechain(root))
            .collect()
    }

    /// Breadth-first from the root; a branch stops where `is_sidechain`
    /// flips back to false.
    fn collect_sidechain(&self, root: NodeIx) -> Sidechain {
        let mut visited = vec![false; self.nodes.len()];
        let mut queue = VecDeque::from([root]);
        let mut ids = vec![];
        let mut max_depth = 0;
        visited[root.0] = true;

        while let Some(ix) = queue.pop_front() {
            let node = self.get(ix);
            ids.push(node.id().to_string());
            max_depth = max_depth.max(node.sidechain_depth);
            for &child in &node.children {
                if !visited[child.0] && self.get(child).is_sidechain() {
                    visited[child.0] = true;
                    queue.push_back(child);
                }
            }
        }

        let root_node = self.get(root);
        Sidechain {
            delegation: root_node.parent.map(|p| self.get(p).id().to_string()),
            root: root_node.id().to_string(),
            agent: root_node
                .sidechain_agent
                .clone()
                .unwrap_or_else(|| crate::graph::UNKNOWN_AGENT.to_string()),
            max_depth,
            ids,
        }
    }

    pub fn compactions(&self) -> &[Compaction] {
        &self.compactions
    }

    /// Nearest compaction boundary preceding `id`: the closest boundary
    /// among its ancestors (itself included), else the last boundary earlier
    /// in file order.
    pub fn nearest_compaction(&self, id: &str) -> Result<Option<&Compaction>, QueryError> {
        let start = self
            .ix(id)
            .ok_or_else(|| QueryError::UnknownNode(id.to_string()))?;

        let mut visited = vec![false; self.nodes.len()];
        let mut current = Some(start);
        while let Some(ix) = current {
            if visited[ix.0] {
                break;
            }
            visited[ix.0] = true;
            if self.get(ix).kind() == RecordKind::CompactPrelude {
                return Ok(self.compactions.iter().find(|c| c.boundary == ix));
            }
            current = self.get(ix).parent;
        }

        let position = self.get(start).position();
        Ok(self
            .compactions
            .iter()
            .filter(|c| self.get(c.boundary).position() < position)
            .max_by_key(|c| self.get(c.boundary).position()))
    }

    /// Longest root-to-leaf chain, counted in nodes
    pub fn max_depth(&self) -> usize {
        let mut visited = vec![false; self.nodes.len()];
        let mut stack: Vec<(NodeIx, usize)> = self.roots.iter().map(|&r| (r, 1)).collect();
        let mut max = 0;

        while let Some((ix, depth)) = stack.pop() {
            if visited[ix.0] {
                continue;
            }
            visited[ix.0] = true;
            max = max.max(depth);
            for &child in &self.get(ix).children {
                stack.push((child, depth + 1));
            }
        }

        max
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::testing::{rec, tool_use};
    use crate::record::{Record, RecordKind::*};
    use serde_json::json;

    fn side(id: &str, parent: &str, kind: RecordKind, position: usize) -> Record {
        let mut record = rec(id, Some(parent), kind, position);
        record.is_sidechain = true;
        record
    }

    #[test]
    fn test_active_path_follows_latest_branch() {
        let graph = Graph::from_records(vec![
            rec("a", None, Human, 1),
            rec("b", Some("a"), Assistant, 2),
            rec("c", Some("a"), Assistant, 3),
            rec("d", Some("c"), Human, 4),
            rec("e", Some("b"), Human, 5),
        ]);

        let path = graph.active_path("a").unwrap();
        assert_eq!(path.ids, vec!["a", "c", "d"]);
        assert_eq!(path.leaf(), Some("d"));
        assert!(matches!(
            graph.active_path("nope"),
            Err(QueryError::UnknownNode(_))
        ));
    }

    #[test]
    fn test_current_path_picks_latest_root() {
        let graph = Graph::from_records(vec![
            rec("a", None, Human, 1),
            rec("b", Some("a"), Assistant, 2),
            rec("cb", None, CompactPrelude, 3),
            rec("cr", Some("cb"), CompactRecap, 4),
            rec("d", Some("cr"), Human, 5),
        ]);

        let current = graph.current_path().unwrap();
        assert_eq!(current.root, "cb");
        assert_eq!(current.ids, vec!["cb", "cr", "d"]);
        assert!(Graph::from_records(vec![]).current_path().is_none());
    }

    #[test]
    fn test_sidechain_extraction_stops_at_main_conversation() {
        let mut m = rec("m", None, Assistant, 1);
        m.payload = vec![tool_use("t1", "Task", json!({"subagent_type": "bug-hunter"}))];
        let graph = Graph::from_records(vec![
            m,
            side("s1", "m", Human, 2),
            side("s2", "s1", Assistant, 3),
            side("s3", "s1", Assistant, 4),
            rec("back", Some("s2"), ToolResult, 5),
            rec("after", Some("back"), Assistant, 6),
        ]);

        let sidechains = graph.get_sidechain("m").unwrap();
        assert_eq!(sidechains.len(), 1);
        let sc = &sidechains[0];
        assert_eq!(sc.delegation.as_deref(), Some("m"));
        assert_eq!(sc.root, "s1");
        assert_eq!(sc.agent, "bug-hunter");
        assert_eq!(sc.max_depth, 2);
        assert_eq!(sc.ids, vec!["s1", "s2", "s3"]);

        assert!(matches!(
            graph.get_sidechain("back"),
            Err(QueryError::NotADelegation(_))
        ));
        // Sidechain members spawning sidechain children are not delegations
        assert!(matches!(
            graph.get_sidechain("s1"),
            Err(QueryError::NotADelegation(_))
        ));
        assert_eq!(graph.sidechains().len(), 1);
    }

    #[test]
    fn test_nearest_compaction() {
        let graph = Graph::from_records(vec![
            rec("a", None, Human, 1),
            rec("cb1", None, CompactPrelude, 2),
            rec("cr1", Some("cb1"), CompactRecap, 3),
            rec("x", Some("cr1"), Human, 4),
            rec("late", Some("a"), Assistant, 5),
            rec("cb2", None, CompactPrelude, 6),
            rec("cr2", Some("cb2"), CompactRecap, 7),
        ]);

        let near = |id: &str| {
            graph
                .nearest_compaction(id)
                .unwrap()
                .map(|c| graph.get(c.boundary).id().to_string())
        };
        assert_eq!(near("x").as_deref(), Some("cb1"));
        assert_eq!(near("cr2").as_deref(), Some("cb2"));
        assert_eq!(near("late").as_deref(), Some("cb1"));
        assert_eq!(near("a"), None);
    }

    #[test]
    fn test_max_depth() {
        let graph = Graph::from_records(vec![
            rec("a", None, Human, 1),
            rec("b", Some("a"), Assistant, 2),
            rec("c", Some("b"), Human, 3),
            rec("o", Some("gone"), Human, 4),
        ]);
        assert_eq!(graph.max_depth(), 3);
        assert_eq!(Graph::from_records(vec![]).max_depth(), 0);
    }
}
