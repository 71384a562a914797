//! Session statistics

use serde::Serialize;
use std::collections::BTreeMap;

use crate::graph::Graph;
use crate::record::RecordKind;

/// Aggregate counts for one graph, including every non-fatal condition
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Statistics {
    pub nodes: usize,
    pub by_kind: BTreeMap<&'static str, usize>,
    pub roots: usize,
    pub orphans: usize,
    /// Fan-out points (parents with more than one child)
    pub branches: usize,
    pub active_nodes: usize,
    pub max_depth: usize,
    pub tool_invocations: usize,
    pub tool_results: usize,
    pub tool_errors: usize,
    pub pending_invocations: usize,
    pub unmatched_results: usize,
    pub duplicate_results: usize,
    pub duplicate_invocations: usize,
    pub sidechains: usize,
    pub max_sidechain_depth: u32,
    pub unattributed_sidechains: usize,
    pub compactions: usize,
    pub unpaired_compactions: usize,
    /// Compaction boundaries that do not start a root
    pub detached_boundaries: usize,
    pub decode_errors: usize,
    pub duplicate_ids: usize,
    pub conflicting_markers: usize,
}

impl Statistics {
    /// Zero roots: valid, but worth reporting
    pub fn is_empty_graph(&self) -> bool {
        self.roots == 0
    }

    /// Sum of all non-fatal conditions
    pub fn warnings(&self) -> usize {
        self.orphans
            + self.pending_invocations
            + self.unmatched_results
            + self.duplicate_results
            + self.duplicate_invocations
            + self.unattributed_sidechains
            + self.unpaired_compactions
            + self.detached_boundaries
            + self.decode_errors
            + self.duplicate_ids
            + self.conflicting_markers
    }
}

impl Graph {
    /// One pass over the nodes plus one depth-first pass.
    pub fn statistics(&self) -> Statistics {
        let mut stats = Statistics {
            nodes: self.nodes.len(),
            by_kind: RecordKind::ALL.iter().map(|k| (k.as_str(), 0)).collect(),
            roots: self.roots.len(),
            orphans: self.orphans.len(),
            ..Default::default()
        };

        for node in &self.nodes {
            *stats.by_kind.entry(node.kind().as_str()).or_insert(0) += 1;
            if node.children.len() > 1 {
                stats.branches += 1;
            }
            if node.is_active {
                stats.active_nodes += 1;
            }
            stats.tool_invocations += node.tool_invocations.len();
            stats.tool_results += node.tool_results.len();
            stats.tool_errors += node.tool_results.iter().filter(|r| !r.ok).count();
            stats.max_sidechain_depth = stats.max_sidechain_depth.max(node.sidechain_depth);
        }

        stats.max_depth = self.max_depth();

        let tools = self.tools();
        stats.pending_invocations = tools.pending().count();
        stats.unmatched_results = tools.unmatched_results.len();
        stats.duplicate_results = tools.duplicate_results.len();
        stats.duplicate_invocations = tools.duplicate_invocations.len();

        stats.sidechains = self.sidechain_roots.len();
        stats.compactions = self.compactions.len();

        let diagnostics = self.diagnostics();
        stats.unattributed_sidechains = diagnostics.unattributed_sidechains.len();
        stats.unpaired_compactions = diagnostics.unpaired_compactions.len();
        stats.detached_boundaries = diagnostics.detached_boundaries.len();
        stats.decode_errors = diagnostics.decode_errors.len();
        stats.duplicate_ids = diagnostics.duplicate_ids.len();
        stats.conflicting_markers = diagnostics.conflicting_markers.len();

        stats
    }
}

#[cfg(test)]
mod tests {
    use crate::graph::testing::{rec, tool_result, tool_use};
    use crate::graph::Graph;
    use crate::record::RecordKind::*;
    use serde_json::json;

    #[test]
    fn test_statistics_counts() {
        let mut m = rec("m", Some("a"), Assistant, 2);
        m.payload = vec![
            tool_use("t1", "Read", json!({})),
            tool_use("t2", "Bash", json!({})),
        ];
        let mut r = rec("r", Some("m"), ToolResult, 3);
        r.payload = vec![tool_result("t1", true), tool_result("nope", false)];

        let graph = Graph::from_records(vec![
            rec("a", None, Human, 1),
            m,
            r,
            rec("alt", Some("a"), Assistant, 4),
            rec("o", Some("ghost"), Human, 5),
            rec("cb", None, CompactPrelude, 6),
            rec("cr", Some("cb"), CompactRecap, 7),
        ]);
        let stats = graph.statistics();

        assert_eq!(stats.nodes, 7);
        assert_eq!(stats.by_kind["human"], 2);
        assert_eq!(stats.by_kind["assistant"], 2);
        assert_eq!(stats.by_kind["tool_result"], 1);
        assert_eq!(stats.roots, 3);
        assert_eq!(stats.orphans, 1);
        assert_eq!(stats.branches, 1);
        assert_eq!(stats.max_depth, 3);
        assert_eq!(stats.tool_invocations, 2);
        assert_eq!(stats.tool_results, 2);
        assert_eq!(stats.tool_errors, 1);
        assert_eq!(stats.pending_invocations, 1);
        assert_eq!(stats.unmatched_results, 1);
        assert_eq!(stats.compactions, 1);
        assert_eq!(stats.active_nodes, 5);
        assert!(!stats.is_empty_graph());
    }

    #[test]
    fn test_empty_graph_statistics() {
        let stats = Graph::from_records(vec![]).statistics();
        assert!(stats.is_empty_graph());
        assert_eq!(stats.by_kind.len(), 5);
        assert_eq!(stats.warnings(), 0);
    }
}
