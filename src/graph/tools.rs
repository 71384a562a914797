//! Tool correlator
//!
//! Matches tool invocations to their results by invocation id over the
//! whole graph, so a result any distance downstream (or even upstream)
//! of its invocation still resolves. A graph holds one session, so
//! invocation ids are scoped to that session.

use std::collections::HashMap;
use tracing::{debug, warn};

use super::{Node, NodeIx};

/// Resolution state of one invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolResolution {
    Pending,
    Resolved { result_node: NodeIx, ok: bool },
}

/// One invocation and what became of it
#[derive(Debug, Clone)]
pub struct ToolLink {
    pub invocation_id: String,
    pub name: String,
    pub owner: NodeIx,
    pub resolution: ToolResolution,
}

impl ToolLink {
    pub fn is_pending(&self) -> bool {
        self.resolution == ToolResolution::Pending
    }
}

/// invocation id -> invocation owner and result
#[derive(Debug, Clone, Default)]
pub struct ToolIndex {
    links: HashMap<String, ToolLink>,
    /// Invocation ids in file order
    order: Vec<String>,
    /// Results whose invocation id was never seen
    pub unmatched_results: Vec<(String, NodeIx)>,
    /// Results for an invocation that already had one; the first wins
    pub duplicate_results: Vec<(String, NodeIx)>,
    /// Invocation ids declared more than once; the first wins
    pub duplicate_invocations: Vec<(String, NodeIx)>,
}

impl ToolIndex {
    pub fn get(&self, invocation_id: &str) -> Option<&ToolLink> {
        self.links.get(invocation_id)
    }

    /// Links in invocation (file) order
    pub fn links(&self) -> impl Iterator<Item = &ToolLink> {
        self.order.iter().filter_map(|id| self.links.get(id))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn pending(&self) -> impl Iterator<Item = &ToolLink> {
        self.links().filter(|link| link.is_pending())
    }
}

pub(crate) fn correlate(nodes: &[Node]) -> ToolIndex {
    let mut index = ToolIndex::default();

    for (i, node) in nodes.iter().enumerate() {
        for invocation in &node.tool_invocations {
            if index.links.contains_key(&invocation.invocation_id) {
                warn!(
                    "Duplicate tool invocation id {} in record {}",
                    invocation.invocation_id,
                    node.id()
                );
                index
                    .duplicate_invocations
                    .push((invocation.invocation_id.clone(), NodeIx(i)));
                continue;
            }
            index.order.push(invocation.invocation_id.clone());
            index.links.insert(
                invocation.invocation_id.clone(),
                ToolLink {
                    invocation_id: invocation.invocation_id.clone(),
                    name: invocation.name.clone(),
                    owner: NodeIx(i),
                    resolution: ToolResolution::Pending,
                },
            );
        }
    }

    for (i, node) in nodes.iter().enumerate() {
        for outcome in &node.tool_results {
            match index.links.get_mut(&outcome.invocation_id) {
                Some(link) if link.is_pending() => {
                    link.resolution = ToolResolution::Resolved {
                        result_node: NodeIx(i),
                        ok: outcome.ok,
                    };
                }
                Some(_) => {
                    index
                        .duplicate_results
                        .push((outcome.invocation_id.clone(), NodeIx(i)));
                }
                None => {
                    debug!(
                        "Tool result {} in record {} has no matching invocation",
                        outcome.invocation_id,
                        node.id()
                    );
                    index
                        .unmatched_results
                        .push((outcome.invocation_id.clone(), NodeIx(i)));
                }
            }
        }
    }

    index
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::testing::{rec, tool_result, tool_use};
    use crate::graph::Graph;
    use crate::record::RecordKind::*;
    use serde_json::json;

    #[test]
    fn test_result_far_downstream_resolves() {
        let mut m = rec("m", None, Assistant, 1);
        m.payload = vec![tool_use("t1", "Read", json!({"path": "a.rs"}))];
        let mut side = rec("s", Some("m"), Human, 2);
        side.is_sidechain = true;
        let mut r = rec("r", Some("s"), ToolResult, 9);
        r.payload = vec![tool_result("t1", false)];

        let graph = Graph::from_records(vec![m, side, r]);
        let link = graph.tools().get("t1").unwrap();

        assert_eq!(link.name, "Read");
        assert_eq!(graph.get(link.owner).id(), "m");
        match link.resolution {
            ToolResolution::Resolved { result_node, ok } => {
                assert_eq!(graph.get(result_node).id(), "r");
                assert!(ok);
            }
            ToolResolution::Pending => panic!("expected resolution"),
        }
    }

    #[test]
    fn test_pending_unmatched_and_duplicates() {
        let mut m = rec("m", None, Assistant, 1);
        m.payload = vec![
            tool_use("t1", "Bash", json!({})),
            tool_use("t2", "Grep", json!({})),
        ];
        let mut r1 = rec("r1", Some("m"), ToolResult, 2);
        r1.payload = vec![tool_result("t1", true), tool_result("ghost", false)];
        let mut r2 = rec("r2", Some("r1"), ToolResult, 3);
        r2.payload = vec![tool_result("t1", false)];

        let graph = Graph::from_records(vec![m, r1, r2]);
        let tools = graph.tools();

        assert_eq!(tools.len(), 2);
        assert!(tools.get("t2").unwrap().is_pending());
        assert!(matches!(
            tools.get("t1").unwrap().resolution,
            ToolResolution::Resolved { ok: false, .. }
        ));
        assert_eq!(tools.unmatched_results.len(), 1);
        assert_eq!(tools.unmatched_results[0].0, "ghost");
        assert_eq!(tools.duplicate_results.len(), 1);
        assert_eq!(tools.pending().count(), 1);
    }
}
