//! Compaction handler
//!
//! A compaction writes a boundary record that starts a fresh root, followed
//! by a recap record as its sole child summarizing everything before it.

use serde::Serialize;
use tracing::warn;

use super::{Diagnostics, Node, NodeIx};
use crate::record::RecordKind;

/// One boundary/recap pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Compaction {
    pub boundary: NodeIx,
    pub recap: Option<NodeIx>,
    /// Last pre-compaction record, when the boundary names one
    pub logical_parent_id: Option<String>,
}

impl Compaction {
    pub fn is_paired(&self) -> bool {
        self.recap.is_some()
    }
}

pub(crate) fn resolve(nodes: &[Node], diagnostics: &mut Diagnostics) -> Vec<Compaction> {
    let mut compactions = vec![];

    for (i, node) in nodes.iter().enumerate() {
        match node.kind() {
            RecordKind::CompactPrelude => {
                let recap = node
                    .children
                    .iter()
                    .copied()
                    .find(|c| nodes[c.0].kind() == RecordKind::CompactRecap);
                if recap.is_none() || node.children.len() != 1 {
                    warn!(
                        "Compaction boundary {} has {} children, expected a single recap",
                        node.id(),
                        node.children.len()
                    );
                    diagnostics.unpaired_compactions.push(node.id().to_string());
                }
                if node.parent.is_some() {
                    warn!("Compaction boundary {} is not a root", node.id());
                    diagnostics.detached_boundaries.push(node.id().to_string());
                }
                compactions.push(Compaction {
                    boundary: NodeIx(i),
                    recap,
                    logical_parent_id: node.record.logical_parent_id.clone(),
                });
            }
            RecordKind::CompactRecap => {
                let under_boundary = node
                    .parent
                    .map(|p| nodes[p.0].kind() == RecordKind::CompactPrelude)
                    .unwrap_or(false);
                if !under_boundary {
                    warn!("Compaction recap {} has no boundary parent", node.id());
                    diagnostics.unpaired_compactions.push(node.id().to_string());
                }
            }
            _ => {}
        }
    }

    compactions
}
