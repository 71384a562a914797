//! Graph builder: one linear pass over records in file order

use std::collections::HashMap;
use tracing::{debug, warn};

use super::{branch, compaction, sidechain, tools};
use super::{BranchPolicy, DelegationRules, Diagnostics, Graph, Node, NodeIx};
use crate::error::DecodeError;
use crate::record::Record;

/// Incremental graph builder.
///
/// Records must be pushed in file order: a parent has to be pushed before
/// its children, otherwise the child is treated as an orphan. Tool matches
/// and branch decisions depend on the whole file, so they are only made in
/// [`GraphBuilder::finish`].
#[derive(Debug, Default)]
pub struct GraphBuilder {
    nodes: Vec<Node>,
    index: HashMap<String, NodeIx>,
    roots: Vec<NodeIx>,
    orphans: Vec<NodeIx>,
    diagnostics: Diagnostics,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Add one record. Duplicate ids are recorded and ignored.
    pub fn push(&mut self, record: Record) {
        if self.index.contains_key(&record.id) {
            warn!(
                "Ignoring duplicate record id {} at line {}",
                record.id, record.position
            );
            self.diagnostics.duplicate_ids.push(record.id);
            return;
        }

        let ix = NodeIx(self.nodes.len());
        let mut node = Node::new(record);

        match node.record.parent_id.as_deref() {
            None => self.roots.push(ix),
            Some(parent_id) => match self.index.get(parent_id).copied() {
                Some(parent) => {
                    node.parent = Some(parent);
                    let position = node.record.position;
                    let at = self.nodes[parent.0]
                        .children
                        .partition_point(|c| self.nodes[c.0].record.position < position);
                    self.nodes[parent.0].children.insert(at, ix);
                }
                None => {
                    debug!(
                        "Record {} references unknown parent {}; promoting to root",
                        node.record.id, parent_id
                    );
                    node.is_orphan = true;
                    self.roots.push(ix);
                    self.orphans.push(ix);
                }
            },
        }

        self.index.insert(node.record.id.clone(), ix);
        self.nodes.push(node);
    }

    /// Keep a skipped line for reporting
    pub fn record_decode_error(&mut self, err: DecodeError) {
        self.diagnostics.decode_errors.push(err);
    }

    /// Run the annotation passes and freeze the graph.
    pub fn finish(self, policy: &dyn BranchPolicy, delegation: &DelegationRules) -> Graph {
        let GraphBuilder {
            mut nodes,
            index,
            roots,
            orphans,
            mut diagnostics,
        } = self;

        let tools = tools::correlate(&nodes);
        branch::resolve(&mut nodes, &roots, policy, &mut diagnostics);
        let sidechain_roots = sidechain::resolve(&mut nodes, delegation, &mut diagnostics);
        let compactions = compaction::resolve(&nodes, &mut diagnostics);

        debug!(
            "Built graph: {} nodes, {} roots, {} orphans, {} sidechains, {} compactions",
            nodes.len(),
            roots.len(),
            orphans.len(),
            sidechain_roots.len(),
            compactions.len()
        );

        Graph {
            nodes,
            index,
            roots,
            orphans,
            tools,
            sidechain_roots,
            compactions,
            diagnostics,
        }
    }
}
