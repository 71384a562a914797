//! Session graph
//!
//! Records are assembled into an id-keyed arena of [`Node`]s. Parent and
//! children are stored as arena indices, never as owning references. After
//! the builder pass, annotation passes run in a fixed order:
//! tool correlation, branch resolution, sidechain resolution, compaction.
//! The finished [`Graph`] is immutable and can be shared across threads.

mod branch;
mod builder;
mod compaction;
mod sidechain;
mod tools;

pub use branch::{BranchPolicy, BranchPolicyKind, LatestTimestamp, LatestWins, MarkerOnly};
pub use builder::GraphBuilder;
pub use compaction::Compaction;
pub use sidechain::{DelegationRules, EffectiveRole, UNKNOWN_AGENT};
pub use tools::{ToolIndex, ToolLink, ToolResolution};

use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;

use crate::error::DecodeError;
use crate::record::{Record, RecordKind};

/// Index of a node in the graph arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeIx(pub(crate) usize);

impl NodeIx {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeIx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A tool invocation carried by a node
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolInvocation {
    pub invocation_id: String,
    pub name: String,
    pub input: Value,
}

/// A tool result carried by a node
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolOutcome {
    pub invocation_id: String,
    pub ok: bool,
    pub content: Value,
}

/// A record plus its computed graph annotations
#[derive(Debug, Clone)]
pub struct Node {
    pub record: Record,
    pub parent: Option<NodeIx>,
    /// Ordered by strictly increasing record position
    pub children: Vec<NodeIx>,
    pub is_active: bool,
    /// Chosen child at its own fan-out (always true for roots and only children)
    pub is_selected: bool,
    pub is_orphan: bool,
    /// 0 when the node is not part of a sidechain
    pub sidechain_depth: u32,
    pub sidechain_agent: Option<String>,
    pub effective_role: EffectiveRole,
    pub tool_invocations: Vec<ToolInvocation>,
    pub tool_results: Vec<ToolOutcome>,
}

impl Node {
    pub(crate) fn new(record: Record) -> Self {
        let tool_invocations = record
            .tool_uses()
            .map(|(id, name, input)| ToolInvocation {
                invocation_id: id.to_string(),
                name: name.to_string(),
                input: input.clone(),
            })
            .collect();
        let tool_results = record
            .tool_results()
            .map(|(id, content, is_error)| ToolOutcome {
                invocation_id: id.to_string(),
                ok: !is_error,
                content: content.clone(),
            })
            .collect();

        Self {
            parent: None,
            children: vec![],
            is_active: true,
            is_selected: true,
            is_orphan: false,
            sidechain_depth: 0,
            sidechain_agent: None,
            effective_role: EffectiveRole::from_kind(record.kind),
            tool_invocations,
            tool_results,
            record,
        }
    }

    pub fn id(&self) -> &str {
        &self.record.id
    }

    pub fn kind(&self) -> RecordKind {
        self.record.kind
    }

    pub fn position(&self) -> usize {
        self.record.position
    }

    pub fn is_sidechain(&self) -> bool {
        self.record.is_sidechain
    }
}

/// Non-fatal conditions found while building and annotating a graph
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    /// Lines skipped by the decoder
    pub decode_errors: Vec<DecodeError>,
    /// Ids seen more than once; the later record is ignored
    pub duplicate_ids: Vec<String>,
    /// Fan-out parents whose children carry more than one explicit active marker
    pub conflicting_markers: Vec<String>,
    /// Sidechain roots whose delegating agent could not be determined
    pub unattributed_sidechains: Vec<String>,
    /// Compaction records that are not a boundary with exactly one recap child
    pub unpaired_compactions: Vec<String>,
    /// Compaction boundaries that have a parent instead of starting a root
    pub detached_boundaries: Vec<String>,
}

/// A fully annotated, immutable session graph
#[derive(Debug, Clone)]
pub struct Graph {
    pub(crate) nodes: Vec<Node>,
    pub(crate) index: HashMap<String, NodeIx>,
    pub(crate) roots: Vec<NodeIx>,
    pub(crate) orphans: Vec<NodeIx>,
    pub(crate) tools: ToolIndex,
    pub(crate) sidechain_roots: Vec<NodeIx>,
    pub(crate) compactions: Vec<Compaction>,
    pub(crate) diagnostics: Diagnostics,
}

impl Graph {
    /// Build a graph from records in file order with the default branch
    /// policy and delegation rules.
    pub fn from_records<I>(records: I) -> Self
    where
        I: IntoIterator<Item = Record>,
    {
        let mut builder = GraphBuilder::new();
        for record in records {
            builder.push(record);
        }
        builder.finish(&LatestWins, &DelegationRules::default())
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    pub fn get(&self, ix: NodeIx) -> &Node {
        &self.nodes[ix.0]
    }

    pub fn ix(&self, id: &str) -> Option<NodeIx> {
        self.index.get(id).copied()
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.ix(id).map(|ix| self.get(ix))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// All nodes in file order
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }

    pub fn roots(&self) -> impl Iterator<Item = &Node> {
        self.roots.iter().map(|&ix| self.get(ix))
    }

    pub fn root_ids(&self) -> Vec<&str> {
        self.roots.iter().map(|&ix| self.get(ix).id()).collect()
    }

    pub fn orphan_ids(&self) -> Vec<&str> {
        self.orphans.iter().map(|&ix| self.get(ix).id()).collect()
    }

    pub fn parent(&self, id: &str) -> Option<&Node> {
        self.node(id)
            .and_then(|n| n.parent)
            .map(|ix| self.get(ix))
    }

    /// Children ids in first-seen order; empty for unknown ids
    pub fn children_ids(&self, id: &str) -> Vec<&str> {
        self.node(id)
            .map(|n| n.children.iter().map(|&c| self.get(c).id()).collect())
            .unwrap_or_default()
    }

    pub fn tools(&self) -> &ToolIndex {
        &self.tools
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Order-independent structural fingerprint (SHA-256, hex).
    ///
    /// Covers ids, parent links, child order, active and orphan flags.
    pub fn fingerprint(&self) -> String {
        let mut entries: Vec<String> = self
            .nodes
            .iter()
            .map(|node| {
                let parent = node.parent.map(|p| self.get(p).id()).unwrap_or("");
                let children: Vec<&str> = node.children.iter().map(|&c| self.get(c).id()).collect();
                format!(
                    "{}|{}|{}|{}|{}",
                    node.id(),
                    parent,
                    children.join(","),
                    node.is_active as u8,
                    node.is_orphan as u8
                )
            })
            .collect();
        entries.sort();

        let mut hasher = Sha256::new();
        for entry in &entries {
            hasher.update(entry.as_bytes());
            hasher.update(b"\n");
        }
        hex::encode(hasher.finalize())
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use crate::record::{ContentItem, Record, RecordKind};
    use serde_json::Value;

    /// Minimal record for graph tests; position doubles as timestamp.
    pub fn rec(id: &str, parent: Option<&str>, kind: RecordKind, position: usize) -> Record {
        Record {
            id: id.to_string(),
            parent_id: parent.map(String::from),
            session_id: "s1".to_string(),
            timestamp: position as i64 * 1000,
            kind,
            is_sidechain: false,
            originator_role: None,
            active_marker: false,
            logical_parent_id: None,
            payload: vec![],
            position,
        }
    }

    pub fn tool_use(id: &str, name: &str, input: Value) -> ContentItem {
        ContentItem::ToolUse {
            id: id.to_string(),
            name: name.to_string(),
            input,
        }
    }

    pub fn tool_result(id: &str, is_error: bool) -> ContentItem {
        ContentItem::ToolResult {
            tool_use_id: id.to_string(),
            content: Value::String("ok".to_string()),
            is_error,
        }
    }
}
