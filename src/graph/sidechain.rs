//! Sidechain resolver
//!
//! A sidechain is a delegated sub-conversation. A node is a sidechain root
//! when it is flagged `is_sidechain` and its parent is absent or not a
//! sidechain node. The delegated agent is read from the parent's
//! delegation-class tool invocation. Depth follows
//! `depth(n) = depth(parent) + 1` while the parent is a sidechain node,
//! `1` for a sidechain root and `0` outside sidechains.
//!
//! Inside a sidechain the speaker roles are reversed: a human-kind record is
//! the delegator talking to the sub-agent, so each node also carries an
//! [`EffectiveRole`] distinct from its declared kind.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::{Diagnostics, Node, NodeIx};
use crate::record::{ContentItem, Record, RecordKind};

/// Agent name used when a sidechain cannot be attributed
pub const UNKNOWN_AGENT: &str = "unknown";

/// Which tool invocations spawn sidechains, and where their target lives
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegationRules {
    #[serde(default = "default_tool_names")]
    pub tool_names: Vec<String>,

    /// Input keys tried in order for the target agent name
    #[serde(default = "default_target_keys")]
    pub target_keys: Vec<String>,
}

fn default_tool_names() -> Vec<String> {
    vec!["Task".to_string(), "Agent".to_string()]
}

fn default_target_keys() -> Vec<String> {
    vec![
        "subagent_type".to_string(),
        "agent".to_string(),
        "target".to_string(),
    ]
}

impl Default for DelegationRules {
    fn default() -> Self {
        Self {
            tool_names: default_tool_names(),
            target_keys: default_target_keys(),
        }
    }
}

impl DelegationRules {
    pub fn is_delegation(&self, tool_name: &str) -> bool {
        self.tool_names.iter().any(|t| t == tool_name)
    }

    /// Declared target agent of a delegation invocation
    pub fn target(&self, input: &Value) -> Option<String> {
        self.target_keys
            .iter()
            .filter_map(|key| input.get(key).and_then(|v| v.as_str()))
            .find(|s| !s.is_empty())
            .map(String::from)
    }
}

/// Who is actually speaking in a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectiveRole {
    User,
    Assistant,
    Tool,
    System,
    /// Delegating agent speaking to a sub-agent
    Delegator,
    /// Delegated agent answering inside a sidechain
    SubAgent,
}

impl EffectiveRole {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "user" => Some(EffectiveRole::User),
            "assistant" => Some(EffectiveRole::Assistant),
            "tool" => Some(EffectiveRole::Tool),
            "system" => Some(EffectiveRole::System),
            "delegator" => Some(EffectiveRole::Delegator),
            "subagent" | "sub_agent" => Some(EffectiveRole::SubAgent),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EffectiveRole::User => "user",
            EffectiveRole::Assistant => "assistant",
            EffectiveRole::Tool => "tool",
            EffectiveRole::System => "system",
            EffectiveRole::Delegator => "delegator",
            EffectiveRole::SubAgent => "subagent",
        }
    }

    pub(crate) fn from_kind(kind: RecordKind) -> Self {
        match kind {
            RecordKind::Human => EffectiveRole::User,
            RecordKind::Assistant => EffectiveRole::Assistant,
            RecordKind::ToolResult => EffectiveRole::Tool,
            RecordKind::CompactPrelude | RecordKind::CompactRecap => EffectiveRole::System,
        }
    }

    /// An originator role naming a known role wins; otherwise derive it from
    /// the kind, reversing human/assistant inside sidechains.
    pub fn derive(record: &Record, in_sidechain: bool) -> Self {
        if let Some(role) = record
            .originator_role
            .as_deref()
            .and_then(EffectiveRole::parse)
        {
            return role;
        }

        let only_tool_results = !record.payload.is_empty()
            && record
                .payload
                .iter()
                .all(|item| matches!(item, ContentItem::ToolResult { .. }));

        match (record.kind, in_sidechain) {
            (RecordKind::Human, _) if only_tool_results => EffectiveRole::Tool,
            (RecordKind::Human, true) => EffectiveRole::Delegator,
            (RecordKind::Assistant, true) => EffectiveRole::SubAgent,
            (kind, _) => EffectiveRole::from_kind(kind),
        }
    }
}

/// Annotate depth, agent and effective role. Returns sidechain roots in
/// file order.
///
/// Nodes are visited in arena order, which is file order, so a parent is
/// always annotated before its children.
pub(crate) fn resolve(
    nodes: &mut [Node],
    rules: &DelegationRules,
    diagnostics: &mut Diagnostics,
) -> Vec<NodeIx> {
    let mut roots = vec![];

    for i in 0..nodes.len() {
        let (depth, agent) = if !nodes[i].is_sidechain() {
            (0, None)
        } else {
            match nodes[i].parent {
                Some(p) if nodes[p.0].is_sidechain() => (
                    nodes[p.0].sidechain_depth + 1,
                    nodes[p.0].sidechain_agent.clone(),
                ),
                parent => {
                    roots.push(NodeIx(i));
                    let agent = attribute(nodes, NodeIx(i), parent, rules).unwrap_or_else(|| {
                        debug!("Sidechain {} has no attributable delegation", nodes[i].id());
                        diagnostics
                            .unattributed_sidechains
                            .push(nodes[i].id().to_string());
                        UNKNOWN_AGENT.to_string()
                    });
                    (1, Some(agent))
                }
            }
        };

        let node = &mut nodes[i];
        node.sidechain_depth = depth;
        node.sidechain_agent = agent;
        node.effective_role = EffectiveRole::derive(&node.record, depth > 0);
    }

    roots
}

/// Parallel delegations from one record are matched to its sidechain
/// children in order; extra sidechains fall back to the last delegation.
fn attribute(
    nodes: &[Node],
    root: NodeIx,
    parent: Option<NodeIx>,
    rules: &DelegationRules,
) -> Option<String> {
    let parent = &nodes[parent?.0];
    let delegations: Vec<_> = parent
        .tool_invocations
        .iter()
        .filter(|inv| rules.is_delegation(&inv.name))
        .collect();

    let ordinal = parent
        .children
        .iter()
        .filter(|c| nodes[c.0].is_sidechain())
        .position(|&c| c == root)
        .unwrap_or(0);

    let invocation = delegations.get(ordinal).or_else(|| delegations.last())?;
    rules.target(&invocation.input)
}
