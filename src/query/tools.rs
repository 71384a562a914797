//! Tool usage aggregation

use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

use crate::graph::{Graph, ToolResolution};

pub const DEFAULT_SAMPLE_LIMIT: usize = 3;

/// Per-tool usage summary
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ToolUsage {
    pub count: usize,
    pub success: usize,
    pub error: usize,
    pub pending: usize,
    pub samples: Vec<ToolSample>,
}

/// One example invocation of a tool
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolSample {
    pub invocation_id: String,
    pub node_id: String,
    pub input: Value,
}

impl Graph {
    pub fn tool_usage(&self) -> BTreeMap<String, ToolUsage> {
        self.tool_usage_with(DEFAULT_SAMPLE_LIMIT)
    }

    /// Join invocations against the correlator's result map, keeping at most
    /// `sample_limit` sample invocations per tool.
    pub fn tool_usage_with(&self, sample_limit: usize) -> BTreeMap<String, ToolUsage> {
        let mut usage: BTreeMap<String, ToolUsage> = BTreeMap::new();

        for link in self.tools().links() {
            let entry = usage.entry(link.name.clone()).or_default();
            entry.count += 1;
            match link.resolution {
                ToolResolution::Resolved { ok: true, .. } => entry.success += 1,
                ToolResolution::Resolved { ok: false, .. } => entry.error += 1,
                ToolResolution::Pending => entry.pending += 1,
            }

            if entry.samples.len() < sample_limit {
                let owner = self.get(link.owner);
                let input = owner
                    .tool_invocations
                    .iter()
                    .find(|inv| inv.invocation_id == link.invocation_id)
                    .map(|inv| inv.input.clone())
                    .unwrap_or(Value::Null);
                entry.samples.push(ToolSample {
                    invocation_id: link.invocation_id.clone(),
                    node_id: owner.id().to_string(),
                    input,
                });
            }
        }

        usage
    }
}

#[cfg(test)]
mod tests {
    use crate::graph::testing::{rec, tool_result, tool_use};
    use crate::graph::Graph;
    use crate::record::RecordKind::*;
    use serde_json::json;

    #[test]
    fn test_usage_joins_results() {
        let mut m = rec("m", None, Assistant, 1);
        m.payload = vec![
            tool_use("t1", "Read", json!({"path": "a"})),
            tool_use("t2", "Read", json!({"path": "b"})),
            tool_use("t3", "Bash", json!({"command": "ls"})),
        ];
        let mut r = rec("r", Some("m"), ToolResult, 2);
        r.payload = vec![tool_result("t1", false), tool_result("t2", true)];

        let usage = Graph::from_records(vec![m, r]).tool_usage_with(1);

        let read = &usage["Read"];
        assert_eq!((read.count, read.success, read.error, read.pending), (2, 1, 1, 0));
        assert_eq!(read.samples.len(), 1);
        assert_eq!(read.samples[0].invocation_id, "t1");
        assert_eq!(read.samples[0].input["path"], "a");

        let bash = &usage["Bash"];
        assert_eq!((bash.count, bash.success, bash.error, bash.pending), (1, 0, 0, 1));
    }
}
