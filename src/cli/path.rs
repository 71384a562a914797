//! Path command implementation

use anyhow::Result;
use std::path::Path;

use super::{describe, load_graph, print_header, print_json};
use crate::analyze::AnalysisOptions;

pub fn run(path: &Path, options: &AnalysisOptions, root: Option<&str>, json: bool) -> Result<()> {
    let graph = load_graph(path, options)?;

    let active = match root {
        Some(id) => Some(graph.active_path(id)?),
        None => graph.current_path(),
    };

    let active = match active {
        Some(p) => p,
        None => {
            println!("Empty session (no roots).");
            return Ok(());
        }
    };

    if json {
        return print_json(&active);
    }

    print_header(&format!(
        "Active path from {} ({} nodes, {} roots in session)",
        active.root,
        active.len(),
        graph.root_ids().len()
    ));

    for id in &active.ids {
        if let Some(node) = graph.node(id) {
            let indent = "  ".repeat(node.sidechain_depth as usize);
            println!("{}{}", indent, describe(node));
        }
    }

    Ok(())
}
