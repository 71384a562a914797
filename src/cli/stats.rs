//! Stats command implementation

use anyhow::Result;
use std::path::Path;

use super::{load_graph, print_header, print_json};
use crate::analyze::AnalysisOptions;

pub fn run(path: &Path, options: &AnalysisOptions, json: bool) -> Result<()> {
    let graph = load_graph(path, options)?;
    let stats = graph.statistics();

    if json {
        return print_json(&stats);
    }

    print_header(&format!("Session: {}", path.display()));

    if stats.is_empty_graph() {
        println!("Empty session (no roots).");
    }

    let kinds: Vec<String> = stats
        .by_kind
        .iter()
        .filter(|(_, count)| **count > 0)
        .map(|(kind, count)| format!("{} {}", kind, count))
        .collect();
    println!("Nodes: {} ({})", stats.nodes, kinds.join(", "));
    println!(
        "Roots: {} | Branches: {} | Active: {} | Max depth: {}",
        stats.roots, stats.branches, stats.active_nodes, stats.max_depth
    );
    println!(
        "Tools: {} invocations, {} results, {} errors",
        stats.tool_invocations, stats.tool_results, stats.tool_errors
    );
    println!(
        "Sidechains: {} (max depth {}) | Compactions: {}",
        stats.sidechains, stats.max_sidechain_depth, stats.compactions
    );

    println!("\nWarnings ({}):", stats.warnings());
    let conditions = [
        ("decode errors", stats.decode_errors),
        ("duplicate ids", stats.duplicate_ids),
        ("orphans", stats.orphans),
        ("pending invocations", stats.pending_invocations),
        ("unmatched results", stats.unmatched_results),
        ("duplicate results", stats.duplicate_results),
        ("duplicate invocations", stats.duplicate_invocations),
        ("conflicting active markers", stats.conflicting_markers),
        ("unattributed sidechains", stats.unattributed_sidechains),
        ("unpaired compactions", stats.unpaired_compactions),
        ("detached compaction boundaries", stats.detached_boundaries),
    ];
    for (label, count) in conditions {
        println!("  {:<32} {}", label, count);
    }

    for err in &graph.diagnostics().decode_errors {
        println!("  ⚠ {}", err);
    }

    Ok(())
}
