//! Tools command implementation

use anyhow::Result;
use std::path::Path;

use super::{load_graph, print_json, truncate};
use crate::analyze::AnalysisOptions;

pub fn run(path: &Path, options: &AnalysisOptions, json: bool) -> Result<()> {
    let graph = load_graph(path, options)?;
    let usage = graph.tool_usage_with(options.tool_sample_limit);

    if json {
        return print_json(&usage);
    }

    if usage.is_empty() {
        println!("No tool invocations found.");
        return Ok(());
    }

    println!(
        "{:<24} {:>7} {:>8} {:>7} {:>8}",
        "Tool", "Count", "Success", "Error", "Pending"
    );
    println!("{}", "-".repeat(58));

    for (name, tool) in &usage {
        println!(
            "{:<24} {:>7} {:>8} {:>7} {:>8}",
            truncate(name, 24),
            tool.count,
            tool.success,
            tool.error,
            tool.pending
        );
    }

    let unmatched = graph.tools().unmatched_results.len();
    if unmatched > 0 {
        println!("\n{} tool results had no matching invocation", unmatched);
    }

    Ok(())
}
