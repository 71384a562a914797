//! CLI subcommand implementations

pub mod compactions;
pub mod path;
pub mod scan;
pub mod sidechains;
pub mod stats;
pub mod tools;

use anyhow::{Context, Result};
use serde::Serialize;
use std::path::Path;

use crate::analyze::{analyze_file, AnalysisOptions};
use crate::graph::{Graph, Node};

pub(crate) fn load_graph(path: &Path, options: &AnalysisOptions) -> Result<Graph> {
    analyze_file(path, options).with_context(|| format!("Failed to analyze {}", path.display()))
}

pub(crate) fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub(crate) fn print_header(title: &str) {
    println!("\n{}", "=".repeat(80));
    println!("{}", title);
    println!("{}", "=".repeat(80));
}

/// First line of `text`, cut to `max` characters
pub(crate) fn truncate(text: &str, max: usize) -> String {
    let first_line = text.lines().next().unwrap_or(text);
    if first_line.chars().count() > max {
        let cut: String = first_line.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", cut)
    } else {
        first_line.to_string()
    }
}

/// One-line description of a node for listings
pub(crate) fn describe(node: &Node) -> String {
    let preview = node
        .record
        .text()
        .map(|t| truncate(&t, 50))
        .or_else(|| {
            node.tool_invocations
                .first()
                .map(|inv| format!("🔧 {}", inv.name))
        })
        .unwrap_or_default();
    format!(
        "[{:>5}] {:<12} {:<15} {:<10} {}",
        node.position(),
        truncate(node.id(), 12),
        node.kind().as_str(),
        node.effective_role.as_str(),
        preview
    )
}
