//! Sidechains command implementation

use anyhow::Result;
use std::path::Path;

use super::{describe, load_graph, print_json, truncate};
use crate::analyze::AnalysisOptions;

pub fn run(
    path: &Path,
    options: &AnalysisOptions,
    delegation: Option<&str>,
    json: bool,
) -> Result<()> {
    let graph = load_graph(path, options)?;

    let sidechains = match delegation {
        Some(id) => graph.get_sidechain(id)?,
        None => graph.sidechains(),
    };

    if json {
        return print_json(&sidechains);
    }

    if sidechains.is_empty() {
        println!("No sidechains found.");
        return Ok(());
    }

    println!(
        "{:<14} {:<14} {:<20} {:<6} {}",
        "Delegation", "Root", "Agent", "Depth", "Members"
    );
    println!("{}", "-".repeat(70));

    for sidechain in &sidechains {
        println!(
            "{:<14} {:<14} {:<20} {:<6} {}",
            truncate(sidechain.delegation.as_deref().unwrap_or("-"), 14),
            truncate(&sidechain.root, 14),
            truncate(&sidechain.agent, 20),
            sidechain.max_depth,
            sidechain.ids.len()
        );

        if delegation.is_some() {
            for id in &sidechain.ids {
                if let Some(node) = graph.node(id) {
                    println!("    {}", describe(node));
                }
            }
        }
    }

    Ok(())
}
