//! Compactions command implementation

use anyhow::Result;
use chrono::{TimeZone, Utc};
use serde::Serialize;
use std::path::Path;

use super::{load_graph, print_json};
use crate::analyze::AnalysisOptions;
use crate::graph::{Compaction, Graph};

#[derive(Serialize)]
struct CompactionView<'a> {
    boundary: &'a str,
    recap: Option<&'a str>,
    logical_parent_id: Option<&'a str>,
    timestamp: i64,
}

fn view<'a>(graph: &'a Graph, compaction: &'a Compaction) -> CompactionView<'a> {
    let boundary = graph.get(compaction.boundary);
    CompactionView {
        boundary: boundary.id(),
        recap: compaction.recap.map(|r| graph.get(r).id()),
        logical_parent_id: compaction.logical_parent_id.as_deref(),
        timestamp: boundary.record.timestamp,
    }
}

pub fn run(path: &Path, options: &AnalysisOptions, node: Option<&str>, json: bool) -> Result<()> {
    let graph = load_graph(path, options)?;

    let views: Vec<CompactionView> = match node {
        Some(id) => graph
            .nearest_compaction(id)?
            .map(|c| view(&graph, c))
            .into_iter()
            .collect(),
        None => graph.compactions().iter().map(|c| view(&graph, c)).collect(),
    };

    if json {
        return print_json(&views);
    }

    if views.is_empty() {
        match node {
            Some(id) => println!("No compaction precedes {}.", id),
            None => println!("No compactions found."),
        }
        return Ok(());
    }

    println!(
        "{:<20} {:<20} {:<20} {}",
        "Boundary", "Recap", "Logical parent", "Time"
    );
    println!("{}", "-".repeat(85));

    for v in &views {
        let time = Utc
            .timestamp_millis_opt(v.timestamp)
            .single()
            .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<20} {:<20} {:<20} {}",
            v.boundary,
            v.recap.unwrap_or("(unpaired)"),
            v.logical_parent_id.unwrap_or("-"),
            time
        );
    }

    Ok(())
}
