//! Scan command implementation

use anyhow::Result;
use std::path::Path;
use std::sync::Arc;

use super::{print_json, truncate};
use crate::analyze::{analyze_many, AnalysisOptions};
use crate::query::Statistics;
use crate::source::{self, SessionRef};

#[derive(serde::Serialize)]
struct ScanRow {
    session: String,
    path: String,
    statistics: Option<Statistics>,
    error: Option<String>,
}

pub fn run(
    sessions: Vec<SessionRef>,
    options: AnalysisOptions,
    workers: usize,
    json: bool,
) -> Result<()> {
    if sessions.is_empty() {
        println!("No sessions found.");
        return Ok(());
    }

    let rt = tokio::runtime::Runtime::new()?;
    let reports = rt.block_on(analyze_many(sessions, Arc::new(options), workers))?;

    let rows: Vec<ScanRow> = reports
        .into_iter()
        .map(|report| {
            let (statistics, error) = match report.result {
                Ok(graph) => (Some(graph.statistics()), None),
                Err(e) => (None, Some(format!("{:#}", e))),
            };
            ScanRow {
                session: report.session.id,
                path: report.session.source_path.display().to_string(),
                statistics,
                error,
            }
        })
        .collect();

    if json {
        return print_json(&rows);
    }

    println!(
        "{:<12} {:>7} {:>6} {:>9} {:>11} {:>12} {:>9}",
        "Session", "Nodes", "Roots", "Branches", "Sidechains", "Compactions", "Warnings"
    );
    println!("{}", "-".repeat(72));

    let mut failed = 0;
    for row in &rows {
        match (&row.statistics, &row.error) {
            (Some(stats), _) => println!(
                "{:<12} {:>7} {:>6} {:>9} {:>11} {:>12} {:>9}",
                truncate(&row.session, 12),
                stats.nodes,
                stats.roots,
                stats.branches,
                stats.sidechains,
                stats.compactions,
                stats.warnings()
            ),
            (None, error) => {
                failed += 1;
                println!(
                    "{:<12} ❌ {}",
                    truncate(&row.session, 12),
                    error.as_deref().unwrap_or("unknown error")
                );
            }
        }
    }

    println!("\n✅ {} sessions analyzed, {} failed", rows.len() - failed, failed);
    Ok(())
}

/// Sessions from a glob pattern, or everything under `dir`
pub fn collect(dir: &Path, pattern: Option<&str>) -> Result<Vec<SessionRef>> {
    match pattern {
        Some(p) => source::expand_pattern(p),
        None => source::discover(dir),
    }
}
