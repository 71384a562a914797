//! Analysis pipeline: raw lines -> records -> annotated graph
//!
//! One session is always built sequentially, since file order decides child
//! order and orphan detection. Independent sessions are built in parallel on
//! a bounded worker pool that shares nothing but the immutable options.

use anyhow::Result;
use std::io::BufRead;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, info};

use crate::config::Config;
use crate::graph::{BranchPolicy, DelegationRules, Graph, GraphBuilder, LatestWins};
use crate::query::DEFAULT_SAMPLE_LIMIT;
use crate::source::{self, DecodePolicy, SessionLog, SessionRef};

/// Everything a build needs besides the records themselves
#[derive(Clone)]
pub struct AnalysisOptions {
    pub branch_policy: Arc<dyn BranchPolicy>,
    pub delegation: DelegationRules,
    pub decode_policy: DecodePolicy,
    pub tool_sample_limit: usize,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            branch_policy: Arc::new(LatestWins),
            delegation: DelegationRules::default(),
            decode_policy: DecodePolicy::default(),
            tool_sample_limit: DEFAULT_SAMPLE_LIMIT,
        }
    }
}

impl std::fmt::Debug for AnalysisOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalysisOptions")
            .field("branch_policy", &self.branch_policy.name())
            .field("delegation", &self.delegation)
            .field("decode_policy", &self.decode_policy)
            .field("tool_sample_limit", &self.tool_sample_limit)
            .finish()
    }
}

impl AnalysisOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            branch_policy: config.analysis.branch_policy.build(),
            delegation: config.delegation.clone(),
            decode_policy: config.analysis.on_decode_error,
            tool_sample_limit: config.analysis.tool_sample_limit,
        }
    }
}

/// Build and annotate a graph from an already-read session log.
pub fn build_graph(log: SessionLog, options: &AnalysisOptions) -> Graph {
    let mut builder = GraphBuilder::new();
    for record in log.records {
        builder.push(record);
    }
    for err in log.errors {
        builder.record_decode_error(err);
    }
    builder.finish(options.branch_policy.as_ref(), &options.delegation)
}

pub fn analyze_reader<R: BufRead>(reader: R, options: &AnalysisOptions) -> Result<Graph> {
    let log = source::read_records(reader, options.decode_policy)?;
    Ok(build_graph(log, options))
}

pub fn analyze_file(path: &Path, options: &AnalysisOptions) -> Result<Graph> {
    let log = source::read_session(path, options.decode_policy)?;
    debug!(
        "Read {} records ({} skipped) from {}",
        log.records.len(),
        log.errors.len(),
        path.display()
    );
    Ok(build_graph(log, options))
}

/// Outcome of analyzing one session in a batch
#[derive(Debug)]
pub struct SessionReport {
    pub session: SessionRef,
    pub result: Result<Graph>,
}

/// Analyze independent sessions on at most `workers` blocking threads.
/// Reports come back in input order; a failed session does not stop the
/// others.
pub async fn analyze_many(
    sessions: Vec<SessionRef>,
    options: Arc<AnalysisOptions>,
    workers: usize,
) -> Result<Vec<SessionReport>> {
    let semaphore = Arc::new(Semaphore::new(workers.max(1)));
    let mut handles = Vec::with_capacity(sessions.len());

    info!(
        "Analyzing {} sessions with {} workers",
        sessions.len(),
        workers.max(1)
    );

    for session in sessions {
        let permit = semaphore.clone().acquire_owned().await?;
        let options = options.clone();
        let path = session.source_path.clone();
        let handle = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            analyze_file(&path, &options)
        });
        handles.push((session, handle));
    }

    let mut reports = Vec::with_capacity(handles.len());
    for (session, handle) in handles {
        let result = match handle.await {
            Ok(result) => result,
            Err(e) => Err(anyhow::anyhow!("Worker failed for {}: {}", session.id, e)),
        };
        reports.push(SessionReport { session, result });
    }

    Ok(reports)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const SESSION: &str = r#"{"id":"a","session_id":"s","timestamp":1,"kind":"human","payload":"start"}
{"id":"b","parent_id":"a","session_id":"s","timestamp":2,"kind":"assistant"}
not json at all
{"id":"c","parent_id":"a","session_id":"s","timestamp":3,"kind":"assistant"}
"#;

    #[test]
    fn test_analyze_reader_counts_skipped_lines() {
        let graph = analyze_reader(Cursor::new(SESSION), &AnalysisOptions::default()).unwrap();

        assert_eq!(graph.len(), 3);
        let stats = graph.statistics();
        assert_eq!(stats.decode_errors, 1);
        assert!(graph.node("c").unwrap().is_active);
    }

    #[test]
    fn test_strict_options_abort() {
        let options = AnalysisOptions {
            decode_policy: DecodePolicy::Abort,
            ..Default::default()
        };
        assert!(analyze_reader(Cursor::new(SESSION), &options).is_err());
    }

    #[test]
    fn test_options_from_config() {
        let mut config = Config::default();
        config.analysis.branch_policy = crate::graph::BranchPolicyKind::MarkerOnly;
        let options = AnalysisOptions::from_config(&config);
        assert_eq!(options.branch_policy.name(), "marker-only");
        assert_eq!(options.tool_sample_limit, 3);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_analyze_many_keeps_order_and_failures() {
        let dir = tempfile::tempdir().unwrap();
        let mut sessions = vec![];
        for name in ["one", "two", "three"] {
            let path = dir.path().join(format!("{}.jsonl", name));
            std::fs::write(&path, SESSION).unwrap();
            sessions.push(SessionRef::from_path(path));
        }
        sessions.push(SessionRef::from_path(dir.path().join("missing.jsonl")));

        let reports = analyze_many(sessions, Arc::new(AnalysisOptions::default()), 2)
            .await
            .unwrap();

        let ids: Vec<&str> = reports.iter().map(|r| r.session.id.as_str()).collect();
        assert_eq!(ids, vec!["one", "two", "three", "missing"]);
        assert!(reports[..3].iter().all(|r| r.result.is_ok()));
        assert!(reports[3].result.is_err());
    }
}
