//! Session log sources
//!
//! Discovers session files and reads them line by line into records.
//! Data format: newline-delimited JSON, plain (`*.jsonl`) or
//! zstd-compressed (`*.jsonl.zst`).

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::DecodeError;
use crate::record::{decode_line, Record};

/// Reference to a session's source file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRef {
    pub id: String,
    pub source_path: PathBuf,
}

impl SessionRef {
    pub fn from_path(path: PathBuf) -> Self {
        Self {
            id: session_id_from_path(&path),
            source_path: path,
        }
    }
}

/// What to do with a line that fails to decode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecodePolicy {
    /// Log, keep the error for reporting, continue with the next line
    #[default]
    Skip,
    /// Stop reading and fail the whole session
    Abort,
}

/// Records of one session in file order, plus the lines that were skipped
#[derive(Debug, Clone, Default)]
pub struct SessionLog {
    pub records: Vec<Record>,
    pub errors: Vec<DecodeError>,
}

fn is_session_file(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    name.ends_with(".jsonl") || name.ends_with(".jsonl.zst")
}

fn is_compressed(path: &Path) -> bool {
    path.extension().map(|e| e == "zst").unwrap_or(false)
}

/// File name without the `.jsonl` / `.jsonl.zst` suffix
pub fn session_id_from_path(path: &Path) -> String {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unknown");
    name.trim_end_matches(".zst")
        .trim_end_matches(".jsonl")
        .to_string()
}

/// Find every session file under `base_path`, sorted by path.
pub fn discover(base_path: &Path) -> Result<Vec<SessionRef>> {
    let mut sessions = vec![];

    if !base_path.exists() {
        return Ok(sessions);
    }

    for entry in walkdir::WalkDir::new(base_path).follow_links(true) {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!("Skipping unreadable entry under {}: {}", base_path.display(), e);
                continue;
            }
        };
        if entry.file_type().is_file() && is_session_file(entry.path()) {
            sessions.push(SessionRef::from_path(entry.into_path()));
        }
    }

    sessions.sort_by(|a, b| a.source_path.cmp(&b.source_path));
    debug!("Discovered {} sessions under {}", sessions.len(), base_path.display());
    Ok(sessions)
}

/// Expand a glob pattern into session files, sorted by path.
pub fn expand_pattern(pattern: &str) -> Result<Vec<SessionRef>> {
    let expanded = shellexpand::tilde(pattern).to_string();
    let mut sessions = vec![];

    for entry in glob::glob(&expanded).with_context(|| format!("Invalid pattern: {}", pattern))? {
        match entry {
            Ok(path) if path.is_file() => sessions.push(SessionRef::from_path(path)),
            Ok(_) => {}
            Err(e) => warn!("Skipping unreadable path: {}", e),
        }
    }

    sessions.sort_by(|a, b| a.source_path.cmp(&b.source_path));
    Ok(sessions)
}

/// Open a session file for line reading, decompressing `.zst` files.
pub fn open_lines(path: &Path) -> Result<Box<dyn BufRead>> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open session file {}", path.display()))?;
    if is_compressed(path) {
        let decoder = zstd::Decoder::new(file)
            .with_context(|| format!("Failed to start zstd decoder for {}", path.display()))?;
        Ok(Box::new(BufReader::new(decoder)))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

/// Decode every line of `reader`. Blank lines are skipped silently; decode
/// failures follow `policy`.
pub fn read_records<R: BufRead>(reader: R, policy: DecodePolicy) -> Result<SessionLog> {
    let mut log = SessionLog::default();

    for (i, line) in reader.lines().enumerate() {
        let line_number = i + 1;
        let line = line.with_context(|| format!("Failed to read line {}", line_number))?;

        if line.trim().is_empty() {
            continue;
        }

        match decode_line(&line, line_number) {
            Ok(record) => log.records.push(record),
            Err(e) => match policy {
                DecodePolicy::Skip => {
                    warn!("Skipping line: {}", e);
                    log.errors.push(e);
                }
                DecodePolicy::Abort => return Err(e.into()),
            },
        }
    }

    Ok(log)
}

/// Read one session file.
pub fn read_session(path: &Path, policy: DecodePolicy) -> Result<SessionLog> {
    let reader = open_lines(path)?;
    read_records(reader, policy).with_context(|| format!("Failed to read {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};

    const LINES: &str = r#"{"id":"a","session_id":"s","timestamp":1,"kind":"human","payload":"hi"}

{"id":"b","parent_id":"a","session_id":"s","timestamp":2}
{"id":"c","parent_id":"a","session_id":"s","timestamp":3,"kind":"assistant"}
"#;

    #[test]
    fn test_skip_policy_keeps_going() {
        let log = read_records(Cursor::new(LINES), DecodePolicy::Skip).unwrap();

        assert_eq!(log.records.len(), 2);
        assert_eq!(log.records[1].id, "c");
        assert_eq!(log.records[1].position, 4);
        assert_eq!(log.errors.len(), 1);
        assert_eq!(log.errors[0].line(), 3);
    }

    #[test]
    fn test_abort_policy_fails() {
        let err = read_records(Cursor::new(LINES), DecodePolicy::Abort).unwrap_err();
        let decode = err.downcast_ref::<DecodeError>().unwrap();
        assert_eq!(decode.line(), 3);
    }

    #[test]
    fn test_discover_and_compressed_read() {
        let dir = tempfile::tempdir().unwrap();
        let project = dir.path().join("project");
        std::fs::create_dir_all(&project).unwrap();

        std::fs::write(project.join("plain.jsonl"), LINES).unwrap();
        std::fs::write(project.join("notes.txt"), "ignored").unwrap();
        let compressed = zstd::encode_all(LINES.as_bytes(), 0).unwrap();
        let mut file = File::create(project.join("packed.jsonl.zst")).unwrap();
        file.write_all(&compressed).unwrap();

        let sessions = discover(dir.path()).unwrap();
        let ids: Vec<&str> = sessions.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["packed", "plain"]);

        let log = read_session(&sessions[0].source_path, DecodePolicy::Skip).unwrap();
        assert_eq!(log.records.len(), 2);
    }

    #[test]
    fn test_expand_pattern() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("one.jsonl"), LINES).unwrap();
        std::fs::write(dir.path().join("two.jsonl"), LINES).unwrap();

        let pattern = format!("{}/*.jsonl", dir.path().display());
        let sessions = expand_pattern(&pattern).unwrap();
        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions[0].id, "one");
    }

    #[test]
    fn test_missing_base_path_is_empty() {
        let sessions = discover(Path::new("/definitely/not/here")).unwrap();
        assert!(sessions.is_empty());
    }
}
