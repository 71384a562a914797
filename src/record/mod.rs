//! Record decoder
//!
//! Turns one newline-delimited JSON log line into a typed [`Record`].
//! Data format: one object per line with `id`, `parent_id`, `session_id`,
//! `timestamp`, `kind`, optional `is_sidechain` / `originator_role` /
//! `is_active_branch` / `logical_parent_id`, and a `payload` content list.
//!
//! Native Claude Code lines are accepted as well: `uuid`, `parentUuid`,
//! `sessionId`, `type`, `isSidechain`, `userType`, `logicalParentUuid` and
//! `message.content` map onto the same fields. A `system` line with subtype
//! `compact_boundary` is a compaction boundary, and a line flagged
//! `isCompactSummary` is its recap.

mod content;

pub use content::ContentItem;

use chrono::DateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::DecodeError;

/// Record kind discriminator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Human,
    Assistant,
    ToolResult,
    /// Compaction boundary: starts a fresh logical root
    CompactPrelude,
    /// Compaction recap: sole child of a boundary, summarizing prior history
    CompactRecap,
}

impl RecordKind {
    pub const ALL: [RecordKind; 5] = [
        RecordKind::Human,
        RecordKind::Assistant,
        RecordKind::ToolResult,
        RecordKind::CompactPrelude,
        RecordKind::CompactRecap,
    ];

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "human" | "user" => Some(RecordKind::Human),
            "assistant" => Some(RecordKind::Assistant),
            "tool_result" => Some(RecordKind::ToolResult),
            "compact_prelude" | "compact_boundary" => Some(RecordKind::CompactPrelude),
            "compact_recap" | "compact_summary" => Some(RecordKind::CompactRecap),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Human => "human",
            RecordKind::Assistant => "assistant",
            RecordKind::ToolResult => "tool_result",
            RecordKind::CompactPrelude => "compact_prelude",
            RecordKind::CompactRecap => "compact_recap",
        }
    }

    pub fn is_compaction(&self) -> bool {
        matches!(self, RecordKind::CompactPrelude | RecordKind::CompactRecap)
    }
}

/// One decoded log line. Immutable once decoded.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    pub id: String,
    pub parent_id: Option<String>,
    pub session_id: String,
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
    pub kind: RecordKind,
    pub is_sidechain: bool,
    pub originator_role: Option<String>,
    /// Explicit "this child is the active branch" marker
    pub active_marker: bool,
    /// Pre-compaction predecessor named by a compaction boundary
    pub logical_parent_id: Option<String>,
    pub payload: Vec<ContentItem>,
    /// 1-based line number; only used for tie-breaking
    pub position: usize,
}

impl Record {
    /// Tool invocation items carried by this record: `(id, name, input)`
    pub fn tool_uses(&self) -> impl Iterator<Item = (&str, &str, &Value)> {
        self.payload.iter().filter_map(|item| match item {
            ContentItem::ToolUse { id, name, input } => {
                Some((id.as_str(), name.as_str(), input))
            }
            _ => None,
        })
    }

    /// Tool result items carried by this record: `(tool_use_id, content, is_error)`
    pub fn tool_results(&self) -> impl Iterator<Item = (&str, &Value, bool)> {
        self.payload.iter().filter_map(|item| match item {
            ContentItem::ToolResult {
                tool_use_id,
                content,
                is_error,
            } => Some((tool_use_id.as_str(), content, *is_error)),
            _ => None,
        })
    }

    /// Concatenated text items, if any
    pub fn text(&self) -> Option<String> {
        let parts: Vec<&str> = self
            .payload
            .iter()
            .filter_map(|item| match item {
                ContentItem::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join("\n"))
        }
    }
}

/// Wire shape; every field optional so missing ones map to a precise error.
#[derive(Debug, Deserialize)]
struct RawRecord {
    #[serde(default, alias = "uuid")]
    id: Option<String>,
    #[serde(default, alias = "parentUuid")]
    parent_id: Option<String>,
    #[serde(default, alias = "sessionId")]
    session_id: Option<String>,
    #[serde(default)]
    timestamp: Option<Value>,
    #[serde(default, alias = "type")]
    kind: Option<String>,
    #[serde(default)]
    subtype: Option<String>,
    #[serde(default, alias = "isSidechain")]
    is_sidechain: Option<bool>,
    #[serde(default, alias = "userType")]
    originator_role: Option<String>,
    #[serde(default, alias = "isActiveBranch")]
    is_active_branch: Option<bool>,
    #[serde(default, rename = "isCompactSummary")]
    is_compact_summary: Option<bool>,
    #[serde(default, alias = "logicalParentUuid")]
    logical_parent_id: Option<String>,
    #[serde(default)]
    payload: Option<Value>,
    #[serde(default)]
    message: Option<RawMessage>,
}

/// Claude Code nests the content list under `message`
#[derive(Debug, Deserialize)]
struct RawMessage {
    #[serde(default)]
    content: Option<Value>,
}

/// Claude Code recaps are user lines flagged `isCompactSummary`, and
/// boundaries are `system` lines carrying the real kind in `subtype`.
fn resolve_kind(kind: &str, subtype: Option<&str>, compact_summary: bool) -> Option<RecordKind> {
    if compact_summary {
        return Some(RecordKind::CompactRecap);
    }
    match (kind, subtype) {
        ("system", Some(subtype)) => RecordKind::parse(subtype),
        _ => RecordKind::parse(kind),
    }
}

/// Decode one log line. `line` is the 1-based line number, which also
/// becomes the record's `position`.
pub fn decode_line(text: &str, line: usize) -> Result<Record, DecodeError> {
    let raw: RawRecord = serde_json::from_str(text).map_err(|e| DecodeError::Malformed {
        line,
        message: e.to_string(),
    })?;

    let id = non_empty(raw.id).ok_or(DecodeError::MissingField { line, field: "id" })?;
    let session_id = non_empty(raw.session_id).ok_or(DecodeError::MissingField {
        line,
        field: "session_id",
    })?;
    let kind_str = non_empty(raw.kind).ok_or(DecodeError::MissingField { line, field: "kind" })?;
    let kind = resolve_kind(
        &kind_str,
        raw.subtype.as_deref(),
        raw.is_compact_summary.unwrap_or(false),
    )
    .ok_or(DecodeError::UnknownKind {
        line,
        kind: kind_str,
    })?;
    let timestamp = match raw.timestamp {
        Some(value) if !value.is_null() => parse_timestamp(&value, line)?,
        _ => {
            return Err(DecodeError::MissingField {
                line,
                field: "timestamp",
            })
        }
    };

    Ok(Record {
        id,
        parent_id: non_empty(raw.parent_id),
        session_id,
        timestamp,
        kind,
        is_sidechain: raw.is_sidechain.unwrap_or(false),
        originator_role: non_empty(raw.originator_role),
        active_marker: raw.is_active_branch.unwrap_or(false),
        logical_parent_id: non_empty(raw.logical_parent_id),
        payload: content::decode_payload(
            raw.payload.or_else(|| raw.message.and_then(|m| m.content)),
        ),
        position: line,
    })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.is_empty())
}

/// Integer milliseconds, or an RFC 3339 string
fn parse_timestamp(value: &Value, line: usize) -> Result<i64, DecodeError> {
    let invalid = || DecodeError::InvalidTimestamp {
        line,
        value: value.to_string(),
    };
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .ok_or_else(invalid),
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.timestamp_millis())
            .map_err(|_| invalid()),
        _ => Err(invalid()),
    }
}
