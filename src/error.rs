//! Error types for sessiondag

use thiserror::Error;

/// A log line that could not be turned into a [`crate::record::Record`].
///
/// Every variant carries the 1-based line number of the offending line.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("line {line}: malformed record: {message}")]
    Malformed { line: usize, message: String },

    #[error("line {line}: missing required field `{field}`")]
    MissingField { line: usize, field: &'static str },

    #[error("line {line}: unknown record kind `{kind}`")]
    UnknownKind { line: usize, kind: String },

    #[error("line {line}: invalid timestamp `{value}`")]
    InvalidTimestamp { line: usize, value: String },
}

impl DecodeError {
    pub fn line(&self) -> usize {
        match self {
            DecodeError::Malformed { line, .. }
            | DecodeError::MissingField { line, .. }
            | DecodeError::UnknownKind { line, .. }
            | DecodeError::InvalidTimestamp { line, .. } => *line,
        }
    }
}

/// Errors returned by read-only graph queries.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    #[error("no node with id `{0}`")]
    UnknownNode(String),

    #[error("node `{0}` does not spawn any sidechain")]
    NotADelegation(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_error_line() {
        let err = DecodeError::MissingField {
            line: 7,
            field: "session_id",
        };
        assert_eq!(err.line(), 7);
        assert_eq!(err.to_string(), "line 7: missing required field `session_id`");
    }
}
