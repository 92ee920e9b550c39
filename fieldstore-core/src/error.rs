//! Error types for the fieldstore engine.

use thiserror::Error;

/// Reasons a backup could not be restored.
///
/// Line numbers are 1-based positions in the backup text.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RestoreError {
    /// The input ended before a required line
    #[error("backup truncated: expected {expected} at line {line}")]
    MissingLine {
        /// What the decoder was looking for
        expected: &'static str,
        /// Line that was missing
        line: usize,
    },

    /// A record, field or TTL count is not a non-negative integer
    #[error("invalid count {value:?} at line {line}")]
    InvalidCount { line: usize, value: String },

    /// A TTL remaining-seconds value is not an integer
    #[error("invalid TTL seconds {value:?} at line {line}")]
    InvalidSeconds { line: usize, value: String },

    /// A token contains a backslash not followed by `\`, `n` or `r`
    #[error("invalid escape sequence at line {line}")]
    InvalidEscape { line: usize },

    /// A TTL entry names a key that is not among the restored records
    #[error("TTL at line {line} refers to unknown record {key:?}")]
    UnknownTtlKey { line: usize, key: String },
}
