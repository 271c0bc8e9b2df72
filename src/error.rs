//! Error types for schemasync

use thiserror::Error;

use crate::sql::ValidationReport;

/// Errors surfaced to the user when SQL text cannot replace the current graph.
///
/// Every variant leaves the previously applied graph untouched.
#[derive(Error, Debug)]
pub enum SchemaError {
    /// Blocking findings reported by the validator before any parse attempt.
    #[error("SQL validation failed: {}", .0.blocking().collect::<Vec<_>>().join("; "))]
    Validation(ValidationReport),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Apply(#[from] ApplyError),

    #[error("Invalid graph JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Malformed DDL.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("SQL syntax error: {message}")]
    Syntax { message: String },

    #[error("SQL syntax error: CREATE TABLE {name} at line {line} has no column list")]
    MalformedCreateTable { name: String, line: usize },
}

/// The text parsed but cannot be applied.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ApplyError {
    #[error("No valid tables found in SQL")]
    NoValidTables,

    #[error("Another SQL apply is already in progress")]
    InProgress,

    #[error("No SQL apply is in progress")]
    NotApplying,

    #[error("The graph cannot be edited while SQL is being applied")]
    Editing,
}
