use thiserror::Error;

use crate::workflow::Violation;

/// Errors from repository operations (used by trait definitions in formflow-core).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database connection error")]
    Connection,

    #[error("query error: {0}")]
    Query(String),

    #[error("entity not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),
}

/// Errors related to workflow operations.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("workflow not found")]
    NotFound,

    #[error("node '{0}' not found")]
    NodeNotFound(String),

    /// Input bytes are not a decodable node list.
    #[error("malformed graph: {0}")]
    MalformedGraph(String),

    /// The decoded graph breaks one or more validation rules.
    #[error("workflow validation failed: {}", summarize(.0))]
    ValidationFailed(Vec<Violation>),

    /// An edit repurposed a node identifier or changed a node set that must stay fixed.
    #[error("node identity violation: {}", summarize(.0))]
    NodeIdentityViolation(Vec<Violation>),

    #[error("invalid node operation: {0}")]
    InvalidNodeOperation(String),

    /// The persistence boundary failed independently of graph content.
    #[error("storage error: {0}")]
    Storage(#[from] RepositoryError),
}

impl WorkflowError {
    /// Whether retrying the same call could succeed. Content errors are
    /// deterministic and must be fixed by the caller.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            WorkflowError::Storage(RepositoryError::Connection | RepositoryError::Conflict(_))
        )
    }

    /// Violations carried by this error, if any.
    pub fn violations(&self) -> &[Violation] {
        match self {
            WorkflowError::ValidationFailed(v) | WorkflowError::NodeIdentityViolation(v) => v,
            _ => &[],
        }
    }
}

fn summarize(violations: &[Violation]) -> String {
    match violations {
        [] => "no violations reported".to_string(),
        [only] => only.to_string(),
        [first, rest @ ..] => format!("{first} (and {} more)", rest.len()),
    }
}
